//! Runtime limits for a VM instance.

/// Spare stack slots every frame starts with (`LUA_MINSTACK`).
pub const LUA_MIN_STACK: usize = 20;

/// Hard cap on the number of slots in one frame.
pub const LUA_MAX_STACK: usize = 1_000_000;

/// Limits applied to a VM instance and every coroutine created from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of nested calls (Lua and host) before `stack overflow`.
    pub max_call_depth: usize,
    /// Extra slots reserved above a Lua function's register window.
    pub min_stack: usize,
    /// Stack size in bytes of each coroutine worker thread.
    pub coroutine_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            min_stack: LUA_MIN_STACK,
            coroutine_stack_size: 16 * 1024 * 1024,
        }
    }
}

impl VmConfig {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_coroutine_stack_size(mut self, bytes: usize) -> Self {
        self.coroutine_stack_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = VmConfig::default();
        assert_eq!(config.max_call_depth, 200);
        assert_eq!(config.min_stack, 20);
        assert_eq!(config.coroutine_stack_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_builder_overrides() {
        let config = VmConfig::default()
            .with_max_call_depth(10)
            .with_coroutine_stack_size(1 << 20);
        assert_eq!(config.max_call_depth, 10);
        assert_eq!(config.coroutine_stack_size, 1 << 20);
    }
}
