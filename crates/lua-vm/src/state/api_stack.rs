use crate::closure::Upvalue;
use crate::config::LUA_MAX_STACK;
use crate::error::LuaError;
use crate::state::{LuaState, LUA_REGISTRY_INDEX};
use crate::value::LuaValue;

/// What a stack index addresses.
pub(crate) enum Slot {
    /// 0-based slot of the current frame; may lie above the top.
    Stack(usize),
    Registry,
    /// 0-based upvalue of the running closure.
    Upvalue(usize),
}

// ── Index resolution ──────────────────────────────────────────────────────────

impl LuaState {
    pub(crate) fn slot(&self, idx: i32) -> Result<Slot, LuaError> {
        if idx == LUA_REGISTRY_INDEX {
            return Ok(Slot::Registry);
        }
        if idx < LUA_REGISTRY_INDEX {
            return Ok(Slot::Upvalue((LUA_REGISTRY_INDEX - idx - 1) as usize));
        }
        let top = self.current.top() as i32;
        let abs = if idx < 0 { top + idx + 1 } else { idx };
        if abs <= 0 {
            return Err(LuaError::Stack(format!("invalid index {idx}")));
        }
        Ok(Slot::Stack((abs - 1) as usize))
    }

    /// Value at `idx`, or `None` for a valid index with nothing in it.
    pub(crate) fn value_at(&self, idx: i32) -> Result<Option<LuaValue>, LuaError> {
        Ok(match self.slot(idx)? {
            Slot::Stack(i) => self.current.slots.read().get(i).cloned(),
            Slot::Registry => Some(LuaValue::Table(self.registry().clone())),
            Slot::Upvalue(n) => Some(self.upvalue_cell(n)?.get()),
        })
    }

    fn upvalue_cell(&self, n: usize) -> Result<&Upvalue, LuaError> {
        self.current
            .closure
            .as_ref()
            .and_then(|c| c.upvalues.get(n))
            .ok_or_else(|| LuaError::Stack(format!("invalid upvalue index {}", n + 1)))
    }

    /// Value at `idx`; `nil` above the top.
    pub(crate) fn get(&self, idx: i32) -> Result<LuaValue, LuaError> {
        Ok(self.value_at(idx)?.unwrap_or(LuaValue::Nil))
    }

    /// Overwrite the value at `idx`, which must exist.
    pub(crate) fn set(&mut self, idx: i32, val: LuaValue) -> Result<(), LuaError> {
        match self.slot(idx)? {
            Slot::Stack(i) => match self.current.slots.write().get_mut(i) {
                Some(slot) => {
                    *slot = val;
                    Ok(())
                }
                None => Err(LuaError::Stack(format!("invalid index {idx}"))),
            },
            Slot::Registry => Err(LuaError::Stack("cannot replace the registry".into())),
            Slot::Upvalue(n) => {
                self.upvalue_cell(n)?.set(val);
                Ok(())
            }
        }
    }

    fn stack_slot(&self, idx: i32) -> Result<usize, LuaError> {
        match self.slot(idx)? {
            Slot::Stack(i) if i < self.current.top() => Ok(i),
            _ => Err(LuaError::Stack(format!("invalid index {idx}"))),
        }
    }

    // ── Basic stack manipulation ──────────────────────────────────────────────

    pub fn get_top(&self) -> i32 {
        self.current.top() as i32
    }

    /// Convert a relative index into an absolute one. Pseudo-indices are
    /// returned unchanged.
    pub fn abs_index(&self, idx: i32) -> Result<i32, LuaError> {
        match self.slot(idx)? {
            Slot::Stack(i) => Ok(i as i32 + 1),
            Slot::Registry | Slot::Upvalue(_) => Ok(idx),
        }
    }

    /// Make room for `n` more values; `false` when that would pass the stack
    /// limit.
    pub fn check_stack(&mut self, n: i32) -> bool {
        let top = self.current.top();
        if n < 0 || top + n as usize > LUA_MAX_STACK {
            return false;
        }
        self.current.slots.write().reserve(n as usize);
        true
    }

    pub fn push(&mut self, val: LuaValue) {
        self.current.slots.write().push(val);
    }

    pub fn push_values(&mut self, vals: impl IntoIterator<Item = LuaValue>) {
        self.current.slots.write().extend(vals);
    }

    /// Pop the top value.
    pub fn pop_value(&mut self) -> Result<LuaValue, LuaError> {
        self.current
            .slots
            .write()
            .pop()
            .ok_or_else(|| LuaError::Stack("stack underflow".into()))
    }

    /// Pop the top `n` values, bottom-most first.
    pub fn pop_values(&mut self, n: i32) -> Result<Vec<LuaValue>, LuaError> {
        let mut slots = self.current.slots.write();
        let len = slots.len();
        if n < 0 || n as usize > len {
            return Err(LuaError::Stack(format!("cannot pop {n} values from {len}")));
        }
        Ok(slots.split_off(len - n as usize))
    }

    pub fn pop(&mut self, n: i32) -> Result<(), LuaError> {
        self.pop_values(n).map(drop)
    }

    /// Set the top to `idx`, filling new slots with nil or dropping values.
    pub fn set_top(&mut self, idx: i32) -> Result<(), LuaError> {
        let top = self.get_top();
        let new_top = if idx >= 0 { idx } else { top + idx + 1 };
        if new_top < 0 || new_top as usize > LUA_MAX_STACK {
            return Err(LuaError::Stack(format!("invalid new top {idx}")));
        }
        self.current.slots.write().resize(new_top as usize, LuaValue::Nil);
        Ok(())
    }

    /// Copy the value at `from` into `to`.
    pub fn copy(&mut self, from: i32, to: i32) -> Result<(), LuaError> {
        let val = self.get(from)?;
        self.set(to, val)
    }

    /// Push a copy of the value at `idx`.
    pub fn push_value(&mut self, idx: i32) -> Result<(), LuaError> {
        let val = self.get(idx)?;
        self.push(val);
        Ok(())
    }

    /// Pop the top value into `idx`.
    pub fn replace(&mut self, idx: i32) -> Result<(), LuaError> {
        let target = self.abs_index(idx)?;
        let val = self.pop_value()?;
        self.set(target, val)
    }

    /// Rotate the values between `idx` and the top `n` positions towards the
    /// top (negative `n` rotates towards `idx`).
    pub fn rotate(&mut self, idx: i32, n: i32) -> Result<(), LuaError> {
        let start = self.stack_slot(idx)?;
        let mut slots = self.current.slots.write();
        let window = &mut slots[start..];
        let len = window.len();
        if n.unsigned_abs() as usize > len {
            return Err(LuaError::Stack(format!("invalid rotation {n} of {len} values")));
        }
        if n >= 0 {
            window.rotate_right(n as usize);
        } else {
            window.rotate_left(n.unsigned_abs() as usize);
        }
        Ok(())
    }

    /// Move the top value into `idx`, shifting the values above it up.
    pub fn insert(&mut self, idx: i32) -> Result<(), LuaError> {
        self.rotate(idx, 1)
    }

    /// Remove the value at `idx`, shifting the values above it down.
    pub fn remove(&mut self, idx: i32) -> Result<(), LuaError> {
        self.rotate(idx, -1)?;
        self.pop(1)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LuaError;
    use crate::state::{upvalue_index, LuaState, LUA_REGISTRY_INDEX};
    use crate::value::LuaValue;

    fn state_with(values: &[i64]) -> LuaState {
        let mut state = LuaState::new();
        for v in values {
            state.push_integer(*v);
        }
        state
    }

    fn contents(state: &LuaState) -> Vec<i64> {
        (1..=state.get_top()).map(|i| state.to_integer(i)).collect()
    }

    // ── Index resolution ─────────────────────────────────────────────────────

    #[test]
    fn relative_and_absolute_indices() {
        let state = state_with(&[10, 20, 30]);
        assert_eq!(state.abs_index(-1).unwrap(), 3);
        assert_eq!(state.abs_index(2).unwrap(), 2);
        assert_eq!(state.abs_index(LUA_REGISTRY_INDEX).unwrap(), LUA_REGISTRY_INDEX);
        assert!(state.abs_index(0).is_err());
        assert!(state.abs_index(-4).is_err());
    }

    #[test]
    fn reads_above_top_are_empty() {
        let state = state_with(&[1]);
        assert_eq!(state.value_at(5).unwrap(), None);
        assert_eq!(state.get(5).unwrap(), LuaValue::Nil);
    }

    fn third_upvalue(state: &mut LuaState) -> Result<i32, LuaError> {
        state.push_value(upvalue_index(3))?;
        Ok(1)
    }

    #[test]
    fn upvalue_index_without_closure_is_a_stack_error() {
        let mut state = LuaState::new();
        assert!(matches!(state.value_at(upvalue_index(1)), Err(LuaError::Stack(_))));
        assert!(state.is_none(upvalue_index(1)));
        state.push_nil();
        assert!(matches!(state.replace(upvalue_index(1)), Err(LuaError::Stack(_))));
        assert!(matches!(state.push_value(upvalue_index(1)), Err(LuaError::Stack(_))));
    }

    #[test]
    fn upvalue_index_past_the_closure_upvalues_is_a_stack_error() {
        let mut state = LuaState::new();
        state.push_integer(1);
        state.push_integer(2);
        state.push_host_closure(third_upvalue, 2).unwrap();
        let r = state.pcall(0, 1, 0);
        assert_eq!(r, crate::state::ThreadStatus::ErrRun);
        assert_eq!(state.to_string(-1), "stack error: invalid upvalue index 3");
    }

    // ── Manipulation ─────────────────────────────────────────────────────────

    #[test]
    fn set_top_grows_with_nil_and_truncates() {
        let mut state = state_with(&[1, 2, 3]);
        state.set_top(5).unwrap();
        assert!(state.is_nil(5));
        state.set_top(-4).unwrap();
        assert_eq!(contents(&state), vec![1, 2]);
        assert!(state.set_top(-10).is_err());
    }

    #[test]
    fn rotate_insert_and_remove() {
        let mut state = state_with(&[1, 2, 3, 4, 5]);
        state.rotate(2, 1).unwrap();
        assert_eq!(contents(&state), vec![1, 5, 2, 3, 4]);
        state.rotate(2, -1).unwrap();
        assert_eq!(contents(&state), vec![1, 2, 3, 4, 5]);
        state.insert(1).unwrap();
        assert_eq!(contents(&state), vec![5, 1, 2, 3, 4]);
        state.remove(-2).unwrap();
        assert_eq!(contents(&state), vec![5, 1, 2, 4]);
    }

    #[test]
    fn copy_replace_and_push_value() {
        let mut state = state_with(&[1, 2, 3]);
        state.copy(1, 3).unwrap();
        assert_eq!(contents(&state), vec![1, 2, 1]);
        state.push_integer(9);
        state.replace(2).unwrap();
        assert_eq!(contents(&state), vec![1, 9, 1]);
        state.push_value(-2).unwrap();
        assert_eq!(contents(&state), vec![1, 9, 1, 9]);
    }

    #[test]
    fn popping_past_the_bottom_fails() {
        let mut state = state_with(&[1, 2]);
        assert!(state.pop(3).is_err());
        assert_eq!(state.pop_values(2).unwrap(), vec![LuaValue::Integer(1), LuaValue::Integer(2)]);
        assert!(state.pop_value().is_err());
    }

    #[test]
    fn check_stack_respects_the_limit() {
        let mut state = LuaState::new();
        assert!(state.check_stack(100));
        assert!(!state.check_stack(i32::MAX));
        assert!(!state.check_stack(-1));
    }
}
