use std::collections::HashMap;
use std::sync::Arc;

use lua_core::Prototype;
use parking_lot::RwLock;

use crate::closure::{LuaClosure, Slots, Upvalue};
use crate::value::LuaValue;

// ── Call frame ────────────────────────────────────────────────────────────────

/// One activation record.
///
/// The frame owns its value slots; `slots.len()` is the frame's top. Lua
/// functions keep their registers at the bottom of the slots and use the
/// space above `max_register_size` as a scratch stack for calls and
/// multiple results.
pub(crate) struct Frame {
    pub(crate) slots: Slots,
    /// The running closure; `None` for the base frame of a thread.
    pub(crate) closure: Option<Arc<LuaClosure>>,
    /// Prototype of a Lua closure, kept apart so `fetch` need not match.
    pub(crate) proto: Option<Arc<Prototype>>,
    /// Arguments beyond the fixed parameters of a vararg function.
    pub(crate) varargs: Vec<LuaValue>,
    pub(crate) pc: usize,
    /// Open upvalue cells keyed by 0-based slot, at most one per slot.
    open_upvalues: HashMap<usize, Upvalue>,
}

impl Frame {
    pub(crate) fn new(
        closure: Option<Arc<LuaClosure>>,
        values: Vec<LuaValue>,
        varargs: Vec<LuaValue>,
    ) -> Self {
        let proto = closure.as_ref().and_then(|c| c.proto().cloned());
        Self {
            slots: Arc::new(RwLock::new(values)),
            closure,
            proto,
            varargs,
            pc: 0,
            open_upvalues: HashMap::new(),
        }
    }

    /// Empty frame at the bottom of every thread.
    pub(crate) fn base(capacity: usize) -> Self {
        Self::new(None, Vec::with_capacity(capacity), Vec::new())
    }

    pub(crate) fn top(&self) -> usize {
        self.slots.read().len()
    }

    /// The open cell for `slot`, created on first capture and reused after.
    pub(crate) fn capture(&mut self, slot: usize) -> Upvalue {
        let slots = &self.slots;
        self.open_upvalues
            .entry(slot)
            .or_insert_with(|| Upvalue::open(slots.clone(), slot))
            .clone()
    }

    /// Close every open cell at or above `from`.
    pub(crate) fn close_upvalues(&mut self, from: usize) {
        self.open_upvalues.retain(|&slot, cell| {
            if slot >= from {
                cell.close();
                false
            } else {
                true
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn open_upvalue_count(&self) -> usize {
        self.open_upvalues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reuses_the_cell_for_a_slot() {
        let mut frame = Frame::new(None, vec![LuaValue::Integer(1), LuaValue::Integer(2)], vec![]);
        let a = frame.capture(1);
        let b = frame.capture(1);
        assert!(a.ptr_eq(&b));
        assert_eq!(frame.open_upvalue_count(), 1);
    }

    #[test]
    fn close_from_a_level_keeps_lower_cells_open() {
        let mut frame = Frame::new(
            None,
            vec![LuaValue::Integer(1), LuaValue::Integer(2), LuaValue::Integer(3)],
            vec![],
        );
        let low = frame.capture(0);
        let high = frame.capture(2);
        frame.close_upvalues(1);
        assert!(low.is_open());
        assert!(!high.is_open());
        frame.slots.write()[2] = LuaValue::Nil;
        assert_eq!(high.get(), LuaValue::Integer(3));
        assert_eq!(frame.open_upvalue_count(), 1);
    }
}
