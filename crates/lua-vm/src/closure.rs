//! Closure and upvalue types.

use std::sync::Arc;

use lua_core::Prototype;
use parking_lot::RwLock;

use crate::error::LuaError;
use crate::state::LuaState;
use crate::value::LuaValue;

/// A host function: reads its arguments from the stack, pushes its results
/// and returns how many it pushed.
pub type HostFunction = fn(&mut LuaState) -> Result<i32, LuaError>;

/// The value slots of one call frame, shared with the open upvalues that
/// alias them.
pub type Slots = Arc<RwLock<Vec<LuaValue>>>;

// ── Upvalue cells ─────────────────────────────────────────────────────────────

/// A shared, mutable upvalue cell.
///
/// While the captured local is still on the stack (`Open`), the cell points at
/// its slot in the owning frame. When the frame exits, the runtime copies the
/// value into the cell (`Closed`). Every closure holding a clone of the same
/// `Upvalue` observes the same variable.
#[derive(Clone)]
pub struct Upvalue(Arc<RwLock<UpvalueInner>>);

/// Interior state of an upvalue cell.
pub enum UpvalueInner {
    /// The value is still alive in `slots[index]` of its frame.
    Open { slots: Slots, index: usize },
    /// The enclosing frame exited; the value was migrated here.
    Closed(LuaValue),
}

impl Upvalue {
    /// Create an open upvalue aliasing `slots[index]`.
    pub fn open(slots: Slots, index: usize) -> Self {
        Self(Arc::new(RwLock::new(UpvalueInner::Open { slots, index })))
    }

    /// Create a closed upvalue with the given initial value.
    pub fn closed(val: LuaValue) -> Self {
        Self(Arc::new(RwLock::new(UpvalueInner::Closed(val))))
    }

    pub fn get(&self) -> LuaValue {
        match &*self.0.read() {
            UpvalueInner::Open { slots, index } => {
                slots.read().get(*index).cloned().unwrap_or(LuaValue::Nil)
            }
            UpvalueInner::Closed(val) => val.clone(),
        }
    }

    pub fn set(&self, val: LuaValue) {
        // Lock order is always cell, then frame slots.
        match &mut *self.0.write() {
            UpvalueInner::Open { slots, index } => {
                if let Some(slot) = slots.write().get_mut(*index) {
                    *slot = val;
                }
            }
            UpvalueInner::Closed(slot) => *slot = val,
        }
    }

    /// Detach the cell from its frame, keeping the current value.
    pub fn close(&self) {
        let mut inner = self.0.write();
        if let UpvalueInner::Open { slots, index } = &*inner {
            let val = slots.read().get(*index).cloned().unwrap_or(LuaValue::Nil);
            *inner = UpvalueInner::Closed(val);
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(&*self.0.read(), UpvalueInner::Open { .. })
    }

    pub fn ptr_eq(&self, other: &Upvalue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Upvalue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.0.read() {
            UpvalueInner::Open { index, .. } => write!(f, "Upvalue::Open({index})"),
            UpvalueInner::Closed(v) => write!(f, "Upvalue::Closed({v:?})"),
        }
    }
}

// ── Closures ──────────────────────────────────────────────────────────────────

/// What a closure runs.
#[derive(Clone)]
pub enum FunctionBody {
    Lua(Arc<Prototype>),
    Host(HostFunction),
}

/// A runtime closure: a function body paired with its captured upvalue cells.
pub struct LuaClosure {
    pub body: FunctionBody,
    /// Upvalue cells, one per `proto.upvalues` entry (or per host upvalue).
    pub upvalues: Vec<Upvalue>,
}

impl LuaClosure {
    pub fn lua(proto: Arc<Prototype>, upvalues: Vec<Upvalue>) -> Self {
        Self {
            body: FunctionBody::Lua(proto),
            upvalues,
        }
    }

    pub fn host(func: HostFunction, upvalues: Vec<Upvalue>) -> Self {
        Self {
            body: FunctionBody::Host(func),
            upvalues,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.body, FunctionBody::Host(_))
    }

    pub fn proto(&self) -> Option<&Arc<Prototype>> {
        match &self.body {
            FunctionBody::Lua(p) => Some(p),
            FunctionBody::Host(_) => None,
        }
    }
}

impl std::fmt::Debug for LuaClosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body {
            FunctionBody::Lua(p) => write!(
                f,
                "LuaClosure(lua {}:{}, {} upvalues)",
                p.source,
                p.line_defined,
                self.upvalues.len()
            ),
            FunctionBody::Host(_) => write!(f, "LuaClosure(host, {} upvalues)", self.upvalues.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(values: Vec<LuaValue>) -> Slots {
        Arc::new(RwLock::new(values))
    }

    #[test]
    fn open_cell_aliases_the_frame_slot() {
        let slots = frame(vec![LuaValue::Integer(1), LuaValue::Integer(2)]);
        let uv = Upvalue::open(slots.clone(), 1);
        assert_eq!(uv.get(), LuaValue::Integer(2));
        slots.write()[1] = LuaValue::Integer(20);
        assert_eq!(uv.get(), LuaValue::Integer(20));
        uv.set(LuaValue::Integer(200));
        assert_eq!(slots.read()[1], LuaValue::Integer(200));
    }

    #[test]
    fn closing_detaches_from_the_frame() {
        let slots = frame(vec![LuaValue::string("x")]);
        let uv = Upvalue::open(slots.clone(), 0);
        let shared = uv.clone();
        uv.close();
        assert!(!shared.is_open());
        slots.write()[0] = LuaValue::Nil;
        assert_eq!(shared.get(), LuaValue::string("x"));
        shared.set(LuaValue::Boolean(true));
        assert_eq!(uv.get(), LuaValue::Boolean(true));
        assert!(uv.ptr_eq(&shared));
    }

    #[test]
    fn closed_cells_are_independent() {
        let a = Upvalue::closed(LuaValue::Integer(1));
        let b = Upvalue::closed(LuaValue::Integer(1));
        a.set(LuaValue::Integer(5));
        assert_eq!(b.get(), LuaValue::Integer(1));
        assert!(!a.ptr_eq(&b));
    }
}
