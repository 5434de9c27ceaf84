use std::sync::Arc;

use parking_lot::RwLock;

use crate::closure::HostFunction;
use crate::error::LuaError;
use crate::state::LuaState;
use crate::table::LuaTable;
use crate::value::{LuaType, LuaValue};

/// Longest `__index` / `__newindex` chain followed before giving up.
const MAX_META_CHAIN: usize = 100;

// ── Indexing with metamethods ─────────────────────────────────────────────────

impl LuaState {
    /// `t[key]`, following `__index` unless `raw`.
    pub(crate) fn index_value(
        &mut self,
        t: &LuaValue,
        key: &LuaValue,
        raw: bool,
    ) -> Result<LuaValue, LuaError> {
        let mut current = t.clone();
        for _ in 0..MAX_META_CHAIN {
            let direct = match &current {
                LuaValue::Table(tbl) => Some(tbl.read().get(key)),
                _ => None,
            };
            let is_table = direct.is_some();
            match direct {
                Some(v) if raw || !v.is_nil() => return Ok(v),
                None if raw => return Err(LuaError::Index(current.type_name())),
                _ => {}
            }
            match self.metamethod(&current, "__index") {
                LuaValue::Nil if is_table => return Ok(LuaValue::Nil),
                LuaValue::Nil => return Err(LuaError::Index(current.type_name())),
                mm @ LuaValue::Function(_) => {
                    return self.call_metamethod(mm, vec![current, key.clone()]);
                }
                next => current = next,
            }
        }
        Err(LuaError::Runtime(LuaValue::string(
            "'__index' chain too long; possible loop",
        )))
    }

    /// `t[key] = val`, following `__newindex` unless `raw` or the key is
    /// already present.
    pub(crate) fn set_index_value(
        &mut self,
        t: &LuaValue,
        key: LuaValue,
        val: LuaValue,
        raw: bool,
    ) -> Result<(), LuaError> {
        let mut current = t.clone();
        for _ in 0..MAX_META_CHAIN {
            let table = match &current {
                LuaValue::Table(tbl) => Some(tbl.clone()),
                _ => None,
            };
            if let Some(tbl) = &table {
                let present = !tbl.read().get(&key).is_nil();
                if raw || present {
                    return tbl.write().put(key, val);
                }
            } else if raw {
                return Err(LuaError::Index(current.type_name()));
            }
            match self.metamethod(&current, "__newindex") {
                LuaValue::Nil => {
                    return match table {
                        Some(tbl) => tbl.write().put(key, val),
                        None => Err(LuaError::Index(current.type_name())),
                    };
                }
                mm @ LuaValue::Function(_) => {
                    self.call_metamethod(mm, vec![current, key, val])?;
                    return Ok(());
                }
                next => current = next,
            }
        }
        Err(LuaError::Runtime(LuaValue::string(
            "'__newindex' chain too long; possible loop",
        )))
    }

    fn push_indexed(&mut self, t: &LuaValue, key: &LuaValue, raw: bool) -> Result<LuaType, LuaError> {
        let val = self.index_value(t, key, raw)?;
        let tp = val.lua_type();
        self.push(val);
        Ok(tp)
    }

    // ── Creation ──────────────────────────────────────────────────────────────

    pub fn new_table(&mut self) {
        self.create_table(0, 0);
    }

    /// Push a table with room for `narr` sequence items and `nrec` others.
    pub fn create_table(&mut self, narr: i32, nrec: i32) {
        let table = LuaTable::with_capacity(narr.max(0) as usize, nrec.max(0) as usize);
        self.push(LuaValue::Table(Arc::new(RwLock::new(table))));
    }

    // ── Get ───────────────────────────────────────────────────────────────────

    /// Pop a key and push `t[key]` for the table at `idx`.
    pub fn get_table(&mut self, idx: i32) -> Result<LuaType, LuaError> {
        let t = self.get(idx)?;
        let key = self.pop_value()?;
        self.push_indexed(&t, &key, false)
    }

    pub fn get_field(&mut self, idx: i32, key: &str) -> Result<LuaType, LuaError> {
        let t = self.get(idx)?;
        self.push_indexed(&t, &LuaValue::string(key), false)
    }

    pub fn get_i(&mut self, idx: i32, i: i64) -> Result<LuaType, LuaError> {
        let t = self.get(idx)?;
        self.push_indexed(&t, &LuaValue::Integer(i), false)
    }

    pub fn raw_get(&mut self, idx: i32) -> Result<LuaType, LuaError> {
        let t = self.get(idx)?;
        let key = self.pop_value()?;
        self.push_indexed(&t, &key, true)
    }

    pub fn raw_get_i(&mut self, idx: i32, i: i64) -> Result<LuaType, LuaError> {
        let t = self.get(idx)?;
        self.push_indexed(&t, &LuaValue::Integer(i), true)
    }

    // ── Set ───────────────────────────────────────────────────────────────────

    /// Pop a value and a key (value on top) and store them into the table at
    /// `idx`.
    pub fn set_table(&mut self, idx: i32) -> Result<(), LuaError> {
        let t = self.get(idx)?;
        let val = self.pop_value()?;
        let key = self.pop_value()?;
        self.set_index_value(&t, key, val, false)
    }

    pub fn set_field(&mut self, idx: i32, key: &str) -> Result<(), LuaError> {
        let t = self.get(idx)?;
        let val = self.pop_value()?;
        self.set_index_value(&t, LuaValue::string(key), val, false)
    }

    pub fn set_i(&mut self, idx: i32, i: i64) -> Result<(), LuaError> {
        let t = self.get(idx)?;
        let val = self.pop_value()?;
        self.set_index_value(&t, LuaValue::Integer(i), val, false)
    }

    pub fn raw_set(&mut self, idx: i32) -> Result<(), LuaError> {
        let t = self.get(idx)?;
        let val = self.pop_value()?;
        let key = self.pop_value()?;
        self.set_index_value(&t, key, val, true)
    }

    pub fn raw_set_i(&mut self, idx: i32, i: i64) -> Result<(), LuaError> {
        let t = self.get(idx)?;
        let val = self.pop_value()?;
        self.set_index_value(&t, LuaValue::Integer(i), val, true)
    }

    // ── Metatables ────────────────────────────────────────────────────────────

    /// Push the metatable of the value at `idx`, if it has one.
    pub fn get_metatable(&mut self, idx: i32) -> Result<bool, LuaError> {
        let val = self.get(idx)?;
        match self.metatable_of(&val) {
            Some(mt) => {
                self.push(LuaValue::Table(mt));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pop a table (or nil) and make it the metatable of the value at `idx`.
    /// Values other than tables share one metatable per type.
    pub fn set_metatable(&mut self, idx: i32) -> Result<(), LuaError> {
        let target = self.get(idx)?;
        let mt = match self.pop_value()? {
            LuaValue::Table(mt) => Some(mt),
            LuaValue::Nil => None,
            other => {
                return Err(LuaError::TypeError {
                    expected: "nil or table",
                    got: other.type_name(),
                })
            }
        };
        match target {
            LuaValue::Table(t) => t.write().set_metatable(mt),
            other => {
                if let Some(tag) = other.lua_type().tag() {
                    self.global.type_metatables.write()[tag] = mt;
                }
            }
        }
        Ok(())
    }

    // ── Traversal ─────────────────────────────────────────────────────────────

    /// Pop a key and push the next key/value pair of the table at `idx`.
    /// Returns `false`, pushing nothing, once the traversal is over.
    pub fn next(&mut self, idx: i32) -> Result<bool, LuaError> {
        let t = self.get(idx)?;
        let key = self.pop_value()?;
        let LuaValue::Table(t) = t else {
            return Err(LuaError::TypeError {
                expected: "table",
                got: t.type_name(),
            });
        };
        let entry = t.write().next(&key)?;
        match entry {
            Some((k, v)) => {
                self.push(k);
                self.push(v);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Globals ───────────────────────────────────────────────────────────────

    pub fn get_global(&mut self, name: &str) -> Result<LuaType, LuaError> {
        let globals = self.globals();
        self.push_indexed(&globals, &LuaValue::string(name), false)
    }

    /// Pop a value into global `name`.
    pub fn set_global(&mut self, name: &str) -> Result<(), LuaError> {
        let globals = self.globals();
        let val = self.pop_value()?;
        self.set_index_value(&globals, LuaValue::string(name), val, false)
    }

    pub fn register(&mut self, name: &str, f: HostFunction) -> Result<(), LuaError> {
        self.push_host_function(f);
        self.set_global(name)
    }
}
