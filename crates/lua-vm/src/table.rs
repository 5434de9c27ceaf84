use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use lua_core::number::float_to_integer;

use crate::error::LuaError;
use crate::value::{LuaValue, TableRef};

// ── Keys ──────────────────────────────────────────────────────────────────────

/// A normalized, hashable table key.
///
/// Floats with an exact integer value are stored as integers; nil and NaN
/// are rejected. Tables, functions and coroutines hash by identity.
#[derive(Debug, Clone)]
pub struct TableKey(LuaValue);

impl TableKey {
    pub fn new(key: LuaValue) -> Result<Self, LuaError> {
        match key {
            LuaValue::Nil => Err(LuaError::TableKey("nil")),
            LuaValue::Float(f) if f.is_nan() => Err(LuaError::TableKey("NaN")),
            LuaValue::Float(f) => Ok(TableKey(match float_to_integer(f) {
                Some(i) => LuaValue::Integer(i),
                None => LuaValue::Float(f),
            })),
            other => Ok(TableKey(other)),
        }
    }

    pub fn value(&self) -> &LuaValue {
        &self.0
    }

    pub fn into_value(self) -> LuaValue {
        self.0
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for TableKey {}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            LuaValue::Nil => 0u8.hash(state),
            LuaValue::Boolean(b) => (1u8, b).hash(state),
            LuaValue::Integer(i) => (2u8, i).hash(state),
            LuaValue::Float(f) => (3u8, f.to_bits()).hash(state),
            LuaValue::LuaString(s) => (4u8, s).hash(state),
            LuaValue::Function(c) => (5u8, Arc::as_ptr(c) as *const () as usize).hash(state),
            LuaValue::Table(t) => (6u8, Arc::as_ptr(t) as *const () as usize).hash(state),
            LuaValue::Coroutine(c) => (7u8, Arc::as_ptr(c) as *const () as usize).hash(state),
        }
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// A Lua table: an associative array keyed by any non-nil, non-NaN value.
///
/// Integer keys 1..n live in the `array` part; everything else goes into the
/// `map` part. A key written with `nil` is removed from the map; inside the
/// array it leaves a hole until trailing holes are trimmed.
#[derive(Debug, Default)]
pub struct LuaTable {
    array: Vec<LuaValue>, // 1-indexed: array[i-1] = t[i]
    map: HashMap<TableKey, LuaValue>,
    /// Number of nil slots inside `array`.
    holes: usize,
    metatable: Option<TableRef>,
    /// Iteration order of `map`, built on first `next` after a key insertion.
    order: Option<KeyOrder>,
}

#[derive(Debug)]
struct KeyOrder {
    keys: Vec<TableKey>,
    position: HashMap<TableKey, usize>,
}

impl LuaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(narr: usize, nrec: usize) -> Self {
        Self {
            array: Vec::with_capacity(narr),
            map: HashMap::with_capacity(nrec),
            ..Self::default()
        }
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, mt: Option<TableRef>) {
        self.metatable = mt;
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Read `t[key]`. Returns `LuaValue::Nil` for missing keys, including
    /// the keys that can never be stored (nil, NaN).
    pub fn get(&self, key: &LuaValue) -> LuaValue {
        match key {
            LuaValue::Nil => LuaValue::Nil,
            LuaValue::Integer(i) => self.get_int(*i),
            LuaValue::Float(f) => match float_to_integer(*f) {
                Some(i) => self.get_int(i),
                None if f.is_nan() => LuaValue::Nil,
                None => self.lookup(TableKey(key.clone())),
            },
            _ => self.lookup(TableKey(key.clone())),
        }
    }

    pub fn get_int(&self, i: i64) -> LuaValue {
        if i >= 1 && i as u64 <= self.array.len() as u64 {
            return self.array[(i - 1) as usize].clone();
        }
        self.lookup(TableKey(LuaValue::Integer(i)))
    }

    pub fn get_str(&self, key: &str) -> LuaValue {
        self.lookup(TableKey(LuaValue::LuaString(key.to_string())))
    }

    fn lookup(&self, key: TableKey) -> LuaValue {
        self.map.get(&key).cloned().unwrap_or(LuaValue::Nil)
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Write `t[key] = val`. Setting to nil deletes the entry.
    pub fn put(&mut self, key: LuaValue, val: LuaValue) -> Result<(), LuaError> {
        let key = TableKey::new(key)?;
        match key.0 {
            LuaValue::Integer(i) => self.put_int(i, val),
            _ => self.put_map(key, val),
        }
        Ok(())
    }

    pub fn put_int(&mut self, i: i64, val: LuaValue) {
        let len = self.array.len() as i64;
        if i >= 1 && i <= len {
            let slot = &mut self.array[(i - 1) as usize];
            match (slot.is_nil(), val.is_nil()) {
                (false, true) => self.holes += 1,
                (true, false) => self.holes -= 1,
                _ => {}
            }
            *slot = val;
            if i == len {
                self.shrink();
            }
            return;
        }
        if i == len + 1 {
            self.put_map(TableKey(LuaValue::Integer(i)), LuaValue::Nil);
            if !val.is_nil() {
                self.array.push(val);
                self.expand();
            }
            return;
        }
        self.put_map(TableKey(LuaValue::Integer(i)), val);
    }

    pub fn put_str(&mut self, key: &str, val: LuaValue) {
        self.put_map(TableKey(LuaValue::LuaString(key.to_string())), val);
    }

    fn put_map(&mut self, key: TableKey, val: LuaValue) {
        if val.is_nil() {
            // A removed key keeps its place in a cached order; `next` skips it.
            self.map.remove(&key);
        } else if self.map.insert(key, val).is_none() {
            self.order = None;
        }
    }

    /// Trim trailing nils off the array part.
    fn shrink(&mut self) {
        while matches!(self.array.last(), Some(LuaValue::Nil)) {
            self.array.pop();
            self.holes -= 1;
        }
    }

    /// Pull `len+1, len+2, ...` out of the map after the array grew.
    fn expand(&mut self) {
        loop {
            let next = TableKey(LuaValue::Integer(self.array.len() as i64 + 1));
            match self.map.remove(&next) {
                Some(v) => self.array.push(v),
                None => break,
            }
        }
    }

    // ── Length ────────────────────────────────────────────────────────────────

    /// Size of the array part, holes included.
    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    /// The `#` border: length of the non-nil prefix of the array part.
    pub fn length(&self) -> i64 {
        if self.holes == 0 {
            return self.array.len() as i64;
        }
        self.array
            .iter()
            .position(LuaValue::is_nil)
            .unwrap_or(self.array.len()) as i64
    }

    pub fn map_len(&self) -> usize {
        self.map.len()
    }

    // ── Traversal ─────────────────────────────────────────────────────────────

    /// The entry after `key` (`nil` starts a traversal), or `None` at the end.
    pub fn next(&mut self, key: &LuaValue) -> Result<Option<(LuaValue, LuaValue)>, LuaError> {
        let map_start = match key {
            LuaValue::Nil => match self.next_in_array(0) {
                Some(entry) => return Ok(Some(entry)),
                None => 0,
            },
            _ => {
                let key = TableKey::new(key.clone())?;
                if let LuaValue::Integer(i) = key.0 {
                    if i >= 1 && i as u64 <= self.array.len() as u64 {
                        if let Some(entry) = self.next_in_array(i as usize) {
                            return Ok(Some(entry));
                        }
                        return Ok(self.next_in_map(0));
                    }
                }
                let order = self.order();
                match (order.position.get(&key), &key.0) {
                    (Some(p), _) => p + 1,
                    // An array key cleared during traversal may have been
                    // trimmed off; nothing non-nil follows it in the array.
                    (None, LuaValue::Integer(i)) if *i >= 1 => 0,
                    (None, _) => {
                        return Err(LuaError::Runtime(LuaValue::string(
                            "invalid key to 'next'",
                        )))
                    }
                }
            }
        };
        Ok(self.next_in_map(map_start))
    }

    fn next_in_array(&self, from: usize) -> Option<(LuaValue, LuaValue)> {
        self.array
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, v)| !v.is_nil())
            .map(|(i, v)| (LuaValue::Integer(i as i64 + 1), v.clone()))
    }

    fn next_in_map(&mut self, from: usize) -> Option<(LuaValue, LuaValue)> {
        self.order();
        let order = self.order.as_ref()?;
        order.keys[from.min(order.keys.len())..]
            .iter()
            .find_map(|k| self.map.get(k).map(|v| (k.0.clone(), v.clone())))
    }

    fn order(&mut self) -> &KeyOrder {
        let map = &self.map;
        self.order.get_or_insert_with(|| {
            let keys: Vec<TableKey> = map.keys().cloned().collect();
            let position = keys.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect();
            KeyOrder { keys, position }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(v: &str) -> LuaValue {
        LuaValue::string(v)
    }

    fn seq(n: i64) -> LuaTable {
        let mut t = LuaTable::new();
        for i in 1..=n {
            t.put_int(i, LuaValue::Integer(i * 10));
        }
        t
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    #[test]
    fn nil_and_nan_keys_are_rejected() {
        let mut t = LuaTable::new();
        assert_eq!(t.put(LuaValue::Nil, s("x")), Err(LuaError::TableKey("nil")));
        assert_eq!(
            t.put(LuaValue::Float(f64::NAN), s("x")),
            Err(LuaError::TableKey("NaN"))
        );
        assert_eq!(t.get(&LuaValue::Nil), LuaValue::Nil);
    }

    #[test]
    fn integral_float_keys_normalize() {
        let mut t = LuaTable::new();
        t.put(LuaValue::Float(1.0), s("one")).unwrap();
        assert_eq!(t.get(&LuaValue::Integer(1)), s("one"));
        assert_eq!(t.array_len(), 1);
        t.put(LuaValue::Float(1.5), s("half")).unwrap();
        assert_eq!(t.get(&LuaValue::Float(1.5)), s("half"));
    }

    #[test]
    fn reference_keys_use_identity() {
        let mut t = LuaTable::new();
        let k1 = LuaValue::new_table();
        let k2 = LuaValue::new_table();
        t.put(k1.clone(), s("a")).unwrap();
        assert_eq!(t.get(&k1), s("a"));
        assert_eq!(t.get(&k2), LuaValue::Nil);
    }

    // ── Array / map boundary ─────────────────────────────────────────────────

    #[test]
    fn append_migrates_following_keys() {
        let mut t = LuaTable::new();
        t.put_int(2, s("b"));
        t.put_int(3, s("c"));
        assert_eq!(t.array_len(), 0);
        assert_eq!(t.map_len(), 2);
        t.put_int(1, s("a"));
        assert_eq!(t.array_len(), 3);
        assert_eq!(t.map_len(), 0);
        assert_eq!(t.length(), 3);
    }

    #[test]
    fn clearing_last_slot_shrinks_past_trailing_nils() {
        let mut t = seq(5);
        t.put_int(4, LuaValue::Nil);
        assert_eq!(t.array_len(), 5);
        t.put_int(5, LuaValue::Nil);
        assert_eq!(t.array_len(), 3);
        assert_eq!(t.length(), 3);
    }

    #[test]
    fn holes_scenario() {
        let mut t = seq(3);
        assert_eq!(t.length(), 3);
        t.put_int(4, s("x"));
        assert_eq!(t.length(), 4);
        t.put_int(2, LuaValue::Nil);
        assert_eq!(t.array_len(), 4);
        assert_eq!(t.get_int(2), LuaValue::Nil);
        assert_eq!(t.get_int(4), s("x"));
        assert_eq!(t.length(), 1);
        t.put_int(2, s("back"));
        assert_eq!(t.length(), 4);
    }

    #[test]
    fn nil_removes_map_entries() {
        let mut t = LuaTable::new();
        t.put_str("k", s("v"));
        assert_eq!(t.map_len(), 1);
        t.put_str("k", LuaValue::Nil);
        assert_eq!(t.map_len(), 0);
        assert_eq!(t.get_str("k"), LuaValue::Nil);
    }

    // ── Traversal ────────────────────────────────────────────────────────────

    fn collect(t: &mut LuaTable) -> Vec<(LuaValue, LuaValue)> {
        let mut out = Vec::new();
        let mut key = LuaValue::Nil;
        while let Some((k, v)) = t.next(&key).unwrap() {
            out.push((k.clone(), v));
            key = k;
        }
        out
    }

    #[test]
    fn next_visits_array_then_map() {
        let mut t = seq(2);
        t.put_str("x", s("y"));
        let entries = collect(&mut t);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (LuaValue::Integer(1), LuaValue::Integer(10)));
        assert_eq!(entries[1], (LuaValue::Integer(2), LuaValue::Integer(20)));
        assert_eq!(entries[2], (s("x"), s("y")));
    }

    #[test]
    fn next_skips_array_holes() {
        let mut t = seq(3);
        t.put_int(2, LuaValue::Nil);
        let keys: Vec<_> = collect(&mut t).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![LuaValue::Integer(1), LuaValue::Integer(3)]);
    }

    #[test]
    fn order_is_stable_until_mutation() {
        let mut t = LuaTable::new();
        for name in ["a", "b", "c", "d", "e"] {
            t.put_str(name, s(name));
        }
        let first = collect(&mut t);
        let second = collect(&mut t);
        assert_eq!(first, second);
    }

    #[test]
    fn clearing_fields_during_traversal_is_allowed() {
        let mut t = LuaTable::new();
        for name in ["a", "b", "c", "d"] {
            t.put_str(name, s(name));
        }
        let mut key = LuaValue::Nil;
        let mut seen = 0;
        while let Some((k, _)) = t.next(&key).unwrap() {
            t.put(k.clone(), LuaValue::Nil).unwrap();
            seen += 1;
            key = k;
        }
        assert_eq!(seen, 4);
        assert_eq!(t.map_len(), 0);
    }

    #[test]
    fn clearing_array_entries_during_traversal_is_allowed() {
        let mut t = seq(3);
        t.put_str("x", s("y"));
        let mut key = LuaValue::Nil;
        let mut seen = Vec::new();
        while let Some((k, _)) = t.next(&key).unwrap() {
            t.put(k.clone(), LuaValue::Nil).unwrap();
            seen.push(k.clone());
            key = k;
        }
        assert_eq!(
            seen,
            vec![LuaValue::Integer(1), LuaValue::Integer(2), LuaValue::Integer(3), s("x")]
        );
        assert_eq!(t.array_len(), 0);
        assert_eq!(t.map_len(), 0);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let mut t = seq(1);
        assert!(t.next(&s("missing")).is_err());
    }

    // ── Properties ───────────────────────────────────────────────────────────

    fn key_strategy() -> impl Strategy<Value = LuaValue> {
        prop_oneof![
            (-20i64..40).prop_map(LuaValue::Integer),
            "[a-z]{1,4}".prop_map(LuaValue::LuaString),
            any::<bool>().prop_map(LuaValue::Boolean),
            (-100.0f64..100.0).prop_map(LuaValue::Float),
        ]
    }

    proptest! {
        #[test]
        fn put_then_get(
            setup in prop::collection::vec((key_strategy(), any::<i64>()), 0..30),
            key in key_strategy(),
            v in any::<i64>(),
        ) {
            let mut t = LuaTable::new();
            for (k, x) in setup {
                t.put(k, LuaValue::Integer(x)).unwrap();
            }
            t.put(key.clone(), LuaValue::Integer(v)).unwrap();
            prop_assert_eq!(t.get(&key), LuaValue::Integer(v));
        }

        #[test]
        fn append_grows_length(n in 0i64..50, v in any::<i64>()) {
            let mut t = seq(n);
            let len = t.array_len() as i64;
            t.put_int(len + 1, LuaValue::Integer(v));
            prop_assert_eq!(t.length(), len + 1);
            prop_assert_eq!(t.array_len() as i64, len + 1);
        }

        #[test]
        fn clearing_last_trims_trailing_nils(n in 1i64..40, cleared in 0i64..40) {
            let mut t = seq(n);
            let cleared = cleared.min(n - 1);
            // punch holes just below the last slot, then clear the last slot
            for i in (n - cleared)..n {
                t.put_int(i, LuaValue::Nil);
            }
            t.put_int(n, LuaValue::Nil);
            prop_assert_eq!(t.array_len() as i64, n - 1 - cleared);
            prop_assert_eq!(t.length(), n - 1 - cleared);
        }

        #[test]
        fn traversal_visits_every_entry_once(
            entries in prop::collection::hash_map("[a-z]{1,3}", any::<i64>(), 0..20),
            n in 0i64..10,
        ) {
            let mut t = seq(n);
            for (k, v) in &entries {
                t.put_str(k, LuaValue::Integer(*v));
            }
            prop_assert_eq!(collect(&mut t).len(), entries.len() + n as usize);
        }
    }
}
