//! Chained scatter table with the same layout as the host's `bmap`.
//!
//! Every occupied slot stores its key, its value and the index of the next
//! slot in the same bucket chain. A key lives at its main position
//! (`hash % size`) unless that slot was already taken by a key of the same
//! bucket, in which case it is placed in a free slot taken from the top of
//! the table and linked into the chain. Solidified maps keep this layout, so
//! the `next` indices emitted for each slot must be exactly the ones this
//! table computes.
use std::fmt;

use super::value::{Data, Value};

/// End of a bucket chain.
pub const LASTNODE: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapNode {
    pub key: Value,
    pub value: Value,
    pub next: u32,
}

impl MapNode {
    const EMPTY: MapNode = MapNode {
        key: Value {
            data: Data::Nil,
            is_static: false,
        },
        value: Value {
            data: Data::Nil,
            is_static: false,
        },
        next: LASTNODE,
    };
    pub fn is_empty(&self) -> bool {
        self.key.is_nil()
    }
    /// Chain link as the host prints it: `-1` for the end of a chain.
    pub fn next_index(&self) -> i64 {
        if self.next == LASTNODE {
            -1
        } else {
            self.next as i64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    NilKey,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::NilKey => write!(f, "map key cannot be nil"),
        }
    }
}

impl std::error::Error for MapError {}

fn str_hash(s: &str) -> u32 {
    s.bytes()
        .fold(2166136261u32, |h, c| (h ^ c as u32).wrapping_mul(16777619))
}

pub(crate) fn hashcode(key: &Value) -> u32 {
    match key.data {
        Data::Nil => 0,
        Data::Bool(b) => b as u32,
        Data::Int(i) | Data::Index(i) => i as u32,
        Data::Real(r) => {
            let bits = r.to_bits() as u64;
            (bits ^ (bits >> 32)) as u32
        }
        Data::Str(s) => s.with_str(str_hash),
        Data::NativeFunction(s) | Data::NativeClosure(s) | Data::NativePointer(s) => s.0 as u32,
        Data::Closure(k) => ffi_hash(k),
        Data::Class(k) => ffi_hash(k),
        Data::Module(k) => ffi_hash(k),
        Data::Instance(k) => ffi_hash(k),
        Data::Map(k) => ffi_hash(k),
        Data::List(k) => ffi_hash(k),
    }
}

fn ffi_hash<K: slotmap::Key>(k: K) -> u32 {
    let v = k.data().as_ffi();
    (v ^ (v >> 32)) as u32
}

fn key_eq(a: &Value, b: &Value) -> bool {
    match (a.data, b.data) {
        (Data::Real(x), Data::Real(y)) => x.to_bits() == y.to_bits(),
        (x, y) => x == y,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapTable {
    slots: Vec<MapNode>,
    count: usize,
    lastfree: usize,
}

impl MapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            slots: vec![MapNode::EMPTY; size],
            count: 0,
            lastfree: size,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.count
    }
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
    /// Number of slots, occupied or not.
    pub fn size(&self) -> usize {
        self.slots.len()
    }
    pub fn slots(&self) -> &[MapNode] {
        &self.slots
    }
    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &MapNode> {
        self.slots.iter().filter(|n| !n.is_empty())
    }

    fn main_position(&self, hash: u32) -> usize {
        hash as usize % self.slots.len()
    }

    fn find_slot(&self, key: &Value) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let mut pos = self.main_position(hashcode(key));
        loop {
            let node = &self.slots[pos];
            if node.is_empty() {
                return None;
            }
            if key_eq(&node.key, key) {
                return Some(pos);
            }
            if node.next == LASTNODE {
                return None;
            }
            pos = node.next as usize;
        }
    }

    pub fn find(&self, key: &Value) -> Option<&Value> {
        self.find_slot(key).map(|pos| &self.slots[pos].value)
    }

    fn next_free(&mut self) -> Option<usize> {
        while self.lastfree > 0 {
            self.lastfree -= 1;
            if self.slots[self.lastfree].is_empty() {
                return Some(self.lastfree);
            }
        }
        None
    }

    /// Places a key known to be absent; the table must have a free slot.
    fn place(&mut self, key: Value, value: Value) {
        let hash = hashcode(&key);
        let main = self.main_position(hash);
        if self.slots[main].is_empty() {
            self.slots[main] = MapNode {
                key,
                value,
                next: LASTNODE,
            };
            self.count += 1;
            return;
        }
        let Some(free) = self.next_free() else {
            // count < size guarantees a free slot
            unreachable!("map table has no free slot");
        };
        let occupant_main = self.main_position(hashcode(&self.slots[main].key));
        if occupant_main == main {
            // same bucket: link the new node right after the head
            self.slots[free] = MapNode {
                key,
                value,
                next: self.slots[main].next,
            };
            self.slots[main].next = free as u32;
        } else {
            // the occupant was displaced from another bucket: move it out
            let mut prev = occupant_main;
            while self.slots[prev].next as usize != main {
                prev = self.slots[prev].next as usize;
            }
            self.slots[prev].next = free as u32;
            self.slots[free] = self.slots[main];
            self.slots[main] = MapNode {
                key,
                value,
                next: LASTNODE,
            };
        }
        self.count += 1;
    }

    fn resize(&mut self, size: usize) {
        if size < self.count {
            return;
        }
        let old = std::mem::replace(&mut self.slots, vec![MapNode::EMPTY; size]);
        self.count = 0;
        self.lastfree = size;
        for node in old.into_iter().filter(|n| !n.is_empty()) {
            self.place(node.key, node.value);
        }
    }

    /// Inserts or updates `key`, returning the previous value if any.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<Option<Value>, MapError> {
        if key.is_nil() {
            return Err(MapError::NilKey);
        }
        if let Some(pos) = self.find_slot(&key) {
            let old = std::mem::replace(&mut self.slots[pos].value, value);
            return Ok(Some(old));
        }
        if self.count >= self.slots.len() {
            self.resize((self.slots.len() * 2).max(2));
        }
        self.place(key, value);
        Ok(None)
    }

    /// Removes `key`, leaving an empty slot behind.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        if self.slots.is_empty() {
            return None;
        }
        let mut pos = self.main_position(hashcode(key));
        let mut prev = None;
        loop {
            let node = &self.slots[pos];
            if node.is_empty() {
                return None;
            }
            if key_eq(&node.key, key) {
                break;
            }
            if node.next == LASTNODE {
                return None;
            }
            prev = Some(pos);
            pos = node.next as usize;
        }
        let removed = self.slots[pos].value;
        let mut hole = pos;
        match prev {
            None if self.slots[pos].next != LASTNODE => {
                // chain head: pull the second node into the main position
                let next = self.slots[pos].next as usize;
                self.slots[pos] = self.slots[next];
                hole = next;
            }
            None => {}
            Some(prev) => self.slots[prev].next = self.slots[pos].next,
        }
        self.slots[hole] = MapNode::EMPTY;
        if self.lastfree <= hole {
            self.lastfree = hole + 1;
        }
        self.count -= 1;
        Some(removed)
    }

    /// Shrinks the table to exactly its live entries.
    ///
    /// A table without empty slots is left as is, so compaction is
    /// idempotent. Otherwise survivors are reinserted in slot order into a
    /// table of `len()` slots, which keeps every chain valid for lookups by
    /// the loader.
    pub fn compact(&mut self) {
        if self.count == self.slots.len() {
            return;
        }
        log::trace!("compacting map: {} slots -> {}", self.slots.len(), self.count);
        self.resize(self.count);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn keys(map: &MapTable) -> Vec<String> {
        map.iter().map(|n| n.key.to_string()).collect()
    }

    #[test]
    fn insert_find_update() {
        let mut map = MapTable::new();
        for (i, k) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            assert_eq!(map.insert(Value::str(k), Value::int(i as _)), Ok(None));
        }
        assert_eq!(map.len(), 5);
        assert_eq!(map.find(&Value::str("c")), Some(&Value::int(2)));
        assert_eq!(
            map.insert(Value::str("c"), Value::int(20)),
            Ok(Some(Value::int(2)))
        );
        assert_eq!(map.find(&Value::str("c")), Some(&Value::int(20)));
        assert_eq!(map.find(&Value::str("z")), None);
        assert_eq!(map.insert(Value::nil(), Value::int(0)), Err(MapError::NilKey));
    }

    #[test]
    fn chains_stay_reachable() {
        let mut map = MapTable::new();
        for i in 0..40 {
            map.insert(Value::int(i * 8), Value::int(i)).unwrap();
        }
        for i in 0..40 {
            assert_eq!(map.find(&Value::int(i * 8)), Some(&Value::int(i)));
        }
    }

    #[test]
    fn remove_leaves_hole() {
        let mut map = MapTable::new();
        for i in 0..8 {
            map.insert(Value::int(i), Value::int(i * 10)).unwrap();
        }
        assert_eq!(map.remove(&Value::int(3)), Some(Value::int(30)));
        assert_eq!(map.remove(&Value::int(3)), None);
        assert_eq!(map.len(), 7);
        assert_eq!(map.size(), 8);
        assert!(map.slots().iter().any(MapNode::is_empty));
        for i in (0..8).filter(|i| *i != 3) {
            assert_eq!(map.find(&Value::int(i)), Some(&Value::int(i * 10)));
        }
    }

    #[test]
    fn compact_drops_empty_slots() {
        let mut map = MapTable::new();
        for k in ["init", "speak", "name", "legs", "tail"] {
            map.insert(Value::str(k), Value::bool(true)).unwrap();
        }
        map.remove(&Value::str("legs"));
        map.compact();
        assert_eq!(map.size(), 4);
        assert!(map.slots().iter().all(|n| !n.is_empty()));
        for k in ["init", "speak", "name", "tail"] {
            assert_eq!(map.find(&Value::str(k)), Some(&Value::bool(true)), "{k}");
        }
    }

    #[test]
    fn compact_is_idempotent() {
        let mut map = MapTable::new();
        for i in 0..13 {
            map.insert(Value::str(format!("k{i}")), Value::int(i)).unwrap();
        }
        map.remove(&Value::str("k4"));
        map.compact();
        let once = map.clone();
        map.compact();
        assert_eq!(map, once);
        assert_eq!(keys(&map), keys(&once));
    }

    #[test]
    fn compact_is_deterministic() {
        let build = || {
            let mut map = MapTable::new();
            for i in 0..9 {
                map.insert(Value::str(format!("m{i}")), Value::int(i)).unwrap();
            }
            map.remove(&Value::str("m0"));
            map.compact();
            map
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn chain_end_prints_as_minus_one() {
        let mut map = MapTable::new();
        map.insert(Value::str("a"), Value::nil()).unwrap();
        map.compact();
        assert_eq!(map.slots()[0].next_index(), -1);
    }
}
