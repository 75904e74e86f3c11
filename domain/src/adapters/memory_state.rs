use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{KeyValue, StateError, StateIterator, WorldState};

/// In-memory world state for tests and demos. Keys iterate in byte-wise
/// order, matching the ordering the ledger host gives range scans.
pub struct InMemoryWorldState {
    inner: Mutex<BTreeMap<String, Vec<u8>>>,
    open_iterators: Arc<AtomicUsize>,
}

impl InMemoryWorldState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
            open_iterators: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of range iterators handed out and not yet closed.
    pub fn open_iterators(&self) -> usize {
        self.open_iterators.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        // A poisoned map is still intact; report its real size.
        match self.inner.lock() {
            Ok(map) => map.len(),
            Err(poison) => poison.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryWorldState {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StateError {
    StateError::new("mutex poisoned")
}

impl WorldState for InMemoryWorldState {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let map = self.inner.lock().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        if key.is_empty() {
            return Err(StateError::new("key must not be empty"));
        }
        let mut map = self.inner.lock().map_err(|_| poisoned())?;
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn del_state(&self, key: &str) -> Result<(), StateError> {
        let mut map = self.inner.lock().map_err(|_| poisoned())?;
        map.remove(key);
        Ok(())
    }

    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<Box<dyn StateIterator + 'a>, StateError> {
        let map = self.inner.lock().map_err(|_| poisoned())?;
        let lower = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start.to_string())
        };
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end.to_string())
        };
        if let (Bound::Included(s), Bound::Excluded(e)) = (&lower, &upper) {
            if s > e {
                return Err(StateError::new(format!(
                    "invalid range: start {s:?} is after end {e:?}"
                )));
            }
        }
        // Snapshot so the scan does not hold the lock between pulls.
        let entries: Vec<KeyValue> = map
            .range::<String, _>((lower, upper))
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: v.clone(),
            })
            .collect();
        self.open_iterators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SnapshotIter {
            entries: entries.into_iter(),
            open: Some(Arc::clone(&self.open_iterators)),
        }))
    }
}

struct SnapshotIter {
    entries: std::vec::IntoIter<KeyValue>,
    open: Option<Arc<AtomicUsize>>,
}

impl StateIterator for SnapshotIter {
    fn next_entry(&mut self) -> Option<Result<KeyValue, StateError>> {
        if self.open.is_none() {
            return Some(Err(StateError::new("iterator already closed")));
        }
        self.entries.next().map(Ok)
    }

    fn close(&mut self) -> Result<(), StateError> {
        if let Some(counter) = self.open.take() {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for SnapshotIter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(it: &mut Box<dyn StateIterator + '_>) -> Vec<String> {
        let mut keys = Vec::new();
        while let Some(kv) = it.next_entry() {
            keys.push(kv.unwrap().key);
        }
        keys
    }

    #[test]
    fn put_get_delete() {
        let ws = InMemoryWorldState::new();
        ws.put_state("a", b"1").unwrap();
        assert_eq!(ws.get_state("a").unwrap(), Some(b"1".to_vec()));
        ws.put_state("a", b"2").unwrap();
        assert_eq!(ws.get_state("a").unwrap(), Some(b"2".to_vec()));
        ws.del_state("a").unwrap();
        assert_eq!(ws.get_state("a").unwrap(), None);
        // absent key
        ws.del_state("a").unwrap();
        assert!(ws.is_empty());
    }

    #[test]
    fn range_bounds_are_half_open() {
        let ws = InMemoryWorldState::new();
        for k in ["a", "b", "c", "d"] {
            ws.put_state(k, b"{}").unwrap();
        }
        let mut all = ws.get_state_by_range("", "").unwrap();
        assert_eq!(drain(&mut all), vec!["a", "b", "c", "d"]);
        all.close().unwrap();

        let mut mid = ws.get_state_by_range("b", "d").unwrap();
        assert_eq!(drain(&mut mid), vec!["b", "c"]);
        mid.close().unwrap();

        let mut tail = ws.get_state_by_range("c", "").unwrap();
        assert_eq!(drain(&mut tail), vec!["c", "d"]);
        tail.close().unwrap();
        assert_eq!(ws.open_iterators(), 0);
    }

    #[test]
    fn open_iterators_tracks_close() {
        let ws = InMemoryWorldState::new();
        let mut it = ws.get_state_by_range("", "").unwrap();
        assert_eq!(ws.open_iterators(), 1);
        it.close().unwrap();
        it.close().unwrap();
        assert_eq!(ws.open_iterators(), 0);
        assert!(it.next_entry().unwrap().is_err());
    }

    #[test]
    fn dropping_unclosed_iterator_releases_it() {
        let ws = InMemoryWorldState::new();
        ws.put_state("a", b"{}").unwrap();
        {
            let mut it = ws.get_state_by_range("", "").unwrap();
            assert!(it.next_entry().is_some());
            assert_eq!(ws.open_iterators(), 1);
        }
        assert_eq!(ws.open_iterators(), 0);

        // close then drop must not release twice
        let mut it = ws.get_state_by_range("", "").unwrap();
        it.close().unwrap();
        drop(it);
        assert_eq!(ws.open_iterators(), 0);
    }

    #[test]
    fn len_survives_poisoned_lock() {
        let ws = Arc::new(InMemoryWorldState::new());
        ws.put_state("a", b"1").unwrap();
        ws.put_state("b", b"2").unwrap();

        let held = Arc::clone(&ws);
        let res = std::thread::spawn(move || {
            let _guard = held.inner.lock().unwrap();
            panic!("poison the map");
        })
        .join();
        assert!(res.is_err());
        assert!(ws.inner.is_poisoned());

        assert_eq!(ws.len(), 2);
        assert!(!ws.is_empty());
        assert!(ws.get_state("a").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let ws = InMemoryWorldState::new();
        assert!(ws.get_state_by_range("z", "a").is_err());
        assert_eq!(ws.open_iterators(), 0);
    }
}
