use std::{collections::BTreeMap, sync::Mutex, time::SystemTime};

/// A delivered item that has not been acknowledged.
pub(super) struct Entry<T> {
    pub data: T,
    pub deadline: SystemTime,
}

/// Deliveries awaiting acknowledgement, keyed by delivery id.
///
/// Every removal (acknowledgement, bulk acknowledgement, or expiry) happens under the same lock,
/// so an entry is handed to at most one remover.
pub(super) struct Pending<T> {
    entries: Mutex<BTreeMap<u64, Entry<T>>>,
}

impl<T> Pending<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, id: u64, data: T, deadline: SystemTime) {
        self.entries
            .lock()
            .unwrap()
            .insert(id, Entry { data, deadline });
    }

    /// Remove the entry for `id`, if it is still tracked.
    pub fn remove(&self, id: u64) -> Option<Entry<T>> {
        self.entries.lock().unwrap().remove(&id)
    }

    /// Remove all entries, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Remove and return (in id order) every entry with a deadline at or before `now`.
    pub fn expire(&self, now: SystemTime) -> Vec<(u64, Entry<T>)> {
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<u64> = entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry)))
            .collect()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    #[test]
    fn test_expire() {
        let pending = Pending::new();
        let start = SystemTime::UNIX_EPOCH;
        pending.insert(3, "c", start + Duration::from_secs(3));
        pending.insert(1, "a", start + Duration::from_secs(1));
        pending.insert(2, "b", start + Duration::from_secs(2));
        assert_eq!(pending.len(), 3);

        // Nothing has expired yet
        assert!(pending.expire(start).is_empty());

        // Deadlines at `now` are expired
        let expired = pending.expire(start + Duration::from_secs(2));
        let expired: Vec<_> = expired.into_iter().map(|(id, e)| (id, e.data)).collect();
        assert_eq!(expired, vec![(1, "a"), (2, "b")]);
        assert_eq!(pending.len(), 1);
        assert!(pending.contains(3));
        assert!(!pending.contains(1));
    }

    #[test]
    fn test_remove_and_clear() {
        let pending = Pending::new();
        let deadline = SystemTime::UNIX_EPOCH;
        pending.insert(1, 10, deadline);
        pending.insert(2, 20, deadline);
        pending.insert(3, 30, deadline);

        assert_eq!(pending.remove(2).map(|e| e.data), Some(20));
        assert!(pending.remove(2).is_none());
        assert!(pending.remove(42).is_none());
        assert_eq!(pending.clear(), 2);
        assert_eq!(pending.clear(), 0);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_remove_races_expire() {
        let pending = Arc::new(Pending::new());
        let deadline = SystemTime::UNIX_EPOCH;
        let entries = 10_000u64;
        for id in 0..entries {
            pending.insert(id, id, deadline);
        }

        // Acknowledge from several threads while another repeatedly expires
        let removed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let pending = pending.clone();
            let removed = removed.clone();
            handles.push(thread::spawn(move || {
                for id in (t..entries).step_by(4) {
                    if pending.remove(id).is_some() {
                        removed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        let expirer = {
            let pending = pending.clone();
            let removed = removed.clone();
            thread::spawn(move || {
                let now = deadline + Duration::from_secs(1);
                for _ in 0..100 {
                    let expired = pending.expire(now);
                    removed.fetch_add(expired.len(), Ordering::Relaxed);
                }
            })
        };
        for handle in handles {
            handle.join().unwrap();
        }
        expirer.join().unwrap();

        // Every entry was removed exactly once
        assert_eq!(removed.load(Ordering::Relaxed), entries as usize);
        assert_eq!(pending.len(), 0);
    }
}
