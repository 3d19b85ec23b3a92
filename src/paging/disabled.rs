//! Objects hidden at runtime regardless of their placement data.

use std::collections::BTreeSet;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::records::RefNum;

/// Reader-writer guarded set of disabled reference numbers.
///
/// Chunk builds hold [`DisabledSet::read`] across their whole cell scan, so
/// one build sees one consistent snapshot. Mutations hold the write lock only
/// while they change the set.
#[derive(Debug, Default)]
pub struct DisabledSet {
    refs: RwLock<BTreeSet<RefNum>>,
}

impl DisabledSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable one object. Returns true if the set changed.
    pub fn enable(&self, ref_num: RefNum, enabled: bool) -> bool {
        let mut refs = self.refs.write();
        if enabled {
            refs.remove(&ref_num)
        } else {
            refs.insert(ref_num)
        }
    }

    /// Re-enable everything.
    pub fn clear(&self) {
        self.refs.write().clear();
    }

    pub fn contains(&self, ref_num: RefNum) -> bool {
        self.refs.read().contains(&ref_num)
    }

    pub fn len(&self) -> usize {
        self.refs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.read().is_empty()
    }

    /// Snapshot held for the duration of a scan.
    pub fn read(&self) -> RwLockReadGuard<'_, BTreeSet<RefNum>> {
        self.refs.read()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_enable_disable() {
        let set = DisabledSet::new();
        let r = RefNum::new(0, 7);
        assert!(set.enable(r, false));
        assert!(!set.enable(r, false));
        assert!(set.contains(r));
        assert!(set.enable(r, true));
        assert!(!set.contains(r));
        assert!(!set.enable(r, true));
    }

    #[test]
    fn test_clear() {
        let set = DisabledSet::new();
        set.enable(RefNum::new(0, 1), false);
        set.enable(RefNum::new(1, 1), false);
        assert_eq!(set.len(), 2);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_concurrent_writers() {
        let set = Arc::new(DisabledSet::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let set = Arc::clone(&set);
                thread::spawn(move || {
                    for i in 0..100 {
                        set.enable(RefNum::new(t, i), false);
                        let _snapshot = set.read();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(set.len(), 400);
    }
}
