use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccessNotice {
    pub kind: AccessKind,
    pub address: u32,
    pub length: u32,
    pub value: i32,
}

pub type Callback = Arc<dyn Fn(&MemoryAccessNotice) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Registration {
    id: ObserverId,
    range: RangeInclusive<u32>,
    callback: Callback,
}

/// Address-range subscriptions. Ranges may overlap; every subscriber whose
/// range contains the accessed address is told, in registration order.
#[derive(Default)]
pub struct Observers {
    next: AtomicU64,
    list: RwLock<Vec<Registration>>,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Observers({})", self.len())
    }
}

impl Observers {
    pub fn add(&self, range: RangeInclusive<u32>, callback: Callback) -> ObserverId {
        let id = ObserverId(self.next.fetch_add(1, Ordering::Relaxed));
        self.write().push(Registration { id, range, callback });
        id
    }

    pub fn remove(&self, id: ObserverId) -> bool {
        let mut list = self.write();
        let before = list.len();
        list.retain(|r| r.id != id);
        list.len() != before
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls matching subscribers outside the lock so a callback may
    /// register or remove observers itself.
    pub fn notify(&self, notice: MemoryAccessNotice) {
        let callbacks: Vec<Callback> = self
            .read()
            .iter()
            .filter(|r| r.range.contains(&notice.address))
            .map(|r| r.callback.clone())
            .collect();
        for callback in callbacks {
            callback(&notice);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Registration>> {
        self.list.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Registration>> {
        self.list.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn overlapping_ranges() {
        let observers = Observers::default();
        let seen = Arc::new(Mutex::new(vec![]));
        let a = {
            let seen = seen.clone();
            observers.add(0..=15, Arc::new(move |n: &MemoryAccessNotice| seen.lock().unwrap().push(("a", n.address))))
        };
        {
            let seen = seen.clone();
            observers.add(8..=8, Arc::new(move |n: &MemoryAccessNotice| seen.lock().unwrap().push(("b", n.address))));
        }
        let notice = |address| MemoryAccessNotice {
            kind: AccessKind::Write,
            address,
            length: 4,
            value: 1,
        };
        observers.notify(notice(8));
        observers.notify(notice(4));
        assert!(observers.remove(a));
        assert!(!observers.remove(a));
        observers.notify(notice(8));
        assert_eq!(*seen.lock().unwrap(), vec![("a", 8), ("b", 8), ("a", 4), ("b", 8)]);
    }
}
