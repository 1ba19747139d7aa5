//! Snapshot store combinators

use crate::context::SnapshotStore;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Primary store with a best-effort mirror
///
/// The primary is authoritative: writes go there first and its errors are
/// returned. The mirror is then updated, and a mirror failure is only logged.
pub struct MirroredStore<P, M> {
    primary: P,
    mirror: M,
}

impl<P: SnapshotStore, M: SnapshotStore> MirroredStore<P, M> {
    pub fn new(primary: P, mirror: M) -> Self {
        Self { primary, mirror }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    /// Read the mirrored copy, falling back to the primary
    pub fn read_mirror(&self, id: &str) -> Result<Option<Snapshot>> {
        match self.mirror.read(id) {
            Ok(Some(snapshot)) => Ok(Some(snapshot)),
            Ok(None) => self.primary.read(id),
            Err(e) => {
                log::warn!("could not read mirrored snapshot: {}", e);
                self.primary.read(id)
            }
        }
    }
}

impl<P: SnapshotStore, M: SnapshotStore> SnapshotStore for MirroredStore<P, M> {
    fn read(&self, id: &str) -> Result<Option<Snapshot>> {
        self.primary.read(id)
    }

    fn write(&self, id: &str, snapshot: &Snapshot) -> Result<()> {
        self.primary.write(id, snapshot)?;
        if let Err(e) = self.mirror.write(id, snapshot) {
            log::warn!("snapshot saved locally but the mirror was not updated: {}", e);
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.primary.delete(id)?;
        if let Err(e) = self.mirror.delete(id) {
            log::warn!("snapshot removed locally but not from the mirror: {}", e);
        }
        Ok(())
    }
}

/// In-memory store
///
/// `failing()` builds a store whose writes always fail, `unreachable()` one
/// where every operation fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: RefCell<BTreeMap<String, Snapshot>>,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_writes: true,
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        self.snapshots
            .borrow_mut()
            .insert(snapshot.name.clone(), snapshot);
        self
    }

    pub fn get(&self, id: &str) -> Option<Snapshot> {
        self.snapshots.borrow().get(id).cloned()
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self, id: &str) -> Result<Option<Snapshot>> {
        if self.fail_reads {
            return Err(Error::snapshot(id, "store is unreachable"));
        }
        Ok(self.get(id))
    }

    fn write(&self, id: &str, snapshot: &Snapshot) -> Result<()> {
        if self.fail_writes {
            return Err(Error::snapshot(id, "store is read-only"));
        }
        self.snapshots
            .borrow_mut()
            .insert(id.to_string(), snapshot.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Error::snapshot(id, "store is read-only"));
        }
        self.snapshots.borrow_mut().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, infra: &[&str]) -> Snapshot {
        Snapshot {
            name: name.to_string(),
            infra: infra.iter().map(|s| (*s).to_string()).collect(),
            services: BTreeMap::new(),
        }
    }

    #[test]
    fn test_write_reaches_both_stores() {
        let store = MirroredStore::new(MemoryStore::new(), MemoryStore::new());
        store.write("dev", &snapshot("dev", &["kafka"])).unwrap();

        assert!(store.primary().get("dev").is_some());
        assert!(store.mirror().get("dev").is_some());
    }

    #[test]
    fn test_mirror_failure_is_not_fatal() {
        let store = MirroredStore::new(MemoryStore::new(), MemoryStore::failing());
        store.write("dev", &snapshot("dev", &["kafka"])).unwrap();
        store.delete("dev").unwrap();
        assert!(store.primary().get("dev").is_none());
    }

    #[test]
    fn test_primary_failure_skips_mirror() {
        let store = MirroredStore::new(MemoryStore::failing(), MemoryStore::new());
        assert!(store.write("dev", &snapshot("dev", &[])).is_err());
        assert!(store.mirror().get("dev").is_none());
    }

    #[test]
    fn test_read_mirror_prefers_mirror_and_falls_back() {
        let store = MirroredStore::new(
            MemoryStore::new().with_snapshot(snapshot("dev", &["redis"])),
            MemoryStore::new().with_snapshot(snapshot("dev", &["kafka"])),
        );
        assert_eq!(store.read("dev").unwrap().unwrap().infra, vec!["redis"]);
        assert_eq!(store.read_mirror("dev").unwrap().unwrap().infra, vec!["kafka"]);

        let local_only = MirroredStore::new(
            MemoryStore::new().with_snapshot(snapshot("dev", &["redis"])),
            MemoryStore::new(),
        );
        assert_eq!(
            local_only.read_mirror("dev").unwrap().unwrap().infra,
            vec!["redis"]
        );
    }

    #[test]
    fn test_read_mirror_falls_back_when_mirror_is_unreachable() {
        let store = MirroredStore::new(
            MemoryStore::new().with_snapshot(snapshot("dev", &["redis"])),
            MemoryStore::unreachable(),
        );
        assert_eq!(store.read_mirror("dev").unwrap().unwrap().infra, vec!["redis"]);
        assert!(store.read_mirror("qa").unwrap().is_none());

        store.write("dev", &snapshot("dev", &["kafka"])).unwrap();
        assert_eq!(store.read_mirror("dev").unwrap().unwrap().infra, vec!["kafka"]);
    }

    #[test]
    fn test_read_mirror_propagates_primary_errors() {
        let store = MirroredStore::new(MemoryStore::unreachable(), MemoryStore::unreachable());
        assert!(store.read_mirror("dev").is_err());
    }
}
