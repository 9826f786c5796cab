//! Persistence layer for the container store.
//!
//! One bincode-encoded record per entity in a sled database, with a typed
//! key prefix per entity kind, plus meta records for the id counter and
//! root-container order. Whole-store load on open, whole-store flush on
//! close; the store does not stream array payloads.

use crate::error::StoreError;
use crate::store::{Container, ContainerId, DataArray, Grouping, Section, SourceNode, Store, Tag};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const META_NEXT_ID: &str = "meta:next_id";
const META_ROOTS: &str = "meta:roots";

/// Sled-backed record storage for one store location.
pub struct SledBackend {
    db: sled::Db,
}

impl fmt::Debug for SledBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledBackend").finish_non_exhaustive()
    }
}

impl SledBackend {
    pub fn open(location: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(location)?;
        Ok(SledBackend { db })
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.db.clear()?;
        Ok(())
    }

    fn load_kind<T: DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> Result<BTreeMap<u64, T>, StoreError> {
        let mut out = BTreeMap::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            let id: u64 = key_str
                .strip_prefix(prefix)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    StoreError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("malformed store key: {key_str}"),
                    ))
                })?;
            let entity: T = bincode::deserialize(&value)?;
            out.insert(id, entity);
        }
        Ok(out)
    }

    fn flush_kind<T: Serialize>(
        &self,
        prefix: &str,
        entities: &BTreeMap<u64, T>,
    ) -> Result<(), StoreError> {
        for (id, entity) in entities {
            let key = format!("{prefix}{id}");
            let value = bincode::serialize(entity)?;
            self.db.insert(key.as_bytes(), value)?;
        }
        Ok(())
    }

    /// Populate `store` from the records at this location.
    pub fn load_into(&self, store: &mut Store) -> Result<(), StoreError> {
        store.containers = self.load_kind::<Container>("container:")?;
        store.groupings = self.load_kind::<Grouping>("grouping:")?;
        store.sources = self.load_kind::<SourceNode>("source:")?;
        store.arrays = self.load_kind::<DataArray>("array:")?;
        store.tags = self.load_kind::<Tag>("tag:")?;
        store.sections = self.load_kind::<Section>("section:")?;

        if let Some(value) = self.db.get(META_NEXT_ID.as_bytes())? {
            store.next_id = bincode::deserialize(&value)?;
        }
        if let Some(value) = self.db.get(META_ROOTS.as_bytes())? {
            store.roots = bincode::deserialize::<Vec<ContainerId>>(&value)?;
        }
        Ok(())
    }

    /// Replace the records at this location with the store's current state.
    pub fn flush_from(&self, store: &Store) -> Result<(), StoreError> {
        // Deleted entities must not survive the rewrite.
        self.db.clear()?;

        self.flush_kind("container:", &store.containers)?;
        self.flush_kind("grouping:", &store.groupings)?;
        self.flush_kind("source:", &store.sources)?;
        self.flush_kind("array:", &store.arrays)?;
        self.flush_kind("tag:", &store.tags)?;
        self.flush_kind("section:", &store.sections)?;

        self.db
            .insert(META_NEXT_ID.as_bytes(), bincode::serialize(&store.next_id)?)?;
        self.db
            .insert(META_ROOTS.as_bytes(), bincode::serialize(&store.roots)?)?;
        self.db.flush()?;
        Ok(())
    }
}
