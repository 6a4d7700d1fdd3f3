use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use heed::types::Bytes;
use heed::{Env, EnvOpenOptions};
use mockd_errors::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

use crate::models::{Environment, RawEnvironment};

/// Opaque asynchronous key-value store holding the environments collection.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<RawEnvironment>>, StoreError>;
    async fn set(&self, key: &str, environments: &[Environment]) -> Result<(), StoreError>;
}

/// Database name used inside LMDB / the in-memory map.
const STATE_DB: &str = "state";

pub struct Memory {
    kind: MemoryKind,
}

enum MemoryKind {
    LMDB {
        env: Env,
        dbs: DashMap<String, heed::Database<Bytes, Bytes>>,
    },
    Memory {
        map: DashMap<String, Vec<u8>>,
    },
}

impl Memory {
    /// Open LMDB storage at given path
    pub fn open_lmdb<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(8)
                .map_size(1024 * 1024 * 1024)
                .open(path)?
        };
        Ok(Self {
            kind: MemoryKind::LMDB {
                env,
                dbs: DashMap::new(),
            },
        })
    }

    /// Open in-memory storage
    pub fn memory() -> Self {
        Self {
            kind: MemoryKind::Memory {
                map: DashMap::new(),
            },
        }
    }

    fn make_key(db: &str, key: &str) -> String {
        format!("{}/{}", db, key)
    }

    fn get_db(
        env: &Env,
        dbs: &DashMap<String, heed::Database<Bytes, Bytes>>,
        db_name: &str,
    ) -> Result<heed::Database<Bytes, Bytes>> {
        if let Some(dbi) = dbs.get(db_name) {
            Ok(*dbi)
        } else {
            let mut wtxn = env.write_txn()?;
            let dbi: heed::Database<Bytes, Bytes> =
                env.create_database::<Bytes, Bytes>(&mut wtxn, Some(db_name))?;
            wtxn.commit()?;
            dbs.insert(db_name.to_string(), dbi);
            Ok(dbi)
        }
    }

    /// Insert or update (upsert). Values are MessagePack maps so records
    /// written by older releases still decode field by field.
    pub fn put<T: Serialize + ?Sized>(&self, db: &str, key: &str, value: &T) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(value)?;
        match &self.kind {
            MemoryKind::LMDB { env, dbs } => {
                let dbi = Self::get_db(env, dbs, db)?;
                let mut wtxn = env.write_txn()?;
                dbi.put(&mut wtxn, key.as_bytes(), &bytes)?;
                wtxn.commit()?;
                Ok(())
            }
            MemoryKind::Memory { map } => {
                map.insert(Self::make_key(db, key), bytes);
                Ok(())
            }
        }
    }

    /// Get by key
    pub fn get<T: DeserializeOwned>(&self, db: &str, key: &str) -> Result<Option<T>> {
        match &self.kind {
            MemoryKind::LMDB { env, dbs } => {
                let dbi = Self::get_db(env, dbs, db)?;
                let rtxn = env.read_txn()?;
                match dbi.get(&rtxn, key.as_bytes())? {
                    Some(bytes) => Ok(Some(rmp_serde::from_slice(bytes)?)),
                    None => Ok(None),
                }
            }
            MemoryKind::Memory { map } => match map.get(&Self::make_key(db, key)) {
                Some(bytes) => Ok(Some(rmp_serde::from_slice(bytes.value())?)),
                None => Ok(None),
            },
        }
    }
}

#[async_trait]
impl Store for Memory {
    async fn get(&self, key: &str) -> Result<Option<Vec<RawEnvironment>>, StoreError> {
        Ok(Memory::get(self, STATE_DB, key)?)
    }

    async fn set(&self, key: &str, environments: &[Environment]) -> Result<(), StoreError> {
        Ok(self.put(STATE_DB, key, environments)?)
    }
}
