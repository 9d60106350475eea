//! Flat-file record store.
//!
//! Each collection is one JSON array on disk. Every operation re-reads the
//! whole file; mutations rewrite it through a sibling temp file that is renamed
//! over the original, so readers only ever observe complete arrays. Writers to
//! the same collection are serialized by a per-store mutex.

use std::{
    io,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::models::{StoredUser, Tweet, same_email};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: Uuid },

    #[error("{collection} already holds a record with this {key}")]
    DuplicateKey {
        collection: &'static str,
        key: &'static str,
    },

    #[error("storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode or decode {collection}: {source}")]
    Serialization {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A record that can live in a [`JsonStore`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;

    /// Name of the unique key `self` shares with `other`, if any.
    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.id() == other.id()).then_some("id")
    }
}

impl Record for StoredUser {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.user.user_id
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        if self.id() == other.id() {
            Some("id")
        } else if same_email(&self.user.email, &other.user.email) {
            Some("email")
        } else {
            None
        }
    }
}

impl Record for Tweet {
    const COLLECTION: &'static str = "tweets";

    fn id(&self) -> Uuid {
        self.tweet_id
    }
}

pub struct JsonStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> JsonStore<T> {
    /// Opens the collection at `path`, creating an empty array file if none exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let unavailable = |source: io::Error| StoreError::StorageUnavailable {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(unavailable)?;
        }
        if !fs::try_exists(&path).await.map_err(unavailable)? {
            debug!(collection = T::COLLECTION, path = %path.display(), "initializing empty collection");
            fs::write(&path, b"[]").await.map_err(unavailable)?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn list(&self) -> Result<Vec<T>, StoreError> {
        self.load().await
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn get(&self, id: Uuid) -> Result<T, StoreError> {
        self.load()
            .await?
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or(StoreError::NotFound {
                collection: T::COLLECTION,
                id,
            })
    }

    pub async fn find<P>(&self, mut predicate: P) -> Result<Option<T>, StoreError>
    where
        P: FnMut(&T) -> bool,
    {
        Ok(self.load().await?.into_iter().find(|r| predicate(r)))
    }

    #[instrument(skip_all, fields(collection = T::COLLECTION, id = %record.id()))]
    pub async fn append(&self, record: T) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        if let Some(key) = records.iter().find_map(|r| record.conflicts_with(r)) {
            return Err(StoreError::DuplicateKey {
                collection: T::COLLECTION,
                key,
            });
        }

        records.push(record.clone());
        self.persist(&records).await?;
        Ok(record)
    }

    #[instrument(skip(self, mutate), fields(collection = T::COLLECTION))]
    pub async fn update<F>(&self, id: Uuid, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let index = self.position(&records, id)?;
        let mut updated = records[index].clone();
        mutate(&mut updated);

        let clash = records
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .find_map(|(_, r)| updated.conflicts_with(r));
        if let Some(key) = clash {
            return Err(StoreError::DuplicateKey {
                collection: T::COLLECTION,
                key,
            });
        }

        records[index] = updated.clone();
        self.persist(&records).await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn delete(&self, id: Uuid) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let index = self.position(&records, id)?;
        let removed = records.remove(index);
        self.persist(&records).await?;
        Ok(removed)
    }

    fn position(&self, records: &[T], id: Uuid) -> Result<usize, StoreError> {
        records
            .iter()
            .position(|r| r.id() == id)
            .ok_or(StoreError::NotFound {
                collection: T::COLLECTION,
                id,
            })
    }

    async fn load(&self) -> Result<Vec<T>, StoreError> {
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|source| StoreError::StorageUnavailable {
                path: self.path.clone(),
                source,
            })?;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|source| StoreError::Serialization {
            collection: T::COLLECTION,
            source,
        })
    }

    async fn persist(&self, records: &[T]) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(records).map_err(|source| StoreError::Serialization {
                collection: T::COLLECTION,
                source,
            })?;

        let tmp = self.temp_path();
        if let Err(source) = write_then_rename(&tmp, &self.path, &bytes).await {
            match fs::remove_file(&tmp).await {
                Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                    warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
                }
                _ => {}
            }
            return Err(StoreError::StorageUnavailable {
                path: self.path.clone(),
                source,
            });
        }

        debug!(count = records.len(), "collection persisted");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| T::COLLECTION.to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }
}

/// Writes `bytes` to `tmp`, flushes it to disk, then renames it over `target`.
async fn write_then_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, target).await
}
