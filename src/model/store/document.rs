use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use rocket::{
    serde::json::serde_json,
    tokio::{
        fs,
        sync::{Mutex, MutexGuard},
    },
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// A record that is persisted as a single JSON file and rewritten wholesale
/// on every change.
pub trait JsonDocument: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Path of the file, relative to the data directory.
    const FILE_NAME: &'static str;
}

/// Single-writer access to one JSON document.
///
/// The in-memory copy is authoritative once loaded. Writers hold the lock for
/// the whole read-modify-write cycle, and a change only becomes visible after
/// it has been written to disk.
pub struct JsonStore<T> {
    path: PathBuf,
    state: Mutex<T>,
}

impl<T> JsonStore<T>
where
    T: JsonDocument,
{
    /// Load the document from `data_dir`, creating parent directories as needed.
    /// A missing file yields the default document.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(T::FILE_NAME);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let state = match read_json(&path).await? {
            Some(document) => document,
            None => {
                debug!("{} not found, starting from defaults", path.display());
                T::default()
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Lock the document for reading.
    pub async fn read(&self) -> MutexGuard<'_, T> {
        self.state.lock().await
    }

    /// Lock the document for modification. Changes are discarded unless
    /// [`StoreGuard::commit`] is called.
    pub async fn write(&self) -> StoreGuard<'_, T> {
        let guard = self.state.lock().await;
        let working = guard.clone();
        StoreGuard {
            path: &self.path,
            guard,
            working,
        }
    }

    /// Directory holding the document file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Write an auxiliary JSON file next to the document.
    pub async fn write_attachment<V: Serialize>(&self, file_name: &str, value: &V) -> Result<()> {
        write_json(&self.dir().join(file_name), value).await
    }

    /// Read an auxiliary JSON file next to the document, if it exists.
    pub async fn read_attachment<V: DeserializeOwned>(&self, file_name: &str) -> Result<Option<V>> {
        read_json(&self.dir().join(file_name)).await
    }
}

/// Exclusive handle on a document being modified.
pub struct StoreGuard<'a, T> {
    path: &'a Path,
    guard: MutexGuard<'a, T>,
    working: T,
}

impl<'a, T> StoreGuard<'a, T>
where
    T: JsonDocument,
{
    /// Persist the modified document, then make it visible to other requests.
    pub async fn commit(mut self) -> Result<()> {
        write_json(self.path, &self.working).await?;
        *self.guard = self.working;
        Ok(())
    }
}

impl<T> Deref for StoreGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.working
    }
}

impl<T> DerefMut for StoreGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.working
    }
}

async fn read_json<V: DeserializeOwned>(path: &Path) -> Result<Option<V>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a temporary file and rename, so readers never see a partial file.
async fn write_json<V: Serialize>(path: &Path, value: &V) -> Result<()> {
    let contents = serde_json::to_vec_pretty(value)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, contents).await?;
    fs::rename(&tmp_path, path).await?;
    trace!("Wrote {}", path.display());
    Ok(())
}
