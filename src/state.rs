//! Small values persisted between invocations, each stored as a plain string in its own file.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::protocol::AcMode;

/// Name of the value holding the last heating or cooling mode the AC was seen in.
pub const LAST_MODE: &str = "current_ac_mode";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("could not write {1:?}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("{1:?} contains `{0}`, which is not an AC mode")]
    MalformedMode(String, PathBuf),
}

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "state::Args")]
pub struct Args {
    /// Directory to keep the remembered AC mode and group activity logs in.
    #[arg(long, default_value_os_t = std::env::temp_dir())]
    pub state_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read the value stored under `name`, or `None` if nothing has been stored yet.
    pub async fn read(&self, name: &str) -> Result<Option<String>, Error> {
        let path = self.path(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Read(e, path)),
        }
    }

    pub async fn write(&self, name: &str, value: &str) -> Result<(), Error> {
        let path = self.path(name);
        debug!(message = "storing", ?path, value);
        tokio::fs::write(&path, value).await.map_err(|e| Error::Write(e, path))
    }

    pub async fn last_mode(&self) -> Result<Option<AcMode>, Error> {
        let Some(value) = self.read(LAST_MODE).await? else {
            return Ok(None);
        };
        AcMode::from_name(value.trim())
            .map(Some)
            .map_err(|_| Error::MalformedMode(value, self.path(LAST_MODE)))
    }

    pub async fn remember_mode(&self, mode: AcMode) -> Result<(), Error> {
        self.write(LAST_MODE, mode.name()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.read(LAST_MODE).await.unwrap(), None);
        assert_eq!(store.last_mode().await.unwrap(), None);
    }

    #[tokio::test]
    async fn mode_is_stored_as_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.remember_mode(AcMode::Heat).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join(LAST_MODE)).unwrap(), "Heat");
        assert_eq!(store.last_mode().await.unwrap(), Some(AcMode::Heat));
        store.remember_mode(AcMode::Cool).await.unwrap();
        assert_eq!(store.last_mode().await.unwrap(), Some(AcMode::Cool));
    }

    #[tokio::test]
    async fn garbage_mode() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.write(LAST_MODE, "Sauna").await.unwrap();
        assert!(matches!(store.last_mode().await, Err(Error::MalformedMode(v, _)) if v == "Sauna"));
    }
}
