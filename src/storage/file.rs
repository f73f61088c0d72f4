// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use secrecy::SecretVec;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::{
    error::{self, Result},
    metadata,
};

use super::{BundleIdentifier, IsPersistent, Storage};

#[serde_as]
#[derive(Default, Deserialize, Serialize)]
struct Entries(#[serde_as(as = "BTreeMap<_, Base64>")] BTreeMap<String, Vec<u8>>);

/// Unencrypted JSON file holding base64-encoded entries.
pub struct File {
    bundle: BundleIdentifier,
    path: PathBuf,
}

impl File {
    /// Places the file in the user's data directory.
    pub fn new<P: AsRef<Path>>(bundle: BundleIdentifier, file: P) -> Option<Self> {
        metadata::PROJECT_DIRS
            .as_ref()
            .map(|dirs| Self::with_path(bundle, dirs.data_dir().join(file)))
    }

    pub fn with_path<P: Into<PathBuf>>(bundle: BundleIdentifier, path: P) -> Self {
        Self {
            bundle,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries> {
        match fs::File::open(&self.path) {
            Ok(fp) => serde_json::from_reader(fp).map_err(|e| {
                if e.is_io() {
                    e.into()
                } else {
                    error::Storage::Data.into()
                }
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Entries::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        _ = options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            _ = options.mode(0o600);
        }
        let file = options.open(&self.path)?;
        serde_json::to_writer_pretty(file, entries)?;
        Ok(())
    }
}

impl IsPersistent for File {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl Storage for File {
    fn bundle(&self) -> &BundleIdentifier {
        &self.bundle
    }

    async fn get(&mut self, suffix: &str) -> Result<Option<SecretVec<u8>>> {
        let id = self.bundle.item_identifier(suffix)?;
        let mut entries = self.load()?;
        Ok(entries.0.remove(&id).map(SecretVec::new))
    }

    async fn update(&mut self, suffix: &str, data: &[u8]) -> Result<()> {
        let id = self.bundle.item_identifier(suffix)?;
        let mut entries = self.load()?;
        _ = entries.0.insert(id, data.to_vec());
        self.save(&entries)
    }

    async fn clear(&mut self, suffix: &str) -> Result<()> {
        let id = self.bundle.item_identifier(suffix)?;
        let mut entries = self.load()?;
        if entries.0.remove(&id).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[tokio::test]
    async fn entries_survive_reopening() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("credentials.json");
        let bundle = BundleIdentifier::new("com.example.app");

        let mut store = File::with_path(bundle.clone(), &path);
        assert!(store.get("key").await?.is_none());
        store.update("key", &[0xde, 0xad, 0xbe, 0xef]).await?;

        let mut reopened = File::with_path(bundle, &path);
        assert_eq!(
            reopened.get("key").await?.map(|k| k.expose_secret().clone()),
            Some(vec![0xde, 0xad, 0xbe, 0xef])
        );

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(raw["com.example.app.key"], "3q2+7w==");

        reopened.clear("key").await?;
        reopened.clear("key").await?;
        assert!(reopened.get("key").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json")?;

        let mut store = File::with_path(BundleIdentifier::new("com.example.app"), &path);
        assert!(matches!(
            store.get("key").await,
            Err(error::Error::Storage(error::Storage::Data))
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_private_to_the_user() -> Result<()> {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("credentials.json");
        let mut store = File::with_path(BundleIdentifier::new("com.example.app"), &path);
        store.update("key", b"secret").await?;

        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o600);
        Ok(())
    }
}
