// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Credential stores for raw key material.
//!
//! Entries are addressed by a short suffix (for example `key`) which is
//! namespaced by the application's [`BundleIdentifier`], so the item actually
//! written to the platform store is named `<bundle>.<suffix>`.

mod file;
#[cfg(feature = "keychain")]
mod keychain;
mod memory;
#[cfg(feature = "secret-service")]
mod secret_service;

use std::fmt;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::SecretVec;

use crate::{
    error::{self, Result},
    metadata,
};

pub use file::File;
#[cfg(feature = "keychain")]
pub use keychain::Keychain;
pub use memory::Memory;
#[cfg(feature = "secret-service")]
pub use secret_service::SecretService;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleIdentifier(String);

impl BundleIdentifier {
    pub const MAX_LEN: usize = 255;

    /// Creates an identifier, truncating it to [`Self::MAX_LEN`] bytes on a
    /// character boundary.
    pub fn new<S: Into<String>>(id: S) -> Self {
        let mut id = id.into();
        if id.len() > Self::MAX_LEN {
            let mut end = Self::MAX_LEN;
            while !id.is_char_boundary(end) {
                end -= 1;
            }
            id.truncate(end);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the store item name for `suffix`.
    pub fn item_identifier(&self, suffix: &str) -> Result<String, error::Storage> {
        if suffix.is_empty() || suffix.contains('\0') {
            return Err(error::Storage::InvalidSuffix(suffix.to_owned()));
        }
        Ok(self.item_identifier_lossy(suffix))
    }

    pub(crate) fn item_identifier_lossy(&self, suffix: &str) -> String {
        format!("{}.{}", self.0, suffix)
    }
}

impl Default for BundleIdentifier {
    fn default() -> Self {
        Self::new(metadata::DEFAULT_BUNDLE_IDENTIFIER.as_str())
    }
}

impl fmt::Display for BundleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait IsPersistent {
    fn is_persistent(&self) -> bool;
}

impl<T: IsPersistent + ?Sized> IsPersistent for Box<T> {
    fn is_persistent(&self) -> bool {
        (**self).is_persistent()
    }
}

#[async_trait]
pub trait Storage: Send + Sync + IsPersistent {
    fn bundle(&self) -> &BundleIdentifier;

    /// Fetches the bytes stored under `suffix`, if any.
    async fn get(&mut self, suffix: &str) -> Result<Option<SecretVec<u8>>>;

    /// Stores `data` under `suffix`, replacing any previous value.
    async fn update(&mut self, suffix: &str, data: &[u8]) -> Result<()>;

    /// Removes the value stored under `suffix`. Removing an absent value is
    /// not an error.
    async fn clear(&mut self, suffix: &str) -> Result<()>;
}

#[async_trait]
impl<T: Storage + ?Sized> Storage for Box<T> {
    fn bundle(&self) -> &BundleIdentifier {
        (**self).bundle()
    }

    async fn get(&mut self, suffix: &str) -> Result<Option<SecretVec<u8>>> {
        (**self).get(suffix).await
    }

    async fn update(&mut self, suffix: &str, data: &[u8]) -> Result<()> {
        (**self).update(suffix, data).await
    }

    async fn clear(&mut self, suffix: &str) -> Result<()> {
        (**self).clear(suffix).await
    }
}

/// Opens the most secure credential store available on this system, falling
/// back to an unencrypted file and finally to process memory.
#[allow(clippy::unused_async)]
pub async fn open(bundle: BundleIdentifier, persistent: bool) -> Box<dyn Storage> {
    if persistent {
        #[cfg(feature = "secret-service")]
        match SecretService::new(bundle.clone()).await {
            Ok(secret_service_storage) => return Box::new(secret_service_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to the secret service: {}", e);
            }
        }

        #[cfg(feature = "keychain")]
        match Keychain::new(bundle.clone()) {
            Ok(keychain_storage) => return Box::new(keychain_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to Keychain: {}", e);
            }
        }

        if let Some(file_storage) = File::new(bundle.clone(), "credentials.json") {
            warn!("Keys are kept unencrypted in {}", file_storage.path().display());
            return Box::new(file_storage);
        }

        warn!("No persistent credential store is available, so keys will be lost when we exit");
    }

    Box::new(Memory::new(bundle))
}

/// Stores `key` under `suffix`, reporting failure as `false` after logging it.
pub async fn store_key<S: Storage + ?Sized>(store: &mut S, key: &[u8], suffix: &str) -> bool {
    match store.update(suffix, key).await {
        Ok(()) => {
            debug!("Stored {} key bytes for suffix {}", key.len(), suffix);
            true
        }
        Err(e) => {
            warn!("Failed to store key in credential store for suffix {}: {}", suffix, e);
            false
        }
    }
}

/// Retrieves the key stored under `suffix`, reporting absence and failure
/// alike as `None` after logging them.
pub async fn retrieve_key<S: Storage + ?Sized>(
    store: &mut S,
    suffix: &str,
) -> Option<SecretVec<u8>> {
    match store.get(suffix).await {
        Ok(Some(key)) => Some(key),
        Ok(None) => {
            debug!("No key in credential store for suffix {}", suffix);
            None
        }
        Err(e) => {
            warn!("Failed to retrieve key from credential store for suffix {}: {}", suffix, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn bundle_identifier_is_truncated_on_char_boundary() {
        let long = "é".repeat(200);
        let bundle = BundleIdentifier::new(long);
        assert!(bundle.as_str().len() <= BundleIdentifier::MAX_LEN);
        assert_eq!(bundle.as_str().len(), 254);
    }

    #[test]
    fn item_identifier_joins_bundle_and_suffix() -> Result<()> {
        let bundle = BundleIdentifier::new("com.example.app");
        assert_eq!(bundle.item_identifier("iv")?, "com.example.app.iv");
        assert!(matches!(
            bundle.item_identifier(""),
            Err(error::Storage::InvalidSuffix(_))
        ));
        assert!(matches!(
            bundle.item_identifier("a\0b"),
            Err(error::Storage::InvalidSuffix(_))
        ));
        Ok(())
    }

    #[test]
    fn default_bundle_uses_crate_name() {
        assert_eq!(
            BundleIdentifier::default().as_str(),
            "com.scribblelab.scribble-fm"
        );
    }

    #[tokio::test]
    async fn helper_contract_reports_flags() {
        let mut store = open(BundleIdentifier::new("com.example.app"), false).await;
        assert!(!store.is_persistent());

        assert!(retrieve_key(&mut store, "key").await.is_none());
        assert!(store_key(&mut store, &[1, 2, 3], "key").await);
        assert_eq!(
            retrieve_key(&mut store, "key")
                .await
                .map(|k| k.expose_secret().clone()),
            Some(vec![1, 2, 3])
        );
        assert!(!store_key(&mut store, &[1], "").await);
    }
}
