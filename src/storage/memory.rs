// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use secrecy::SecretVec;
use tokio::sync::RwLock;

use crate::error::Result;

use super::{BundleIdentifier, IsPersistent, Storage};

pub struct Memory {
    bundle: BundleIdentifier,
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl Memory {
    pub fn new(bundle: BundleIdentifier) -> Self {
        Self {
            bundle,
            data: Arc::default(),
        }
    }
}

impl IsPersistent for Memory {
    fn is_persistent(&self) -> bool {
        false
    }
}

#[async_trait]
impl Storage for Memory {
    fn bundle(&self) -> &BundleIdentifier {
        &self.bundle
    }

    async fn get(&mut self, suffix: &str) -> Result<Option<SecretVec<u8>>> {
        let id = self.bundle.item_identifier(suffix)?;
        let data = Arc::clone(&self.data);
        let guard = data.read().await;
        Ok(guard.get(&id).map(|bytes| SecretVec::new(bytes.clone())))
    }

    async fn update(&mut self, suffix: &str, data: &[u8]) -> Result<()> {
        let id = self.bundle.item_identifier(suffix)?;
        let target_data = Arc::clone(&self.data);
        let mut guard = target_data.write_owned().await;
        _ = guard.insert(id, data.to_vec());
        Ok(())
    }

    async fn clear(&mut self, suffix: &str) -> Result<()> {
        let id = self.bundle.item_identifier(suffix)?;
        let target_data = Arc::clone(&self.data);
        let mut guard = target_data.write_owned().await;
        if let Some(mut old) = guard.remove(&id) {
            secrecy::Zeroize::zeroize(&mut old);
        }
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(BundleIdentifier::default())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[tokio::test]
    async fn entries_are_independent_per_suffix() -> Result<()> {
        let mut store = Memory::new(BundleIdentifier::new("com.example.app"));
        store.update("key", b"0123").await?;
        store.update("iv", b"abcd").await?;

        assert_eq!(
            store.get("key").await?.map(|k| k.expose_secret().clone()),
            Some(b"0123".to_vec())
        );

        store.update("key", b"4567").await?;
        assert_eq!(
            store.get("key").await?.map(|k| k.expose_secret().clone()),
            Some(b"4567".to_vec())
        );

        store.clear("key").await?;
        store.clear("key").await?;
        assert!(store.get("key").await?.is_none());
        assert!(store.get("iv").await?.is_some());
        Ok(())
    }
}
