// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::SecretVec;

use crate::{
    error::{self, Result},
    metadata,
};

use super::{BundleIdentifier, IsPersistent, Storage};

pub struct SecretService {
    keyring: oo7::Keyring,
    bundle: BundleIdentifier,
}

impl SecretService {
    fn attributes(id: &str) -> HashMap<&str, &str> {
        HashMap::from([("scribble.kind", "key"), ("scribble.id", id)])
    }

    async fn item(&self, id: &str) -> Result<Option<oo7::Item>> {
        Ok(self
            .keyring
            .search_items(Self::attributes(id))
            .await
            .map_err(error::Storage::from)?
            .into_iter()
            .next())
    }

    pub async fn new(bundle: BundleIdentifier) -> Result<Self> {
        Ok(Self {
            keyring: oo7::Keyring::new().await.map_err(error::Storage::from)?,
            bundle,
        })
    }
}

impl IsPersistent for SecretService {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl Storage for SecretService {
    fn bundle(&self) -> &BundleIdentifier {
        &self.bundle
    }

    async fn get(&mut self, suffix: &str) -> Result<Option<SecretVec<u8>>> {
        let id = self.bundle.item_identifier(suffix)?;
        let data = match self.item(&id).await? {
            Some(item) => {
                let secret = item.secret().await.map_err(error::Storage::from)?;
                Some(SecretVec::new(secret.to_vec()))
            }
            None => None,
        };
        Ok(data)
    }

    async fn update(&mut self, suffix: &str, data: &[u8]) -> Result<()> {
        let id = self.bundle.item_identifier(suffix)?;
        let label = format!("{} ({})", *metadata::CLIENT_DISPLAY_NAME, id);
        self.keyring
            .create_item(&label, Self::attributes(&id), data, true)
            .await
            .map_err(|_| error::Storage::Add(id.clone()))?;
        Ok(())
    }

    async fn clear(&mut self, suffix: &str) -> Result<()> {
        let id = self.bundle.item_identifier(suffix)?;
        if let Some(item) = self.item(&id).await? {
            item.delete().await.map_err(error::Storage::from)?;
        }
        Ok(())
    }
}
