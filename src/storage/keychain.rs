// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use secrecy::SecretVec;
use security_framework::os::macos::keychain::{SecKeychain, SecPreferencesDomain};

use crate::error::{self, Result};

use super::{BundleIdentifier, IsPersistent, Storage};

/// `errSecItemNotFound`
const ITEM_NOT_FOUND: i32 = -25300_i32;

/// Generic password items in the user's login keychain. The service is the
/// bundle identifier and the account is the full item identifier.
pub struct Keychain {
    delegate: SecKeychain,
    bundle: BundleIdentifier,
}

impl Keychain {
    pub fn new(bundle: BundleIdentifier) -> Result<Self> {
        Ok(Self {
            delegate: SecKeychain::default_for_domain(SecPreferencesDomain::User)
                .map_err(Into::<error::Storage>::into)?,
            bundle,
        })
    }
}

impl IsPersistent for Keychain {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl Storage for Keychain {
    fn bundle(&self) -> &BundleIdentifier {
        &self.bundle
    }

    async fn get(&mut self, suffix: &str) -> Result<Option<SecretVec<u8>>> {
        let account = self.bundle.item_identifier(suffix)?;
        let result = self
            .delegate
            .find_generic_password(self.bundle.as_str(), &account);
        match result {
            Ok((password, _)) => Ok(Some(SecretVec::new(password.to_vec()))),
            Err(err) if err.code() == ITEM_NOT_FOUND => Ok(None),
            Err(err) => Err(Into::<error::Storage>::into(err).into()),
        }
    }

    async fn update(&mut self, suffix: &str, data: &[u8]) -> Result<()> {
        let account = self.bundle.item_identifier(suffix)?;
        self.delegate
            .set_generic_password(self.bundle.as_str(), &account, data)
            .map_err(|_| error::Storage::Add(account.clone()))?;
        Ok(())
    }

    async fn clear(&mut self, suffix: &str) -> Result<()> {
        let account = self.bundle.item_identifier(suffix)?;
        let result = self
            .delegate
            .find_generic_password(self.bundle.as_str(), &account);
        match result {
            Ok((_, item)) => item.delete(),
            Err(err) if err.code() == ITEM_NOT_FOUND => {}
            Err(err) => return Err(Into::<error::Storage>::into(err).into()),
        };
        Ok(())
    }
}
