// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use async_trait::async_trait;
use log::debug;
use scribble_fm::{
    archive::{self, Archive},
    error::Result,
    storage::{self, BundleIdentifier, Storage},
};

pub(crate) mod checksum;
pub(crate) mod cipher;
pub(crate) mod lifecycle;
pub(crate) mod seal;
pub(crate) mod text;
pub(crate) mod watch;

/// Shared state for a single invocation. The credential store is only
/// opened once a command asks for it.
pub(crate) struct Context {
    bundle: BundleIdentifier,
    persistent: bool,
    store: Option<Box<dyn Storage>>,
}

impl Context {
    pub(crate) const fn new(bundle: BundleIdentifier, persistent: bool) -> Self {
        Self {
            bundle,
            persistent,
            store: None,
        }
    }

    pub(crate) async fn store(&mut self) -> &mut Box<dyn Storage> {
        let store = match self.store.take() {
            Some(store) => store,
            None => {
                debug!("Opening credential store for {}", self.bundle);
                storage::open(self.bundle.clone(), self.persistent).await
            }
        };
        self.store.insert(store)
    }

    /// Opens the archive at `root`, consulting the credential store only if
    /// its configuration is sealed.
    pub(crate) async fn open_archive(&mut self, root: &Path) -> Result<Archive> {
        if root.join(archive::ENCRYPTED_CONFIG_FILE).is_file() {
            Archive::open_encrypted(root, self.store().await).await
        } else {
            Archive::open(root)
        }
    }
}

#[async_trait]
pub(crate) trait Command {
    async fn execute(self, ctx: &mut Context) -> Result<()>;
}
