// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{num, path::PathBuf, time::Duration};

use async_trait::async_trait;
use clap::Parser;
use log::{info, warn};
use scribble_fm::{
    error::Result,
    watcher::{EventKind, Watcher},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Report files that are created, modified or removed inside an archive until
/// interrupted.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// Polling interval in milliseconds.
    #[arg(long, short, default_value = "1000")]
    interval: num::NonZeroU64,

    /// Stop after reporting this many events.
    #[arg(long, short)]
    count: Option<num::NonZeroUsize>,

    #[clap()]
    path: PathBuf,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        let archive = ctx.open_archive(&self.path).await?;
        let root = archive.root().to_path_buf();
        let watcher = Watcher::new(&root)
            .excluding(archive.temp_dir())
            .with_interval(Duration::from_millis(self.interval.get()));

        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(tx, cancel.clone()));

        let interrupt = cancel.clone();
        _ = tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("We could not listen for interrupts: {}", e);
            }
            interrupt.cancel();
        });

        info!("Watching {}", root.display());
        let mut remaining = self.count.map_or(usize::MAX, num::NonZeroUsize::get);
        while let Some(event) = rx.recv().await {
            let kind = match event.kind {
                EventKind::Created => "created",
                EventKind::Modified => "modified",
                EventKind::Removed => "removed",
            };
            let name = event.path.strip_prefix(&root).unwrap_or(&event.path);
            println!("{kind:8} {}", name.display());

            remaining -= 1;
            if remaining == 0 {
                cancel.cancel();
                break;
            }
        }

        task.await?
    }
}
