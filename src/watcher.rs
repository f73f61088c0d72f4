// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Change tracking for files inside an archive.

use std::{
    collections::{BTreeSet, HashMap},
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use log::{debug, trace, warn};
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;

use crate::{
    checksum,
    error::{self, Result},
    tree,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub modified: SystemTime,
    pub len: u64,
    pub crc32: u32,
}

impl FileState {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        Ok(Self {
            modified: metadata.modified()?,
            len: metadata.len(),
            crc32: checksum::file_crc32(path)?,
        })
    }
}

/// Last known state of a set of files.
#[derive(Debug, Default)]
pub struct FileStates {
    states: HashMap<PathBuf, FileState>,
}

impl FileStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modification_time<P: AsRef<Path>>(path: P) -> Result<SystemTime> {
        Ok(fs::metadata(path)?.modified()?)
    }

    /// Records the current state of `path`. A file that no longer exists is
    /// dropped from the tracker.
    pub fn update<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        match FileState::read(path) {
            Ok(state) => {
                _ = self.states.insert(path.to_path_buf(), state);
                Ok(())
            }
            Err(error::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                _ = self.states.remove(path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `path` differs from its recorded state. Untracked paths and
    /// paths that can no longer be read always count as changed.
    pub fn has_changed<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        let Some(recorded) = self.states.get(path) else {
            return true;
        };
        match FileState::read(path) {
            Ok(current) => current != *recorded,
            Err(e) => {
                trace!("Treating {} as changed: {}", path.display(), e);
                true
            }
        }
    }

    pub fn is_tracked<P: AsRef<Path>>(&self, path: P) -> bool {
        self.states.contains_key(path.as_ref())
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&FileState> {
        self.states.get(path.as_ref())
    }

    pub fn forget<P: AsRef<Path>>(&mut self, path: P) -> Option<FileState> {
        self.states.remove(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn paths(&self) -> BTreeSet<PathBuf> {
        self.states.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub path: PathBuf,
    pub kind: EventKind,
}

/// Polls a directory tree and reports files that appear, change or vanish.
#[derive(Debug)]
pub struct Watcher {
    root: PathBuf,
    exclude: Vec<PathBuf>,
    interval: Duration,
    states: FileStates,
    primed: bool,
}

impl Watcher {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            exclude: Vec::new(),
            interval: DEFAULT_INTERVAL,
            states: FileStates::new(),
            primed: false,
        }
    }

    /// Sets the polling interval. Intervals shorter than [`MIN_INTERVAL`] are
    /// raised to it.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Skips the directory `dir` (and everything below it).
    #[must_use]
    pub fn excluding<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.exclude.push(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Performs a single pass over the tree. The first pass only records the
    /// initial state and reports nothing. Files that cannot be read are
    /// skipped and reported once they become readable.
    pub fn scan(&mut self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let mut vanished = self.states.paths();

        for path in tree::files(&self.root, &self.exclude)? {
            let kind = if !vanished.remove(&path) {
                EventKind::Created
            } else if self.states.has_changed(&path) {
                EventKind::Modified
            } else {
                continue;
            };
            if let Err(e) = self.states.update(&path) {
                warn!("Skipping {} for now: {}", path.display(), e);
                continue;
            }
            if self.states.is_tracked(&path) {
                events.push(Event { path, kind });
            }
        }

        for path in vanished {
            _ = self.states.forget(&path);
            events.push(Event {
                path,
                kind: EventKind::Removed,
            });
        }

        if !self.primed {
            self.primed = true;
            debug!(
                "Watching {} files below {}",
                self.states.len(),
                self.root.display()
            );
            events.clear();
        }
        Ok(events)
    }

    /// Scans on every tick until `cancel` fires or `tx` is closed.
    pub async fn run(mut self, tx: mpsc::Sender<Event>, cancel: CancellationToken) -> Result<()> {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let events = match self.scan() {
                        Ok(events) => events,
                        Err(e) => {
                            warn!("We could not scan {}: {}", self.root.display(), e);
                            continue;
                        }
                    };
                    for event in events {
                        if tx.send(event).await.is_err() {
                            debug!("Event receiver went away, stopping watcher");
                            return Ok(());
                        }
                    }
                }
            }
        }

        debug!("Stopped watching {}", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_detects_content_changes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "one")?;

        let mut states = FileStates::new();
        assert!(states.has_changed(&path));

        states.update(&path)?;
        assert_eq!(states.len(), 1);
        assert!(!states.has_changed(&path));
        assert_eq!(
            states.get(&path).map(|state| state.crc32),
            Some(checksum::crc32(b"one"))
        );

        fs::write(&path, "three")?;
        assert!(states.has_changed(&path));

        fs::remove_file(&path)?;
        assert!(states.has_changed(&path));
        states.update(&path)?;
        assert!(states.is_empty());
        assert!(FileStates::modification_time(&path).is_err());
        Ok(())
    }

    #[test]
    fn scan_reports_lifecycle_after_priming() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let existing = dir.path().join("existing.txt");
        fs::write(&existing, "a")?;

        let mut watcher = Watcher::new(dir.path());
        assert!(watcher.scan()?.is_empty());
        assert!(watcher.scan()?.is_empty());

        let created = dir.path().join("created.txt");
        fs::write(&created, "new")?;
        fs::write(&existing, "changed")?;
        assert_eq!(
            watcher.scan()?,
            vec![
                Event {
                    path: created.clone(),
                    kind: EventKind::Created
                },
                Event {
                    path: existing.clone(),
                    kind: EventKind::Modified
                },
            ]
        );

        fs::remove_file(&created)?;
        assert_eq!(
            watcher.scan()?,
            vec![Event {
                path: created,
                kind: EventKind::Removed
            }]
        );
        Ok(())
    }

    #[test]
    fn excluded_directories_are_ignored() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let scratch = dir.path().join("temp");
        fs::create_dir(&scratch)?;

        let mut watcher = Watcher::new(dir.path()).excluding(&scratch);
        assert!(watcher.scan()?.is_empty());
        fs::write(scratch.join("junk"), "x")?;
        assert!(watcher.scan()?.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_files_do_not_hide_other_changes() -> Result<()> {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir()?;
        let mut watcher = Watcher::new(dir.path());
        assert!(watcher.scan()?.is_empty());

        let readable = dir.path().join("a.txt");
        let locked = dir.path().join("b.bin");
        fs::write(&readable, "a")?;
        fs::write(&locked, "b")?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        if fs::File::open(&locked).is_ok() {
            // Permission bits do not apply to this user.
            return Ok(());
        }

        let created = |path: &Path| Event {
            path: path.to_path_buf(),
            kind: EventKind::Created,
        };
        assert_eq!(watcher.scan()?, vec![created(&readable)]);

        let later = dir.path().join("c.txt");
        fs::write(&later, "c")?;
        assert_eq!(watcher.scan()?, vec![created(&later)]);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))?;
        assert_eq!(watcher.scan()?, vec![created(&locked)]);
        assert!(watcher.scan()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn zero_interval_is_raised_to_the_minimum() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let watcher = Watcher::new(dir.path()).with_interval(Duration::ZERO);
        assert_eq!(watcher.interval, MIN_INTERVAL);

        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(tx, cancel.clone()));
        time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        task.await??;
        Ok(())
    }

    #[tokio::test]
    async fn run_sends_events_until_cancelled() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut watcher = Watcher::new(dir.path()).with_interval(Duration::from_millis(10));
        assert!(watcher.scan()?.is_empty());

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(tx, cancel.clone()));

        let path = dir.path().join("fresh.txt");
        fs::write(&path, "hello")?;

        let event = time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(
            event.ok().flatten(),
            Some(Event {
                path,
                kind: EventKind::Created
            })
        );

        cancel.cancel();
        task.await??;
        Ok(())
    }
}
