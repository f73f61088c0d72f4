// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    io,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

/// Lists every regular file below `root`, skipping the directories in
/// `exclude`. Symbolic links are not followed. The result is sorted.
pub(crate) fn files(root: &Path, exclude: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && exclude.iter().any(|skip| skip == entry.path()))
        });

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Entries may disappear between listing and descending.
            Err(e)
                if e.depth() > 0
                    && e.io_error()
                        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound) =>
            {
                continue
            }
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Renders `path` relative to `root` with `/` separators.
pub(crate) fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
