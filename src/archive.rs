// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Scribble archives: a directory holding the project configuration, text
//! and image entries, a canvas layout and scratch space.
//!
//! ```text
//! <root>/.scconfig          project configuration (.scconfig.enc if sealed)
//! <root>/content.scstate    canvas layout
//! <root>/img/               raster images
//! <root>/img/vec/           vector images
//! <root>/txt/               text entries
//! <root>/temp/              scratch files, never checksummed
//! ```

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Component, Path, PathBuf},
};

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretVec};
use tempfile::NamedTempFile;

use crate::{
    checksum,
    config::{ProjectConfig, References},
    crypto,
    error::{self, Result},
    layout::Layout,
    storage::Storage,
    tree,
};

pub const CONFIG_FILE: &str = ".scconfig";
pub const ENCRYPTED_CONFIG_FILE: &str = ".scconfig.enc";
pub const LAYOUT_FILE: &str = "content.scstate";
const IMAGE_DIR: &str = "img";
const VECTOR_DIR: &str = "vec";
const TEXT_DIR: &str = "txt";
const TEMP_DIR: &str = "temp";

pub struct Archive {
    root: PathBuf,
    config: ProjectConfig,
    key: Option<SecretVec<u8>>,
}

fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None)
            if !name.contains(['/', '\\', '\0']) && name.trim() == name =>
        {
            Ok(())
        }
        _ => Err(error::Archive::InvalidName(name.to_owned()).into()),
    }
}

fn is_vector_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

fn normalize_line_endings(content: &str, ending: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");
    if ending == "\n" {
        unified
    } else {
        unified.replace('\n', ending)
    }
}

fn not_found_as_entry(name: &str) -> impl FnOnce(io::Error) -> error::Error + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::NotFound {
            error::Archive::EntryNotFound(name.to_owned()).into()
        } else {
            e.into()
        }
    }
}

/// Writes `data` to `path` through a temporary sibling so readers never see a
/// partially written file.
fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    io::Write::write_all(&mut temp, data)?;
    _ = temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn text_files(references: &mut References) -> &mut Vec<String> {
    &mut references.text_files
}

fn images(references: &mut References) -> &mut Vec<String> {
    &mut references.images
}

impl Archive {
    /// Creates a new archive at `root` with a plain configuration file.
    pub fn create<P: AsRef<Path>>(root: P, config: ProjectConfig) -> Result<Self> {
        Self::build(root.as_ref(), config, None)
    }

    /// Creates a new archive whose configuration is sealed with the key held
    /// by `store`. A key is generated and stored if the store has none.
    pub async fn create_encrypted<P, S>(
        root: P,
        mut config: ProjectConfig,
        store: &mut S,
    ) -> Result<Self>
    where
        P: AsRef<Path> + Send,
        S: Storage + ?Sized,
    {
        let root = root.as_ref();
        if root.exists() {
            return Err(error::Archive::Exists(root.to_path_buf()).into());
        }
        let key = crypto::ensure_key(store).await?;
        config.mark_encrypted();
        Self::build(root, config, Some(key))
    }

    fn build(root: &Path, config: ProjectConfig, key: Option<SecretVec<u8>>) -> Result<Self> {
        if fs::symlink_metadata(root).is_ok() {
            return Err(error::Archive::Exists(root.to_path_buf()).into());
        }
        fs::create_dir_all(root)?;

        let archive = Self {
            root: root.to_path_buf(),
            config,
            key,
        };
        let populated = (|| -> Result<()> {
            fs::create_dir_all(archive.vector_dir())?;
            fs::create_dir(archive.text_dir())?;
            fs::create_dir(archive.temp_dir())?;
            archive.persist_config()?;
            Layout::new().save(archive.root.join(LAYOUT_FILE))
        })();

        if let Err(e) = populated {
            if let Err(cleanup) = fs::remove_dir_all(root) {
                warn!(
                    "We could not remove the partially created archive {}: {}",
                    root.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        info!("Created archive {}", root.display());
        Ok(archive)
    }

    fn check_layout(root: &Path) -> Result<()> {
        if !root.is_dir() {
            return Err(error::Archive::NotFound(root.to_path_buf()).into());
        }
        for (dir, label) in [
            (root.join(IMAGE_DIR), "img/"),
            (root.join(IMAGE_DIR).join(VECTOR_DIR), "img/vec/"),
            (root.join(TEXT_DIR), "txt/"),
            (root.join(TEMP_DIR), "temp/"),
        ] {
            if !dir.is_dir() {
                return Err(error::Archive::InvalidLayout(root.to_path_buf(), label).into());
            }
        }
        if !root.join(CONFIG_FILE).is_file() && !root.join(ENCRYPTED_CONFIG_FILE).is_file() {
            return Err(error::Archive::InvalidLayout(root.to_path_buf(), CONFIG_FILE).into());
        }
        Ok(())
    }

    /// Opens an archive with a plain configuration.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        Self::check_layout(root)?;
        if !root.join(CONFIG_FILE).is_file() {
            return Err(error::Archive::Encrypted(root.to_path_buf()).into());
        }
        let config = ProjectConfig::from_slice(&fs::read(root.join(CONFIG_FILE))?)?;
        debug!("Opened archive {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            config,
            key: None,
        })
    }

    /// Opens an archive, unsealing its configuration with the key held by
    /// `store` when necessary.
    pub async fn open_encrypted<P, S>(root: P, store: &mut S) -> Result<Self>
    where
        P: AsRef<Path> + Send,
        S: Storage + ?Sized,
    {
        let root = root.as_ref();
        Self::check_layout(root)?;
        let sealed_path = root.join(ENCRYPTED_CONFIG_FILE);
        if !sealed_path.is_file() {
            return Self::open(root);
        }

        let key = store.get(crypto::KEY_SUFFIX).await?.ok_or_else(|| {
            error::Storage::Retrieve(store.bundle().item_identifier_lossy(crypto::KEY_SUFFIX))
        })?;
        let json = crypto::unseal_bytes(key.expose_secret(), &fs::read(&sealed_path)?)?;
        let config = ProjectConfig::from_slice(&json)?;
        debug!("Opened encrypted archive {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            config,
            key: Some(key),
        })
    }

    /// Removes the archive at `root` and everything in it.
    pub fn delete<P: AsRef<Path>>(root: P) -> Result<()> {
        let root = root.as_ref();
        if fs::symlink_metadata(root).is_err() {
            return Err(error::Archive::NotFound(root.to_path_buf()).into());
        }
        if !root.join(CONFIG_FILE).is_file() && !root.join(ENCRYPTED_CONFIG_FILE).is_file() {
            return Err(error::Archive::InvalidLayout(root.to_path_buf(), CONFIG_FILE).into());
        }
        fs::remove_dir_all(root)?;
        info!("Deleted archive {}", root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ProjectConfig {
        &mut self.config
    }

    pub const fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    fn text_dir(&self) -> PathBuf {
        self.root.join(TEXT_DIR)
    }

    fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_DIR)
    }

    fn vector_dir(&self) -> PathBuf {
        self.image_dir().join(VECTOR_DIR)
    }

    /// Scratch directory whose content is excluded from checksums.
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    fn image_path(&self, name: &str) -> PathBuf {
        if is_vector_image(name) {
            self.vector_dir().join(name)
        } else {
            self.image_dir().join(name)
        }
    }

    fn persist_config(&self) -> Result<()> {
        let json = self.config.to_json()?;
        match &self.key {
            Some(key) => {
                let sealed = crypto::seal_bytes(key.expose_secret(), json.as_bytes())?;
                write_atomically(&self.root.join(ENCRYPTED_CONFIG_FILE), &sealed)?;
                match fs::remove_file(self.root.join(CONFIG_FILE)) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            None => write_atomically(&self.root.join(CONFIG_FILE), json.as_bytes())?,
        }
        Ok(())
    }

    /// Stamps the configuration as modified and writes it out.
    pub fn save_config(&mut self) -> Result<()> {
        self.config.touch();
        self.persist_config()
    }

    /// Re-reads the configuration from disk, discarding unsaved changes.
    pub fn reload_config(&mut self) -> Result<()> {
        self.config = match &self.key {
            Some(key) => ProjectConfig::from_slice(&crypto::unseal_bytes(
                key.expose_secret(),
                &fs::read(self.root.join(ENCRYPTED_CONFIG_FILE))?,
            )?)?,
            None => ProjectConfig::from_slice(&fs::read(self.root.join(CONFIG_FILE))?)?,
        };
        Ok(())
    }

    /// Writes `bytes` to `path` and registers `name` in the reference list
    /// chosen by `list`. If the configuration cannot be saved, a newly
    /// created entry is removed again and the registration is undone.
    fn store_entry(
        &mut self,
        path: &Path,
        name: &str,
        bytes: &[u8],
        list: fn(&mut References) -> &mut Vec<String>,
    ) -> Result<()> {
        let created = fs::symlink_metadata(path).is_err();
        fs::write(path, bytes)?;
        let registered = References::register(list(&mut self.config.references), name);

        if let Err(e) = self.save_config() {
            if registered {
                _ = References::unregister(list(&mut self.config.references), name);
            }
            if created {
                if let Err(cleanup) = fs::remove_file(path) {
                    warn!(
                        "We could not remove the unrecorded entry {}: {}",
                        path.display(),
                        cleanup
                    );
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Writes a text entry, converting its line endings to the archive's
    /// configured style.
    pub fn write_text(&mut self, name: &str, content: &str) -> Result<()> {
        validate_name(name)?;
        let content = normalize_line_endings(
            content,
            self.config.document_settings.line_endings.as_str(),
        );
        self.store_entry(
            &self.text_dir().join(name),
            name,
            content.as_bytes(),
            text_files,
        )
    }

    pub fn read_text(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        let bytes = fs::read(self.text_dir().join(name)).map_err(not_found_as_entry(name))?;
        Ok(String::from_utf8(bytes).map_err(error::Conversion::from)?)
    }

    pub fn remove_text(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        fs::remove_file(self.text_dir().join(name)).map_err(not_found_as_entry(name))?;
        _ = References::unregister(&mut self.config.references.text_files, name);
        self.save_config()
    }

    /// Names of the text entries present on disk, sorted.
    pub fn list_texts(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.text_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Stores an image. Names with an `.svg` extension go to the vector image
    /// directory.
    pub fn import_image(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_name(name)?;
        self.store_entry(&self.image_path(name), name, bytes, images)
    }

    pub fn import_image_base64(&mut self, name: &str, encoded: &str) -> Result<()> {
        let bytes = base64::decode(encoded.trim()).map_err(error::Conversion::from)?;
        self.import_image(name, &bytes)
    }

    pub fn read_image(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        Ok(fs::read(self.image_path(name)).map_err(not_found_as_entry(name))?)
    }

    pub fn image_base64(&self, name: &str) -> Result<String> {
        Ok(base64::encode(self.read_image(name)?))
    }

    /// Creates a scratch file inside the archive that is removed when dropped.
    /// Its name is recorded under `references.temporary` until
    /// [`Self::clear_temp`] runs.
    pub fn temp_file(&mut self) -> Result<NamedTempFile> {
        let file = NamedTempFile::new_in(self.temp_dir())?;
        let name = tree::relative_name(&self.temp_dir(), file.path());
        if References::register(&mut self.config.references.temporary, &name) {
            if let Err(e) = self.save_config() {
                _ = References::unregister(&mut self.config.references.temporary, &name);
                return Err(e);
            }
        }
        Ok(file)
    }

    /// Empties the scratch directory.
    pub fn clear_temp(&mut self) -> Result<()> {
        for entry in fs::read_dir(self.temp_dir())? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        if !self.config.references.temporary.is_empty() {
            self.config.references.temporary.clear();
            self.save_config()?;
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<Layout> {
        Layout::load(self.root.join(LAYOUT_FILE))
    }

    pub fn save_layout(&self, layout: &Layout) -> Result<()> {
        layout.save(self.root.join(LAYOUT_FILE))
    }

    /// CRC-32 of every file in the archive except scratch files, keyed by
    /// their `/`-separated path relative to the archive root.
    pub fn checksums(&self) -> Result<BTreeMap<String, u32>> {
        let mut sums = BTreeMap::new();
        for path in tree::files(&self.root, &[self.temp_dir()])? {
            let name = tree::relative_name(&self.root, &path);
            _ = sums.insert(name, checksum::file_crc32(&path)?);
        }
        Ok(sums)
    }
}
