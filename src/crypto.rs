// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! AES-256-CBC file encryption with PKCS#7 padding.
//!
//! Two formats are produced here. The plain format written by
//! [`encrypt_file`] is bare ciphertext; key and IV travel out of band (for
//! example as a key file produced by [`KeyMaterial::to_bytes`]). The sealed
//! format written by [`seal`] carries its own IV in a small header and takes
//! the key from a credential store:
//!
//! ```text
//! "SCFA" | version: u8 | iv: [u8; 16] | ciphertext
//! ```

use std::{
    fmt::Debug,
    fs,
    io::{self, BufReader, BufWriter, Read, Write},
    mem,
    path::Path,
};

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, Iv, Key, KeyIvInit};
use generic_array::GenericArray;
use log::debug;
use rand::Rng;
use secrecy::{ExposeSecret, Secret, SecretVec, Zeroize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tempfile::NamedTempFile;

use crate::{
    error::{self, Result},
    rng,
    storage::Storage,
};

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;
const CHUNK_SIZE: usize = BLOCK_SIZE * 4096;

/// Credential store suffix under which the archive sealing key is kept.
pub const KEY_SUFFIX: &str = "key";
pub const ENCRYPTION_METHOD: &str = "AES-256-CBC";

const SEALED_MAGIC: &[u8; 4] = b"SCFA";
const SEALED_VERSION: u8 = 1;
const SEALED_HEADER_LEN: usize = SEALED_MAGIC.len() + 1 + IV_SIZE;

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

pub struct KeyMaterial {
    key: Secret<[u8; KEY_SIZE]>,
    iv: [u8; IV_SIZE],
}

impl KeyMaterial {
    /// Generates a fresh random key and IV.
    pub fn generate() -> Result<Self> {
        let mut key = [0_u8; KEY_SIZE];
        let iv = random_iv()?;
        rng::map(|rng| rng.fill(&mut key))?;
        let material = Self {
            key: Secret::new(key),
            iv,
        };
        key.zeroize();
        Ok(material)
    }

    pub fn from_bytes(key: &[u8], iv: &[u8]) -> Result<Self> {
        let mut key: [u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| error::Conversion::KeyLength(KEY_SIZE, key.len()))?;
        let iv: [u8; IV_SIZE] = iv
            .try_into()
            .map_err(|_| error::Conversion::KeyLength(IV_SIZE, iv.len()))?;
        let material = Self {
            key: Secret::new(key),
            iv,
        };
        key.zeroize();
        Ok(material)
    }

    /// Pairs an existing key with a freshly generated IV.
    pub fn from_key(key: &[u8]) -> Result<Self> {
        Self::from_bytes(key, &random_iv()?)
    }

    /// Parses the `key || iv` concatenation produced by [`Self::to_bytes`].
    pub fn from_concatenated(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE + IV_SIZE {
            return Err(error::Conversion::KeyLength(KEY_SIZE + IV_SIZE, bytes.len()).into());
        }
        let (key, iv) = bytes.split_at(KEY_SIZE);
        Self::from_bytes(key, iv)
    }

    pub fn to_bytes(&self) -> SecretVec<u8> {
        let mut bytes = Vec::with_capacity(KEY_SIZE + IV_SIZE);
        bytes.extend_from_slice(self.key.expose_secret());
        bytes.extend_from_slice(&self.iv);
        SecretVec::new(bytes)
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        self.key.expose_secret()
    }

    pub const fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// Short, non-reversible identifier of the key suitable for display.
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha256::digest(self.key.expose_secret())[..8])
    }

    fn encryptor(&self) -> Encryptor {
        Encryptor::new(
            Key::<Encryptor>::from_slice(self.key.expose_secret()),
            Iv::<Encryptor>::from_slice(&self.iv),
        )
    }

    fn decryptor(&self) -> Decryptor {
        Decryptor::new(
            Key::<Decryptor>::from_slice(self.key.expose_secret()),
            Iv::<Decryptor>::from_slice(&self.iv),
        )
    }
}

impl Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        (self.key.expose_secret().ct_eq(other.key.expose_secret()) & self.iv.ct_eq(&other.iv))
            .unwrap_u8()
            == 1
    }
}

impl Eq for KeyMaterial {}

fn random_iv() -> Result<[u8; IV_SIZE]> {
    let mut iv = [0_u8; IV_SIZE];
    rng::map(|rng| rng.fill(&mut iv))?;
    Ok(iv)
}

/// Reads until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[must_use]
pub fn encrypt(plaintext: &[u8], material: &KeyMaterial) -> Vec<u8> {
    material
        .encryptor()
        .encrypt_padded_vec_mut::<block_padding::Pkcs7>(plaintext)
}

pub fn decrypt(ciphertext: &[u8], material: &KeyMaterial) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(error::Crypto::CiphertextLength(ciphertext.len() as u64).into());
    }
    Ok(material
        .decryptor()
        .decrypt_padded_vec_mut::<block_padding::Pkcs7>(ciphertext)
        .map_err(error::Crypto::from)?)
}

/// Encrypts everything `input` yields into `output`, returning the number of
/// ciphertext bytes written.
pub fn encrypt_stream<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    material: &KeyMaterial,
) -> Result<u64> {
    let mut encryptor = material.encryptor();
    let mut buf = vec![0_u8; CHUNK_SIZE];
    let mut written = 0_u64;

    let tail = loop {
        let n = read_full(&mut input, &mut buf)?;
        if n < CHUNK_SIZE {
            break n;
        }
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        output.write_all(&buf)?;
        written += CHUNK_SIZE as u64;
    };

    let last = encryptor.encrypt_padded_vec_mut::<block_padding::Pkcs7>(&buf[..tail]);
    output.write_all(&last)?;
    output.flush()?;
    buf.zeroize();
    Ok(written + last.len() as u64)
}

/// Decrypts everything `input` yields into `output`, returning the number of
/// plaintext bytes written.
pub fn decrypt_stream<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    material: &KeyMaterial,
) -> Result<u64> {
    let mut decryptor = material.decryptor();
    let mut current = vec![0_u8; CHUNK_SIZE];
    let mut next = vec![0_u8; CHUNK_SIZE];
    let mut consumed = 0_u64;
    let mut written = 0_u64;

    let mut len = read_full(&mut input, &mut current)?;
    // The final chunk has to go through the unpadding path, so a full chunk is
    // only decrypted eagerly once we know more data follows it.
    while len == CHUNK_SIZE {
        let n = read_full(&mut input, &mut next)?;
        if n == 0 {
            break;
        }
        for block in current.chunks_exact_mut(BLOCK_SIZE) {
            decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        output.write_all(&current)?;
        consumed += CHUNK_SIZE as u64;
        written += CHUNK_SIZE as u64;
        mem::swap(&mut current, &mut next);
        len = n;
    }

    if len == 0 || len % BLOCK_SIZE != 0 {
        return Err(error::Crypto::CiphertextLength(consumed + len as u64).into());
    }
    let mut last = decryptor
        .decrypt_padded_vec_mut::<block_padding::Pkcs7>(&current[..len])
        .map_err(error::Crypto::from)?;
    output.write_all(&last)?;
    output.flush()?;
    written += last.len() as u64;

    last.zeroize();
    current.zeroize();
    next.zeroize();
    Ok(written)
}

/// Directory that receives the staging file for `output`.
fn staging_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Runs `f` into a temporary sibling of `output` and moves it into place
/// only once `f` succeeds. `input` is fully read before `output` is touched,
/// so the two may name the same file.
fn transform_file<F>(input: &Path, output: &Path, f: F) -> Result<()>
where
    F: FnOnce(BufReader<fs::File>, &mut BufWriter<&fs::File>) -> Result<u64>,
{
    let reader = BufReader::new(fs::File::open(input)?);
    let staged = NamedTempFile::new_in(staging_dir(output))?;
    let mut writer = BufWriter::new(staged.as_file());
    let n = f(reader, &mut writer)?;
    writer.flush()?;
    drop(writer);
    _ = staged.persist(output).map_err(|e| e.error)?;
    debug!(
        "Wrote {} bytes from {} to {}",
        n,
        input.display(),
        output.display()
    );
    Ok(())
}

/// Encrypts `input` into `output`. A failed run leaves `output` untouched.
pub fn encrypt_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    material: &KeyMaterial,
) -> Result<()> {
    transform_file(input.as_ref(), output.as_ref(), |reader, writer| {
        encrypt_stream(reader, writer, material)
    })
}

/// Decrypts `input` into `output`. A failed run leaves `output` untouched.
pub fn decrypt_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    material: &KeyMaterial,
) -> Result<()> {
    transform_file(input.as_ref(), output.as_ref(), |reader, writer| {
        decrypt_stream(reader, writer, material)
    })
}

/// Returns the sealing key held by `store`, creating and storing a new one if
/// the store does not have one yet.
pub async fn ensure_key<S: Storage + ?Sized>(store: &mut S) -> Result<SecretVec<u8>> {
    if let Some(key) = store.get(KEY_SUFFIX).await? {
        return Ok(key);
    }

    let material = KeyMaterial::generate()?;
    store.update(KEY_SUFFIX, material.key()).await?;
    debug!(
        "Stored a new sealing key with fingerprint {}",
        material.fingerprint()
    );
    Ok(SecretVec::new(material.key().to_vec()))
}

async fn sealing_key<S: Storage + ?Sized>(store: &mut S) -> Result<SecretVec<u8>> {
    store
        .get(KEY_SUFFIX)
        .await?
        .ok_or_else(|| {
            let id = store.bundle().item_identifier_lossy(KEY_SUFFIX);
            error::Storage::Retrieve(id).into()
        })
}

/// Encrypts the file at `plain` into a sealed archive at `archive`, using the
/// key kept in `store` and a fresh IV.
pub async fn seal<S, P, Q>(store: &mut S, plain: P, archive: Q) -> Result<()>
where
    S: Storage + ?Sized,
    P: AsRef<Path> + Send,
    Q: AsRef<Path> + Send,
{
    let key = sealing_key(store).await?;
    let material = KeyMaterial::from_key(key.expose_secret())?;
    seal_with(&material, plain.as_ref(), archive.as_ref())
}

pub(crate) fn seal_with(material: &KeyMaterial, plain: &Path, archive: &Path) -> Result<()> {
    transform_file(plain, archive, |reader, writer| {
        writer.write_all(SEALED_MAGIC)?;
        writer.write_all(&[SEALED_VERSION])?;
        writer.write_all(material.iv())?;
        Ok(SEALED_HEADER_LEN as u64 + encrypt_stream(reader, writer, material)?)
    })
}

fn read_sealed_header<R: Read>(reader: &mut R) -> Result<[u8; IV_SIZE]> {
    let mut header = [0_u8; SEALED_HEADER_LEN];
    if read_full(reader, &mut header)? != SEALED_HEADER_LEN
        || &header[..SEALED_MAGIC.len()] != SEALED_MAGIC
    {
        return Err(error::Crypto::SealedHeader.into());
    }
    let version = header[SEALED_MAGIC.len()];
    if version != SEALED_VERSION {
        return Err(error::Crypto::SealedVersion(version).into());
    }

    let mut iv = [0_u8; IV_SIZE];
    iv.copy_from_slice(&header[SEALED_MAGIC.len() + 1..]);
    Ok(iv)
}

/// Seals an in-memory buffer with `key` and a fresh IV.
pub(crate) fn seal_bytes(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let material = KeyMaterial::from_key(key)?;
    let mut sealed = Vec::with_capacity(SEALED_HEADER_LEN + plaintext.len() + BLOCK_SIZE);
    sealed.extend_from_slice(SEALED_MAGIC);
    sealed.push(SEALED_VERSION);
    sealed.extend_from_slice(material.iv());
    sealed.extend_from_slice(&encrypt(plaintext, &material));
    Ok(sealed)
}

pub(crate) fn unseal_bytes(key: &[u8], mut sealed: &[u8]) -> Result<Vec<u8>> {
    let iv = read_sealed_header(&mut sealed)?;
    decrypt(sealed, &KeyMaterial::from_bytes(key, &iv)?)
}

pub(crate) fn unseal_with_key(key: &[u8], archive: &Path, output: &mut fs::File) -> Result<u64> {
    let mut reader = BufReader::new(fs::File::open(archive)?);
    let iv = read_sealed_header(&mut reader)?;
    let material = KeyMaterial::from_bytes(key, &iv)?;
    decrypt_stream(reader, BufWriter::new(output), &material)
}

/// Decrypts a sealed archive into a new temporary file, which is removed once
/// the returned handle is dropped.
pub async fn unseal<S, P>(store: &mut S, archive: P) -> Result<NamedTempFile>
where
    S: Storage + ?Sized,
    P: AsRef<Path> + Send,
{
    let key = sealing_key(store).await?;
    let mut temp = NamedTempFile::new()?;
    let n = unseal_with_key(key.expose_secret(), archive.as_ref(), temp.as_file_mut())?;
    debug!(
        "Unsealed {} bytes from {} into {}",
        n,
        archive.as_ref().display(),
        temp.path().display()
    );
    Ok(temp)
}

/// Decrypts a sealed archive into `output`, replacing it only once the
/// whole archive has been decrypted.
pub async fn unseal_to<S, P, Q>(store: &mut S, archive: P, output: Q) -> Result<()>
where
    S: Storage + ?Sized,
    P: AsRef<Path> + Send,
    Q: AsRef<Path> + Send,
{
    let key = sealing_key(store).await?;
    let output = output.as_ref();
    let mut staged = NamedTempFile::new_in(staging_dir(output))?;
    let n = unseal_with_key(key.expose_secret(), archive.as_ref(), staged.as_file_mut())?;
    _ = staged.persist(output).map_err(|e| e.error)?;
    debug!("Unsealed {} bytes into {}", n, output.display());
    Ok(())
}
