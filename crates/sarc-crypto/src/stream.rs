//! Chunked XChaCha20-Poly1305 file encryption.
//!
//! # File format
//!
//! ```text
//! "SARC" | version: u8 | handle_len: u8 | handle: [u8] | nonce: [u8; 19] | chunks...
//! ```
//!
//! The plaintext is split into `CHUNK_LEN` pieces sealed with the STREAM
//! construction (big-endian 32-bit counter). The final chunk is always
//! shorter than `CHUNK_LEN`, possibly empty, and carries the last-block
//! flag, so truncation and reordering are detected. The full header is
//! bound into every chunk as associated data.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::stream::{DecryptorBE32, EncryptorBE32};
use chacha20poly1305::aead::{KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};

use crate::cipher::Cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyHandle, SecretKey};
use crate::keyring::KeyRing;

/// Leading bytes of every ciphertext.
pub const MAGIC: &[u8; 4] = b"SARC";
/// Current format version.
pub const FORMAT_VERSION: u8 = 1;
/// Plaintext bytes per sealed chunk.
pub const CHUNK_LEN: usize = 64 * 1024;

const NONCE_LEN: usize = 19;
const TAG_LEN: usize = 16;

/// [`Cipher`] backed by a [`KeyRing`], one fresh key per ciphertext.
#[derive(Clone, Debug)]
pub struct StreamCipher {
    keyring: KeyRing,
}

impl StreamCipher {
    pub fn new(keyring: KeyRing) -> Self {
        Self { keyring }
    }

    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    /// Read the key handle from a ciphertext header without decrypting.
    pub fn peek_handle(path: &Path) -> CryptoResult<KeyHandle> {
        let mut input = BufReader::new(File::open(path).map_err(|e| CryptoError::io(path, e))?);
        read_header(&mut input, path).map(|(handle, _, _)| handle)
    }

    fn seal(&self, src: &Path, dst: &Path, handle: &KeyHandle, key: &SecretKey) -> CryptoResult<()> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let header = encode_header(handle, &nonce);

        let aead = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let mut encryptor = EncryptorBE32::from_aead(aead, GenericArray::from_slice(&nonce));

        let mut input = File::open(src).map_err(|e| CryptoError::io(src, e))?;
        let mut output = BufWriter::new(File::create(dst).map_err(|e| CryptoError::io(dst, e))?);
        output.write_all(&header).map_err(|e| CryptoError::io(dst, e))?;

        let mut buf = vec![0u8; CHUNK_LEN];
        loop {
            let n = read_full(&mut input, &mut buf).map_err(|e| CryptoError::io(src, e))?;
            let payload = Payload {
                msg: &buf[..n],
                aad: &header,
            };
            if n == CHUNK_LEN {
                let sealed = encryptor
                    .encrypt_next(payload)
                    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
                output.write_all(&sealed).map_err(|e| CryptoError::io(dst, e))?;
            } else {
                let sealed = encryptor
                    .encrypt_last(payload)
                    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
                output.write_all(&sealed).map_err(|e| CryptoError::io(dst, e))?;
                break;
            }
        }
        finish(dst, output)
    }

    fn open(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle> {
        let mut input = BufReader::new(File::open(src).map_err(|e| CryptoError::io(src, e))?);
        let (handle, nonce, header) = read_header(&mut input, src)?;
        let key = self.keyring.load(&handle)?;

        let aead = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let mut decryptor = DecryptorBE32::from_aead(aead, GenericArray::from_slice(&nonce));
        let mut output = BufWriter::new(File::create(dst).map_err(|e| CryptoError::io(dst, e))?);

        let mut buf = vec![0u8; CHUNK_LEN + TAG_LEN];
        loop {
            let n = read_full(&mut input, &mut buf).map_err(|e| CryptoError::io(src, e))?;
            let payload = Payload {
                msg: &buf[..n],
                aad: &header,
            };
            if n == buf.len() {
                let plain = decryptor
                    .decrypt_next(payload)
                    .map_err(|_| CryptoError::AuthenticationFailed(format!("chunk rejected in {}", src.display())))?;
                output.write_all(&plain).map_err(|e| CryptoError::io(dst, e))?;
            } else {
                let plain = decryptor
                    .decrypt_last(payload)
                    .map_err(|_| CryptoError::AuthenticationFailed(format!("final chunk rejected in {}", src.display())))?;
                output.write_all(&plain).map_err(|e| CryptoError::io(dst, e))?;
                break;
            }
        }
        finish(dst, output)?;
        Ok(handle)
    }
}

impl Cipher for StreamCipher {
    fn encrypt(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle> {
        let (handle, key) = self.keyring.generate()?;
        if let Err(e) = self.seal(src, dst, &handle, &key) {
            discard_output(dst);
            self.keyring.discard(&handle);
            return Err(e);
        }
        debug!(src = %src.display(), dst = %dst.display(), handle = %handle, "encrypted");
        Ok(handle)
    }

    fn decrypt(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle> {
        match self.open(src, dst) {
            Ok(handle) => {
                debug!(src = %src.display(), dst = %dst.display(), handle = %handle, "decrypted");
                Ok(handle)
            }
            Err(e) => {
                discard_output(dst);
                Err(e)
            }
        }
    }
}

fn encode_header(handle: &KeyHandle, nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let id = handle.as_str().as_bytes();
    let mut header = Vec::with_capacity(MAGIC.len() + 2 + id.len() + NONCE_LEN);
    header.extend_from_slice(MAGIC);
    header.push(FORMAT_VERSION);
    // Handles are fixed-length hex, well under 256 bytes.
    header.push(id.len() as u8);
    header.extend_from_slice(id);
    header.extend_from_slice(nonce);
    header
}

fn read_header<R: Read>(input: &mut R, path: &Path) -> CryptoResult<(KeyHandle, [u8; NONCE_LEN], Vec<u8>)> {
    let truncated = || CryptoError::InvalidHeader(format!("{} is truncated", path.display()));

    let mut fixed = [0u8; 6];
    let n = read_full(input, &mut fixed).map_err(|e| CryptoError::io(path, e))?;
    if n < fixed.len() {
        return Err(truncated());
    }
    if &fixed[..4] != MAGIC {
        return Err(CryptoError::InvalidHeader(format!("{} has no SARC magic", path.display())));
    }
    if fixed[4] != FORMAT_VERSION {
        return Err(CryptoError::InvalidHeader(format!("unsupported format version {}", fixed[4])));
    }

    let mut id = vec![0u8; usize::from(fixed[5])];
    if read_full(input, &mut id).map_err(|e| CryptoError::io(path, e))? < id.len() {
        return Err(truncated());
    }
    let handle = std::str::from_utf8(&id)
        .ok()
        .and_then(KeyHandle::parse)
        .ok_or_else(|| CryptoError::InvalidHeader("malformed key handle".into()))?;

    let mut nonce = [0u8; NONCE_LEN];
    if read_full(input, &mut nonce).map_err(|e| CryptoError::io(path, e))? < NONCE_LEN {
        return Err(truncated());
    }

    let mut header = fixed.to_vec();
    header.extend_from_slice(&id);
    header.extend_from_slice(&nonce);
    Ok((handle, nonce, header))
}

/// Fill `buf` as far as the input allows. Returns bytes read; short only at EOF.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn finish(path: &Path, writer: BufWriter<File>) -> CryptoResult<()> {
    let file = writer
        .into_inner()
        .map_err(|e| CryptoError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| CryptoError::io(path, e))
}

fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial output"),
    }
}
