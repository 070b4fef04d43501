// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The instance keypair.
//!
//! Each managed instance proves possession of an RSA private key on every
//! role token request. The public half is registered with the fleet service
//! once, when the key is created. The private half is persisted locally so
//! later runs reuse it.
//!
//! The persisted file holds the private key as a PKCS#1 PEM document. The
//! file may be absent or unreadable, e.g. after a failed registration or a
//! partially written disk. In either case [KeyStore::load] reports
//! [StoredKey::Absent] and the caller starts over with a new key.

use crate::Result;
use crate::errors::Error;
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The size of newly generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// The key type reported to the registration endpoint.
pub(crate) const PUBLIC_KEY_TYPE: &str = "Rsa";

/// An RSA keypair used to sign role token requests.
#[derive(Clone)]
pub struct KeyPair {
    private_key: Arc<RsaPrivateKey>,
}

impl KeyPair {
    /// Generates a fresh keypair with the given modulus size.
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits).map_err(Error::key_generation)?;
        Ok(Self::from(private_key))
    }

    /// Decodes a keypair from a PKCS#1 PEM document.
    pub fn from_pem(pem: &str) -> std::result::Result<Self, rsa::pkcs1::Error> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)?;
        Ok(Self::from(private_key))
    }

    /// Encodes the private key as a PKCS#1 PEM document.
    pub fn to_pem(&self) -> Result<String> {
        let pem = self
            .private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(Error::persistence)?;
        Ok(pem.to_string())
    }

    /// The public key, as the base64 encoding of its DER `SubjectPublicKeyInfo`.
    ///
    /// This is the format expected by the registration endpoint.
    pub fn public_key(&self) -> Result<String> {
        let der = self
            .private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(Error::key_generation)?;
        Ok(BASE64_STANDARD.encode(der.as_bytes()))
    }

    /// Signs `message` with RSASSA-PKCS1-v1_5 over its SHA-256 digest.
    ///
    /// The signature is deterministic: signing the same bytes with the same
    /// key always produces the same result. Returns the base64 encoded
    /// signature.
    pub fn sign(&self, message: &[u8]) -> Result<String> {
        let digest = Sha256::digest(message);
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(Error::signing)?;
        Ok(BASE64_STANDARD.encode(signature))
    }
}

impl From<RsaPrivateKey> for KeyPair {
    fn from(private_key: RsaPrivateKey) -> Self {
        Self {
            private_key: Arc::new(private_key),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &(self.private_key.size() * 8))
            .field("private_key", &"[censored]")
            .finish()
    }
}

/// The result of looking for a persisted keypair.
#[derive(Clone, Debug)]
pub enum StoredKey {
    /// A keypair was found and decoded.
    Present(KeyPair),
    /// There is no usable keypair. Either the file does not exist, or its
    /// contents cannot be decoded.
    Absent,
}

impl StoredKey {
    /// Returns the keypair, if one was found.
    pub fn into_option(self) -> Option<KeyPair> {
        match self {
            StoredKey::Present(k) => Some(k),
            StoredKey::Absent => None,
        }
    }
}

/// Creates, loads, and persists the instance keypair.
///
/// The store assumes a single writer. Concurrent runs on the same host may
/// race to create and persist different keys; the store does not lock the
/// file.
#[derive(Clone, Debug)]
pub struct KeyStore {
    path: PathBuf,
    key_bits: usize,
}

impl KeyStore {
    /// Creates a store backed by the file at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            key_bits: DEFAULT_KEY_BITS,
        }
    }

    /// Changes the size of keys created by this store.
    ///
    /// Defaults to [DEFAULT_KEY_BITS].
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// The location of the persisted keypair.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted keypair, if there is a usable one.
    ///
    /// Never fails: a missing, unreadable, or undecodable file is reported as
    /// [StoredKey::Absent].
    pub fn load(&self) -> StoredKey {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), "no persisted keypair: {e}");
                return StoredKey::Absent;
            }
        };
        match KeyPair::from_pem(&contents) {
            Ok(key_pair) => StoredKey::Present(key_pair),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "ignoring persisted keypair that cannot be decoded: {e}"
                );
                StoredKey::Absent
            }
        }
    }

    /// Generates a new keypair. The keypair is not persisted.
    pub fn create(&self) -> Result<KeyPair> {
        KeyPair::generate(self.key_bits)
    }

    /// Writes the keypair to the store.
    ///
    /// The key is encoded in full before anything is written. It is written
    /// to a temporary file, readable only by the owner, which then replaces
    /// the target. A failed write never leaves a partially written key at
    /// [path][KeyStore::path].
    pub fn persist(&self, key_pair: &KeyPair) -> Result<()> {
        let pem = key_pair.to_pem()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::persistence(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let staging = staging_path(&self.path);
        write_owner_only(&staging, pem.as_bytes()).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            Error::persistence(format!("cannot write {}: {e}", staging.display()))
        })?;
        std::fs::rename(&staging, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            Error::persistence(format!("cannot replace {}: {e}", self.path.display()))
        })?;
        tracing::info!(path = %self.path.display(), "persisted keypair");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // The mode only applies when the file is created.
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
