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

//! Registers new keypairs with the fleet service.
//!
//! A keypair goes through these states:
//!
//! ```text
//! NoKey -> KeyCreated -> Registered -> Persisted
//! ```
//!
//! If the store already holds a usable keypair the flow returns it and makes
//! no calls. Otherwise it creates a keypair, registers its public key, and
//! only then persists it. A keypair that fails registration is discarded, so
//! the next run starts over from `NoKey`. A registered keypair is never
//! replaced without registering its replacement.

use crate::Result;
use crate::identity::Identity;
use crate::keys::{KeyPair, KeyStore, StoredKey};
use crate::signer::sigv4::SigV4Signer;
use crate::ssm;
use tokio_util::sync::CancellationToken;

/// How the keypair returned by [load_or_register] was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOrigin {
    /// The keypair was already persisted.
    Loaded,
    /// The keypair was created, registered, and persisted by this run.
    Registered,
}

/// A keypair the fleet service trusts for this instance.
#[derive(Clone, Debug)]
pub struct Enrollment {
    /// The registered keypair, also present in the key store.
    pub key_pair: KeyPair,
    /// Whether this run loaded or registered the keypair.
    pub origin: KeyOrigin,
}

/// Returns the persisted keypair, or creates and registers a new one.
///
/// The registration request is signed with `sigv4` only.
pub async fn load_or_register(
    store: &KeyStore,
    client: &ssm::Client,
    sigv4: &SigV4Signer,
    identity: &Identity,
    cancel: &CancellationToken,
) -> Result<Enrollment> {
    if let StoredKey::Present(key_pair) = store.load() {
        tracing::debug!(path = %store.path().display(), "using persisted keypair");
        return Ok(Enrollment {
            key_pair,
            origin: KeyOrigin::Loaded,
        });
    }

    let key_pair = store.create()?;
    tracing::info!("created keypair");

    let public_key = key_pair.public_key()?;
    client
        .register_managed_instance(sigv4, identity, &public_key, cancel)
        .await?;

    store.persist(&key_pair)?;
    Ok(Enrollment {
        key_pair,
        origin: KeyOrigin::Registered,
    })
}
