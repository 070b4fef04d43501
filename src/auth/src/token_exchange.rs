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

//! Exchanges a registered keypair for a role token.
//!
//! The role token request is signed twice. First with Signature Version 4,
//! using the platform credentials, then with the instance keypair over the
//! resulting `Authorization` header. The fleet service only issues a token
//! if both signatures are valid and the keypair matches the one registered
//! for the instance.

use crate::Result;
use crate::identity::Identity;
use crate::keys::KeyPair;
use crate::signer::RequestSignerExt;
use crate::signer::keypair::KeyPairSigner;
use crate::signer::sigv4::SigV4Signer;
use crate::ssm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tokio_util::sync::CancellationToken;

/// Short-lived credentials issued to a managed instance.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleToken {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    #[serde(rename = "TokenExpirationDate", deserialize_with = "epoch_seconds")]
    expiration: DateTime<Utc>,
    #[serde(default)]
    update_key_pair: bool,
}

impl RoleToken {
    /// The access key id.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The session token to send with each request.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// When the token expires, truncated to whole seconds.
    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// The fleet service asks the instance to rotate its keypair.
    ///
    /// The flag is reported as received. Acting on it is up to the caller.
    pub fn update_key_pair(&self) -> bool {
        self.update_key_pair
    }
}

impl std::fmt::Debug for RoleToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleToken")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[censored]")
            .field("session_token", &"[censored]")
            .field("expiration", &self.expiration)
            .field("update_key_pair", &self.update_key_pair)
            .finish()
    }
}

fn epoch_seconds<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;
    let seconds = f64::deserialize(deserializer)?;
    if !seconds.is_finite() {
        return Err(D::Error::custom(format!("invalid expiration {seconds}")));
    }
    DateTime::from_timestamp(seconds.trunc() as i64, 0)
        .ok_or_else(|| D::Error::custom(format!("expiration out of range {seconds}")))
}

/// Requests a role token for the instance.
///
/// `key_pair` must be the keypair registered for `identity`. Signing
/// failures are reported unchanged, rejected or malformed responses are
/// token exchange errors.
pub async fn exchange(
    client: &ssm::Client,
    sigv4: &SigV4Signer,
    key_pair: &KeyPair,
    identity: &Identity,
    cancel: &CancellationToken,
) -> Result<RoleToken> {
    let signer = sigv4.clone().then(KeyPairSigner::new(key_pair.clone()));
    let token = client
        .request_role_token(&signer, identity, cancel)
        .await?;
    tracing::info!(
        fingerprint = %identity.fingerprint,
        expiration = %token.expiration,
        update_key_pair = token.update_key_pair,
        "exchanged keypair for a role token"
    );
    Ok(token)
}
