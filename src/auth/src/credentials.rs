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

//! Platform credentials are the short-lived access keys an EC2 instance
//! obtains from its metadata service. They are used only as the input to
//! [Signature Version 4][crate::signer::sigv4] signing. The fleet service uses
//! them to authenticate the instance before it trusts the instance keypair.

mod cache;

pub use cache::CredentialsCache;

use crate::Result;
use tokio::time::Instant;

/// A set of platform credentials.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    /// The access key id, e.g. `ASIA...`.
    pub access_key_id: String,

    /// The secret used to derive the request signing key.
    pub secret_access_key: String,

    /// The session token, required for temporary credentials.
    ///
    /// When present, it is sent in the `x-amz-security-token` header of
    /// every signed request.
    pub session_token: Option<String>,

    /// The instant at which the credentials expire.
    ///
    /// If `None`, the credentials do not expire.
    pub expires_at: Option<Instant>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[censored]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[censored]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies platform credentials for request signing.
///
/// Implementations may perform a network round-trip on each call. Wrap them in
/// a [CredentialsCache] to reuse credentials until they are close to expiring.
#[async_trait::async_trait]
pub trait CredentialsProvider: std::fmt::Debug + Send + Sync {
    /// Returns credentials valid for at least the duration of one request.
    async fn credentials(&self) -> Result<Credentials>;
}

/// A [CredentialsProvider] that always returns the same credentials.
///
/// Useful when the application already holds credentials, and in tests.
#[derive(Clone, Debug)]
pub struct StaticCredentialsProvider {
    credentials: Credentials,
}

impl StaticCredentialsProvider {
    /// Creates a provider that always returns the given long-lived key.
    pub fn new<K, S>(access_key_id: K, secret_access_key: S) -> Self
    where
        K: Into<String>,
        S: Into<String>,
    {
        Self {
            credentials: Credentials {
                access_key_id: access_key_id.into(),
                secret_access_key: secret_access_key.into(),
                session_token: None,
                expires_at: None,
            },
        }
    }

    /// Sets the session token for temporary credentials.
    pub fn with_session_token<T: Into<String>>(mut self, session_token: T) -> Self {
        self.credentials.session_token = Some(session_token.into());
        self
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}
