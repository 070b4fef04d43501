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

//! Runs the full bootstrap.
//!
//! A run looks up the instance identity, makes sure the instance has a
//! registered keypair, and exchanges that keypair for a role token. The steps
//! run sequentially and every failure ends the run.
//!
//! # Example
//! ```
//! # use managed_instance_auth::bootstrap::Builder;
//! # use tokio_util::sync::CancellationToken;
//! # async fn sample() -> managed_instance_auth::Result<()> {
//! let token = Builder::new("/var/lib/managed-instance-credentials/rsa-key.pem")
//!     .run(&CancellationToken::new())
//!     .await?;
//! println!("credentials expire at {}", token.expiration());
//! # Ok(()) }
//! ```

use crate::Result;
use crate::credentials::{CredentialsCache, CredentialsProvider};
use crate::imds::{self, InstanceCredentialsProvider};
use crate::keys::{DEFAULT_KEY_BITS, KeyStore};
use crate::registration::{self, KeyOrigin};
use crate::signer::sigv4::SigV4Signer;
use crate::ssm;
use crate::token_exchange::{self, RoleToken};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configures and runs the bootstrap.
#[derive(Clone, Debug)]
pub struct Builder {
    key_path: PathBuf,
    key_bits: usize,
    imds_endpoint: Option<String>,
    ssm_endpoint: Option<String>,
    timeout: Option<Duration>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

impl Builder {
    /// Creates a builder that stores the instance keypair at `key_path`.
    pub fn new<P: Into<PathBuf>>(key_path: P) -> Self {
        Self {
            key_path: key_path.into(),
            key_bits: DEFAULT_KEY_BITS,
            imds_endpoint: None,
            ssm_endpoint: None,
            timeout: None,
            credentials: None,
        }
    }

    /// Sets the size of newly created keys.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Overrides the metadata service endpoint. See [imds::Builder::with_endpoint].
    pub fn with_imds_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.imds_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the fleet service endpoint. See [ssm::Builder::with_endpoint].
    pub fn with_ssm_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.ssm_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the timeout for each network call. The default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Signs requests with these credentials instead of the instance identity
    /// credentials from the metadata service.
    pub fn with_credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Runs the bootstrap and returns the role token.
    pub async fn run(self, cancel: &CancellationToken) -> Result<RoleToken> {
        let imds = self.imds_client();
        let identity = imds.identity(cancel).await?;

        let credentials: Arc<dyn CredentialsProvider> = match &self.credentials {
            Some(c) => c.clone(),
            None => Arc::new(CredentialsCache::new(InstanceCredentialsProvider::new(
                imds.clone(),
            ))),
        };
        let sigv4 = SigV4Signer::new(credentials, ssm::SERVICE_NAME, &identity.region);
        let client = self.ssm_client(&identity.region);
        let store = KeyStore::new(&self.key_path).with_key_bits(self.key_bits);

        let enrollment =
            registration::load_or_register(&store, &client, &sigv4, &identity, cancel).await?;
        if enrollment.origin == KeyOrigin::Registered {
            tracing::info!(fingerprint = %identity.fingerprint, "enrolled new keypair");
        }
        token_exchange::exchange(&client, &sigv4, &enrollment.key_pair, &identity, cancel).await
    }

    fn imds_client(&self) -> imds::Client {
        let builder = self
            .imds_endpoint
            .iter()
            .fold(imds::Builder::default(), |b, e| b.with_endpoint(e));
        let builder = self.timeout.iter().fold(builder, |b, t| b.with_timeout(*t));
        builder.build()
    }

    fn ssm_client(&self, region: &str) -> ssm::Client {
        let builder = self
            .ssm_endpoint
            .iter()
            .fold(ssm::Builder::default(), |b, e| b.with_endpoint(e));
        let builder = self.timeout.iter().fold(builder, |b, t| b.with_timeout(*t));
        builder.build(region)
    }
}
