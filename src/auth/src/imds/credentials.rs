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

use super::{Builder, Client};
use crate::Result;
use crate::credentials::{Credentials, CredentialsProvider};
use crate::errors::Error;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const CREDENTIALS_PATH: &str =
    "/latest/meta-data/identity-credentials/ec2/security-credentials/ec2-instance";
const SUCCESS: &str = "Success";

/// Supplies the instance identity credentials from the metadata service.
///
/// Each call fetches new credentials. Wrap the provider in a
/// [CredentialsCache][crate::credentials::CredentialsCache] to reuse them
/// until they are about to expire.
#[derive(Clone, Debug)]
pub struct InstanceCredentialsProvider {
    client: Client,
}

impl InstanceCredentialsProvider {
    /// Creates a provider that uses `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for InstanceCredentialsProvider {
    fn default() -> Self {
        Self::new(Builder::default().build())
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityCredentials {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    access_key_id: String,
    #[serde(default)]
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
impl CredentialsProvider for InstanceCredentialsProvider {
    async fn credentials(&self) -> Result<Credentials> {
        // Signing has no cancellation scope of its own, the caller cancels
        // the request that is being signed.
        let body = self
            .client
            .fetch(
                CREDENTIALS_PATH,
                Error::credential_retrieval,
                &CancellationToken::new(),
            )
            .await?;
        let response = serde_json::from_str::<SecurityCredentials>(&body)
            .map_err(Error::credential_retrieval)?;
        if response.code != SUCCESS {
            return Err(Error::credential_retrieval(format!(
                "the metadata service returned code {}: {}",
                response.code,
                response.message.unwrap_or_default()
            )));
        }
        if response.access_key_id.is_empty() || response.secret_access_key.is_empty() {
            return Err(Error::credential_retrieval(
                "the metadata service returned incomplete credentials",
            ));
        }

        let expires_at = response.expiration.map(|e| {
            let remaining = (e - Utc::now()).to_std().unwrap_or_default();
            Instant::now() + remaining
        });
        tracing::debug!(
            access_key_id = %response.access_key_id,
            expiration = ?response.expiration,
            "fetched instance identity credentials"
        );
        Ok(Credentials {
            access_key_id: response.access_key_id,
            secret_access_key: response.secret_access_key,
            session_token: response.token,
            expires_at,
        })
    }
}
