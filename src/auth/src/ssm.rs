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

//! The fleet-management (Systems Manager) endpoints used by managed instances.
//!
//! Both operations are JSON-over-HTTP calls to the regional endpoint,
//! `POST https://ssm.<region>.amazonaws.com/`, selected by the `X-Amz-Target`
//! header. The caller supplies the [RequestSigner] for each call: the
//! registration uses Signature Version 4 only, the role token request adds a
//! keypair signature on top.

use crate::{DEFAULT_TIMEOUT, Result};
use crate::cancel::cancellable;
use crate::errors::{BoxError, Error, HttpStatus};
use crate::identity::Identity;
use crate::keys::PUBLIC_KEY_TYPE;
use crate::signer::RequestSigner;
use crate::token_exchange::RoleToken;
use http::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The service name used in Signature Version 4 credential scopes.
pub const SERVICE_NAME: &str = "ssm";

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_HEADER: &str = "x-amz-target";
const REGISTER_MANAGED_INSTANCE: &str = "AmazonSSM.RegisterManagedInstance";
const REQUEST_ROLE_TOKEN: &str = "AmazonSSM.RequestManagedInstanceRoleToken";

/// Configures a fleet service [Client].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl Builder {
    /// Overrides the endpoint. The default is the regional endpoint,
    /// `https://ssm.<region>.amazonaws.com/`.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the timeout for each request. The default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates a client for the endpoint in `region`.
    pub fn build(self, region: &str) -> Client {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| format!("https://{SERVICE_NAME}.{region}.amazonaws.com/"));
        Client {
            endpoint,
            inner: reqwest::Client::new(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

/// A client for the managed instance endpoints.
#[derive(Clone, Debug)]
pub struct Client {
    endpoint: String,
    inner: reqwest::Client,
    timeout: Duration,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterManagedInstanceRequest<'a> {
    fingerprint: &'a str,
    public_key: &'a str,
    public_key_type: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct RequestRoleTokenRequest<'a> {
    fingerprint: &'a str,
}

impl Client {
    /// Returns the endpoint this client sends requests to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Registers `public_key` as the keypair of the managed instance
    /// identified by `identity`.
    pub async fn register_managed_instance(
        &self,
        signer: &dyn RequestSigner,
        identity: &Identity,
        public_key: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let body = RegisterManagedInstanceRequest {
            fingerprint: &identity.fingerprint,
            public_key,
            public_key_type: PUBLIC_KEY_TYPE,
        };
        let errors = Errors {
            transport: Error::registration,
            status: Error::registration_status,
        };
        self.call(REGISTER_MANAGED_INSTANCE, &body, signer, errors, cancel)
            .await?;
        tracing::info!(fingerprint = %identity.fingerprint, "registered managed instance");
        Ok(())
    }

    /// Requests a role token for the managed instance identified by
    /// `identity`.
    pub async fn request_role_token(
        &self,
        signer: &dyn RequestSigner,
        identity: &Identity,
        cancel: &CancellationToken,
    ) -> Result<RoleToken> {
        let body = RequestRoleTokenRequest {
            fingerprint: &identity.fingerprint,
        };
        let response = self
            .call(
                REQUEST_ROLE_TOKEN,
                &body,
                signer,
                Errors {
                    transport: Error::token_exchange,
                    status: Error::token_exchange_status,
                },
                cancel,
            )
            .await?;
        cancellable(cancel, async {
            response
                .json::<RoleToken>()
                .await
                .map_err(Error::token_exchange)
        })
        .await
    }

    /// Builds, signs, and sends a request. Returns the response if its status
    /// is `200 OK`.
    ///
    /// Signer errors propagate unchanged.
    async fn call<B: serde::Serialize>(
        &self,
        target: &str,
        body: &B,
        signer: &dyn RequestSigner,
        errors: Errors,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let body = serde_json::to_vec(body).map_err(|e| (errors.transport)(e.into()))?;
        let request = self
            .inner
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header(TARGET_HEADER, target)
            .body(body)
            .timeout(self.timeout)
            .build()
            .map_err(|e| (errors.transport)(e.into()))?;

        let request = cancellable(cancel, signer.sign(request)).await?;
        tracing::debug!(target, endpoint = %self.endpoint, "sending request");
        let response = cancellable(cancel, async {
            self.inner
                .execute(request)
                .await
                .map_err(|e| (errors.transport)(e.into()))
        })
        .await?;

        if response.status() != StatusCode::OK {
            let error = cancellable(cancel, async {
                Ok(HttpStatus::from_response(response).await)
            })
            .await?;
            return Err((errors.status)(error));
        }
        Ok(response)
    }
}

/// Maps failures to the error kind of each operation.
struct Errors {
    transport: fn(BoxError) -> Error,
    status: fn(HttpStatus) -> Error,
}
