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

//! The EC2 instance metadata service (IMDS).
//!
//! The metadata service is reachable only from the instance itself. It
//! supplies the instance identity (instance id and region) and the instance
//! identity credentials used for [Signature Version 4][crate::signer::sigv4]
//! signing.
//!
//! The client prefers IMDSv2: each lookup first opens a session with
//! `PUT /latest/api/token` and presents the session token on the following
//! requests. If the service does not support sessions (it answers the `PUT`
//! with `404` or `405`) the client falls back to plain IMDSv1 requests.
//!
//! # Example
//! ```
//! # use managed_instance_auth::imds::Builder;
//! # use tokio_util::sync::CancellationToken;
//! # async fn sample() -> managed_instance_auth::Result<()> {
//! let client = Builder::default().build();
//! let identity = client.identity(&CancellationToken::new()).await?;
//! println!("running on {} in {}", identity.fingerprint, identity.region);
//! # Ok(()) }
//! ```

mod credentials;

pub use credentials::InstanceCredentialsProvider;

use crate::cancel::cancellable;
use crate::errors::{BoxError, Error, HttpStatus};
use crate::identity::Identity;
use crate::{DEFAULT_TIMEOUT, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Overrides the metadata service endpoint, e.g. `http://[fd00:ec2::254]`.
pub const METADATA_ENDPOINT_ENV_VAR: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";

const TOKEN_PATH: &str = "/latest/api/token";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_TTL_SECONDS: &str = "21600";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";

type ErrorFn = fn(BoxError) -> Error;

/// Configures a metadata service [Client].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl Builder {
    /// Sets the endpoint for the metadata service.
    ///
    /// The `AWS_EC2_METADATA_SERVICE_ENDPOINT` environment variable, when set,
    /// takes precedence over this value. The default is
    /// `http://169.254.169.254`.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the timeout for each request. The default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates the client.
    pub fn build(self) -> Client {
        let env = std::env::var(METADATA_ENDPOINT_ENV_VAR).ok();
        let endpoint = resolve_endpoint(env, self.endpoint);
        Client {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            inner: reqwest::Client::new(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

fn resolve_endpoint(env: Option<String>, endpoint_override: Option<String>) -> String {
    env.filter(|e| !e.is_empty())
        .or(endpoint_override)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// A client for the instance metadata service.
#[derive(Clone, Debug)]
pub struct Client {
    endpoint: String,
    inner: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    instance_id: String,
    region: String,
}

impl Client {
    /// Fetches the instance identity.
    ///
    /// The fingerprint is the instance id.
    pub async fn identity(&self, cancel: &CancellationToken) -> Result<Identity> {
        let body = self
            .fetch(IDENTITY_DOCUMENT_PATH, Error::identity_lookup, cancel)
            .await?;
        let document =
            serde_json::from_str::<IdentityDocument>(&body).map_err(Error::identity_lookup)?;
        tracing::debug!(
            instance_id = %document.instance_id,
            region = %document.region,
            "fetched instance identity"
        );
        Ok(Identity::new(document.instance_id, document.region))
    }

    /// Fetches `path` and returns the response body.
    ///
    /// Failures are reported through `into_error`, so each caller reports its
    /// own error kind. Cancellation is always reported as such.
    pub(crate) async fn fetch(
        &self,
        path: &str,
        into_error: ErrorFn,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let session = self.session_token(into_error, cancel).await?;
        let request = self
            .inner
            .get(format!("{}{path}", self.endpoint))
            .timeout(self.timeout);
        let request = session
            .iter()
            .fold(request, |r, token| r.header(TOKEN_HEADER, token));

        let response = cancellable(cancel, async {
            request.send().await.map_err(|e| into_error(e.into()))
        })
        .await?;
        if !response.status().is_success() {
            let error = cancellable(cancel, async {
                Ok(HttpStatus::from_response(response).await)
            })
            .await?;
            return Err(into_error(error.into()));
        }
        cancellable(cancel, async {
            response.text().await.map_err(|e| into_error(e.into()))
        })
        .await
    }

    /// Opens an IMDSv2 session. Returns `None` if the service only supports
    /// IMDSv1.
    async fn session_token(
        &self,
        into_error: ErrorFn,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let request = self
            .inner
            .put(format!("{}{TOKEN_PATH}", self.endpoint))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS)
            .timeout(self.timeout);
        let response = cancellable(cancel, async {
            request.send().await.map_err(|e| into_error(e.into()))
        })
        .await?;

        match response.status() {
            status if status.is_success() => {
                let token = cancellable(cancel, async {
                    response.text().await.map_err(|e| into_error(e.into()))
                })
                .await?;
                Ok(Some(token))
            }
            status @ (StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) => {
                tracing::debug!("metadata sessions unavailable ({status}), using IMDSv1");
                Ok(None)
            }
            _ => {
                let error = cancellable(cancel, async {
                    Ok(HttpStatus::from_response(response).await)
                })
                .await?;
                Err(into_error(error.into()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;

    pub(crate) const TEST_SESSION_TOKEN: &str = "test-only-session-token";

    pub(crate) fn expect_session(server: &Server) {
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", TOKEN_PATH),
                request::headers(contains((TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS))),
            ])
            .times(1..)
            .respond_with(status_code(200).body(TEST_SESSION_TOKEN)),
        );
    }

    pub(crate) fn expect_identity(server: &Server, instance_id: &str, region: &str) {
        expect_session(server);
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", IDENTITY_DOCUMENT_PATH),
                request::headers(contains((TOKEN_HEADER, TEST_SESSION_TOKEN))),
            ])
            .respond_with(json_encoded(json!({
                "accountId": "123456789012",
                "instanceId": instance_id,
                "region": region,
                "availabilityZone": format!("{region}a"),
            }))),
        );
    }

    fn test_client(server: &Server) -> Client {
        Builder::default()
            .with_endpoint(format!("http://{}", server.addr()))
            .build()
    }

    #[tokio::test]
    async fn identity_v2() -> anyhow::Result<()> {
        let server = Server::run();
        expect_identity(&server, "i-0123456789abcdef0", "us-west-2");

        let got = test_client(&server)
            .identity(&CancellationToken::new())
            .await?;
        assert_eq!(got, Identity::new("i-0123456789abcdef0", "us-west-2"));
        Ok(())
    }

    #[test_case::test_case(404)]
    #[test_case::test_case(405)]
    #[tokio::test]
    async fn identity_v1_fallback(code: u16) -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", TOKEN_PATH))
                .respond_with(status_code(code)),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", IDENTITY_DOCUMENT_PATH),
                request::headers(not(contains(key(TOKEN_HEADER)))),
            ])
            .respond_with(json_encoded(json!({
                "instanceId": "i-0123456789abcdef0",
                "region": "eu-west-1",
            }))),
        );

        let got = test_client(&server)
            .identity(&CancellationToken::new())
            .await?;
        assert_eq!(got, Identity::new("i-0123456789abcdef0", "eu-west-1"));
        Ok(())
    }

    #[tokio::test]
    async fn session_forbidden() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", TOKEN_PATH))
                .respond_with(status_code(403).body("forbidden")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", IDENTITY_DOCUMENT_PATH))
                .times(0)
                .respond_with(status_code(500)),
        );

        let err = test_client(&server)
            .identity(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_identity_lookup(), "{err:?}");
        assert!(err.to_string().contains("forbidden"), "{err}");
    }

    #[tokio::test]
    async fn identity_http_error() {
        let server = Server::run();
        expect_session(&server);
        server.expect(
            Expectation::matching(request::method_path("GET", IDENTITY_DOCUMENT_PATH))
                .respond_with(status_code(500).body("try again")),
        );

        let err = test_client(&server)
            .identity(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_identity_lookup(), "{err:?}");
    }

    #[tokio::test]
    async fn identity_bad_document() {
        let server = Server::run();
        expect_session(&server);
        server.expect(
            Expectation::matching(request::method_path("GET", IDENTITY_DOCUMENT_PATH))
                .respond_with(json_encoded(json!({"instanceId": "i-0123"}))),
        );

        let err = test_client(&server)
            .identity(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_identity_lookup(), "{err:?}");
    }

    #[tokio::test]
    async fn identity_unreachable() {
        let server = Server::run();
        let endpoint = format!("http://{}", server.addr());
        drop(server);

        let client = Builder::default().with_endpoint(endpoint).build();
        let err = client.identity(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_identity_lookup(), "{err:?}");
    }

    #[tokio::test]
    async fn identity_cancelled() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", TOKEN_PATH))
                .times(0..)
                .respond_with(status_code(200).body(TEST_SESSION_TOKEN)),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = test_client(&server).identity(&cancel).await.unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
    }

    #[test_case::test_case(None, None, DEFAULT_ENDPOINT; "default")]
    #[test_case::test_case(None, Some("http://test-only.local"), "http://test-only.local"; "override")]
    #[test_case::test_case(Some(""), Some("http://test-only.local"), "http://test-only.local"; "empty env")]
    #[test_case::test_case(Some("http://[fd00:ec2::254]"), None, "http://[fd00:ec2::254]"; "env")]
    #[test_case::test_case(Some("http://[fd00:ec2::254]"), Some("http://test-only.local"), "http://[fd00:ec2::254]"; "env wins")]
    fn endpoint_precedence(env: Option<&str>, endpoint: Option<&str>, want: &str) {
        let got = resolve_endpoint(env.map(str::to_string), endpoint.map(str::to_string));
        assert_eq!(got, want);
    }

    #[test]
    fn endpoint_trailing_slash() {
        let client = Builder::default()
            .with_endpoint("http://test-only.local/")
            .build();
        assert!(!client.endpoint.ends_with('/'), "{client:?}");
    }
}
