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

//! Signature Version 4 request signing.
//!
//! The signer computes a canonical form of the request, derives a signing key
//! from the platform secret, and adds three headers:
//!
//! * `x-amz-date`: the request timestamp, in `YYYYMMDDTHHMMSSZ` format.
//! * `x-amz-security-token`: the session token, only for temporary credentials.
//! * `Authorization`: `AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...`.
//!
//! The request body must be buffered, its SHA-256 digest is part of the
//! signature.

use super::RequestSigner;
use crate::Result;
use crate::credentials::CredentialsProvider;
use crate::errors::Error;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Request, Url};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

// Headers that proxies and clients rewrite in flight.
const UNSIGNED_HEADERS: [&str; 4] = ["authorization", "user-agent", "expect", "x-amzn-trace-id"];

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Signs requests with Signature Version 4.
#[derive(Clone, Debug)]
pub struct SigV4Signer {
    credentials: Arc<dyn CredentialsProvider>,
    service: String,
    region: String,
}

impl SigV4Signer {
    /// Creates a signer for `service` in `region`.
    ///
    /// The fleet service endpoints use `ssm` as the service name.
    pub fn new<S, R>(credentials: Arc<dyn CredentialsProvider>, service: S, region: R) -> Self
    where
        S: Into<String>,
        R: Into<String>,
    {
        Self {
            credentials,
            service: service.into(),
            region: region.into(),
        }
    }

    /// Signs `request` as if it was sent at `now`.
    pub async fn sign_at(&self, mut request: Request, now: DateTime<Utc>) -> Result<Request> {
        let credentials = self.credentials.credentials().await?;

        let payload_hash = match request.body() {
            None => content_digest(&[]),
            Some(body) => content_digest(
                body.as_bytes()
                    .ok_or_else(|| Error::signing("cannot sign a streaming request body"))?,
            ),
        };

        let request_timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();

        let headers = request.headers_mut();
        headers.remove(AUTHORIZATION);
        headers.insert(
            HeaderName::from_static(X_AMZ_DATE),
            HeaderValue::from_str(&request_timestamp).map_err(Error::signing)?,
        );
        match &credentials.session_token {
            Some(token) => {
                let mut value = HeaderValue::from_str(token).map_err(Error::signing)?;
                value.set_sensitive(true);
                headers.insert(HeaderName::from_static(X_AMZ_SECURITY_TOKEN), value);
            }
            None => {
                headers.remove(X_AMZ_SECURITY_TOKEN);
            }
        }

        let (canonical_request, signed_headers) = canonical_request(&request, &payload_hash)?;
        let canonical_request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let credential_scope = format!(
            "{datestamp}/{}/{}/aws4_request",
            self.region, self.service
        );
        let string_to_sign = [
            ALGORITHM.to_string(),
            request_timestamp,
            credential_scope.clone(),
            canonical_request_hash,
        ]
        .join("\n");

        let signing_key = [
            datestamp.as_str(),
            self.region.as_str(),
            self.service.as_str(),
            "aws4_request",
        ]
        .iter()
        .try_fold(
            format!("AWS4{}", credentials.secret_access_key).into_bytes(),
            |key, data| hmac_sha256(&key, data.as_bytes()),
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        );
        let mut value = HeaderValue::from_str(&authorization).map_err(Error::signing)?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

#[async_trait::async_trait]
impl RequestSigner for SigV4Signer {
    async fn sign(&self, request: Request) -> Result<Request> {
        self.sign_at(request, Utc::now()).await
    }
}

/// The lowercase hex encoding of the SHA-256 digest of `body`.
pub fn content_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::signing(format!("cannot initialize HMAC: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Returns the canonical request and the list of signed headers.
fn canonical_request(request: &Request, payload_hash: &str) -> Result<(String, String)> {
    let headers = canonical_headers(request)?;
    let canonical_headers = headers
        .iter()
        .fold(String::new(), |acc, (k, v)| format!("{acc}{k}:{v}\n"));
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical_request = [
        request.method().as_str().to_string(),
        canonical_uri(request.url()),
        canonical_query(request.url()),
        canonical_headers,
        signed_headers.clone(),
        payload_hash.to_string(),
    ]
    .join("\n");
    Ok((canonical_request, signed_headers))
}

fn canonical_headers(request: &Request) -> Result<BTreeMap<String, String>> {
    let mut headers = BTreeMap::<String, Vec<String>>::new();
    for (name, value) in request.headers() {
        if UNSIGNED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = value.to_str().map_err(Error::signing)?;
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    if !headers.contains_key("host") {
        headers.insert("host".to_string(), vec![host(request.url())?]);
    }
    Ok(headers.into_iter().map(|(k, v)| (k, v.join(","))).collect())
}

fn host(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::signing(format!("cannot sign a request without a host: {url}")))?;
    Ok(match url.port() {
        None => host.to_string(),
        Some(port) => format!("{host}:{port}"),
    })
}

fn canonical_uri(url: &Url) -> String {
    match url.path() {
        "" | "/" => "/".to_string(),
        path => path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, UNRESERVED).to_string())
            .collect::<Vec<_>>()
            .join("/"),
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs = url
        .query_pairs()
        .map(|(k, v)| {
            (
                utf8_percent_encode(&k, UNRESERVED).to_string(),
                utf8_percent_encode(&v, UNRESERVED).to_string(),
            )
        })
        .collect::<Vec<_>>();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
