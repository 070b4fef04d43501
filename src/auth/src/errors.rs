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

//! Errors produced while bootstrapping managed instance credentials.
//!
//! Every error is fatal to the current run. The predicates on [Error] let the
//! process boundary report which step failed.

use http::StatusCode;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for this crate.
///
/// Applications rarely need to create instances of this error type. The
/// exception might be when testing application code, where the application is
/// mocking a [CredentialsProvider][crate::credentials::CredentialsProvider].
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// The instance identity could not be fetched from the metadata service.
    pub fn is_identity_lookup(&self) -> bool {
        matches!(self.0, ErrorKind::IdentityLookup(_))
    }

    /// The platform credentials used for request signing were unavailable.
    pub fn is_credential_retrieval(&self) -> bool {
        matches!(self.0, ErrorKind::CredentialRetrieval(_))
    }

    /// A new keypair could not be generated.
    pub fn is_key_generation(&self) -> bool {
        matches!(self.0, ErrorKind::KeyGeneration(_))
    }

    /// The keypair could not be written to its storage location.
    pub fn is_persistence(&self) -> bool {
        matches!(self.0, ErrorKind::Persistence(_))
    }

    /// A request could not be signed.
    ///
    /// This includes requests rejected because they lack a primary
    /// authorization header, see [is_missing_primary_signature].
    ///
    /// [is_missing_primary_signature]: Error::is_missing_primary_signature
    pub fn is_signing(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::Signing(_) | ErrorKind::MissingPrimarySignature
        )
    }

    /// A keypair signature was requested on a request without a primary
    /// authorization header.
    pub fn is_missing_primary_signature(&self) -> bool {
        matches!(self.0, ErrorKind::MissingPrimarySignature)
    }

    /// The registration endpoint rejected the request, or could not be reached.
    pub fn is_registration(&self) -> bool {
        matches!(self.0, ErrorKind::Registration { .. })
    }

    /// The role token endpoint rejected the request, or could not be reached.
    pub fn is_token_exchange(&self) -> bool {
        matches!(self.0, ErrorKind::TokenExchange { .. })
    }

    /// The caller cancelled the run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.0, ErrorKind::Cancelled)
    }

    /// The HTTP status returned by the fleet service, if the error was caused
    /// by a non-success response.
    pub fn http_status(&self) -> Option<StatusCode> {
        match &self.0 {
            ErrorKind::Registration {
                status: Some(s), ..
            }
            | ErrorKind::TokenExchange {
                status: Some(s), ..
            } => Some(*s),
            _ => None,
        }
    }

    pub(crate) fn identity_lookup<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::IdentityLookup(source.into()))
    }

    pub(crate) fn credential_retrieval<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::CredentialRetrieval(source.into()))
    }

    pub(crate) fn key_generation<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::KeyGeneration(source.into()))
    }

    pub(crate) fn persistence<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Persistence(source.into()))
    }

    pub(crate) fn signing<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Signing(source.into()))
    }

    pub(crate) fn missing_primary_signature() -> Error {
        Error(ErrorKind::MissingPrimarySignature)
    }

    /// The registration request could not be sent or its response read.
    pub(crate) fn registration<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Registration {
            status: None,
            source: source.into(),
        })
    }

    /// The registration endpoint answered with a non-success status.
    pub(crate) fn registration_status(error: HttpStatus) -> Error {
        Error(ErrorKind::Registration {
            status: Some(error.status),
            source: error.into(),
        })
    }

    /// The token request could not be sent or its response parsed.
    pub(crate) fn token_exchange<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::TokenExchange {
            status: None,
            source: source.into(),
        })
    }

    /// The role token endpoint answered with a non-success status.
    pub(crate) fn token_exchange_status(error: HttpStatus) -> Error {
        Error(ErrorKind::TokenExchange {
            status: Some(error.status),
            source: error.into(),
        })
    }

    pub(crate) fn cancelled() -> Error {
        Error(ErrorKind::Cancelled)
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("cannot look up the instance identity: {0}")]
    IdentityLookup(#[source] BoxError),
    #[error("cannot retrieve platform credentials: {0}")]
    CredentialRetrieval(#[source] BoxError),
    #[error("cannot generate a new keypair: {0}")]
    KeyGeneration(#[source] BoxError),
    #[error("cannot persist the keypair: {0}")]
    Persistence(#[source] BoxError),
    #[error("cannot sign the request: {0}")]
    Signing(#[source] BoxError),
    #[error("cannot sign the request with the keypair, the request has no authorization header")]
    MissingPrimarySignature,
    #[error("cannot register the managed instance: {source}")]
    Registration {
        status: Option<StatusCode>,
        #[source]
        source: BoxError,
    },
    #[error("cannot exchange the keypair for a role token: {source}")]
    TokenExchange {
        status: Option<StatusCode>,
        #[source]
        source: BoxError,
    },
    #[error("the operation was cancelled")]
    Cancelled,
}

/// A non-success response from a remote endpoint.
#[derive(thiserror::Error, Debug)]
#[error("the service returned {status}, body=<{body}>")]
pub(crate) struct HttpStatus {
    status: StatusCode,
    body: String,
}

impl HttpStatus {
    /// Consumes a non-success response, capturing its body for diagnostics.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("[cannot read response body: {e}]"));
        Self { status, body }
    }
}
