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

//! Request signers.
//!
//! Every request sent to the fleet service is authenticated by one or more
//! [RequestSigner]s. A signer receives a fully built request, adds its
//! authentication headers, and returns the request.
//!
//! Registration requests carry a single [SigV4Signer][sigv4::SigV4Signer]
//! signature. Role token requests carry two: the SigV4 signature, and then a
//! [KeyPairSigner][keypair::KeyPairSigner] signature over the SigV4
//! `Authorization` header. Use [RequestSignerExt::then] to compose them:
//!
//! ```
//! # use managed_instance_auth::credentials::StaticCredentialsProvider;
//! # use managed_instance_auth::keys::KeyPair;
//! # use managed_instance_auth::signer::RequestSignerExt;
//! # use managed_instance_auth::signer::keypair::KeyPairSigner;
//! # use managed_instance_auth::signer::sigv4::SigV4Signer;
//! # use std::sync::Arc;
//! # fn sample(key_pair: KeyPair) {
//! let credentials = StaticCredentialsProvider::new("test-only-akid", "test-only-secret");
//! let sigv4 = SigV4Signer::new(Arc::new(credentials), "ssm", "us-east-1");
//! let signer = sigv4.then(KeyPairSigner::new(key_pair));
//! # }
//! ```

pub mod keypair;
pub mod sigv4;

use crate::Result;

/// Adds authentication headers to a request.
#[async_trait::async_trait]
pub trait RequestSigner: std::fmt::Debug + Send + Sync {
    /// Signs `request`, returning the request with the new headers.
    ///
    /// Signing a request that was already signed by the same kind of signer
    /// replaces the previous signature.
    async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request>;
}

/// Extension methods for [RequestSigner].
pub trait RequestSignerExt: RequestSigner + Sized {
    /// Runs `next` on the output of this signer.
    ///
    /// If this signer fails, `next` is never called.
    fn then<N: RequestSigner>(self, next: N) -> Chain<Self, N> {
        Chain { first: self, next }
    }
}

impl<T: RequestSigner> RequestSignerExt for T {}

/// Two signers applied in sequence. See [RequestSignerExt::then].
#[derive(Clone, Debug)]
pub struct Chain<A, B> {
    first: A,
    next: B,
}

#[async_trait::async_trait]
impl<A, B> RequestSigner for Chain<A, B>
where
    A: RequestSigner,
    B: RequestSigner,
{
    async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request> {
        let request = self.first.sign(request).await?;
        self.next.sign(request).await
    }
}

#[async_trait::async_trait]
impl<T: RequestSigner + ?Sized> RequestSigner for std::sync::Arc<T> {
    async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request> {
        self.as_ref().sign(request).await
    }
}
