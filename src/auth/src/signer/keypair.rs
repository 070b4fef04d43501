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

//! Signs requests with the instance keypair.

use super::RequestSigner;
use crate::Result;
use crate::errors::Error;
use crate::keys::KeyPair;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::Request;

/// The header carrying the keypair signature.
pub const ASYMMETRIC_KEY_AUTHORIZATION: &str = "ssm-asymmetrickeyauthorization";

/// Adds a keypair signature over the request's `Authorization` header.
///
/// The signed bytes are the exact `Authorization` value produced by a
/// preceding signer, normally a [SigV4Signer][super::sigv4::SigV4Signer].
/// The signature is sent as `SSM-AsymmetricKeyAuthorization: Signature=<base64>`.
#[derive(Clone, Debug)]
pub struct KeyPairSigner {
    key_pair: KeyPair,
}

impl KeyPairSigner {
    /// Creates a signer that uses `key_pair`.
    pub fn new(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }
}

#[async_trait::async_trait]
impl RequestSigner for KeyPairSigner {
    async fn sign(&self, mut request: Request) -> Result<Request> {
        let primary = request
            .headers()
            .get(AUTHORIZATION)
            .filter(|v| !v.is_empty())
            .ok_or_else(Error::missing_primary_signature)?;
        let signature = self.key_pair.sign(primary.as_bytes())?;

        let mut value =
            HeaderValue::try_from(format!("Signature={signature}")).map_err(Error::signing)?;
        value.set_sensitive(true);
        request
            .headers_mut()
            .insert(HeaderName::from_static(ASYMMETRIC_KEY_AUTHORIZATION), value);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialsProvider;
    use crate::keys::tests::test_key_pair;
    use crate::signer::RequestSignerExt;
    use crate::signer::sigv4::SigV4Signer;
    use crate::signer::tests::test_request;
    use base64::Engine as _;
    use base64::prelude::BASE64_STANDARD;
    use rsa::pkcs8::DecodePublicKey;
    use rsa::{Pkcs1v15Sign, RsaPublicKey};
    use sha2::{Digest, Sha256};
    use std::sync::Arc;

    fn with_authorization(value: &'static str) -> Request {
        let mut request = test_request();
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static(value));
        request
    }

    fn key_authorization(request: &Request) -> anyhow::Result<String> {
        let value = request
            .headers()
            .get(ASYMMETRIC_KEY_AUTHORIZATION)
            .ok_or_else(|| anyhow::anyhow!("missing header in {request:?}"))?;
        Ok(value.to_str()?.to_string())
    }

    #[tokio::test]
    async fn missing_primary() {
        let signer = KeyPairSigner::new(test_key_pair());
        let err = signer.sign(test_request()).await.unwrap_err();
        assert!(err.is_missing_primary_signature(), "{err:?}");
        assert!(err.is_signing(), "{err:?}");
    }

    #[tokio::test]
    async fn empty_primary() {
        let signer = KeyPairSigner::new(test_key_pair());
        let err = signer.sign(with_authorization("")).await.unwrap_err();
        assert!(err.is_missing_primary_signature(), "{err:?}");
    }

    #[tokio::test]
    async fn signs_authorization() -> anyhow::Result<()> {
        const PRIMARY: &str = "AWS4-HMAC-SHA256 Credential=test-only";
        let key_pair = test_key_pair();
        let signer = KeyPairSigner::new(key_pair.clone());

        let got = signer.sign(with_authorization(PRIMARY)).await?;
        let value = key_authorization(&got)?;
        let encoded = value
            .strip_prefix("Signature=")
            .ok_or_else(|| anyhow::anyhow!("unexpected format {value}"))?;

        let der = BASE64_STANDARD.decode(key_pair.public_key()?)?;
        let public_key = RsaPublicKey::from_public_key_der(&der)?;
        public_key.verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(PRIMARY.as_bytes()),
            &BASE64_STANDARD.decode(encoded)?,
        )?;
        // The primary signature is untouched.
        assert_eq!(
            got.headers().get(AUTHORIZATION),
            Some(&HeaderValue::from_static(PRIMARY))
        );
        Ok(())
    }

    #[tokio::test]
    async fn deterministic() -> anyhow::Result<()> {
        let signer = KeyPairSigner::new(test_key_pair());
        let first = signer.sign(with_authorization("test-only-primary")).await?;
        let second = signer.sign(with_authorization("test-only-primary")).await?;
        assert_eq!(key_authorization(&first)?, key_authorization(&second)?);
        Ok(())
    }

    #[tokio::test]
    async fn resign_replaces() -> anyhow::Result<()> {
        let signer = KeyPairSigner::new(test_key_pair());
        let once = signer.sign(with_authorization("test-only-primary")).await?;
        let want = key_authorization(&once)?;
        let twice = signer.sign(once).await?;
        assert_eq!(
            twice
                .headers()
                .get_all(ASYMMETRIC_KEY_AUTHORIZATION)
                .iter()
                .count(),
            1
        );
        assert_eq!(key_authorization(&twice)?, want);
        Ok(())
    }

    #[tokio::test]
    async fn after_sigv4() -> anyhow::Result<()> {
        let credentials = StaticCredentialsProvider::new("test-only-akid", "test-only-secret");
        let signer = SigV4Signer::new(Arc::new(credentials), "ssm", "us-east-1")
            .then(KeyPairSigner::new(test_key_pair()));

        let got = signer.sign(test_request()).await?;
        let primary = got
            .headers()
            .get(AUTHORIZATION)
            .ok_or_else(|| anyhow::anyhow!("missing authorization in {got:?}"))?;
        let want = test_key_pair().sign(primary.as_bytes())?;
        assert_eq!(key_authorization(&got)?, format!("Signature={want}"));
        Ok(())
    }
}
