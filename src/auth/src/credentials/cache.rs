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

use super::{Credentials, CredentialsProvider};
use crate::Result;
use std::time::Duration;
use tokio::sync::Mutex;
// Using tokio's wrapper makes the cache testable without relying on clock times.
use tokio::time::Instant;

/// Credentials are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Caches the credentials returned by another [CredentialsProvider].
///
/// The cache calls the inner provider when it holds no credentials, or when
/// the credentials it holds expire within the next five minutes. Errors are
/// never cached.
#[derive(Debug)]
pub struct CredentialsCache<P> {
    current: Mutex<Option<Credentials>>,
    inner: P,
}

impl<P> CredentialsCache<P>
where
    P: CredentialsProvider,
{
    /// Creates a cache that refreshes from `inner`.
    pub fn new(inner: P) -> Self {
        Self {
            current: Mutex::new(None),
            inner,
        }
    }
}

// Returns true if the credentials remain valid beyond the refresh margin.
fn usable(credentials: &Credentials) -> bool {
    !credentials
        .expires_at
        .is_some_and(|e| e <= Instant::now() + REFRESH_MARGIN)
}

#[async_trait::async_trait]
impl<P> CredentialsProvider for CredentialsCache<P>
where
    P: CredentialsProvider,
{
    async fn credentials(&self) -> Result<Credentials> {
        // Holding the lock across the refresh means concurrent callers wait
        // for a single refresh.
        let mut current = self.current.lock().await;
        if let Some(credentials) = current.as_ref().filter(|c| usable(c)) {
            return Ok(credentials.clone());
        }
        let fresh = self.inner.credentials().await?;
        tracing::debug!(
            access_key_id = %fresh.access_key_id,
            "refreshed platform credentials"
        );
        *current = Some(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::MockCredentialsProvider;
    use crate::errors::Error;

    static VALID_DURATION: Duration = Duration::from_secs(3600);

    fn credentials(id: &str, expires_at: Option<Instant>) -> Credentials {
        Credentials {
            access_key_id: id.to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("session".to_string()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn initial_success() -> anyhow::Result<()> {
        let expected = credentials("initial", None);
        let expected_clone = expected.clone();

        let mut mock = MockCredentialsProvider::new();
        mock.expect_credentials()
            .times(1)
            .return_once(|| Ok(expected_clone));

        let cache = CredentialsCache::new(mock);
        let actual = cache.credentials().await?;
        assert_eq!(actual, expected);

        // Verify that we use the cached credentials instead of making a new
        // request to the mock provider.
        let actual = cache.credentials().await?;
        assert_eq!(actual, expected);
        Ok(())
    }

    #[tokio::test]
    async fn initial_failure() {
        let mut mock = MockCredentialsProvider::new();
        mock.expect_credentials()
            .times(2)
            .returning(|| Err(Error::credential_retrieval("fail")));

        let cache = CredentialsCache::new(mock);
        let got = cache.credentials().await;
        assert!(matches!(&got, Err(e) if e.is_credential_retrieval()), "{got:?}");

        // Errors are not cached, the next call asks the provider again.
        assert!(cache.credentials().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_before_expiration() -> anyhow::Result<()> {
        let now = Instant::now();
        let initial = credentials("initial", Some(now + VALID_DURATION));
        let initial_clone = initial.clone();
        let refresh = credentials("refresh", Some(now + 2 * VALID_DURATION));
        let refresh_clone = refresh.clone();

        let mut seq = mockall::Sequence::new();
        let mut mock = MockCredentialsProvider::new();
        mock.expect_credentials()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Ok(initial_clone));
        mock.expect_credentials()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Ok(refresh_clone));

        let cache = CredentialsCache::new(mock);
        assert_eq!(cache.credentials().await?, initial);

        // Still outside the refresh margin.
        tokio::time::advance(VALID_DURATION - REFRESH_MARGIN - Duration::from_secs(1)).await;
        assert_eq!(cache.credentials().await?, initial);

        // Inside the refresh margin, the cache fetches new credentials.
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.credentials().await?, refresh);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_then_failure() -> anyhow::Result<()> {
        let initial = credentials("initial", Some(Instant::now() + VALID_DURATION));
        let initial_clone = initial.clone();

        let mut seq = mockall::Sequence::new();
        let mut mock = MockCredentialsProvider::new();
        mock.expect_credentials()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Ok(initial_clone));
        mock.expect_credentials()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Err(Error::credential_retrieval("fail")));

        let cache = CredentialsCache::new(mock);
        assert_eq!(cache.credentials().await?, initial);

        tokio::time::advance(VALID_DURATION).await;

        // Make sure we return the error, not the expired credentials.
        assert!(cache.credentials().await.is_err());
        Ok(())
    }
}
