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

use chrono::SecondsFormat;
use managed_instance_auth::token_exchange::RoleToken;

/// The only document version understood by credential-process consumers.
pub const VERSION: u32 = 1;

/// The document printed on stdout for credential-process consumers.
#[derive(PartialEq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialProcessOutput {
    version: u32,
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

impl From<&RoleToken> for CredentialProcessOutput {
    fn from(token: &RoleToken) -> Self {
        Self {
            version: VERSION,
            access_key_id: token.access_key_id().to_string(),
            secret_access_key: token.secret_access_key().to_string(),
            session_token: token.session_token().to_string(),
            expiration: token
                .expiration()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl std::fmt::Debug for CredentialProcessOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProcessOutput")
            .field("version", &self.version)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[censored]")
            .field("session_token", &"[censored]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn role_token(expiration: serde_json::Value) -> anyhow::Result<RoleToken> {
        let token = serde_json::from_value(json!({
            "AccessKeyId": "AKIA-test-only",
            "SecretAccessKey": "secret",
            "SessionToken": "tok",
            "TokenExpirationDate": expiration,
            "UpdateKeyPair": false,
        }))?;
        Ok(token)
    }

    #[test]
    fn format() -> anyhow::Result<()> {
        let output = CredentialProcessOutput::from(&role_token(json!(1700000000.0))?);
        let got = serde_json::to_value(&output)?;
        assert_eq!(
            got,
            json!({
                "Version": 1,
                "AccessKeyId": "AKIA-test-only",
                "SecretAccessKey": "secret",
                "SessionToken": "tok",
                "Expiration": "2023-11-14T22:13:20Z",
            })
        );
        Ok(())
    }

    #[test_case(json!(0.0), "1970-01-01T00:00:00Z")]
    #[test_case(json!(1700000000.999), "2023-11-14T22:13:20Z")]
    #[test_case(json!(4102444800_i64), "2100-01-01T00:00:00Z")]
    fn expiration(value: serde_json::Value, want: &str) -> anyhow::Result<()> {
        let output = CredentialProcessOutput::from(&role_token(value)?);
        assert_eq!(output.expiration, want);
        Ok(())
    }

    #[test]
    fn debug() -> anyhow::Result<()> {
        let output = CredentialProcessOutput::from(&role_token(json!(1700000000.0))?);
        let got = format!("{output:?}");
        assert!(got.contains("AKIA-test-only"), "{got}");
        assert!(!got.contains("\"secret\""), "{got}");
        assert!(!got.contains("\"tok\""), "{got}");
        Ok(())
    }
}
