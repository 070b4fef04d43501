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

use anyhow::bail;
use clap::{ArgAction, Parser};
use humantime::parse_duration;
use std::path::PathBuf;
use std::time::Duration;

/// The default location of the instance keypair.
pub const DEFAULT_KEY_PATH: &str = "/var/lib/managed-instance-credentials/rsa-key.pem";

/// Configuration options for the credential process.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = super::DESCRIPTION)]
pub struct Args {
    /// Where the instance keypair is stored.
    ///
    /// The file is created, readable only by its owner, the first time the
    /// instance registers.
    #[arg(long, env = "MANAGED_INSTANCE_KEY_PATH", default_value = DEFAULT_KEY_PATH)]
    pub key_path: PathBuf,

    /// Overrides the instance metadata service endpoint.
    ///
    /// `AWS_EC2_METADATA_SERVICE_ENDPOINT` takes precedence when set.
    #[arg(long, env = "MANAGED_INSTANCE_IMDS_ENDPOINT")]
    pub imds_endpoint: Option<String>,

    /// Overrides the fleet service endpoint, by default the regional
    /// `https://ssm.<region>.amazonaws.com/` endpoint.
    #[arg(long, env = "MANAGED_INSTANCE_SSM_ENDPOINT")]
    pub ssm_endpoint: Option<String>,

    /// The timeout for each network call.
    #[arg(long, env = "MANAGED_INSTANCE_TIMEOUT", value_parser = parse_duration, default_value = "10s")]
    pub timeout: Duration,

    /// Log more details to stderr. Repeat for debug logs.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Validates the arguments after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout.is_zero() {
            bail!("invalid timeout, should be > 0")
        }
        Ok(())
    }

    /// The maximum level of log events written to stderr.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}
