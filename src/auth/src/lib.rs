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

//! Managed Instance Credentials for EC2
//!
//! This crate lets an EC2 instance obtain short-lived account credentials
//! without any pre-provisioned secret. The instance proves its identity twice:
//! once with the credentials the [instance metadata service] hands out, and
//! once with a self-generated RSA keypair registered with [Systems Manager] as
//! a managed instance.
//!
//! A run has three steps, strictly in this order:
//!
//! 1. Look up the instance [Identity][identity::Identity] from the metadata
//!    service.
//! 2. Load the persisted [KeyPair][keys::KeyPair], or create one, register it,
//!    and persist it (see [registration]).
//! 3. Exchange the keypair for a [RoleToken][token_exchange::RoleToken]
//!    (see [token_exchange]).
//!
//! The [bootstrap] module wires these steps together.
//!
//! [instance metadata service]: https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/ec2-instance-metadata.html
//! [Systems Manager]: https://docs.aws.amazon.com/systems-manager/latest/userguide/managed-instances.html

pub mod bootstrap;
pub mod credentials;
pub mod errors;
/// The instance identity consumed by every other component.
pub mod identity;
pub mod imds;
pub mod keys;
pub mod registration;
pub mod signer;
pub mod ssm;
pub mod token_exchange;

pub(crate) mod cancel;

/// A `Result` alias where the `Err` case is
/// `managed_instance_auth::errors::Error`.
pub type Result<T> = std::result::Result<T, crate::errors::Error>;

/// The default timeout for each request to the metadata service and to
/// Systems Manager.
pub(crate) const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
