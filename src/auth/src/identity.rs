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

/// The identity of the instance running this process.
///
/// The identity is obtained once per run, typically from the
/// [instance metadata service][crate::imds], and every other component reads
/// it without modifying it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Uniquely identifies the device to the fleet service.
    ///
    /// On EC2 this is the instance id, e.g. `i-0123456789abcdef0`.
    pub fingerprint: String,

    /// The region hosting the instance, e.g. `us-east-1`.
    pub region: String,
}

impl Identity {
    /// Creates an identity from a device fingerprint and a region.
    pub fn new<F, R>(fingerprint: F, region: R) -> Self
    where
        F: Into<String>,
        R: Into<String>,
    {
        Self {
            fingerprint: fingerprint.into(),
            region: region.into(),
        }
    }
}
