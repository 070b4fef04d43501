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

//! Prints short-lived role credentials for a managed EC2 instance.
//!
//! The program writes a single JSON document to stdout, in the format
//! expected by `credential_process` consumers. Logs go to stderr.

mod args;
mod output;

use args::Args;
use clap::Parser;
use managed_instance_auth::bootstrap::Builder;
use output::CredentialProcessOutput;
use tokio_util::sync::CancellationToken;

const DESCRIPTION: &str = concat!(
    "Obtains role credentials for this EC2 instance by registering it as a",
    " managed instance with a self-generated keypair.",
    " The credentials are printed to stdout in the credential-process format."
);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate()?;
    enable_tracing(&args)?;
    tracing::debug!("Configuration: {args:?}");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling the run");
            on_interrupt.cancel();
        }
    });

    let token = builder(&args).run(&cancel).await?;
    if token.update_key_pair() {
        tracing::warn!("UpdateKeyPair: the fleet service requested a new keypair, keeping the current one");
    }

    let output = CredentialProcessOutput::from(&token);
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn builder(args: &Args) -> Builder {
    let builder = Builder::new(&args.key_path).with_timeout(args.timeout);
    let builder = args
        .imds_endpoint
        .iter()
        .fold(builder, |b, e| b.with_imds_endpoint(e));
    args.ssm_endpoint
        .iter()
        .fold(builder, |b, e| b.with_ssm_endpoint(e))
}

fn enable_tracing(args: &Args) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(args.log_level())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
