use clap::Args;

use common::crypto::Identity as SigningIdentity;
use common::path::{validate_path, PathError};

use crate::cli::args::Credentials;

/// Print the public key a path and password derive to
#[derive(Args, Debug, Clone)]
pub struct Identity {
    #[command(flatten)]
    pub credentials: Credentials,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("derivation failed: {0}")]
    Derivation(#[from] tokio::task::JoinError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Identity {
    type Error = IdentityError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        validate_path(&self.credentials.path)?;
        let Credentials { path, password } = self.credentials.clone();
        let identity =
            tokio::task::spawn_blocking(move || SigningIdentity::derive(&path, &password)).await?;
        Ok(identity.public().to_hex())
    }
}
