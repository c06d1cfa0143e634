use clap::Args;

use client::SyncError;

use crate::cli::args::Credentials;

/// Move ownership of a path to a new password
#[derive(Args, Debug, Clone)]
pub struct Rotate {
    #[command(flatten)]
    pub credentials: Credentials,

    /// Password that will own the path afterwards
    #[arg(long)]
    pub new_password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("new password was not accepted as owner")]
    NotAccepted,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rotate {
    type Error = RotateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let sync = ctx.controller();
        sync.set_path(&self.credentials.path)?;
        sync.set_password(&self.credentials.password)?;
        if !sync.settled().await?.owned {
            return Err(SyncError::NotOwned.into());
        }

        sync.rotate_password(&self.new_password).await?;
        if !sync.settled().await?.owned {
            return Err(RotateError::NotAccepted);
        }
        Ok(format!("rotated password for {}", self.credentials.path))
    }
}
