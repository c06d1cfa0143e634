use clap::Args;

use client::SyncError;

use crate::cli::args::Credentials;

/// Show who owns a path and, if the password owns it, its content
#[derive(Args, Debug, Clone)]
pub struct Read {
    #[command(flatten)]
    pub credentials: Credentials,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("failed to format record: {0}")]
    Format(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Read {
    type Error = ReadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let sync = ctx.controller();
        sync.set_path(&self.credentials.path)?;
        sync.set_password(&self.credentials.password)?;
        let settlement = sync.settled().await?;

        let snapshot = sync.snapshot();
        let mut lines = vec![
            format!("path:    {}", snapshot.path),
            format!("claimed: {}", settlement.claimed),
            format!("owned:   {}", settlement.owned),
        ];
        if let Some(public_key) = snapshot.public_key {
            lines.push(format!("key:     {}", public_key));
        }
        if settlement.owned && settlement.claimed {
            lines.push(serde_json::to_string_pretty(&snapshot.draft.record())?);
        }
        Ok(lines.join("\n"))
    }
}
