use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args};

use client::{Edit, SyncError};
use common::content::{ContentKind, RawUpload};

use crate::cli::args::Credentials;

/// Publish content under a path, claiming it if nobody has
#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("content")
        .required(true)
        .args(["redirect", "markdown", "html", "raw"]),
))]
pub struct Publish {
    #[command(flatten)]
    pub credentials: Credentials,

    /// Redirect visitors to this URL
    #[arg(long)]
    pub redirect: Option<String>,

    /// Markdown file to render as a page
    #[arg(long)]
    pub markdown: Option<PathBuf>,

    /// HTML file to serve as is
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// File to serve as raw bytes, typed by its extension
    #[arg(long)]
    pub raw: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

impl Publish {
    fn read_text(path: &Path) -> Result<String, PublishError> {
        std::fs::read_to_string(path).map_err(|e| PublishError::Io(path.to_path_buf(), e))
    }

    /// The draft edits this invocation asks for.
    fn edits(&self) -> Result<(Vec<Edit>, Option<RawUpload>), PublishError> {
        if let Some(url) = &self.redirect {
            return Ok((
                vec![Edit::Kind(ContentKind::Redirect), Edit::Redirect(url.clone())],
                None,
            ));
        }
        if let Some(path) = &self.markdown {
            return Ok((
                vec![
                    Edit::Kind(ContentKind::Markdown),
                    Edit::Markdown(Self::read_text(path)?),
                ],
                None,
            ));
        }
        if let Some(path) = &self.html {
            return Ok((
                vec![Edit::Kind(ContentKind::Html), Edit::Html(Self::read_text(path)?)],
                None,
            ));
        }

        // clap guarantees one member of the group is set
        let Some(path) = &self.raw else {
            return Ok((Vec::new(), None));
        };
        let bytes = std::fs::read(path).map_err(|e| PublishError::Io(path.clone(), e))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok((
            vec![Edit::Kind(ContentKind::Raw)],
            Some(RawUpload::guess(&file_name, bytes)),
        ))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Publish {
    type Error = PublishError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (edits, upload) = self.edits()?;

        let sync = ctx.controller();
        sync.set_path(&self.credentials.path)?;
        sync.set_password(&self.credentials.password)?;
        let settlement = sync.settled().await?;
        if !settlement.owned {
            return Err(SyncError::NotOwned.into());
        }

        for edit in edits {
            sync.edit(edit)?;
        }
        if let Some(upload) = upload {
            sync.attach(upload)?;
        }
        sync.publish().await?;

        let kind = sync.snapshot().draft.kind();
        let verb = if settlement.claimed { "updated" } else { "claimed" };
        let url = ctx
            .config
            .remote
            .join(&self.credentials.path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.credentials.path.clone());
        Ok(format!("{verb} {url} ({kind})"))
    }
}
