//! Content published under a path
//!
//! The owner edits a [`Draft`], which keeps one buffer per kind of content
//! so switching between Markdown, HTML and a redirect never loses text. The
//! draft projects to a [`ContentRecord`] (the owner's private source, which
//! is what a read returns) and a [`PublishedView`] (what visitors get).
//! Both are sent on every write so the gateway never has to render anything.

use std::fmt;

use serde::{Deserialize, Serialize};

mod markdown;

pub use markdown::{escape_html, render_page, split_front_matter, FrontMatter, UNTITLED};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Which kind of content is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Redirect,
    #[default]
    Markdown,
    Html,
    Raw,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Redirect => "redirect",
            ContentKind::Markdown => "markdown",
            ContentKind::Html => "html",
            ContentKind::Raw => "raw",
        };
        f.write_str(name)
    }
}

/// The owner's source for a path. Only the active kind's field is carried.
///
/// Encoded with the kind in a `type` field, e.g.
/// `{type: "redirect", redir: "https://example.com"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentRecord {
    Redirect { redir: String },
    Markdown { markdown: String },
    Html { html: String },
    /// Raw bytes have no editable source; the bytes only live in the view.
    Raw,
}

impl ContentRecord {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentRecord::Redirect { .. } => ContentKind::Redirect,
            ContentRecord::Markdown { .. } => ContentKind::Markdown,
            ContentRecord::Html { .. } => ContentKind::Html,
            ContentRecord::Raw => ContentKind::Raw,
        }
    }
}

impl Default for ContentRecord {
    fn default() -> Self {
        ContentRecord::Markdown {
            markdown: String::new(),
        }
    }
}

/// The artifact served to visitors of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishedView {
    Redirect {
        url: String,
    },
    Html {
        html: String,
    },
    Raw {
        mime: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
}

/// A binary blob to publish as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct RawUpload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for RawUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawUpload")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl RawUpload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Build an upload, guessing the MIME type from `file_name`'s extension.
    pub fn guess(file_name: &str, bytes: Vec<u8>) -> Self {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        Self::new(mime.to_string(), bytes)
    }
}

/// Derive the visitor-facing view from a record.
///
/// Pure: the same record (and upload) always gives the same view. Raw
/// records take their bytes from `upload`; with no upload the view is an
/// empty octet stream, which publishers must not send.
pub fn derive_view(record: &ContentRecord, upload: Option<&RawUpload>) -> PublishedView {
    match record {
        ContentRecord::Redirect { redir } => PublishedView::Redirect { url: redir.clone() },
        ContentRecord::Markdown { markdown } => PublishedView::Html {
            html: render_page(markdown),
        },
        ContentRecord::Html { html } => PublishedView::Html { html: html.clone() },
        ContentRecord::Raw => match upload {
            Some(upload) => PublishedView::Raw {
                mime: upload.mime.clone(),
                bytes: upload.bytes.clone(),
            },
            None => PublishedView::Raw {
                mime: OCTET_STREAM.to_string(),
                bytes: Vec::new(),
            },
        },
    }
}

/// The editing session's buffer
///
/// One buffer per editable kind plus an optional upload. Exactly one kind is
/// active; switching kinds leaves every buffer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    kind: ContentKind,
    redirect: String,
    markdown: String,
    html: String,
    upload: Option<RawUpload>,
}

impl Draft {
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ContentKind) {
        self.kind = kind;
    }

    pub fn redirect(&self) -> &str {
        &self.redirect
    }

    pub fn set_redirect(&mut self, url: impl Into<String>) {
        self.redirect = url.into();
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn set_markdown(&mut self, source: impl Into<String>) {
        self.markdown = source.into();
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn set_html(&mut self, source: impl Into<String>) {
        self.html = source.into();
    }

    pub fn upload(&self) -> Option<&RawUpload> {
        self.upload.as_ref()
    }

    pub fn attach(&mut self, upload: RawUpload) {
        self.upload = Some(upload);
    }

    /// Project the active kind to a record.
    pub fn record(&self) -> ContentRecord {
        match self.kind {
            ContentKind::Redirect => ContentRecord::Redirect {
                redir: self.redirect.clone(),
            },
            ContentKind::Markdown => ContentRecord::Markdown {
                markdown: self.markdown.clone(),
            },
            ContentKind::Html => ContentRecord::Html {
                html: self.html.clone(),
            },
            ContentKind::Raw => ContentRecord::Raw,
        }
    }

    /// The view visitors would see if the draft were published now.
    pub fn view(&self) -> PublishedView {
        derive_view(&self.record(), self.upload.as_ref())
    }

    /// Replace the active kind and its buffer with a server copy.
    pub fn load(&mut self, record: ContentRecord) {
        self.kind = record.kind();
        match record {
            ContentRecord::Redirect { redir } => self.redirect = redir,
            ContentRecord::Markdown { markdown } => self.markdown = markdown,
            ContentRecord::Html { html } => self.html = html,
            ContentRecord::Raw => {}
        }
    }
}
