//! Template rendering with per-archive failure isolation.
//!
//! [`Renderer::render`] takes an archive key through the whole template path:
//! resolve the template, load it, check it exposes a component, invoke that
//! component, and serialize the resulting document. Every failure on the way
//! (missing file, data-only module, a component returning an error or
//! panicking, output that is not a full document) comes back as
//! [`RenderedArchive::Error`] with a readable message. A broken template
//! never takes the caller down with it.
//!
//! Nothing is cached: each call reads and builds the template afresh.

use crate::key::ArchiveKey;
use crate::template::{Document, Export, TemplateError, TemplateSource};
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Panicked(String),
    #[error("rendered output is not a complete HTML document")]
    NotADocument,
}

/// Outcome of rendering one archive: `{"html": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderedArchive {
    Html(String),
    Error(String),
}

impl RenderedArchive {
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Html(html) => Some(html),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Html(_) => None,
            Self::Error(message) => Some(message),
        }
    }

    /// Transform the HTML of a successful render; errors pass through.
    pub fn map_html(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            Self::Html(html) => Self::Html(f(html)),
            error => error,
        }
    }
}

impl From<Result<String, RenderError>> for RenderedArchive {
    fn from(result: Result<String, RenderError>) -> Self {
        match result {
            Ok(html) => Self::Html(html),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

/// Renders archives from a [`TemplateSource`].
pub struct Renderer<S> {
    source: S,
}

impl<S: TemplateSource> Renderer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Render `key` to a standalone HTML document, or an error message.
    pub fn render(&self, key: &ArchiveKey) -> RenderedArchive {
        let result = self.try_render(key);
        if let Err(e) = &result {
            warn!(archive = %key, error = %e, "render failed");
        }
        result.into()
    }

    /// Like [`render`](Self::render) but keeps the typed error.
    pub fn try_render(&self, key: &ArchiveKey) -> Result<String, RenderError> {
        let built = catch_unwind(AssertUnwindSafe(|| self.build(key)))
            .map_err(|payload| RenderError::Panicked(panic_message(payload)))??;
        serialize(built)
    }

    fn build(&self, key: &ArchiveKey) -> Result<Document, RenderError> {
        let handle = self.source.resolve(key)?;
        debug!(archive = %key, template = %handle, "resolved template");

        let Export::Component(component) = self.source.load(&handle)? else {
            return Err(TemplateError::NotAComponent.into());
        };
        Ok(component.build()?)
    }
}

/// Serialize a document, insisting on a real `<html>`/`<body>` document.
fn serialize(document: Document) -> Result<String, RenderError> {
    let html = document.into_markup().into_string();
    let lower = html.to_ascii_lowercase();
    if lower.contains("<html") && lower.contains("<body") {
        Ok(html)
    } else {
        Err(RenderError::NotADocument)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "template panicked".to_string()
    }
}
