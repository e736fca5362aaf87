//! Archive previews: metadata plus rendered HTML with remote asset paths.
//!
//! This is the single entry point an archive browser needs. A lookup goes
//! repository → renderer → asset rewriter:
//!
//! ```text
//! get_archive(y, m, d) ──None──▶ not found
//!        │
//!        ▼
//! render(key) ──Error(msg)──▶ preview with the error, metadata intact
//!        │
//!        ▼
//! rewrite_asset_paths(html, base, key) ──▶ preview with html
//! ```
//!
//! A render failure never hides the archive: callers still get its metadata.

use crate::key::ArchiveKey;
use crate::render::{RenderedArchive, Renderer};
use crate::repository::{Archive, ArchiveRepository};
use crate::rewrite::rewrite_asset_paths;
use crate::template::TemplateSource;
use serde::Serialize;

/// One archive ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub archive: Archive,
    pub rendered: RenderedArchive,
}

pub struct PreviewService<S> {
    repository: ArchiveRepository,
    renderer: Renderer<S>,
    asset_base_url: Option<String>,
}

impl<S: TemplateSource> PreviewService<S> {
    pub fn new(
        repository: ArchiveRepository,
        renderer: Renderer<S>,
        asset_base_url: Option<String>,
    ) -> Self {
        Self {
            repository,
            renderer,
            asset_base_url,
        }
    }

    pub fn repository(&self) -> &ArchiveRepository {
        &self.repository
    }

    /// All listable archives, in configured order.
    pub fn list(&self) -> Vec<Archive> {
        self.repository.list_archives()
    }

    /// Look up and render one archive. `None` when the archive does not exist
    /// or its metadata is invalid.
    pub fn preview(&self, year: &str, month: &str, dayed_slug: &str) -> Option<Preview> {
        let archive = self.repository.get_archive(year, month, dayed_slug)?;
        let rendered = self.render(&archive.key);
        Some(Preview { archive, rendered })
    }

    /// Render `key` and rewrite its asset paths. Metadata is not consulted.
    pub fn render(&self, key: &ArchiveKey) -> RenderedArchive {
        let base = self.asset_base_url.as_deref();
        self.renderer
            .render(key)
            .map_html(|html| rewrite_asset_paths(&html, base, key).into_owned())
    }
}
