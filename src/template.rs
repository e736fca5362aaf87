//! Template sources: where an archive's rendering logic comes from.
//!
//! The renderer only knows two steps, both behind [`TemplateSource`]:
//!
//! 1. **resolve** a key to a handle (a file path, a registry entry)
//! 2. **load** the handle into an [`Export`]: either a [`Component`] that can
//!    be invoked to build a [`Document`], or a plain value that cannot
//!
//! How loading happens is the source's business. Two sources ship here:
//!
//! - [`FsTemplateSource`] reads `mail.<ext>` from the archive directory.
//! - [`TemplateRegistry`] holds components registered from Rust code.
//!
//! ## File templates
//!
//! ```text
//! 2024/12/28-launch/
//! ├── mail.md      # markdown body, wrapped in the email layout
//! ├── mail.html    # HTML fragment (wrapped) or complete document (as-is)
//! └── mail.json    # data only: loads, but is not a component
//! ```
//!
//! The first of `md`, `html`, `json` found wins. Markdown and HTML templates
//! may open with TOML front matter between `+++` fences:
//!
//! ```text
//! +++
//! preview_text = "Our biggest release yet"
//! layout = "email"   # or "none" for a bare html/body shell
//! +++
//! # Launch day
//! ```
//!
//! Front matter is parsed when the component is invoked, so a broken header
//! surfaces as a construction failure of that one template. A `mail.html`
//! that is already a complete document is used as-is and must not carry
//! front matter.

use crate::config::LayoutConfig;
use crate::key::ArchiveKey;
use crate::layout;
use maud::{Markup, PreEscaped};
use pulldown_cmark::{Options, Parser, html as md_html};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Base name of template files inside an archive directory.
pub const TEMPLATE_STEM: &str = "mail";

/// Template extensions in lookup priority order.
const TEMPLATE_EXTENSIONS: &[&str] = &["md", "html", "json"];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported template format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("template {path} could not be loaded: {message}")]
    InvalidModule { path: PathBuf, message: String },
    #[error("Default export is not a valid component")]
    NotAComponent,
    #[error("invalid front matter: {0}")]
    FrontMatter(String),
    #[error("{0}")]
    Construction(String),
}

/// A complete, self-contained HTML document produced by a component.
#[derive(Debug, Clone)]
pub struct Document(Markup);

impl Document {
    pub fn new(markup: Markup) -> Self {
        Self(markup)
    }

    pub fn into_markup(self) -> Markup {
        self.0
    }
}

/// Author-supplied rendering logic: invoked with no arguments, builds a document.
pub trait Component: Send + Sync {
    fn build(&self) -> Result<Document, TemplateError>;
}

impl<F> Component for F
where
    F: Fn() -> Result<Document, TemplateError> + Send + Sync,
{
    fn build(&self) -> Result<Document, TemplateError> {
        self()
    }
}

/// What a loaded template module exposes.
pub enum Export {
    Component(Box<dyn Component>),
    /// Data rather than rendering logic; rendering it is an error.
    Value(serde_json::Value),
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component(_) => f.write_str("Export::Component(..)"),
            Self::Value(v) => f.debug_tuple("Export::Value").field(v).finish(),
        }
    }
}

/// Resolve and load per-archive rendering logic.
pub trait TemplateSource {
    type Handle: fmt::Display;

    /// Locate the template for `key`. No template is a [`TemplateError::NotFound`].
    fn resolve(&self, key: &ArchiveKey) -> Result<Self::Handle, TemplateError>;

    /// Load a resolved handle into its export.
    fn load(&self, handle: &Self::Handle) -> Result<Export, TemplateError>;
}

// =============================================================================
// Filesystem source
// =============================================================================

/// Loads `mail.<ext>` from `<root>/YYYY/MM/DD-slug/`.
#[derive(Debug, Clone)]
pub struct FsTemplateSource {
    root: PathBuf,
    layout: LayoutConfig,
}

/// A resolved template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePath(pub PathBuf);

impl fmt::Display for TemplatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl FsTemplateSource {
    pub fn new(root: impl Into<PathBuf>, layout: LayoutConfig) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }
}

impl TemplateSource for FsTemplateSource {
    type Handle = TemplatePath;

    fn resolve(&self, key: &ArchiveKey) -> Result<TemplatePath, TemplateError> {
        let dir = key.dir_in(&self.root);
        for ext in TEMPLATE_EXTENSIONS {
            let candidate = dir.join(format!("{TEMPLATE_STEM}.{ext}"));
            if candidate.is_file() {
                return Ok(TemplatePath(candidate));
            }
        }
        if let Some(other) = find_other_template(&dir) {
            return Err(TemplateError::UnsupportedFormat(other));
        }
        Err(TemplateError::NotFound(dir.join(format!("{TEMPLATE_STEM}.md"))))
    }

    fn load(&self, handle: &TemplatePath) -> Result<Export, TemplateError> {
        let path = &handle.0;
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let format = match ext.as_str() {
            "md" => TextFormat::Markdown,
            "html" => TextFormat::Html,
            "json" => {
                let value = serde_json::from_str(&source).map_err(|e| {
                    TemplateError::InvalidModule {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                })?;
                return Ok(Export::Value(value));
            }
            _ => return Err(TemplateError::UnsupportedFormat(path.clone())),
        };

        Ok(Export::Component(Box::new(TextTemplate {
            source,
            format,
            layout: self.layout.clone(),
        })))
    }
}

/// A `mail.*` file whose extension is not one we load, if any.
fn find_other_template(dir: &Path) -> Option<PathBuf> {
    let mut others: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_stem().is_some_and(|s| s == TEMPLATE_STEM)
                && p.extension().is_some()
        })
        .collect();
    others.sort();
    others.into_iter().next()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextFormat {
    Markdown,
    Html,
}

/// A markdown or HTML template file, built on invocation.
struct TextTemplate {
    source: String,
    format: TextFormat,
    layout: LayoutConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FrontMatter {
    preview_text: Option<String>,
    layout: LayoutKind,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LayoutKind {
    #[default]
    Email,
    None,
}

impl Component for TextTemplate {
    fn build(&self) -> Result<Document, TemplateError> {
        let (front, body) = split_front_matter(&self.source)?;

        if self.format == TextFormat::Html && is_full_document(body) {
            if front.is_some() {
                return Err(TemplateError::FrontMatter(
                    "a complete HTML document cannot take front matter".to_string(),
                ));
            }
            return Ok(Document::new(PreEscaped(body.to_string())));
        }
        let front = front.unwrap_or_default();

        let body = match self.format {
            TextFormat::Markdown => markdown_to_html(body),
            TextFormat::Html => PreEscaped(body.to_string()),
        };
        let preview = front.preview_text.as_deref();
        let markup = match front.layout {
            LayoutKind::Email => layout::email_document(&self.layout, preview, body),
            LayoutKind::None => layout::bare_document(preview, body),
        };
        Ok(Document::new(markup))
    }
}

/// Split `+++`-fenced TOML front matter, if any, from the body.
fn split_front_matter(source: &str) -> Result<(Option<FrontMatter>, &str), TemplateError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = source
        .strip_prefix("+++\n")
        .or_else(|| source.strip_prefix("+++\r\n"))
    else {
        return Ok((None, source));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "+++" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let front: FrontMatter =
                toml::from_str(header).map_err(|e| TemplateError::FrontMatter(e.to_string()))?;
            return Ok((Some(front), body));
        }
        offset += line.len();
    }
    Err(TemplateError::FrontMatter(
        "missing closing +++ fence".to_string(),
    ))
}

fn is_full_document(body: &str) -> bool {
    let head = body.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn markdown_to_html(markdown: &str) -> Markup {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    PreEscaped(out)
}

// =============================================================================
// In-memory registry
// =============================================================================

/// Templates registered from Rust code, keyed by archive.
#[derive(Default)]
pub struct TemplateRegistry {
    entries: HashMap<ArchiveKey, RegistryEntry>,
}

enum RegistryEntry {
    Component(Arc<dyn Component>),
    Value(serde_json::Value),
}

/// Handle into a [`TemplateRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryHandle(ArchiveKey);

impl fmt::Display for RegistryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry:{}", self.0)
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component for `key`, replacing any previous entry.
    pub fn register<F>(&mut self, key: ArchiveKey, component: F)
    where
        F: Fn() -> Result<Document, TemplateError> + Send + Sync + 'static,
    {
        self.entries
            .insert(key, RegistryEntry::Component(Arc::new(component)));
    }

    /// Register a non-component export for `key`.
    pub fn register_value(&mut self, key: ArchiveKey, value: serde_json::Value) {
        self.entries.insert(key, RegistryEntry::Value(value));
    }
}

/// Adapter so a shared registry component can be boxed as an [`Export`].
struct Shared(Arc<dyn Component>);

impl Component for Shared {
    fn build(&self) -> Result<Document, TemplateError> {
        self.0.build()
    }
}

impl TemplateSource for TemplateRegistry {
    type Handle = RegistryHandle;

    fn resolve(&self, key: &ArchiveKey) -> Result<RegistryHandle, TemplateError> {
        if self.entries.contains_key(key) {
            Ok(RegistryHandle(key.clone()))
        } else {
            Err(TemplateError::NotFound(PathBuf::from(format!(
                "registry:{key}"
            ))))
        }
    }

    fn load(&self, handle: &RegistryHandle) -> Result<Export, TemplateError> {
        match self.entries.get(&handle.0) {
            Some(RegistryEntry::Component(c)) => Ok(Export::Component(Box::new(Shared(c.clone())))),
            Some(RegistryEntry::Value(v)) => Ok(Export::Value(v.clone())),
            None => Err(TemplateError::NotFound(PathBuf::from(handle.to_string()))),
        }
    }
}
