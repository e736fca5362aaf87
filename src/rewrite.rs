//! Rewrites local image paths in rendered HTML to remote asset URLs.
//!
//! Templates reference images through a fixed local prefix so they preview
//! correctly in development:
//!
//! ```html
//! <img src="/mail-assets/logo.png" alt="Logo">
//! ```
//!
//! When a remote base URL is configured, each such reference becomes an
//! absolute URL scoped to the archive:
//!
//! ```html
//! <img src="https://cdn.example.com/archives/2024/12/28-launch/assets/logo.png" alt="Logo">
//! ```
//!
//! Only the `src` attribute of `<img>` tags is touched. Matching is a single
//! attribute-anchored pattern that walks the tag one whole attribute at a
//! time. Attributes are separated by whitespace or `/`, and a quoted value
//! may be followed directly by the next attribute (`alt="x"src=...`), as HTML
//! tokenizers allow. `data-src`, `srcset`, link hrefs, other attribute values
//! and text content that happen to contain the prefix are left alone.
//! Everything outside the rewritten attribute value is preserved byte for
//! byte.

use crate::key::ArchiveKey;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Local path prefix templates use for archive images.
pub const LOCAL_ASSET_PREFIX: &str = "/mail-assets/";

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    // <img and a separator, then whole attributes up to a `src` attribute whose
    // value starts with the local prefix. Each attribute consumes its trailing
    // separator; only a quoted value may be followed by nothing.
    let prefix = regex::escape(LOCAL_ASSET_PREFIX);
    let attribute = r#"[^\s"'=<>/]+(?:\s*=\s*(?:"[^"]*"[\s/]*|'[^']*'[\s/]*|[^\s"'=<>`]+[\s/]+)|[\s/]+)"#;
    Regex::new(&format!(
        r#"(?i)(<img[\s/]+(?:{attribute})*?src\s*=\s*)(?:"{prefix}([^"<>]+)"|'{prefix}([^'<>]+)')"#
    ))
    .expect("img src pattern is a valid regex")
});

/// Rewrite `/mail-assets/...` image sources to `{base}/archives/{key}/assets/...`.
///
/// Returns the input unchanged (borrowed) when `remote_base_url` is `None` or
/// empty, or when nothing matches.
pub fn rewrite_asset_paths<'a>(
    html: &'a str,
    remote_base_url: Option<&str>,
    key: &ArchiveKey,
) -> Cow<'a, str> {
    let Some(base) = remote_base_url
        .map(|b| b.trim_end_matches('/'))
        .filter(|b| !b.is_empty())
    else {
        return Cow::Borrowed(html);
    };

    let archive_base = format!("{base}/archives/{}/assets/", key.relative_path());

    IMG_SRC.replace_all(html, |caps: &Captures| {
        let (quote, filename) = match (caps.get(2), caps.get(3)) {
            (Some(name), _) => ('"', name.as_str()),
            (None, Some(name)) => ('\'', name.as_str()),
            (None, None) => unreachable!("one alternative always matches"),
        };
        format!("{}{quote}{archive_base}{filename}{quote}", &caps[1])
    })
}
