//! # Mail Archive
//!
//! Browse, validate and preview archived email campaigns. Your filesystem is
//! the data source: every campaign lives in a dated directory holding its
//! metadata, its template and its images.
//!
//! # Architecture: Lookup → Render → Rewrite
//!
//! A preview flows through three independent steps:
//!
//! ```text
//! 1. Lookup    YYYY/MM/DD-slug  →  Archive           (config.json → validated metadata)
//! 2. Render    Archive key      →  { html } | { error }  (template → standalone document)
//! 3. Rewrite   html             →  html              (/mail-assets/… → remote URLs)
//! ```
//!
//! Each step is usable on its own. Rendering does not consult metadata and
//! the rewriter does not know where its HTML came from, so each can be
//! tested without the others.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`key`] | `YYYY/MM/DD-slug` archive keys, validation and chronological ordering |
//! | [`metadata`] | The single `config.json` schema: validation with field-attributed diagnostics |
//! | [`repository`] | Archive discovery, listing and lookup over the content root |
//! | [`template`] | Template sources: `mail.md`/`mail.html`/`mail.json` files and an in-memory registry |
//! | [`layout`] | The email layout: table-based wrapper, hidden preview text, footer |
//! | [`render`] | Template invocation with per-archive failure isolation |
//! | [`rewrite`] | `<img src="/mail-assets/…">` → remote asset URL rewriting |
//! | [`preview`] | Lookup, render and rewrite combined into one call |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Directory Is the Identity
//!
//! An archive is identified only by where it lives: year, month and a
//! `DD-slug` directory name. Nothing in `config.json` can rename or move it.
//! Listing order falls out of the key (year, month, day, then slug), so two
//! campaigns on the same day still sort deterministically.
//!
//! ## One Schema
//!
//! [`metadata::MetadataSchema`] is the only definition of valid metadata.
//! The listing, the detail lookup and `check` all validate through it, so an
//! archive that lists is an archive that opens.
//!
//! ## No Caching
//!
//! Every lookup and every render reads the filesystem afresh. Archives are
//! few and edited by hand; stale previews would cost more than the reads.
//!
//! ## Errors as Values at the Render Boundary
//!
//! A template that is missing, exports data instead of a component, returns
//! an error or panics becomes `{ error: message }` for that archive alone.
//! One broken campaign never takes the listing or other previews down.
//!
//! ## Maud for the Layout
//!
//! The email wrapper is generated with [Maud](https://maud.lambda.xyz/):
//! malformed markup is a build error and all interpolation is auto-escaped,
//! which matters when the organization name and preview text come from
//! configuration and front matter.

pub mod config;
pub mod key;
pub mod layout;
pub mod metadata;
pub mod output;
pub mod preview;
pub mod render;
pub mod repository;
pub mod rewrite;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;
