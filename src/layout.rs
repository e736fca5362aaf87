//! The shared email wrapper every template body is rendered into.
//!
//! Mail clients ignore most of modern CSS, so the wrapper sticks to what
//! survives everywhere: nested tables for centring and width, inline styles
//! only, no external stylesheets. The preview text (the snippet clients show
//! under the subject) is emitted as a hidden block at the top of the body.
//!
//! The footer carries a copyright line with the current year, so a rendered
//! document depends on when it was rendered. [`email_document_at`] takes the
//! year explicitly for callers that need stable output.

use crate::config::LayoutConfig;
use chrono::Datelike;
use maud::{DOCTYPE, Markup, html};

const FONT_STACK: &str = r#"-apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif"#;

/// Wrap `body` in the email layout, stamped with the current year.
pub fn email_document(layout: &LayoutConfig, preview_text: Option<&str>, body: Markup) -> Markup {
    email_document_at(layout, preview_text, body, chrono::Local::now().year())
}

/// Wrap `body` in the email layout with an explicit copyright year.
pub fn email_document_at(
    layout: &LayoutConfig,
    preview_text: Option<&str>,
    body: Markup,
    year: i32,
) -> Markup {
    let bg = &layout.background;
    let width = layout.content_width;
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
            }
            body style={ "margin:0;padding:0;background-color:" (bg) ";font-family:" (FONT_STACK) ";" } {
                @if let Some(text) = preview_text.filter(|t| !t.is_empty()) {
                    div style="display:none;max-height:0;overflow:hidden;" { (text) }
                }
                table width="100%" cellpadding="0" cellspacing="0"
                    style={ "margin:0;padding:0;background-color:" (bg) ";" } {
                    tr {
                        td align="center" style="padding:40px 0;" {
                            table width=(width) cellpadding="0" cellspacing="0"
                                style={ "max-width:" (width) "px;background-color:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 2px 8px rgba(0, 0, 0, 0.05);" } {
                                tr {
                                    td style="padding:40px;" { (body) }
                                }
                            }
                            (footer(layout, year))
                        }
                    }
                }
            }
        }
    }
}

/// Minimal document shell for templates that opt out of the email layout.
pub fn bare_document(preview_text: Option<&str>, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
            }
            body {
                @if let Some(text) = preview_text.filter(|t| !t.is_empty()) {
                    div style="display:none;max-height:0;overflow:hidden;" { (text) }
                }
                (body)
            }
        }
    }
}

fn footer(layout: &LayoutConfig, year: i32) -> Markup {
    let width = layout.content_width;
    html! {
        table width=(width) cellpadding="0" cellspacing="0"
            style={ "max-width:" (width) "px;margin-top:20px;" } {
            tr {
                td align="center" style="font-size:12px;color:#8898aa;line-height:16px;" {
                    p style="margin:0 0 8px 0;" { "This email was sent by " (layout.organization) }
                    p style="margin:0;" { "© " (year) " " (copyright_holder(&layout.organization)) " All rights reserved." }
                }
            }
        }
    }
}

/// Organization name closed with exactly one period.
fn copyright_holder(organization: &str) -> String {
    let name = organization.trim_end();
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}
