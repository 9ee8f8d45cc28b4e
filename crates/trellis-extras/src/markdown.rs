#![forbid(unsafe_code)]

//! Markdown to markup conversion for example apps.
//!
//! The output is fed to a binder's `html` attribute, which is a trusted
//! sink: feed it user input only if that input is trusted.

use pulldown_cmark::{Parser, html};

/// Render CommonMark `source` to markup.
#[must_use]
pub fn to_markup(source: &str) -> String {
    let parser = Parser::new(source);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}
