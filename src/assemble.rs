//! Document assembler – wraps a rendered HTML fragment in a complete,
//! self-contained HTML document.
//!
//! The produced document references no external resources: the full utility
//! CSS is inlined in a single `<style>` block, and any images must already
//! be embedded as data URIs by the template that produced the fragment.

use crate::render::escape_html;

/// Build a minimal valid HTML document around `fragment`.
pub fn assemble(fragment: &str, css: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
{css}
</style>
</head>
<body>
{fragment}
</body>
</html>
"#,
        title = escape_html(title),
        css = css,
        fragment = fragment,
    )
}
