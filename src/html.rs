//! Narrow HTML queries
//!
//! The pipeline only ever needs a few things out of a page: the anchors
//! (href + text), the first image source, and the named `<input>` values.
//! Each query selects one tag type and reads specific attributes; callers
//! get plain strings back and decide what they mean.

use std::sync::LazyLock;

use scraper::{Html, Selector};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("static selector"));
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));
static INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input").expect("static selector"));

/// An `<a>` element reduced to what the resolver reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: Option<String>,
    /// Text content, whitespace-trimmed.
    pub text: String,
}

/// All anchors in document order.
#[must_use]
pub fn anchors(markup: &str) -> Vec<Anchor> {
    let document = Html::parse_fragment(markup);
    document
        .select(&ANCHOR)
        .map(|a| Anchor {
            href: a
                .value()
                .attr("href")
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string),
            text: a.text().collect::<String>().trim().to_string(),
        })
        .collect()
}

/// `href` of the first anchor in the page, if it has one.
///
/// Only the first `<a>` is considered: gate pages either show the single
/// onward link or none at all.
#[must_use]
pub fn first_anchor_href(markup: &str) -> Option<String> {
    anchors(markup).into_iter().next().and_then(|a| a.href)
}

/// `src` of the first `<img>` in the page.
#[must_use]
pub fn first_image_src(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    document
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

/// Every named `<input>` in the page, in document order, regardless of
/// which form it belongs to. Inputs without a `value` map to `""`.
#[must_use]
pub fn input_fields(markup: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(markup);
    let mut fields: Vec<(String, String)> = Vec::new();
    for input in document.select(&INPUT) {
        let Some(name) = input.value().attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let value = input.value().attr("value").unwrap_or("").to_string();
        match fields.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value,
            None => fields.push((name.to_string(), value)),
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_keep_order_and_text() {
        let html = r#"<a href="https://clicka.test/d/1" target="_blank">DeltaBit</a> |
            <a href=" https://clicka.test/m/2 ">  MixDrop </a> <a>bare</a>"#;
        let found = anchors(html);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].href.as_deref(), Some("https://clicka.test/d/1"));
        assert_eq!(found[0].text, "DeltaBit");
        assert_eq!(found[1].href.as_deref(), Some("https://clicka.test/m/2"));
        assert_eq!(found[1].text, "MixDrop");
        assert_eq!(found[2].href, None);
    }

    #[test]
    fn first_anchor_only() {
        let html = r#"<p>ok</p><a href="https://deltabit.test/abc">Proceed</a><a href="/other">x</a>"#;
        assert_eq!(
            first_anchor_href(html).as_deref(),
            Some("https://deltabit.test/abc")
        );
        assert_eq!(first_anchor_href("<p>no links</p>"), None);
        assert_eq!(first_anchor_href("<a>no href</a><a href=\"/x\">x</a>"), None);
    }

    #[test]
    fn first_image_src_reads_data_uri() {
        let html = r#"<form><img src="data:image/png;base64,iVBORw0KGgo="><input name="captch4"></form>"#;
        assert_eq!(
            first_image_src(html).as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
        assert_eq!(first_image_src("<img alt=\"none\">"), None);
    }

    #[test]
    fn input_fields_collects_named_inputs() {
        let html = r#"
            <form method="POST">
                <input type="hidden" name="op" value="download1">
                <input type="hidden" name="id" value="fgeki2456ab1">
                <input type="hidden" name="fname" value="Show.S04E05.ITA.mp4">
                <input type="submit" value="Continue">
            </form>
            <input type="hidden" name="op" value="download2">
        "#;
        let fields = input_fields(html);
        assert_eq!(
            fields,
            vec![
                ("op".to_string(), "download2".to_string()),
                ("id".to_string(), "fgeki2456ab1".to_string()),
                ("fname".to_string(), "Show.S04E05.ITA.mp4".to_string()),
            ]
        );
    }
}
