//! Raw link extraction from page markup.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Collect the `href` values of all anchor elements, de-duplicated, in
/// document order.
///
/// Values are returned verbatim: resolving and filtering them is the caller's
/// job. Broken markup is repaired by the HTML5 parser, so this never fails;
/// empty markup simply yields no links.
pub fn extract_links(html: &str) -> Vec<String> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect()
}
