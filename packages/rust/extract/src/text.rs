//! Boilerplate-stripped text extraction from parsed HTML.
//!
//! Produces the plain text that gets chunked and embedded: headings first
//! (H1–H3, each prefixed with its level), then paragraphs, then list items
//! with a bullet marker, joined by blank lines. Script/style/chrome subtrees
//! contribute nothing.

use scraper::{ElementRef, Html, Selector};

/// Tags whose subtrees never contribute text.
const EXCLUDED_TAGS: [&str; 8] = [
    "script", "style", "noscript", "svg", "iframe", "nav", "header", "footer",
];

/// Extract ordered readable text from a document.
///
/// Returns an empty string when the page has no extractable content.
pub fn extract_text(doc: &Html) -> String {
    let mut parts: Vec<String> = Vec::new();

    for (selector, prefix) in [("h1", "H1: "), ("h2", "H2: "), ("h3", "H3: ")] {
        collect_parts(doc, selector, prefix, &mut parts);
    }
    collect_parts(doc, "p", "", &mut parts);
    collect_parts(doc, "li", "\u{2022} ", &mut parts);

    parts.join("\n\n").trim().to_string()
}

/// Extract the `<title>` text, if any.
pub fn extract_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").expect("title selector");
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Whether a `<meta name="robots">` tag declares `noindex`.
pub fn has_noindex(doc: &Html) -> bool {
    let sel = Selector::parse("meta").expect("meta selector");
    doc.select(&sel).any(|el| {
        let name = el.value().attr("name").unwrap_or_default();
        if !name.eq_ignore_ascii_case("robots") {
            return false;
        }
        el.value()
            .attr("content")
            .unwrap_or_default()
            .to_lowercase()
            .contains("noindex")
    })
}

fn collect_parts(doc: &Html, selector: &str, prefix: &str, parts: &mut Vec<String>) {
    let sel = Selector::parse(selector).expect("valid selector");
    for el in doc.select(&sel) {
        if in_excluded_subtree(el) {
            continue;
        }
        let text = element_text(el);
        let text = text.trim();
        if !text.is_empty() {
            parts.push(format!("{prefix}{text}"));
        }
    }
}

/// Whether any ancestor is one of the excluded tags.
fn in_excluded_subtree(el: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| EXCLUDED_TAGS.contains(&a.value().name()))
}

/// Descendant text of an element, skipping excluded subtrees.
fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !EXCLUDED_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn heading_paragraph_list_order() {
        let doc = parse(
            r#"<html><body>
                <p>A paragraph.</p>
                <h1>Main Title</h1>
                <ul><li>First item</li><li>Second item</li></ul>
                <h2>Section</h2>
            </body></html>"#,
        );

        let text = extract_text(&doc);
        let parts: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(
            parts,
            vec![
                "H1: Main Title",
                "H2: Section",
                "A paragraph.",
                "\u{2022} First item",
                "\u{2022} Second item",
            ]
        );
    }

    #[test]
    fn chrome_subtrees_excluded() {
        let doc = parse(
            r#"<html><body>
                <nav><p>Navigation link text</p></nav>
                <header><h1>Site Banner</h1></header>
                <p>Real content.</p>
                <footer><p>Copyright notice</p></footer>
                <script>var x = "should not appear";</script>
            </body></html>"#,
        );

        let text = extract_text(&doc);
        assert_eq!(text, "Real content.");
    }

    #[test]
    fn script_inside_paragraph_skipped() {
        let doc = parse("<p>Before<script>alert(1)</script>After</p>");
        assert_eq!(extract_text(&doc), "BeforeAfter");
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        let doc = parse("<p>Unclosed <div><h1>Still <b>works");
        let text = extract_text(&doc);
        assert!(text.contains("H1: Still works"));
    }

    #[test]
    fn empty_page_yields_empty_text() {
        let doc = parse("<html><body><div>only a div, no p/h/li</div></body></html>");
        assert_eq!(extract_text(&doc), "");
    }

    #[test]
    fn title_extraction() {
        let doc = parse("<html><head><title>  My Page </title></head><body></body></html>");
        assert_eq!(extract_title(&doc).as_deref(), Some("My Page"));

        let doc = parse("<html><head></head><body></body></html>");
        assert!(extract_title(&doc).is_none());
    }

    #[test]
    fn noindex_detection() {
        let doc = parse(r#"<html><head><meta name="robots" content="noindex, nofollow"></head></html>"#);
        assert!(has_noindex(&doc));

        let doc = parse(r#"<html><head><meta name="ROBOTS" content="NOINDEX"></head></html>"#);
        assert!(has_noindex(&doc));

        let doc = parse(r#"<html><head><meta name="robots" content="index, follow"></head></html>"#);
        assert!(!has_noindex(&doc));

        let doc = parse(r#"<html><head><meta name="viewport" content="noindex"></head></html>"#);
        assert!(!has_noindex(&doc));
    }
}
