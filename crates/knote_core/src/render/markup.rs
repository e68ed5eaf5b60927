//! Note markup renderer.
//!
//! # Responsibility
//! - Render CommonMark note text (paragraphs, emphasis, links, images, code)
//!   into HTML.
//! - Neutralize user-supplied HTML and script-capable URLs.
//!
//! # Invariants
//! - Rendering is pure and deterministic.
//! - Raw HTML in the input is emitted as escaped text, never as markup.
//! - Output for blank input is the empty string.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "file:"];
const ALLOWED_IMAGE_DATA_PREFIXES: &[&str] = &[
    "data:image/png",
    "data:image/jpeg",
    "data:image/gif",
    "data:image/webp",
];

/// Renders raw note text into sanitized HTML.
///
/// Leading and trailing whitespace is trimmed before parsing.
pub fn render_markup(raw: &str) -> String {
    let source = raw.trim();
    if source.is_empty() {
        return String::new();
    }

    let events = Parser::new_ext(source, Options::empty()).map(sanitize_event);
    let mut output = String::with_capacity(source.len() + source.len() / 2);
    html::push_html(&mut output, events);
    output
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_destination(dest_url, false),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_destination(dest_url, true),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_destination(dest_url: CowStr<'_>, is_image: bool) -> CowStr<'_> {
    // Browsers skip embedded whitespace/control characters when parsing a
    // scheme, so `java\tscript:` must be caught too.
    let normalized: String = dest_url
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace() && !ch.is_control())
        .take(32)
        .collect::<String>()
        .to_ascii_lowercase();

    let blocked = BLOCKED_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
        || (normalized.starts_with("data:")
            && !(is_image
                && ALLOWED_IMAGE_DATA_PREFIXES
                    .iter()
                    .any(|prefix| normalized.starts_with(prefix))));

    if blocked {
        CowStr::Borrowed("")
    } else {
        dest_url
    }
}

#[cfg(test)]
mod tests {
    use super::render_markup;

    #[test]
    fn blank_input_renders_empty() {
        assert_eq!(render_markup(""), "");
        assert_eq!(render_markup("  \n\t "), "");
    }

    #[test]
    fn plain_text_becomes_paragraph() {
        assert_eq!(render_markup("hello"), "<p>hello</p>\n");
    }

    #[test]
    fn image_syntax_renders_img_element() {
        let html = render_markup("![](x.png)");
        assert!(html.contains("<img src=\"x.png\""), "got {html}");
    }

    #[test]
    fn paragraphs_are_split_on_blank_lines() {
        let html = render_markup("first\n\nsecond");
        assert_eq!(html, "<p>first</p>\n<p>second</p>\n");
    }

    #[test]
    fn rendering_is_deterministic() {
        let source = "my cat ![](/img/a.jpg)\n\n**bold** and `code`";
        assert_eq!(render_markup(source), render_markup(source));
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = render_markup("hi <script>alert(1)</script>");
        assert!(!html.contains("<script>"), "got {html}");
        assert!(html.contains("&lt;script&gt;"), "got {html}");

        let block = render_markup("<div onclick=\"x()\">boom</div>");
        assert!(!block.contains("<div"), "got {block}");
    }

    #[test]
    fn script_urls_are_dropped() {
        let link = render_markup("[click](javascript:alert(1))");
        assert!(!link.contains("javascript"), "got {link}");

        let image = render_markup("![x](JavaScript:alert(1))");
        assert!(!image.to_ascii_lowercase().contains("javascript"), "got {image}");
    }

    #[test]
    fn image_data_urls_are_kept_but_link_data_urls_are_not() {
        let image = render_markup("![](data:image/png;base64,AAAA)");
        assert!(image.contains("data:image/png;base64,AAAA"), "got {image}");

        let link = render_markup("[x](data:text/html;base64,AAAA)");
        assert!(!link.contains("data:text/html"), "got {link}");
    }
}
