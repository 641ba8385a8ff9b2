// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rich-text sanitization applied to note content before it is stored.
//!
//! Editor output is HTML. Only formatting tags from [`ALLOWED_TAGS`] survive;
//! every attribute is dropped except `href` on `<a>` with an http, https or
//! mailto target. The bodies of `<script>`, `<style>` and similar raw-text
//! elements are removed entirely. Text keeps its entities; every `<` and `>`
//! that is not part of an allowed tag is escaped, including those inside
//! malformed tags.

/// Formatting tags the editor toolbar can produce.
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "h4", "hr", "i", "li",
    "ol", "p", "pre", "s", "span", "strike", "strong", "sub", "sup", "u", "ul",
];

/// Elements whose content is dropped along with the tags.
const DROP_CONTENT_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea",
];

const VOID_TAGS: &[&str] = &["br", "hr"];

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape angle brackets only. Text runs keep their existing entities.
fn escape_angle_brackets(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

struct Tag<'a> {
    name: String,
    closing: bool,
    attrs: &'a str,
}

/// Parse the inside of `<...>`. Returns `None` for comments, doctypes and
/// anything that does not look like an element tag.
fn parse_tag(inner: &str) -> Option<Tag<'_>> {
    let (closing, rest) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let rest = rest.trim_end_matches('/').trim_end();
    let name_end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let name = &rest[..name_end];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(Tag {
        name: name.to_ascii_lowercase(),
        closing,
        attrs: &rest[name_end..],
    })
}

/// Extract the value of `href` from an attribute string.
fn find_href(attrs: &str) -> Option<String> {
    let mut rest = attrs;
    while let Some(pos) = rest.to_ascii_lowercase().find("href") {
        let before_ok = pos == 0
            || rest[..pos]
                .chars()
                .last()
                .map(|c| c.is_whitespace())
                .unwrap_or(true);
        let after = rest[pos + 4..].trim_start();
        if before_ok {
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let parsed = match value.chars().next() {
                    Some(q @ ('"' | '\'')) => value[1..].split(q).next().map(str::to_string),
                    Some(_) => value
                        .split(|c: char| c.is_whitespace())
                        .next()
                        .map(str::to_string),
                    None => None,
                };
                return parsed;
            }
        }
        rest = &rest[pos + 4..];
    }
    None
}

fn is_safe_href(href: &str) -> bool {
    let lower: String = href
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
}

/// Sanitize editor HTML against the allow-list.
pub fn sanitize_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    // Name of the raw-text element we are skipping, if any.
    let mut skipping: Option<String> = None;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            if skipping.is_none() {
                out.push_str(&escape_angle_brackets(rest));
            }
            break;
        };

        if skipping.is_none() {
            out.push_str(&escape_angle_brackets(&rest[..lt]));
        }
        let after_lt = &rest[lt + 1..];

        if let Some(comment) = after_lt.strip_prefix("!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }

        let Some(gt) = after_lt.find('>') else {
            if skipping.is_none() {
                out.push_str(&escape_html(&rest[lt..]));
            }
            break;
        };
        let inner = &after_lt[..gt];
        rest = &after_lt[gt + 1..];

        let Some(tag) = parse_tag(inner) else {
            if skipping.is_none() && !inner.starts_with('!') && !inner.starts_with('?') {
                out.push_str("&lt;");
                out.push_str(&escape_angle_brackets(inner));
                out.push_str("&gt;");
            }
            continue;
        };

        if let Some(name) = &skipping {
            if tag.closing && &tag.name == name {
                skipping = None;
            }
            continue;
        }

        if DROP_CONTENT_TAGS.contains(&tag.name.as_str()) {
            if !tag.closing {
                skipping = Some(tag.name);
            }
            continue;
        }

        if !ALLOWED_TAGS.contains(&tag.name.as_str()) {
            continue;
        }

        if tag.closing {
            if !VOID_TAGS.contains(&tag.name.as_str()) {
                out.push_str("</");
                out.push_str(&tag.name);
                out.push('>');
            }
            continue;
        }

        out.push('<');
        out.push_str(&tag.name);
        if tag.name == "a" {
            if let Some(href) = find_href(tag.attrs).filter(|h| is_safe_href(h)) {
                out.push_str(" href=\"");
                out.push_str(&escape_html(&href));
                out.push_str("\" rel=\"noopener noreferrer\"");
            }
        }
        out.push('>');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_formatting() {
        let html = "<h1>Plan</h1><p>Some <b>bold</b> and <em>em</em><br></p><ul><li>one</li></ul>";
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_strips_script_with_body() {
        let html = "<p>hi</p><script>alert('x')</script><p>there</p>";
        assert_eq!(sanitize_html(html), "<p>hi</p><p>there</p>");
    }

    #[test]
    fn test_strips_event_handlers_and_styles() {
        let html = r#"<p onclick="steal()" style="color:red">text</p><img src=x onerror=alert(1)>"#;
        assert_eq!(sanitize_html(html), "<p>text</p>");
    }

    #[test]
    fn test_link_href_allow_list() {
        assert_eq!(
            sanitize_html(r#"<a href="https://example.com" target="_blank">x</a>"#),
            r#"<a href="https://example.com" rel="noopener noreferrer">x</a>"#
        );
        assert_eq!(
            sanitize_html(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href=" jav&#x09;ascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
    }

    #[test]
    fn test_unknown_tags_dropped_text_kept() {
        assert_eq!(
            sanitize_html("<font color=red>warm</font> <!-- note -->day"),
            "warm day"
        );
    }

    #[test]
    fn test_stray_angle_brackets_escaped() {
        assert_eq!(sanitize_html("1 < 2 > 0"), "1 &lt; 2 &gt; 0");
    }

    #[test]
    fn test_malformed_tag_cannot_smuggle_element() {
        let out = sanitize_html("<a<img src=x onerror=alert(1) ><p>hi</p>");
        assert_eq!(out, "&lt;a&lt;img src=x onerror=alert(1) &gt;<p>hi</p>");
        assert!(!out.contains("<img"));

        let out = sanitize_html("<<script>alert(1)</script><p>ok</p>");
        assert_eq!(out, "&lt;&lt;script&gt;alert(1)<p>ok</p>");
        assert!(!out.contains("<script"));
    }

    #[test]
    fn test_text_entities_preserved() {
        assert_eq!(
            sanitize_html("<p>Tom &amp; Jerry</p>"),
            "<p>Tom &amp; Jerry</p>"
        );
    }

    #[test]
    fn test_unterminated_script_drops_remainder() {
        assert_eq!(sanitize_html("<p>a</p><script>evil("), "<p>a</p>");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<Tom & "Jerry">"#),
            "&lt;Tom &amp; &quot;Jerry&quot;&gt;"
        );
    }
}
