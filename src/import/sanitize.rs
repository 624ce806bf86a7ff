use crate::core::config::ImportConfig;
use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use std::borrow::Cow;

/// Elements removed together with their content
const BLOCKED_ELEMENTS: [&str; 4] = ["script", "style", "object", "embed"];

/// Attributes that carry a URL
const URL_ATTRIBUTES: [&str; 7] = [
    "href",
    "src",
    "xlink:href",
    "action",
    "formaction",
    "background",
    "poster",
];

/// Attributes that make the browser load a resource on display
const RESOURCE_ATTRIBUTES: [&str; 3] = ["src", "background", "poster"];

/// Schemes a link or source may use; anything else is dropped
const SAFE_SCHEMES: [&str; 4] = ["http", "https", "mailto", "tel"];

static BLOCKED_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    BLOCKED_ELEMENTS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("blocked element pattern")
        })
        .collect()
});

/// Leftover opening, closing or self-closing blocked tags
static BLOCKED_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:script|style|object|embed)\b[^>]*>").expect("blocked tag pattern")
});

/// Void elements that fetch resources or change how URLs resolve
static RESOURCE_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(?:link|meta|base)\b[^>]*>").expect("resource tag pattern"));

static IFRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<iframe\b([^>]*)>(?:.*?</iframe\s*>)?").expect("iframe pattern")
});

static OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("tag pattern"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\s+([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#)
        .expect("attribute pattern")
});

/// Sanitized description plus what had to be changed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sanitized {
    pub html: String,
    pub modified: bool,
    pub truncated: bool,
}

/// Cleans imported feature descriptions before they are displayed
#[derive(Debug, Clone)]
pub struct Sanitizer {
    trusted_hosts: Vec<String>,
    max_length: usize,
    placeholder: String,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&ImportConfig::default())
    }
}

impl Sanitizer {
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            trusted_hosts: config
                .trusted_iframe_hosts
                .iter()
                .map(|h| h.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_length: config.max_description_length,
            placeholder: config.truncation_placeholder.clone(),
        }
    }

    pub fn sanitize(&self, html: &str) -> Sanitized {
        let mut out = html.to_string();

        for block in BLOCKED_BLOCKS.iter() {
            out = block.replace_all(&out, "").into_owned();
        }
        out = BLOCKED_TAGS.replace_all(&out, "").into_owned();
        out = RESOURCE_TAGS.replace_all(&out, "").into_owned();

        out = IFRAME
            .replace_all(&out, |caps: &Captures| {
                let attributes = caps.get(1).map_or("", |m| m.as_str());
                match attribute_value(attributes, "src") {
                    Some(src) if self.is_trusted_url(&src) => {
                        self.clean_tag(&caps[0], "iframe", true)
                    }
                    src => {
                        log::debug!("removing iframe with untrusted source {:?}", src);
                        String::new()
                    }
                }
            })
            .into_owned();

        out = OPEN_TAG
            .replace_all(&out, |caps: &Captures| {
                let name = caps[1].to_ascii_lowercase();
                if name == "iframe" {
                    // already vetted above
                    return caps[0].to_string();
                }
                self.clean_tag(&caps[0], &name, false)
            })
            .into_owned();

        let modified = out != html;
        let (html, truncated) = self.truncate(out);
        Sanitized {
            html,
            modified,
            truncated,
        }
    }

    /// Whether an embedded resource may be loaded from `url`
    pub fn is_trusted_url(&self, url: &str) -> bool {
        let url = url.trim();
        let absolute = if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url.to_string()
        };
        let Ok(parsed) = url::Url::parse(&absolute) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.trusted_hosts
            .iter()
            .any(|trusted| host == *trusted || host.ends_with(&format!(".{}", trusted)))
    }

    /// Rewrites one opening tag without handlers, script URLs and foreign sources
    fn clean_tag(&self, tag: &str, name: &str, trusted_src: bool) -> String {
        let Some(open) = OPEN_TAG.captures(tag) else {
            return tag.to_string();
        };
        let attributes = open.get(2).map_or("", |m| m.as_str());
        let self_closing = attributes.trim_end().ends_with('/');

        let mut kept = String::new();
        for caps in ATTRIBUTE.captures_iter(attributes) {
            let key = caps[1].to_ascii_lowercase();
            let value = caps.get(2).map(|m| unquote(m.as_str()));

            if key.starts_with("on") || key == "srcdoc" {
                continue;
            }
            if let Some(value) = value.as_deref() {
                let url_attribute = URL_ATTRIBUTES.contains(&key.as_str());
                if url_attribute && has_unsafe_scheme(value) {
                    continue;
                }
                let trusted = trusted_src && key == "src";
                if RESOURCE_ATTRIBUTES.contains(&key.as_str()) && !trusted && self.is_foreign(value) {
                    log::debug!("dropping external {} {} on <{}>", key, value, name);
                    continue;
                }
                if key == "srcset" && self.srcset_is_foreign(value) {
                    log::debug!("dropping srcset on <{}>", name);
                    continue;
                }
                if key == "style" && style_loads_resources(value) {
                    log::debug!("dropping style with resource references on <{}>", name);
                    continue;
                }
            }
            kept.push_str(&caps[0]);
        }

        let rest = &tag[open.get(0).map_or(0, |m| m.end())..];
        format!(
            "<{}{}{}>{}",
            &open[1],
            kept,
            if self_closing { " /" } else { "" },
            rest
        )
    }

    fn is_foreign(&self, value: &str) -> bool {
        is_external(value) && !self.is_trusted_url(value)
    }

    fn srcset_is_foreign(&self, value: &str) -> bool {
        value
            .split(',')
            .filter_map(|candidate| candidate.split_whitespace().next())
            .any(|url| has_unsafe_scheme(url) || self.is_foreign(url))
    }

    fn truncate(&self, html: String) -> (String, bool) {
        if html.chars().count() <= self.max_length {
            return (html, false);
        }
        let mut truncated: String = html.chars().take(self.max_length).collect();
        truncated.push_str(&self.placeholder);
        (truncated, true)
    }
}

fn attribute_value(attributes: &str, key: &str) -> Option<String> {
    ATTRIBUTE
        .captures_iter(attributes)
        .find(|caps| caps[1].eq_ignore_ascii_case(key))
        .and_then(|caps| caps.get(2).map(|m| unquote(m.as_str())))
}

fn unquote(value: &str) -> String {
    value
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Character references resolved the way a browser reads attribute values.
/// Values that do not decode cleanly are returned as written.
fn decode_entities(value: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape_with(value, |entity| match entity {
        "colon" => Some(":"),
        "tab" => Some("\t"),
        "newline" => Some("\n"),
        _ => None,
    })
    .unwrap_or(Cow::Borrowed(value))
}

/// Entity-decoded, whitespace-free, lowercased form used for scheme checks
fn compact(value: &str) -> String {
    decode_entities(value)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// True unless the URL is relative or uses one of [`SAFE_SCHEMES`].
/// A scheme part still holding a character reference counts as unsafe.
fn has_unsafe_scheme(value: &str) -> bool {
    let compact = compact(value);
    let scheme_part = &compact[..compact.find(['/', '?', '#']).unwrap_or(compact.len())];
    if scheme_part.contains('&') {
        return true;
    }
    match scheme_part.find(':') {
        Some(colon) => !SAFE_SCHEMES.contains(&&scheme_part[..colon]),
        None => false,
    }
}

fn style_loads_resources(value: &str) -> bool {
    let compact = compact(value).replace('\\', "");
    ["url(", "image-set(", "expression(", "@import", "javascript:"]
        .iter()
        .any(|needle| compact.contains(needle))
}

fn is_external(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    lower.starts_with("//") || lower.starts_with("http:") || lower.starts_with("https:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> Sanitizer {
        Sanitizer::default()
    }

    #[test]
    fn test_scripts_and_styles_removed() {
        let result = sanitizer().sanitize(
            "<p>Hello</p><script>alert('x')</script><STYLE type=\"text/css\">p{}</STYLE><embed src=\"a.swf\">",
        );
        assert_eq!(result.html, "<p>Hello</p>");
        assert!(result.modified);
    }

    #[test]
    fn test_event_handlers_and_script_urls_removed() {
        let result = sanitizer().sanitize(
            r#"<a href="javascript:alert(1)" title="t">link</a><img src="marker.png" onerror="steal()">"#,
        );
        assert_eq!(result.html, r#"<a title="t">link</a><img src="marker.png">"#);
    }

    #[test]
    fn test_untrusted_iframe_removed() {
        let html = r#"<iframe src="https://evil.example.com/x"></iframe><p>ok</p>"#;
        assert_eq!(sanitizer().sanitize(html).html, "<p>ok</p>");
    }

    #[test]
    fn test_trusted_iframe_kept() {
        let html = r#"<iframe src="https://map.geo.admin.ch/embed" width="400"></iframe>"#;
        let result = sanitizer().sanitize(html);
        assert_eq!(result.html, html);
        assert!(!result.modified);
    }

    #[test]
    fn test_external_image_source_dropped() {
        let result = sanitizer().sanitize(r#"<img src="https://tracker.example.com/p.gif" alt="x">"#);
        assert_eq!(result.html, r#"<img alt="x">"#);

        let trusted = r#"<img src="https://www.swisstopo.ch/logo.png">"#;
        assert_eq!(sanitizer().sanitize(trusted).html, trusted);
    }

    #[test]
    fn test_entity_encoded_script_urls_removed() {
        let s = sanitizer();
        assert_eq!(
            s.sanitize(r#"<a href="&#106;avascript:alert(1)">x</a>"#).html,
            "<a>x</a>"
        );
        assert_eq!(
            s.sanitize(r#"<a href="java&#x09;script:alert(1)">x</a>"#).html,
            "<a>x</a>"
        );
        assert_eq!(
            s.sanitize(r#"<a href="javascript&colon;alert(1)&x">x</a>"#).html,
            "<a>x</a>"
        );
        assert_eq!(s.sanitize(r#"<a href="data:text/html,hi">x</a>"#).html, "<a>x</a>");
    }

    #[test]
    fn test_regular_links_survive() {
        let html = r#"<a href="https://www.geo.admin.ch/?lang=de&topic=ech">a</a><a href="mailto:info@geo.admin.ch">b</a><a href="legend.html#top">c</a>"#;
        let result = sanitizer().sanitize(html);
        assert_eq!(result.html, html);
        assert!(!result.modified);
    }

    #[test]
    fn test_trusted_iframe_loses_srcdoc() {
        let result = sanitizer().sanitize(
            r#"<iframe src="https://map.geo.admin.ch/" srcdoc="&lt;img src=x onerror=alert(1)&gt;"></iframe>"#,
        );
        assert_eq!(result.html, r#"<iframe src="https://map.geo.admin.ch/"></iframe>"#);
    }

    #[test]
    fn test_external_srcset_dropped() {
        let result = sanitizer()
            .sanitize(r#"<img srcset="https://tracker.example.com/a.png 1x, b.png 2x" alt="x">"#);
        assert_eq!(result.html, r#"<img alt="x">"#);

        let local = r#"<img srcset="a.png 1x, https://www.swisstopo.ch/b.png 2x">"#;
        assert_eq!(sanitizer().sanitize(local).html, local);
    }

    #[test]
    fn test_style_with_url_dropped() {
        let result = sanitizer().sanitize(
            r#"<div style="background:url(https://tracker.example.com/p.gif)" class="c">x</div><p style="color:red">y</p>"#,
        );
        assert_eq!(result.html, r#"<div class="c">x</div><p style="color:red">y</p>"#);
    }

    #[test]
    fn test_resource_elements_removed() {
        let result = sanitizer().sanitize(
            r#"<link rel="stylesheet" href="https://evil.example.com/x.css"><meta http-equiv="refresh" content="0;url=https://evil.example.com"><base href="https://evil.example.com/"><p>ok</p>"#,
        );
        assert_eq!(result.html, "<p>ok</p>");
    }

    #[test]
    fn test_truncation_placeholder() {
        let config = ImportConfig {
            max_description_length: 5,
            ..ImportConfig::default()
        };
        let result = Sanitizer::new(&config).sanitize("abcdefghij");
        assert_eq!(result.html, "abcde[...]");
        assert!(result.truncated);
    }

    #[test]
    fn test_trusted_host_matching() {
        let s = sanitizer();
        assert!(s.is_trusted_url("https://admin.ch/page"));
        assert!(s.is_trusted_url("//www.geo.admin.ch/x"));
        assert!(!s.is_trusted_url("https://notadmin.ch/"));
        assert!(!s.is_trusted_url("https://admin.ch.evil.com/"));
        assert!(!s.is_trusted_url("ftp://admin.ch/"));
    }
}
