//! Markup repair for OpenGrok result pages
//!
//! OpenGrok serves pages that claim to be XHTML but are not always well-formed XML.
//! This module applies a fixed, ordered list of textual repairs for the known
//! defects, checks that the outcome is well-formed, and only then parses it into a
//! document tree. It is not a general purpose HTML cleaner.
//!
//! # Repairs, in order
//!
//! | Defect | Repair |
//! |--------|--------|
//! | `<meta ...>` without closing tag | removed |
//! | "no results" page leaves the results div open before the footer | closed |
//! | pager glyph `&lt;&lt` running into the next tag | `&lt<` becomes `&lt;<` |
//! | `<a href=foo>` | `<a href="foo">` |
//! | `&`, `<`, `>` unescaped in an href | escaped |
//! | literal spaces in an href | `%20` |
//! | whitespace before the XML prolog | trimmed |

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use regex::{Captures, Regex};
use scraper::Html;

static META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<meta[^>]*>").unwrap());

static UNCLOSED_RESULTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"</ul>\s*<div id="footer">"#).unwrap());

static UNQUOTED_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a href=([^"'][^>]*)>"#).unwrap());

static QUOTED_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a href=("[^"]*"|'[^']*')>"#).unwrap());

/// One known defect of OpenGrok markup and its fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Remove `<meta>` tags, which are never closed
    StripMeta,
    /// Close the results div that "no results" pages leave open before the footer
    CloseResultsDiv,
    /// Terminate the unterminated `&lt` of the pager glyph: `&lt<` becomes `&lt;<`
    PagerGlyph,
    /// Put quotes around unquoted href values
    QuoteHref,
    /// Escape `&`, `<` and `>` in href values that are not already escaped
    EscapeHref,
    /// Percent-encode literal spaces in href values
    EncodeHrefSpaces,
    /// Drop whitespace before the XML prolog and after the document
    Trim,
}

impl Repair {
    /// All repairs, in the order they are applied
    pub const ALL: [Repair; 7] = [
        Repair::StripMeta,
        Repair::CloseResultsDiv,
        Repair::PagerGlyph,
        Repair::QuoteHref,
        Repair::EscapeHref,
        Repair::EncodeHrefSpaces,
        Repair::Trim,
    ];

    /// Applies this repair to the page text
    pub fn apply(&self, s: &str) -> String {
        match self {
            Self::StripMeta => META_TAG.replace_all(s, "").into_owned(),
            Self::CloseResultsDiv => UNCLOSED_RESULTS
                .replace_all(s, r#"</ul></div><div id="footer">"#)
                .into_owned(),
            Self::PagerGlyph => s.replace("&lt<", "&lt;<"),
            Self::QuoteHref => UNQUOTED_HREF.replace_all(s, r#"<a href="$1">"#).into_owned(),
            Self::EscapeHref => replace_href_values(s, escape_href_value),
            Self::EncodeHrefSpaces => replace_href_values(s, |value| value.replace(' ', "%20")),
            Self::Trim => s.trim().to_string(),
        }
    }
}

/// Rewrites every quoted href value, quotes included
fn replace_href_values(s: &str, fix: impl Fn(&str) -> String) -> String {
    QUOTED_HREF
        .replace_all(s, |caps: &Captures| format!("<a href={}>", fix(&caps[1])))
        .into_owned()
}

/// If the first `&` in the value is not followed by a `;` within four characters it is
/// taken to be a bare ampersand, and then every `&`, `<` and `>` in the value gets
/// escaped.
fn escape_href_value(value: &str) -> String {
    let bare = match value.find('&') {
        Some(amp) => value[amp..].find(';').map_or(true, |semi| semi > 4),
        None => false,
    };

    if bare {
        value
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    } else {
        value.to_string()
    }
}

/// Applies all repairs to the raw page text
pub fn repair(input: &str) -> String {
    Repair::ALL
        .iter()
        .fold(input.to_string(), |text, repair| repair.apply(&text))
}

/// Decodes a response body
///
/// UTF-8 is assumed unless `charset` names ISO-8859-1 or US-ASCII. Other charsets
/// are decoded as UTF-8 as well, with invalid sequences replaced.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> String {
    let charset = charset.map(|c| c.trim().trim_matches('"').to_ascii_lowercase());

    match charset.as_deref() {
        None | Some("utf-8") | Some("utf8") => String::from_utf8_lossy(bytes).into_owned(),
        Some("iso-8859-1") | Some("latin1") | Some("latin-1") | Some("us-ascii") => {
            bytes.iter().map(|&b| b as char).collect()
        }
        Some(other) => {
            tracing::warn!("Unsupported charset '{}', decoding as UTF-8", other);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

// Elements HTML parsers never expect a closing tag for
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

fn is_void(name: &[u8]) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.as_bytes().eq_ignore_ascii_case(name))
}

/// Checks that the text is a single well-formed XML document
///
/// Element nesting, attribute syntax and entity references are checked. Entities
/// other than the predefined XML ones resolve to nothing, as if an external DTD had
/// been loaded and turned out empty; no DTD is ever fetched.
pub fn check_well_formed(text: &str) -> Result<(), String> {
    normalize(text).map(|_| ())
}

/// Checks the text like [`check_well_formed`] and writes it back out with every
/// self-closing element other than the void ones expanded to a start and end tag
///
/// HTML parsing rules read `<div/>` or `<script/>` as an opening tag only, which
/// would pull the rest of the document into that element.
pub fn normalize(text: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(text.len()));
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at position {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if depth == 0 && seen_root {
                    return Err(format!(
                        "at position {}: content after the root element",
                        reader.buffer_position()
                    ));
                }
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| {
                        format!("at position {}: {}", reader.buffer_position(), e)
                    })?;
                    attr.unescape_value_with(resolve_entity).map_err(|e| {
                        format!("at position {}: {}", reader.buffer_position(), e)
                    })?;
                }
                seen_root = true;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
            }
            Event::Text(ref e) => {
                e.unescape_with(resolve_entity).map_err(|e| {
                    format!("at position {}: {}", reader.buffer_position(), e)
                })?;
            }
            Event::Eof => break,
            _ => {}
        }

        let written = match event {
            Event::Empty(e) if !is_void(e.name().as_ref()) => {
                let end = e.to_end().into_owned();
                writer
                    .write_event(Event::Start(e))
                    .and_then(|()| writer.write_event(Event::End(end)))
            }
            other => writer.write_event(other),
        };
        written.map_err(|e| format!("at position {}: {}", reader.buffer_position(), e))?;
    }

    if depth > 0 {
        return Err(format!("{} element(s) not closed at end of document", depth));
    }
    if !seen_root {
        return Err("no root element".to_string());
    }

    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some("")
    } else {
        None
    }
}

/// Repairs the page text and parses it into a document
///
/// # Returns
///
/// * `Ok(Html)` - The repaired text is well-formed and has been parsed
/// * `Err(String)` - The repaired text is still not well-formed XML
pub fn parse_document(raw: &str) -> Result<Html, String> {
    let text = normalize(&repair(raw))?;
    Ok(Html::parse_document(&text))
}
