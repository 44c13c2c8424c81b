//! Parser for OpenGrok result pages
//!
//! This module extracts from a repaired and parsed result page:
//! - The file matches, grouped under the directory rows of the results table
//! - The matching lines of each file, with highlighted spans
//! - The links to further result pages from the pager
//!
//! It also parses the "more" page that lists every matching line of a single file.
//! Only the known OpenGrok page template is supported; anything that does not fit
//! it is a parse error.

use crate::crawler::fetcher::FetchResponse;
use crate::state::{FileMatch, LineMatch};
use crate::url::WebLink;
use crate::{Result, ScrapeError};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

const RESULTS_TABLE: &str = r#"html > body > div[id="page"] > div[id="results"] > table"#;

const PAGER: &str = r#"html > body > div[id="page"] > div[id="results"] > p[class="slider"]"#;

const MORE_LINES: &str =
    r#"html > body > div[id="page"] > div[id="content"] > div[id="more"] > pre > a[class="s"]"#;

// Older OpenGrok versions have no "content" div.
const MORE_LINES_OLD: &str =
    r#"html > body > div[id="page"] > div[id="more"] > pre > a[class="s"]"#;

/// Information parsed out of a single result page
#[derive(Debug, Default)]
pub struct ResultPage {
    /// File matches found on the page, in page order
    pub file_matches: Vec<FileMatch>,

    /// Links to further result pages, in the order they appear in the pager
    pub page_links: Vec<WebLink>,
}

/// Parser for one fetched OpenGrok page
pub struct ResultParser<'a> {
    doc: &'a Html,
    doc_url: &'a Url,
}

impl<'a> ResultParser<'a> {
    pub fn new(response: &'a FetchResponse) -> Self {
        Self {
            doc: &response.document,
            doc_url: &response.url,
        }
    }

    /// Parses a page of search results
    ///
    /// A page without a results table is a "no results" page and yields an empty
    /// `ResultPage`.
    pub fn parse_page(&self) -> Result<ResultPage> {
        let table = match select_first(self.doc, RESULTS_TABLE)? {
            Some(table) => table,
            None => return Ok(ResultPage::default()),
        };

        let mut file_matches = Vec::new();
        let mut dir: Option<String> = None;

        for row in table_rows(table) {
            if attr_is(row, "class", "dir") {
                dir = Some(parse_dir_row(row)?);
            } else {
                let dir = dir.as_deref().ok_or_else(|| {
                    ScrapeError::Parse(
                        "File row without preceding dir row in result list".to_string(),
                    )
                })?;
                file_matches.push(self.parse_file_row(dir, row)?);
            }
        }

        let mut page_links = Vec::new();
        if let Some(pager) = select_first(self.doc, PAGER)? {
            for link in child_elements(pager, "a").filter(|a| attr_is(*a, "class", "more")) {
                if let Some(href) = link.value().attr("href") {
                    page_links.extend(WebLink::resolve(self.doc_url, href));
                }
            }
        }

        tracing::debug!(
            "Parsed {} file matches and {} pager links from {}",
            file_matches.len(),
            page_links.len(),
            self.doc_url
        );

        Ok(ResultPage {
            file_matches,
            page_links,
        })
    }

    /// Parses a page listing every matching line of one file
    pub fn parse_more(&self) -> Result<Vec<LineMatch>> {
        let mut lines = Vec::new();

        for path in [MORE_LINES, MORE_LINES_OLD] {
            for link in select_all(self.doc, path)? {
                lines.push(self.parse_line(link)?);
            }
        }

        tracing::debug!("Parsed {} lines from {}", lines.len(), self.doc_url);
        Ok(lines)
    }

    fn parse_file_row(&self, dir: &str, row: ElementRef<'_>) -> Result<FileMatch> {
        let file_link = child_elements(row, "td")
            .find(|td| attr_is(*td, "class", "f"))
            .and_then(|td| child_elements(td, "a").next())
            .ok_or_else(|| {
                ScrapeError::Parse("Table column contains no link to file".to_string())
            })?;

        let xref = file_link
            .value()
            .attr("href")
            .and_then(|href| WebLink::resolve(self.doc_url, href));

        let mut hit = FileMatch::new(dir.to_string(), text_content(file_link), xref);

        for td in child_elements(row, "td") {
            for tt in child_elements(td, "tt").filter(|tt| attr_is(*tt, "class", "con")) {
                for line_link in child_elements(tt, "a") {
                    match line_link.value().attr("class").unwrap_or("") {
                        // Actual line links
                        "s" => {
                            hit.add_line(self.parse_line(line_link)?);
                        }
                        // A link without class points at the full list of matching
                        // lines, which the table did not show completely.
                        "" => {
                            let more = line_link
                                .value()
                                .attr("href")
                                .and_then(|href| WebLink::resolve(self.doc_url, href));
                            hit.set_abridged(more);
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(hit)
    }

    fn parse_line(&self, line_link: ElementRef<'_>) -> Result<LineMatch> {
        let mut line_number = None;
        let mut text = String::new();
        let mut len = 0usize;
        let mut positions = Vec::new();

        for child in line_link.children() {
            match child.value() {
                Node::Text(t) => {
                    len += t.text.chars().count();
                    text.push_str(&t.text);
                }
                Node::Element(el) => {
                    let Some(el_ref) = ElementRef::wrap(child) else {
                        continue;
                    };
                    match el.name() {
                        "span" => {
                            let number = text_content(el_ref);
                            line_number = Some(number.trim().parse::<u32>().map_err(|e| {
                                ScrapeError::Parse(format!(
                                    "Error parsing line number '{}': {}",
                                    number, e
                                ))
                            })?);
                        }
                        "b" => {
                            let bold = text_content(el_ref);
                            positions.push(len);
                            len += bold.chars().count();
                            text.push_str(&bold);
                            positions.push(len);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let line_number =
            line_number.ok_or_else(|| ScrapeError::Parse("No line number found".to_string()))?;

        let link = line_link
            .value()
            .attr("href")
            .and_then(|href| WebLink::resolve(self.doc_url, href));

        Ok(LineMatch::new(line_number, text, link, &positions))
    }
}

/// Parses the dir row's first cell, whose first link names the directory
fn parse_dir_row(row: ElementRef<'_>) -> Result<String> {
    child_elements(row, "td")
        .next()
        .and_then(|td| child_elements(td, "a").next())
        .map(text_content)
        .ok_or_else(|| ScrapeError::Parse("Directory row contains no link".to_string()))
}

/// Rows of a table, looking through any row group elements the HTML parser inserted
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "tbody" | "thead" | "tfoot" => rows.extend(child_elements(child, "tr")),
            _ => {}
        }
    }
    rows
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

/// True if the element has the attribute with exactly this value
fn attr_is(el: ElementRef<'_>, attr: &str, value: &str) -> bool {
    el.value().attr(attr) == Some(value)
}

fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn selector(path: &str) -> Result<Selector> {
    Selector::parse(path)
        .map_err(|e| ScrapeError::Parse(format!("Internal: incorrect selector {}: {:?}", path, e)))
}

fn select_first<'a>(doc: &'a Html, path: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(doc.select(&selector(path)?).next())
}

fn select_all<'a>(doc: &'a Html, path: &str) -> Result<Vec<ElementRef<'a>>> {
    Ok(doc.select(&selector(path)?).collect())
}
