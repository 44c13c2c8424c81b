//! Search query construction
//!
//! OpenGrok's search form has six text fields. A field that is missing, empty, or only
//! whitespace is left out of the request entirely; the others are trimmed and
//! form-encoded.

use url::form_urlencoded::byte_serialize;
use url::Url;

/// The text fields of an OpenGrok search form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFields {
    /// "Full Search" field (`q`)
    pub text: Option<String>,
    /// "Definition" field (`defs`)
    pub defs: Option<String>,
    /// "Symbol" field (`refs`)
    pub refs: Option<String>,
    /// "File Path" field (`path`)
    pub path: Option<String>,
    /// "History" field (`hist`)
    pub hist: Option<String>,
    /// Project selection on multi-project servers (`project`)
    pub project: Option<String>,
}

impl QueryFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.text = Some(value.into());
        self
    }

    pub fn defs(mut self, value: impl Into<String>) -> Self {
        self.defs = Some(value.into());
        self
    }

    pub fn refs(mut self, value: impl Into<String>) -> Self {
        self.refs = Some(value.into());
        self
    }

    pub fn path(mut self, value: impl Into<String>) -> Self {
        self.path = Some(value.into());
        self
    }

    pub fn hist(mut self, value: impl Into<String>) -> Self {
        self.hist = Some(value.into());
        self
    }

    pub fn project(mut self, value: impl Into<String>) -> Self {
        self.project = Some(value.into());
        self
    }

    /// Returns true if at least one field other than the project carries search terms
    ///
    /// The project only narrows a search, it is not a query by itself.
    pub fn has_search_terms(&self) -> bool {
        [&self.text, &self.defs, &self.refs, &self.path, &self.hist]
            .into_iter()
            .any(|field| trimmed(field).is_some())
    }

    /// Builds the form-encoded query string, e.g. `q=foo+bar&path=src`
    pub fn to_query_string(&self) -> String {
        let fields = [
            ("q", &self.text),
            ("defs", &self.defs),
            ("refs", &self.refs),
            ("path", &self.path),
            ("hist", &self.hist),
            ("project", &self.project),
        ];

        fields
            .into_iter()
            .filter_map(|(tag, value)| {
                trimmed(value).map(|v| {
                    let encoded: String = byte_serialize(v.as_bytes()).collect();
                    format!("{}={}", tag, encoded)
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Builds the search URL from the (redirect-resolved) base URL of the server
///
/// The search path is resolved relative to the base, so a base URL without a trailing
/// slash has its last path segment replaced.
pub fn search_url(base: &Url, query: &QueryFields) -> Result<Url, url::ParseError> {
    base.join(&format!("search?{}", query.to_query_string()))
}
