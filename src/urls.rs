//! Canonicalizing link targets and manipulating query strings.

use kstring::KString;
use lazy_static::lazy_static;
use pct_str::{InvalidPctString, PctStr, PctString, URIReserved};
use regex::Regex;

lazy_static! {
    /// Absolute URLs: optional http(s) scheme, dotted host, then any
    /// amount of path/query material.
    static ref ABSOLUTE_URL: Regex = Regex::new(
        r"^(?:http(s)?://)?[\w.-]+(?:\.[\w.-]+)+[\w\-._~:/?#\[\]@!$&'()*+,;=.]+$"
    ).expect("static pattern parses");
}

/// Outcome of classifying a link target against the absolute-URL shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalCheck {
    /// `file://` — references the local filesystem, never a valid
    /// link target.
    LocalFile,
    /// Matches the absolute-URL pattern.
    ValidExternal,
    /// Not an absolute URL; to be treated as an internal path.
    NotAUrl,
}

pub fn classify_external(url: &str) -> ExternalCheck {
    if url.starts_with("file://") {
        ExternalCheck::LocalFile
    } else if ABSOLUTE_URL.is_match(url) {
        ExternalCheck::ValidExternal
    } else {
        ExternalCheck::NotAUrl
    }
}

/// Rewrite a page name into its routable URL: the literal name `index`
/// maps to the root path, any other bare name gets rooted.
pub fn routable_url(name: &str) -> String {
    if name.trim_matches('/') == "index" {
        return "/".into();
    }
    if name.starts_with('/') {
        name.into()
    } else {
        format!("/{name}")
    }
}

/// Normalize a link target: external targets (including the invalid
/// `file://` kind, which is rejected later at verification time) pass
/// through untouched; internal names are rewritten to routable URLs.
/// Returns the URL and whether it is external.
pub fn normalize_target(target: &str) -> (String, bool) {
    match classify_external(target) {
        ExternalCheck::ValidExternal | ExternalCheck::LocalFile => (target.to_string(), true),
        ExternalCheck::NotAUrl => (routable_url(target), false),
    }
}

pub fn url_encode(s: &str) -> String {
    PctString::encode(s.chars(), URIReserved).to_string()
}

/// Owns the offending string, so it can travel in error chains without
/// borrowing the request.
#[derive(Debug, thiserror::Error)]
#[error("url decoding error: {0}")]
pub struct UrlDecodingError(Box<String>);

impl From<InvalidPctString<&str>> for UrlDecodingError {
    fn from(e: InvalidPctString<&str>) -> Self {
        Self(Box::new(format!("{}", e)))
    }
}

pub fn url_decode(s: &str) -> Result<String, UrlDecodingError> {
    let p = PctStr::new(s)?;
    Ok(p.decode())
}

/// Insertion-ordered form/query fields. Browsers submit flat key/value
/// pairs; order is preserved because argument reconciliation drops
/// trailing fields deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPairs(Vec<(KString, KString)>);

impl QueryPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (still percent-encoded) query string. Value-less
    /// keys get the empty string.
    pub fn from_query_string(s: &str) -> Result<Self, UrlDecodingError> {
        let mut v = Vec::new();
        for part in s.split('&') {
            if part.is_empty() {
                continue;
            }
            if let Some((key, val)) = part.split_once('=') {
                v.push((url_decode(key)?.into(), url_decode(val)?.into()));
            } else {
                v.push((url_decode(part)?.into(), "".into()));
            }
        }
        Ok(QueryPairs(v))
    }

    pub fn push(&mut self, key: &str, value: &str) {
        self.0.push((KString::from_ref(key), KString::from_ref(value)));
    }

    /// Replace the first occurrence of `key`, or append.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == key) {
            slot.1 = KString::from_ref(value);
        } else {
            self.push(key, value);
        }
    }

    /// Remove and return the first value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<KString> {
        let i = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(KString, KString)> {
        self.0
    }

    pub fn to_query_string(&self) -> String {
        let mut s = String::new();
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                s.push('&');
            }
            s.push_str(&url_encode(k));
            s.push('=');
            s.push_str(&url_encode(v));
        }
        s
    }
}

/// Merge additional parameters into a URL's query string, keeping the
/// parameters already present (samely named ones are replaced).
pub fn merge_query_params(url: &str, additional: &[(&str, &str)]) -> String {
    let (base, query) = match url.split_once('?') {
        Some((b, q)) => (b, q),
        None => (url, ""),
    };
    let mut pairs = match QueryPairs::from_query_string(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            crate::warn!("dropping unparsable query string of {url:?}: {e}");
            QueryPairs::new()
        }
    };
    for (k, v) in additional {
        pairs.set(k, v);
    }
    if pairs.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, pairs.to_query_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_classify_external() {
        assert_eq!(classify_external("https://example.com/x"),
                   ExternalCheck::ValidExternal);
        assert_eq!(classify_external("example.com/x"),
                   ExternalCheck::ValidExternal);
        assert_eq!(classify_external("file:///etc/passwd"),
                   ExternalCheck::LocalFile);
        assert_eq!(classify_external("add_page"), ExternalCheck::NotAUrl);
        assert_eq!(classify_external("/add_page"), ExternalCheck::NotAUrl);
    }

    #[test]
    fn t_routable_url() {
        assert_eq!(routable_url("index"), "/");
        assert_eq!(routable_url("/index/"), "/");
        assert_eq!(routable_url("add_page"), "/add_page");
        assert_eq!(routable_url("/add_page"), "/add_page");
    }

    #[test]
    fn t_normalize_target() {
        assert_eq!(normalize_target("index"), ("/".to_string(), false));
        assert_eq!(normalize_target("add_page"),
                   ("/add_page".to_string(), false));
        assert_eq!(normalize_target("https://example.com"),
                   ("https://example.com".to_string(), true));
        // Kept verbatim; rejected at verification:
        assert_eq!(normalize_target("file:///etc/passwd"),
                   ("file:///etc/passwd".to_string(), true));
    }

    #[test]
    fn t_query_pairs_roundtrip() {
        let q = QueryPairs::from_query_string("a=1&b=x%20y&c").unwrap();
        let pairs: Vec<_> = q.iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "x y"), ("c", "")]);
        assert_eq!(q.to_query_string(), "a=1&b=x%20y&c=");
    }

    #[test]
    fn t_merge_query_params() {
        assert_eq!(merge_query_params("/add", &[("-submit-button", "Add")]),
                   "/add?-submit-button=Add");
        assert_eq!(merge_query_params("/add?x=1", &[("y", "2")]),
                   "/add?x=1&y=2");
        // Replacement, not duplication:
        assert_eq!(merge_query_params("/add?y=1", &[("y", "2")]),
                   "/add?y=2");
    }
}
