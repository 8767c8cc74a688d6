//! HTML parser for extracting links, assets and metadata
//!
//! This module reads a fetched primary document and produces:
//! - Follow-on addresses inside the crawl target, from both markup and raw text
//! - Embedded asset addresses (images, scripts, stylesheets, media)
//! - The page title
//!
//! Extraction is pure: the same document always yields the same sets.

use crate::url::{canonicalize_url, Target};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Elements and attributes that point at other documents
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[rel='canonical'][href]", "href"),
    ("iframe[src]", "src"),
    ("frame[src]", "src"),
    ("form[action]", "action"),
];

/// Elements and attributes that point at embedded content
const ASSET_SOURCES: &[(&str, &str)] = &[
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("link[href]", "href"),
    ("source[src]", "src"),
    ("video[src]", "src"),
    ("audio[src]", "src"),
];

/// Characters stripped from the end of addresses found in running text
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Extracted information from a primary document
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Canonical in-target addresses referenced by the page
    pub links: BTreeSet<Url>,

    /// Absolute addresses of embedded assets, any host
    pub assets: BTreeSet<Url>,
}

/// Link and asset extractor bound to one crawl target
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    target: Target,
    /// Matches bare target addresses in running text
    text_pattern: Regex,
}

impl LinkExtractor {
    /// Creates an extractor for the given target
    ///
    /// # Returns
    ///
    /// * `Ok(LinkExtractor)` - Ready to use
    /// * `Err(regex::Error)` - The target's schemes could not form a pattern
    pub fn new(target: Target) -> Result<Self, regex::Error> {
        let schemes = target
            .schemes()
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");

        // Host is matched whole so that "x.onion.example.com" is not cut short;
        // target membership is decided afterwards by canonicalization.
        let pattern = format!(
            r#"(?i)\b(?:{})://[a-z0-9][a-z0-9.-]*(?::\d{{1,5}})?(?:[/?][^\s"'<>`\\]*)?"#,
            schemes
        );

        Ok(Self {
            target,
            text_pattern: Regex::new(&pattern)?,
        })
    }

    /// The target this extractor filters against
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Parses a document body and extracts title, links and assets
    ///
    /// # Arguments
    ///
    /// * `body` - Raw document bytes; invalid UTF-8 is replaced, never rejected
    /// * `source` - Address the document was fetched from, for relative references
    pub fn parse(&self, body: &[u8], source: &Url) -> ParsedPage {
        let text = String::from_utf8_lossy(body);
        let document = Html::parse_document(&text);
        let base = document_base(&document, source);

        let mut links = BTreeSet::new();
        for raw in collect_attributes(&document, LINK_SOURCES) {
            if let Some(link) = self.resolve_link(&raw, &base) {
                links.insert(link);
            }
        }
        for raw in self.text_addresses(&text) {
            if let Some(link) = self.resolve_link(raw, &base) {
                links.insert(link);
            }
        }

        let mut assets = BTreeSet::new();
        for raw in collect_attributes(&document, ASSET_SOURCES) {
            if let Some(asset) = resolve_asset(&raw, &base) {
                assets.insert(asset);
            }
        }

        ParsedPage {
            title: extract_title(&document),
            links,
            assets,
        }
    }

    /// Returns only the in-target links of a document
    pub fn extract_links(&self, body: &[u8], source: &Url) -> BTreeSet<Url> {
        self.parse(body, source).links
    }

    /// Finds bare target addresses in running text
    fn text_addresses<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.text_pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
            .collect()
    }

    /// Resolves a reference and keeps it only if it canonicalizes into the target
    fn resolve_link(&self, href: &str, base: &Url) -> Option<Url> {
        let absolute = resolve_reference(href, base)?;
        canonicalize_url(absolute, &self.target).ok()
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Honors `<base href>` when present and valid
fn document_base(document: &Html, source: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| source.join(href.trim()).ok())
        })
        .unwrap_or_else(|| source.clone())
}

fn collect_attributes(document: &Html, sources: &[(&str, &str)]) -> Vec<String> {
    let mut values = Vec::new();
    for (selector, attr) in sources {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                values.push(value.to_string());
            }
        }
    }
    values
}

/// Resolves a reference to an absolute http(s) URL
///
/// Returns None if the reference should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_reference(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base.join(href) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Some(url),
        _ => None,
    }
}

fn resolve_asset(src: &str, base: &Url) -> Option<Url> {
    let mut url = resolve_reference(src, base)?;
    url.set_fragment(None);
    Some(url)
}
