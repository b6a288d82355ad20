//! HTML content extraction for harvested pages.
//!
//! Pulls readable text and asset URLs out of a page without rendering it.
//! Everything is capped so a pathological page cannot balloon the stored
//! result or the oracle prompt.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Text blocks kept per page.
pub const MAX_TEXT_BLOCKS: usize = 400;
/// Links and images kept per page, each.
pub const MAX_ASSET_URLS: usize = 10;
/// Characters of raw HTML kept as a debugging preview.
pub const HTML_PREVIEW_CHARS: usize = 500;

/// What the extractor found on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    /// Newline-joined text blocks from headings, paragraphs, and list items.
    pub text: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
    /// Best guess at a branding image, for diagnostics only.
    pub logo_candidate: Option<String>,
    /// How many images looked like logos, before the asset cap applied.
    pub logo_candidate_count: usize,
}

impl ExtractedContent {
    pub fn text_chars(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

/// Extract text and assets from an HTML document, resolving relative URLs
/// against `base`.
pub fn extract(html: &str, base: &Url) -> ExtractedContent {
    let document = Html::parse_document(html);
    let block_selector = Selector::parse("h1, h2, h3, h4, h5, h6, p, li").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();
    let image_selector = Selector::parse("img[src]").unwrap();

    let mut blocks = Vec::new();
    for element in document.select(&block_selector) {
        if blocks.len() >= MAX_TEXT_BLOCKS {
            break;
        }
        let raw = element_text(element);
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            blocks.push(collapsed);
        }
    }

    let mut links = Vec::new();
    let mut seen_links = HashSet::new();
    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(resolved) = resolve_asset_url(base, href) {
                if seen_links.insert(resolved.clone()) {
                    links.push(resolved);
                }
            }
        }
    }

    let mut images = Vec::new();
    let mut seen_images = HashSet::new();
    for element in document.select(&image_selector) {
        if let Some(src) = element.value().attr("src") {
            if let Some(resolved) = resolve_asset_url(base, src) {
                if seen_images.insert(resolved.clone()) {
                    images.push(resolved);
                }
            }
        }
    }

    // Logo heuristics look at every image found, not just the ones that
    // survive the asset cap.
    let logo_candidate_count = images
        .iter()
        .filter(|u| u.to_ascii_lowercase().contains("logo"))
        .count();
    let logo_candidate = images
        .iter()
        .find(|u| u.to_ascii_lowercase().contains("logo"))
        .or_else(|| images.first())
        .cloned();

    links.truncate(MAX_ASSET_URLS);
    images.truncate(MAX_ASSET_URLS);

    ExtractedContent {
        text: blocks.join("\n"),
        links,
        images,
        logo_candidate,
        logo_candidate_count,
    }
}

/// Leading slice of the raw HTML, safe to cut anywhere in multibyte text.
pub fn html_preview(html: &str) -> String {
    html.chars().take(HTML_PREVIEW_CHARS).collect()
}

/// Text content of an element, with script, style, and noscript subtrees
/// dropped entirely.
fn element_text(element: ElementRef) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                let name = el.name();
                if name.eq_ignore_ascii_case("script")
                    || name.eq_ignore_ascii_case("style")
                    || name.eq_ignore_ascii_case("noscript")
                {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

/// Resolve an href/src attribute into an absolute http(s) URL, or drop it.
fn resolve_asset_url(base: &Url, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    for scheme in ["mailto:", "javascript:", "tel:", "data:"] {
        if lower.starts_with(scheme) {
            return None;
        }
    }

    let mut resolved = base.join(trimmed).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
