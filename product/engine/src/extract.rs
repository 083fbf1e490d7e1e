use crate::config::{DelayRange, HarvestConfig};
use crate::models::CandidateImage;
use crate::pacing;
use crate::session::{PageDriver, PageState, Session};
use crate::Result;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];

const IMAGE_EXTS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

pub fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

#[derive(Debug, Clone)]
pub struct AssetFilter {
    asset_hosts: Vec<String>,
    exclude_keywords: Vec<String>,
}

impl AssetFilter {
    pub fn new(asset_hosts: Vec<String>, exclude_keywords: Vec<String>) -> Self {
        Self {
            asset_hosts: asset_hosts
                .into_iter()
                .map(|v| v.to_ascii_lowercase())
                .collect(),
            exclude_keywords: exclude_keywords
                .into_iter()
                .map(|v| v.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(config.asset_hosts.clone(), config.exclude_keywords.clone())
    }

    pub fn accepts(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str().map(|h| h.to_ascii_lowercase()) else {
            return false;
        };
        if !self.host_allowed(&host) {
            return false;
        }
        let path = parsed.path().to_ascii_lowercase();
        if !IMAGE_EXTS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }
        let lowered = url.to_ascii_lowercase();
        !self
            .exclude_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
    }

    fn host_allowed(&self, host: &str) -> bool {
        self.asset_hosts.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    items: Vec<CandidateImage>,
    seen: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, alt: Option<&str>) -> bool {
        let normalized = strip_query(url).to_string();
        if !self.seen.insert(normalized.clone()) {
            return false;
        }
        let alt = alt.map(str::trim).filter(|v| !v.is_empty());
        self.items.push(CandidateImage {
            url: normalized,
            alt: alt.map(str::to_string),
            index: self.items.len(),
        });
        true
    }

    pub fn union(&mut self, other: CandidateSet) -> usize {
        let mut added = 0;
        for candidate in other.items {
            if self.insert(&candidate.url, candidate.alt.as_deref()) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<CandidateImage> {
        self.items
    }
}

fn background_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\(\s*["']?([^"')\s]+)["']?\s*\)"#).expect("background url regex")
    })
}

fn resolve_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let joined = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    Some(joined.to_string())
}

pub fn extract_candidates(page: &PageState, filter: &AssetFilter) -> CandidateSet {
    let document = Html::parse_document(&page.html);
    let base = Url::parse(&page.url).ok();
    let mut out = CandidateSet::new();

    let selector_img = Selector::parse("img").expect("img selector");
    for img in document.select(&selector_img) {
        let raw = IMAGE_ATTRS
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty());
        let Some(raw) = raw else {
            continue;
        };
        let Some(url) = resolve_url(raw, base.as_ref()) else {
            continue;
        };
        if !filter.accepts(&url) {
            continue;
        }
        out.insert(&url, img.value().attr("alt"));
    }

    let selector_styled = Selector::parse("[style]").expect("style selector");
    for el in document.select(&selector_styled) {
        let Some(style) = el.value().attr("style") else {
            continue;
        };
        if !style.to_ascii_lowercase().contains("background") {
            continue;
        }
        for caps in background_url_re().captures_iter(style) {
            let Some(url) = resolve_url(&caps[1], base.as_ref()) else {
                continue;
            };
            if filter.accepts(&url) {
                out.insert(&url, None);
            }
        }
    }

    out
}

#[derive(Debug, Clone, Default)]
pub struct GalleryPass {
    pub selector: Option<String>,
    pub added: usize,
    pub error: Option<String>,
}

pub fn harvest_candidates<D: PageDriver>(
    session: &mut Session<D>,
    page: &PageState,
    filter: &AssetFilter,
    gallery_selectors: &[String],
) -> (CandidateSet, GalleryPass) {
    let mut candidates = extract_candidates(page, filter);
    let open_delay = session.pacing().gallery_open;
    let close_delay = session.pacing().gallery_close;

    let pass = match gallery_pass(session, filter, gallery_selectors, open_delay, close_delay) {
        Ok(Some((selector, found))) => GalleryPass {
            selector: Some(selector),
            added: candidates.union(found),
            error: None,
        },
        Ok(None) => GalleryPass::default(),
        Err(err) => GalleryPass {
            selector: None,
            added: 0,
            error: Some(err.to_string()),
        },
    };
    (candidates, pass)
}

fn gallery_pass<D: PageDriver>(
    session: &mut Session<D>,
    filter: &AssetFilter,
    gallery_selectors: &[String],
    open_delay: DelayRange,
    close_delay: DelayRange,
) -> Result<Option<(String, CandidateSet)>> {
    for selector in gallery_selectors {
        // A selector that errors is just a miss; move on to the next one.
        match session.click(selector) {
            Ok(true) => {}
            Ok(false) | Err(_) => continue,
        }
        pacing::jitter(open_delay);
        let expanded = session.snapshot();
        // The overlay is closed even when the expanded DOM could not be read.
        let closed = session.press_key("Escape");
        pacing::jitter(close_delay);
        let found = extract_candidates(&expanded?, filter);
        closed?;
        return Ok(Some((selector.clone(), found)));
    }
    Ok(None)
}
