use crate::models::{CandidateImage, Category};

const POOL_KEYWORDS: &[&str] = &["pool", "swimming", "spa", "hot tub", "jacuzzi", "dive", "swim"];

const EXTERIOR_KEYWORDS: &[&str] = &[
    "exterior", "outside", "front", "back", "yard", "patio", "deck", "beach", "ocean", "view",
];

fn keyword_match(value: &str, keywords: &[&str]) -> bool {
    let lowered = value.to_ascii_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

pub fn classify(url: &str, alt: &str) -> Category {
    if keyword_match(url, POOL_KEYWORDS) {
        return Category::Pool;
    }
    if keyword_match(alt, POOL_KEYWORDS) {
        return Category::Pool;
    }
    if keyword_match(url, EXTERIOR_KEYWORDS) || keyword_match(alt, EXTERIOR_KEYWORDS) {
        return Category::Exterior;
    }
    Category::Unclassified
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedCandidates {
    pub pool: Vec<CandidateImage>,
    pub exterior: Vec<CandidateImage>,
    pub unclassified: Vec<CandidateImage>,
}

impl ClassifiedCandidates {
    pub fn partition(candidates: Vec<CandidateImage>) -> Self {
        let mut out = Self::default();
        for candidate in candidates {
            match classify(&candidate.url, candidate.alt_text()) {
                Category::Pool => out.pool.push(candidate),
                Category::Exterior => out.exterior.push(candidate),
                Category::Unclassified => out.unclassified.push(candidate),
            }
        }
        out
    }

    /// When keywords found nothing at all, the first half of the unclassified
    /// images becomes exterior and the rest pool. Returns whether it fired.
    pub fn apply_positional_fallback(&mut self) -> bool {
        if !self.pool.is_empty() || !self.exterior.is_empty() || self.unclassified.is_empty() {
            return false;
        }
        let mut rest = std::mem::take(&mut self.unclassified);
        let mid = rest.len() / 2;
        self.pool = rest.split_off(mid);
        self.exterior = rest;
        true
    }
}
