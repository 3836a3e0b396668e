//! Query routing.
//!
//! Decides, before any collaborator call, which path answers a query:
//!
//! 1. out-of-band calculation input → [`Route::Calculation`]
//! 2. code token + calculation cue + money amount → [`Route::Calculation`]
//! 3. code token → [`Route::CodeLookup`]
//! 4. lookup cue + at least one content keyword → [`Route::KeywordLookup`]
//! 5. anything else → [`Route::Informational`]
//!
//! A query that half-matches a stricter rule (a calculation cue without a
//! code, an amount that does not parse) falls through to the next rule.

use std::sync::LazyLock;

use regex::Regex;

use tariffbot_core::duty::TariffInput;
use tariffbot_core::types::HtsCode;
use tariffbot_storage::keywords::{extract_keywords, Keyword};

static CALCULATION_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:calculat\w*|compute|duty\s+on|tariff\s+for|landed\s+cost|how\s+much\s+duty)\b")
        .expect("Invalid calculation cue regex")
});

static LOOKUP_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:hts\s+codes?|hs\s+codes?|tariff\s+codes?|classification\s+codes?|heading\s+for|subheading\s+for|duty\s+rates?\s+for|tariff\s+rates?\s+for|classify)\b",
    )
    .expect("Invalid lookup cue regex")
});

static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$\s?(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)|\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(?:usd|dollars)\b",
    )
    .expect("Invalid money regex")
});

/// The path chosen for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Compute duty and landed cost for a known code.
    Calculation(TariffInput),
    /// Look up code tokens found in the text.
    CodeLookup(Vec<HtsCode>),
    /// Look up descriptions by content keyword.
    KeywordLookup(Vec<Keyword>),
    /// Answer from the reference document.
    Informational,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Calculation(_) => "calculation",
            Route::CodeLookup(_) => "code_lookup",
            Route::KeywordLookup(_) => "keyword_lookup",
            Route::Informational => "informational",
        }
    }
}

/// Route `query`, optionally with structured calculation input.
pub fn classify(query: &str, calculation: Option<TariffInput>) -> Route {
    if let Some(input) = calculation {
        return Route::Calculation(input);
    }

    let codes = HtsCode::find_all(query);

    if let Some(code) = codes.first() {
        if CALCULATION_CUE_RE.is_match(query) {
            if let Some(amount) = money_amount(query) {
                return Route::Calculation(TariffInput::new(code.clone(), amount));
            }
        }
        return Route::CodeLookup(codes);
    }

    if LOOKUP_CUE_RE.is_match(query) {
        let keywords = extract_keywords(query);
        if !keywords.is_empty() {
            return Route::KeywordLookup(keywords);
        }
    }

    Route::Informational
}

/// First money amount in the text, in dollars.
pub fn money_amount(text: &str) -> Option<f64> {
    let caps = MONEY_RE.captures(text)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str().replace(',', "");
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
