use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TariffError;

// =============================================================================
// HTS codes
// =============================================================================

/// Code-shaped tokens inside free text: dotted headings/subheadings or bare
/// 8/10 digit statistical numbers. Bare 4-digit numbers are only accepted after
/// the word "heading" since they collide with years.
static CODE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{4}(?:\.\d{2}){1,3})\b|\b(\d{10}|\d{8})\b|\bheading\s+(\d{4})\b",
    )
    .expect("Invalid HTS code regex")
});

/// A validated Harmonized Tariff Schedule number.
///
/// Stored in dotted form with segment widths 4.2.2.2. Shorter headings
/// (`0101`, `0101.30`, `0101.30.00`) are valid codes of their own.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HtsCode(String);

impl HtsCode {
    /// Parse a dotted (`0101.30.00.00`) or bare-digit (`0101300000`) code.
    pub fn parse(raw: &str) -> Result<Self, TariffError> {
        let trimmed = raw.trim();
        let invalid = || TariffError::InvalidCode(raw.to_string());

        let digits: String = if trimmed.contains('.') {
            let mut segments = trimmed.split('.');
            let head = segments.next().ok_or_else(invalid)?;
            if head.len() != 4 {
                return Err(invalid());
            }
            let mut digits = head.to_string();
            let mut count = 0;
            for seg in segments {
                count += 1;
                if seg.len() != 2 || count > 3 {
                    return Err(invalid());
                }
                digits.push_str(seg);
            }
            digits
        } else {
            trimmed.to_string()
        };

        if !digits.chars().all(|c| c.is_ascii_digit()) || ![4, 6, 8, 10].contains(&digits.len())
        {
            return Err(invalid());
        }

        Ok(Self::from_digits(&digits))
    }

    /// Build the dotted form from an already validated digit string.
    fn from_digits(digits: &str) -> Self {
        let mut dotted = digits[..4].to_string();
        let mut rest = &digits[4..];
        while !rest.is_empty() {
            dotted.push('.');
            dotted.push_str(&rest[..2]);
            rest = &rest[2..];
        }
        Self(dotted)
    }

    /// Find every code-shaped token in free text, in order of appearance.
    ///
    /// Tokens that are part of a money amount (`$1000.00`) are ignored.
    pub fn find_all(text: &str) -> Vec<HtsCode> {
        let mut codes = Vec::new();
        for caps in CODE_TOKEN_RE.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
                continue;
            };
            let preceded_by_currency = text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c == '$' || c == ',');
            if preceded_by_currency {
                continue;
            }
            if let Ok(code) = HtsCode::parse(m.as_str()) {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }
        codes
    }

    /// The dotted representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code with separators removed.
    pub fn digits(&self) -> String {
        self.0.replace('.', "")
    }

    /// Whether this code is a heading of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &HtsCode) -> bool {
        other.digits().starts_with(&self.digits())
    }

    /// The 4-digit heading this code belongs to.
    pub fn heading(&self) -> &str {
        &self.0[..4]
    }
}

impl fmt::Display for HtsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HtsCode {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HtsCode::parse(s)
    }
}

impl TryFrom<String> for HtsCode {
    type Error = TariffError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HtsCode::parse(&value)
    }
}

impl From<HtsCode> for String {
    fn from(code: HtsCode) -> Self {
        code.0
    }
}

// =============================================================================
// Catalog and retrieval records
// =============================================================================

/// A single tariff schedule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub hts_code: HtsCode,
    /// Depth in the schedule hierarchy (0 = heading).
    pub indent: u32,
    pub description: String,
    pub unit_of_quantity: String,
    /// Column 1 general duty rate, free text.
    pub general_rate: String,
    /// Column 1 special (preferential) rates, free text.
    pub special_rate: String,
    /// Column 2 rate, free text.
    pub other_rate: String,
}

/// A span of the reference document returned by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    /// Byte offset of the passage in the source document.
    pub offset: usize,
    /// Position of the passage in document order.
    pub ordinal: usize,
    /// Similarity to the query; higher is more relevant.
    pub score: f64,
}

// =============================================================================
// Answers
// =============================================================================

/// Which collaborator path produced an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Composed from tariff catalog records.
    Database,
    /// Written by the language model from retrieved passages.
    Generated,
    /// Local degradation: a retrieved excerpt or a canned message.
    Fallback,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provenance::Database => "database",
            Provenance::Generated => "generated",
            Provenance::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// The single result of answering one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub provenance: Provenance,
}

impl Answer {
    pub fn database(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Database,
        }
    }

    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Generated,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_code() {
        let code = HtsCode::parse("0101.30.00.00").unwrap();
        assert_eq!(code.as_str(), "0101.30.00.00");
        assert_eq!(code.digits(), "0101300000");
        assert_eq!(code.heading(), "0101");
    }

    #[test]
    fn test_parse_bare_digits_normalizes() {
        assert_eq!(HtsCode::parse("0101300000").unwrap().as_str(), "0101.30.00.00");
        assert_eq!(HtsCode::parse("01013000").unwrap().as_str(), "0101.30.00");
        assert_eq!(HtsCode::parse("010130").unwrap().as_str(), "0101.30");
        assert_eq!(HtsCode::parse("0101").unwrap().as_str(), "0101");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "01", "0101.3", "101.30", "0101.30.00.00.00", "01a1.30", "12345"] {
            assert!(HtsCode::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_prefix_relation() {
        let heading = HtsCode::parse("0101").unwrap();
        let sub = HtsCode::parse("0101.30").unwrap();
        let full = HtsCode::parse("0101.30.00.00").unwrap();
        assert!(heading.is_prefix_of(&full));
        assert!(sub.is_prefix_of(&full));
        assert!(full.is_prefix_of(&full));
        assert!(!full.is_prefix_of(&sub));
        assert!(!HtsCode::parse("0102").unwrap().is_prefix_of(&full));
    }

    #[test]
    fn test_find_all_in_text() {
        let codes = HtsCode::find_all("Compare 0101.30.00.00 with 0102.21 and 8471300100.");
        let strs: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(strs, vec!["0101.30.00.00", "0102.21", "8471.30.01.00"]);
    }

    #[test]
    fn test_find_all_ignores_years_and_money() {
        assert!(HtsCode::find_all("the 1985 agreement").is_empty());
        assert!(HtsCode::find_all("a cost of $1000.00 total").is_empty());
        assert!(HtsCode::find_all("with cost $10,000").is_empty());
    }

    #[test]
    fn test_find_all_heading_keyword() {
        let codes = HtsCode::find_all("What is under heading 0101?");
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].as_str(), "0101");
    }

    #[test]
    fn test_find_all_deduplicates() {
        let codes = HtsCode::find_all("0101.30.00.00 or 0101300000");
        assert_eq!(codes.len(), 1);
    }

    #[test]
    fn test_code_serde_roundtrip_normalizes() {
        let code: HtsCode = serde_json::from_str("\"0101300000\"").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"0101.30.00.00\"");
        assert!(serde_json::from_str::<HtsCode>("\"bogus\"").is_err());
    }

    #[test]
    fn test_provenance_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Provenance::Database).unwrap(), "\"database\"");
        assert_eq!(serde_json::to_string(&Provenance::Generated).unwrap(), "\"generated\"");
        assert_eq!(serde_json::to_string(&Provenance::Fallback).unwrap(), "\"fallback\"");
        assert_eq!(Provenance::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_answer_constructors() {
        assert_eq!(Answer::database("x").provenance, Provenance::Database);
        assert_eq!(Answer::generated("x").provenance, Provenance::Generated);
        assert_eq!(Answer::fallback("x").provenance, Provenance::Fallback);
    }
}
