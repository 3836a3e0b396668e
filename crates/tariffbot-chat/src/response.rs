//! Answer text composition for the local paths.
//!
//! Catalog records, tariff calculations and fallback excerpts are turned
//! into readable text here without involving the language model.

use std::collections::HashSet;

use tariffbot_core::duty::TariffBreakdown;
use tariffbot_core::types::{CandidateRecord, RetrievedPassage};
use tariffbot_storage::keywords::{extract_keywords, singularize};

/// Shown when no collaborator produced anything usable.
pub const NO_INFORMATION: &str = "I'm sorry, I was unable to find information about that in the \
HTS database or the General Notes. Try rephrasing your question or asking about a specific HTS code.";

// =============================================================================
// ResponseComposer
// =============================================================================

/// Builds answer text from records, breakdowns and passages.
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    /// Maximum characters of a fallback excerpt.
    pub excerpt_chars: usize,
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new(700)
    }
}

impl ResponseComposer {
    pub fn new(excerpt_chars: usize) -> Self {
        Self { excerpt_chars }
    }

    /// Describe catalog records in the order given.
    pub fn compose_records(&self, records: &[CandidateRecord]) -> String {
        if records.is_empty() {
            return NO_INFORMATION.to_string();
        }

        let mut lines = vec![if records.len() == 1 {
            "I found this entry in the HTS database:".to_string()
        } else {
            format!("I found {} entries in the HTS database:", records.len())
        }];
        for record in records {
            lines.push(String::new());
            lines.push(format!("**{}**: {}", record.hts_code, description_or_dash(record)));
            lines.push(format!("- General rate: {}", rate_or_dash(&record.general_rate)));
            if !record.special_rate.is_empty() {
                lines.push(format!("- Special rate: {}", record.special_rate));
            }
            if !record.other_rate.is_empty() {
                lines.push(format!("- Column 2 rate: {}", record.other_rate));
            }
            if !record.unit_of_quantity.is_empty() {
                lines.push(format!("- Unit of quantity: {}", record.unit_of_quantity));
            }
        }
        lines.join("\n")
    }

    /// Describe a completed tariff calculation.
    pub fn compose_breakdown(&self, breakdown: &TariffBreakdown) -> String {
        let column = if breakdown.column_2 {
            "column 2"
        } else {
            "general"
        };
        [
            format!(
                "Tariff calculation for **{}** ({}):",
                breakdown.hts_code, breakdown.description
            ),
            format!("- Customs value: ${:.2}", breakdown.customs_value),
            format!("- Duty rate ({}): {}", column, rate_or_dash(&breakdown.rate_text)),
            format!(
                "- Duty amount: ${:.2} ({:.2}% effective)",
                breakdown.duty_amount, breakdown.effective_rate_percent
            ),
            format!("- Total landed cost: ${:.2}", breakdown.total_landed_cost),
        ]
        .join("\n")
    }

    /// A record was found but its duty could not be computed.
    pub fn compose_uncomputable(&self, record: &CandidateRecord, reason: &str) -> String {
        format!(
            "**{}**: {}\n- General rate: {}\n\nI could not compute the duty automatically: {}.",
            record.hts_code,
            description_or_dash(record),
            rate_or_dash(&record.general_rate),
            reason
        )
    }

    /// Fallback answer: the top passage, trimmed, with query keywords bolded.
    pub fn compose_excerpt(&self, passage: &RetrievedPassage, query: &str) -> String {
        let excerpt = truncate_chars(&passage.text, self.excerpt_chars);
        format!(
            "Here is the most relevant passage from the HTS General Notes:\n\n> {}",
            highlight(&excerpt, query).replace('\n', "\n> ")
        )
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn description_or_dash(record: &CandidateRecord) -> &str {
    if record.description.is_empty() {
        "-"
    } else {
        &record.description
    }
}

fn rate_or_dash(rate: &str) -> &str {
    if rate.is_empty() {
        "-"
    } else {
        rate
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", text[..byte].trim_end()),
        None => text.to_string(),
    }
}

/// Wrap every word of `text` that matches a content keyword of `query` in `**`.
pub fn highlight(text: &str, query: &str) -> String {
    let terms: HashSet<String> = extract_keywords(query)
        .into_iter()
        .flat_map(|k| k.variants)
        .filter(|v| !v.contains(' '))
        .collect();
    if terms.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut word_start: Option<usize> = None;
    let flush = |out: &mut String, word: &str| {
        if terms.contains(&singularize(&word.to_lowercase())) {
            out.push_str("**");
            out.push_str(word);
            out.push_str("**");
        } else {
            out.push_str(word);
        }
    };

    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            if word_start.is_none() {
                word_start = Some(i);
            }
        } else {
            if let Some(start) = word_start.take() {
                flush(&mut out, &text[start..i]);
            }
            out.push(c);
        }
    }
    if let Some(start) = word_start {
        flush(&mut out, &text[start..]);
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tariffbot_core::types::HtsCode;

    fn asses() -> CandidateRecord {
        CandidateRecord {
            hts_code: HtsCode::parse("0101.30.00.00").unwrap(),
            indent: 1,
            description: "Asses".to_string(),
            unit_of_quantity: "No.".to_string(),
            general_rate: "6.8%".to_string(),
            special_rate: "Free (A+,AU,BH)".to_string(),
            other_rate: "15%".to_string(),
        }
    }

    fn passage(text: &str) -> RetrievedPassage {
        RetrievedPassage {
            text: text.to_string(),
            offset: 0,
            ordinal: 0,
            score: 0.8,
        }
    }

    #[test]
    fn test_single_record() {
        let text = ResponseComposer::default().compose_records(&[asses()]);
        assert!(text.starts_with("I found this entry"));
        assert!(text.contains("**0101.30.00.00**: Asses"));
        assert!(text.contains("General rate: 6.8%"));
        assert!(text.contains("Column 2 rate: 15%"));
        assert!(text.contains("Unit of quantity: No."));
    }

    #[test]
    fn test_multiple_records_keep_order() {
        let mut heading = asses();
        heading.hts_code = HtsCode::parse("0101").unwrap();
        heading.description = "Live horses, asses, mules and hinnies:".to_string();
        heading.general_rate = String::new();
        heading.special_rate = String::new();

        let text = ResponseComposer::default().compose_records(&[asses(), heading]);
        assert!(text.starts_with("I found 2 entries"));
        let first = text.find("0101.30.00.00").unwrap();
        let second = text.find("**0101**").unwrap();
        assert!(first < second);
        assert!(text.contains("General rate: -"));
    }

    #[test]
    fn test_no_records() {
        assert_eq!(ResponseComposer::default().compose_records(&[]), NO_INFORMATION);
    }

    #[test]
    fn test_breakdown() {
        let breakdown = TariffBreakdown {
            hts_code: HtsCode::parse("0101.30.00.00").unwrap(),
            description: "Asses".to_string(),
            rate_text: "6.8%".to_string(),
            column_2: false,
            customs_value: 10_600.0,
            duty_amount: 720.8,
            total_landed_cost: 11_320.8,
            effective_rate_percent: 6.8,
        };
        let text = ResponseComposer::default().compose_breakdown(&breakdown);
        assert!(text.contains("Customs value: $10600.00"));
        assert!(text.contains("Duty rate (general): 6.8%"));
        assert!(text.contains("Duty amount: $720.80 (6.80% effective)"));
        assert!(text.contains("Total landed cost: $11320.80"));
    }

    #[test]
    fn test_uncomputable() {
        let text = ResponseComposer::default().compose_uncomputable(&asses(), "rate unknown");
        assert!(text.contains("General rate: 6.8%"));
        assert!(text.ends_with("rate unknown."));
    }

    #[test]
    fn test_excerpt_highlights_keywords() {
        let text = ResponseComposer::default().compose_excerpt(
            &passage("Products of Israel enter free of duty under the agreement."),
            "What is the Israel Free Trade Agreement?",
        );
        assert!(text.contains("**Israel**"));
        assert!(text.contains("**free**"));
        assert!(text.contains("**agreement**"));
        assert!(!text.contains("**Products**"));
    }

    #[test]
    fn test_excerpt_truncated() {
        let composer = ResponseComposer::new(10);
        let text = composer.compose_excerpt(&passage("abcdefghijklmnop"), "nothing");
        assert!(text.ends_with("abcdefghij..."));
    }

    #[test]
    fn test_highlight_plural_and_multibyte() {
        assert_eq!(highlight("Asses, ¢/kg", "donkeys"), "**Asses**, ¢/kg");
        assert_eq!(highlight("plain text", ""), "plain text");
    }
}
