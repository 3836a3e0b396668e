//! Duty-rate expressions and landed-cost calculation.
//!
//! Rate columns in the schedule are free text. The common shapes (`Free`,
//! `6.8%`, `1.5¢/kg`, `$1.20/head`, `4.4¢/kg + 6%`) are parsed into
//! components; everything else is kept verbatim as [`DutyRate::Unparsed`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TariffError};
use crate::types::{CandidateRecord, HtsCode};

static AD_VALOREM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*%$").expect("Invalid ad valorem regex"));

static SPECIFIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\$(?P<usd>\d+(?:\.\d+)?)|(?P<cents>\d+(?:\.\d+)?)\s*¢)\s*(?:/\s*(?P<unit>[^\s+]+)|\s+(?P<each>each))",
    )
    .expect("Invalid specific rate regex")
});

static FOOTNOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s+\d+/)+\s*$").expect("Invalid footnote regex"));

/// Countries whose goods are dutiable at column 2 rates.
const COLUMN_2_COUNTRIES: &[&str] = &["CU", "KP", "RU", "BY"];

/// Unit a specific duty is charged per.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    Kilogram,
    Each,
    Liter,
    Other(String),
}

impl RateUnit {
    fn parse(raw: &str) -> Self {
        match raw.trim_end_matches('.').to_ascii_lowercase().as_str() {
            "kg" => RateUnit::Kilogram,
            "head" | "each" | "no" | "unit" | "pc" => RateUnit::Each,
            "liter" | "l" => RateUnit::Liter,
            other => RateUnit::Other(other.to_string()),
        }
    }
}

/// One additive part of a duty rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DutyComponent {
    /// Percentage of customs value.
    AdValorem { percent: f64 },
    /// Fixed amount in US dollars per unit.
    Specific { amount_usd: f64, per: RateUnit },
}

/// A parsed duty-rate column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DutyRate {
    Free,
    Components { parts: Vec<DutyComponent> },
    Unparsed { text: String },
}

impl DutyRate {
    /// Parse a rate expression. Never fails; unknown shapes become `Unparsed`.
    pub fn parse(raw: &str) -> Self {
        let unparsed = || DutyRate::Unparsed {
            text: raw.trim().to_string(),
        };

        // Drop preferential program lists: "Free (A+,AU,BH)".
        let head = raw.split('(').next().unwrap_or_default();
        let head = FOOTNOTE_RE.replace(head.trim(), "");
        let head = head.trim();

        if head.is_empty() {
            return unparsed();
        }
        if head.eq_ignore_ascii_case("free") {
            return DutyRate::Free;
        }

        let mut parts = Vec::new();
        for piece in head.split('+') {
            match parse_component(piece.trim()) {
                Some(component) => parts.push(component),
                None => return unparsed(),
            }
        }
        DutyRate::Components { parts }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, DutyRate::Free)
    }
}

fn parse_component(piece: &str) -> Option<DutyComponent> {
    if let Some(caps) = AD_VALOREM_RE.captures(piece) {
        let percent = caps[1].parse().ok()?;
        return Some(DutyComponent::AdValorem { percent });
    }

    let caps = SPECIFIC_RE.captures(piece)?;
    let amount_usd = if let Some(usd) = caps.name("usd") {
        usd.as_str().parse::<f64>().ok()?
    } else {
        caps.name("cents")?.as_str().parse::<f64>().ok()? / 100.0
    };
    let per = match (caps.name("unit"), caps.name("each")) {
        (Some(unit), _) => RateUnit::parse(unit.as_str()),
        (None, Some(_)) => RateUnit::Each,
        (None, None) => return None,
    };
    Some(DutyComponent::Specific { amount_usd, per })
}

// =============================================================================
// Calculation
// =============================================================================

fn default_quantity() -> f64 {
    1.0
}

/// Inputs for a landed-cost calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffInput {
    pub hts_code: HtsCode,
    /// Commercial value of the goods in USD.
    pub product_cost: f64,
    #[serde(default)]
    pub freight: f64,
    #[serde(default)]
    pub insurance: f64,
    /// Number of units (head, pieces, ...).
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// Weight of one unit in kilograms.
    #[serde(default)]
    pub unit_weight_kg: f64,
    /// ISO 3166 alpha-2 code.
    #[serde(default)]
    pub country_of_origin: Option<String>,
}

impl TariffInput {
    /// Input with only a code and product cost; everything else defaulted.
    pub fn new(hts_code: HtsCode, product_cost: f64) -> Self {
        Self {
            hts_code,
            product_cost,
            freight: 0.0,
            insurance: 0.0,
            quantity: default_quantity(),
            unit_weight_kg: 0.0,
            country_of_origin: None,
        }
    }
}

/// Result of a landed-cost calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffBreakdown {
    pub hts_code: HtsCode,
    pub description: String,
    /// Rate column text the duty was computed from.
    pub rate_text: String,
    /// Whether the column 2 rate was applied.
    pub column_2: bool,
    /// Cost + freight + insurance.
    pub customs_value: f64,
    pub duty_amount: f64,
    pub total_landed_cost: f64,
    /// Duty as a percentage of customs value.
    pub effective_rate_percent: f64,
}

/// Compute duty and landed cost for `input` against `record`.
pub fn calculate(record: &CandidateRecord, input: &TariffInput) -> Result<TariffBreakdown> {
    for (name, value) in [
        ("product_cost", input.product_cost),
        ("freight", input.freight),
        ("insurance", input.insurance),
        ("quantity", input.quantity),
        ("unit_weight_kg", input.unit_weight_kg),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(TariffError::Calculation(format!(
                "{} must be a non-negative number",
                name
            )));
        }
    }

    let column_2 = input
        .country_of_origin
        .as_deref()
        .is_some_and(|c| COLUMN_2_COUNTRIES.contains(&c.trim().to_ascii_uppercase().as_str()));
    let rate_text = if column_2 {
        &record.other_rate
    } else {
        &record.general_rate
    };

    let customs_value = input.product_cost + input.freight + input.insurance;

    let duty = match DutyRate::parse(rate_text) {
        DutyRate::Free => 0.0,
        DutyRate::Components { parts } => {
            let mut total = 0.0;
            for part in &parts {
                total += component_duty(part, customs_value, input)?;
            }
            total
        }
        DutyRate::Unparsed { text } if text.is_empty() => {
            return Err(TariffError::Calculation(format!(
                "no duty rate recorded for {}",
                record.hts_code
            )));
        }
        DutyRate::Unparsed { text } => {
            return Err(TariffError::Calculation(format!(
                "rate '{}' cannot be computed automatically",
                text
            )));
        }
    };

    let duty_amount = round_cents(duty);
    let effective_rate_percent = if customs_value > 0.0 {
        round_cents(duty_amount / customs_value * 100.0)
    } else {
        0.0
    };

    Ok(TariffBreakdown {
        hts_code: record.hts_code.clone(),
        description: record.description.clone(),
        rate_text: rate_text.clone(),
        column_2,
        customs_value: round_cents(customs_value),
        duty_amount,
        total_landed_cost: round_cents(customs_value + duty_amount),
        effective_rate_percent,
    })
}

fn component_duty(part: &DutyComponent, customs_value: f64, input: &TariffInput) -> Result<f64> {
    match part {
        DutyComponent::AdValorem { percent } => Ok(customs_value * percent / 100.0),
        DutyComponent::Specific {
            amount_usd,
            per: RateUnit::Kilogram,
        } => {
            if input.unit_weight_kg <= 0.0 {
                return Err(TariffError::Calculation(
                    "a per-kilogram rate requires unit_weight_kg".to_string(),
                ));
            }
            Ok(amount_usd * input.quantity * input.unit_weight_kg)
        }
        DutyComponent::Specific {
            amount_usd,
            per: RateUnit::Each,
        } => Ok(amount_usd * input.quantity),
        DutyComponent::Specific { per, .. } => Err(TariffError::Calculation(format!(
            "unsupported rate unit {:?}",
            per
        ))),
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(general: &str, other: &str) -> CandidateRecord {
        CandidateRecord {
            hts_code: HtsCode::parse("0101.30.00.00").unwrap(),
            indent: 1,
            description: "Asses".to_string(),
            unit_of_quantity: "No.".to_string(),
            general_rate: general.to_string(),
            special_rate: "Free (A+,AU,BH)".to_string(),
            other_rate: other.to_string(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_free() {
        assert_eq!(DutyRate::parse("Free"), DutyRate::Free);
        assert_eq!(DutyRate::parse("  free "), DutyRate::Free);
        assert!(DutyRate::parse("Free (A+,AU,BH,CL)").is_free());
    }

    #[test]
    fn test_parse_ad_valorem() {
        assert_eq!(
            DutyRate::parse("6.8%"),
            DutyRate::Components {
                parts: vec![DutyComponent::AdValorem { percent: 6.8 }]
            }
        );
    }

    #[test]
    fn test_parse_strips_footnotes() {
        assert_eq!(
            DutyRate::parse("6.8% 1/"),
            DutyRate::Components {
                parts: vec![DutyComponent::AdValorem { percent: 6.8 }]
            }
        );
    }

    #[test]
    fn test_parse_cents_per_kg() {
        match DutyRate::parse("1.5¢/kg") {
            DutyRate::Components { parts } => {
                assert_eq!(parts.len(), 1);
                match &parts[0] {
                    DutyComponent::Specific { amount_usd, per } => {
                        assert!(approx(*amount_usd, 0.015));
                        assert_eq!(*per, RateUnit::Kilogram);
                    }
                    other => panic!("unexpected component {:?}", other),
                }
            }
            other => panic!("unexpected rate {:?}", other),
        }
    }

    #[test]
    fn test_parse_dollars_per_head() {
        assert_eq!(
            DutyRate::parse("$1.20/head"),
            DutyRate::Components {
                parts: vec![DutyComponent::Specific {
                    amount_usd: 1.20,
                    per: RateUnit::Each
                }]
            }
        );
        assert_eq!(
            DutyRate::parse("$3 each"),
            DutyRate::Components {
                parts: vec![DutyComponent::Specific {
                    amount_usd: 3.0,
                    per: RateUnit::Each
                }]
            }
        );
    }

    #[test]
    fn test_parse_compound() {
        match DutyRate::parse("4.4¢/kg + 6%") {
            DutyRate::Components { parts } => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], DutyComponent::AdValorem { percent } if approx(percent, 6.0)));
            }
            other => panic!("unexpected rate {:?}", other),
        }
    }

    #[test]
    fn test_parse_unparsed() {
        let text = "The rate applicable to the natural juice in heading 2009";
        assert_eq!(
            DutyRate::parse(text),
            DutyRate::Unparsed {
                text: text.to_string()
            }
        );
        assert_eq!(
            DutyRate::parse(""),
            DutyRate::Unparsed {
                text: String::new()
            }
        );
    }

    // ---- Calculation ----

    #[test]
    fn test_calculate_ad_valorem() {
        let rec = record("6.8%", "20%");
        let mut input = TariffInput::new(rec.hts_code.clone(), 10_000.0);
        input.freight = 500.0;
        input.insurance = 100.0;

        let b = calculate(&rec, &input).unwrap();
        assert!(approx(b.customs_value, 10_600.0));
        assert!(approx(b.duty_amount, 720.8));
        assert!(approx(b.total_landed_cost, 11_320.8));
        assert!(approx(b.effective_rate_percent, 6.8));
        assert!(!b.column_2);
    }

    #[test]
    fn test_calculate_free() {
        let rec = record("Free", "$3.50/head");
        let b = calculate(&rec, &TariffInput::new(rec.hts_code.clone(), 10_000.0)).unwrap();
        assert_eq!(b.duty_amount, 0.0);
        assert!(approx(b.total_landed_cost, 10_000.0));
    }

    #[test]
    fn test_calculate_column_2_country() {
        let rec = record("Free", "$3.50/head");
        let mut input = TariffInput::new(rec.hts_code.clone(), 10_000.0);
        input.quantity = 5.0;
        input.country_of_origin = Some("kp".to_string());

        let b = calculate(&rec, &input).unwrap();
        assert!(b.column_2);
        assert_eq!(b.rate_text, "$3.50/head");
        assert!(approx(b.duty_amount, 17.5));
    }

    #[test]
    fn test_calculate_per_kg_needs_weight() {
        let rec = record("1.5¢/kg", "");
        let input = TariffInput::new(rec.hts_code.clone(), 1_000.0);
        assert!(matches!(calculate(&rec, &input), Err(TariffError::Calculation(_))));

        let mut input = input;
        input.quantity = 5.0;
        input.unit_weight_kg = 500.0;
        let b = calculate(&rec, &input).unwrap();
        assert!(approx(b.duty_amount, 37.5));
    }

    #[test]
    fn test_calculate_compound() {
        let rec = record("4.4¢/kg + 6%", "");
        let mut input = TariffInput::new(rec.hts_code.clone(), 1_000.0);
        input.quantity = 10.0;
        input.unit_weight_kg = 2.0;
        let b = calculate(&rec, &input).unwrap();
        // 0.044 * 20 + 60
        assert!(approx(b.duty_amount, 60.88));
    }

    #[test]
    fn test_calculate_rejects_negative_input() {
        let rec = record("6.8%", "");
        let input = TariffInput::new(rec.hts_code.clone(), -1.0);
        let err = calculate(&rec, &input).unwrap_err();
        assert!(err.to_string().contains("product_cost"));
    }

    #[test]
    fn test_calculate_unparsed_rate() {
        let rec = record("The rate applicable in heading 2009", "");
        let input = TariffInput::new(rec.hts_code.clone(), 100.0);
        assert!(matches!(calculate(&rec, &input), Err(TariffError::Calculation(_))));
    }

    #[test]
    fn test_calculate_missing_rate() {
        let rec = record("", "");
        let err = calculate(&rec, &TariffInput::new(rec.hts_code.clone(), 100.0)).unwrap_err();
        assert!(err.to_string().contains("no duty rate"));
    }

    #[test]
    fn test_input_deserialize_defaults() {
        let input: TariffInput =
            serde_json::from_str(r#"{"hts_code":"0101300000","product_cost":250.0}"#).unwrap();
        assert_eq!(input.hts_code.as_str(), "0101.30.00.00");
        assert_eq!(input.quantity, 1.0);
        assert_eq!(input.freight, 0.0);
        assert!(input.country_of_origin.is_none());
    }
}
