//! Keyword extraction for description matching.
//!
//! Questions like "What's the HTS code for donkeys?" are reduced to content
//! keywords (`donkey`), each carrying the variants the schedule may use for
//! it (`donkey`, `ass`).

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "at", "be", "by", "can", "classification",
    "classify", "code", "codes", "could", "do", "does", "duty", "duties", "find", "for", "from",
    "get", "give", "heading", "hs", "hts", "how", "i", "import", "imported", "importing", "in",
    "into", "is", "it", "its", "look", "lookup", "me", "my", "number", "of", "on", "or", "please",
    "rate", "rates", "s", "schedule", "show", "subheading", "tariff", "tariffs", "tell", "that",
    "the", "their", "there", "these", "this", "to", "under", "us", "use", "want", "was", "we",
    "what", "whats", "when", "where", "which", "with", "would", "you",
];

/// Common names mapped to the wording used in the schedule.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("donkey", &["ass"]),
    ("pig", &["swine"]),
    ("hog", &["swine"]),
    ("cow", &["bovine", "cattle"]),
    ("cattle", &["bovine"]),
    ("bull", &["bovine"]),
    ("sheep", &["ovine"]),
    ("goat", &["caprine"]),
    ("chicken", &["gallus domesticus", "poultry"]),
    ("poultry", &["gallus domesticus"]),
    ("car", &["motor vehicle"]),
    ("automobile", &["motor vehicle"]),
    ("laptop", &["portable automatic data processing"]),
    ("computer", &["automatic data processing"]),
    ("phone", &["telephone"]),
    ("shoe", &["footwear"]),
    ("sneaker", &["footwear"]),
];

/// A content keyword and the terms that count as a match for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub term: String,
    /// `term` first, then synonyms.
    pub variants: Vec<String>,
}

/// Extract content keywords from free text, in order of appearance.
pub fn extract_keywords(text: &str) -> Vec<Keyword> {
    let mut keywords: Vec<Keyword> = Vec::new();
    for word in words(text) {
        if word.len() < 2 || word.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        let term = singularize(&word);
        if STOP_WORDS.contains(&term.as_str()) || keywords.iter().any(|k| k.term == term) {
            continue;
        }

        let mut variants = vec![term.clone()];
        if let Some((_, extra)) = SYNONYMS.iter().find(|(name, _)| *name == term) {
            variants.extend(extra.iter().map(|s| s.to_string()));
        }
        keywords.push(Keyword { term, variants });
    }
    keywords
}

/// Lower-cased alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Reduce simple English plurals to their singular form.
pub fn singularize(word: &str) -> String {
    let len = word.len();
    if len > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..len - 3]);
    }
    if len > 4
        && (word.ends_with("sses")
            || word.ends_with("xes")
            || word.ends_with("ches")
            || word.ends_with("shes"))
    {
        return word[..len - 2].to_string();
    }
    if len > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..len - 1].to_string();
    }
    word.to_string()
}

/// Whether `description` mentions any variant of `keyword`.
///
/// Single-word variants are compared against singularized description words
/// so that `ass` matches "Asses" but not "glass". Multi-word variants match
/// as a case-insensitive phrase.
pub fn description_matches(description: &str, keyword: &Keyword) -> bool {
    let lowered = description.to_lowercase();
    let desc_words: Vec<String> = words(description).iter().map(|w| singularize(w)).collect();
    keyword.variants.iter().any(|variant| {
        if variant.contains(' ') {
            lowered.contains(variant.as_str())
        } else {
            desc_words.iter().any(|w| w == variant)
        }
    })
}
