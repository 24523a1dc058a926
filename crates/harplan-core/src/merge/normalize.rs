//! Grouping-key normalization and edit-distance similarity.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

/// The embedded tuning TOML.
static TUNING_TOML: &str = include_str!("tuning.toml");

/// Tunable parameters of the fuzzy merge.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyConfig {
    /// Minimum similarity (0.0..=1.0) for two keys to share a group.
    pub threshold: f64,
    pub stopwords: BTreeSet<String>,
    /// Word-level substitutions applied before stopword removal.
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTuning {
    threshold: Option<f64>,
    stopwords: Option<Vec<String>>,
    aliases: Option<BTreeMap<String, String>>,
}

impl Default for FuzzyConfig {
    /// The embedded tuning.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. This is a compile-time
    /// invariant -- if the binary was built, the TOML is valid.
    fn default() -> Self {
        let raw: RawTuning = toml::from_str(TUNING_TOML).expect("embedded tuning.toml is invalid");
        Self::bare().overlay(raw)
    }
}

impl FuzzyConfig {
    fn bare() -> Self {
        Self {
            threshold: 1.0,
            stopwords: BTreeSet::new(),
            aliases: BTreeMap::new(),
        }
    }

    fn overlay(mut self, raw: RawTuning) -> Self {
        if let Some(threshold) = raw.threshold {
            self.threshold = threshold;
        }
        if let Some(stopwords) = raw.stopwords {
            self.stopwords = stopwords.into_iter().map(|w| w.to_lowercase()).collect();
        }
        if let Some(aliases) = raw.aliases {
            self.aliases = aliases
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                .collect();
        }
        self
    }

    /// Parse a tuning document. Fields it omits keep their embedded values.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let raw: RawTuning = toml::from_str(text)?;
        Ok(Self::default().overlay(raw))
    }

    /// Canonical grouping key for a label.
    ///
    /// Lower-cases, turns every non-alphanumeric character into a word
    /// break, applies aliases word by word, drops stopwords and joins the
    /// rest with single spaces. `"The Auth-Service"` becomes
    /// `"authentication service"`.
    pub fn normalize_key(&self, text: &str) -> String {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        let mut words = Vec::new();
        for word in cleaned.split_whitespace() {
            let mapped = self.aliases.get(word).map(String::as_str).unwrap_or(word);
            for part in mapped.split_whitespace() {
                if !self.stopwords.contains(part) {
                    words.push(part);
                }
            }
        }
        words.join(" ")
    }

    /// Whether two normalized keys are close enough to share a group.
    pub fn is_similar(&self, a: &str, b: &str) -> bool {
        similarity(a, b) >= self.threshold
    }
}

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Edit similarity in `0.0..=1.0`: `(max_len - distance) / max_len`.
///
/// Two empty strings are identical; one empty string matches nothing.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein(a, b);
    (max_len - distance) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_tuning_loads() {
        let config = FuzzyConfig::default();
        assert!((config.threshold - 0.72).abs() < f64::EPSILON);
        assert!(config.stopwords.contains("the"));
        assert_eq!(config.aliases.get("auth").map(String::as_str), Some("authentication"));
    }

    #[test]
    fn normalizes_case_punctuation_and_stopwords() {
        let config = FuzzyConfig::default();
        assert_eq!(config.normalize_key("  The Auth-Service!  "), "authentication service");
        assert_eq!(config.normalize_key("Performance of the DB"), "performance database");
        assert_eq!(config.normalize_key("IAM"), "identity access management");
        assert_eq!(config.normalize_key("..."), "");
    }

    #[test]
    fn aliases_collapse_report_synonyms() {
        let config = FuzzyConfig::default();
        assert_eq!(config.normalize_key("Bug Report"), "defect report");
        assert_eq!(config.normalize_key("Defect Log"), "defect report");
        assert_eq!(config.normalize_key("Issue report"), "defect report");
    }

    #[test]
    fn aliases_match_whole_words_only() {
        let config = FuzzyConfig::default();
        assert_eq!(config.normalize_key("author"), "author");
        assert_eq!(config.normalize_key("catalog"), "catalog");
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("héllo", "hello"), 1);
    }

    #[test]
    fn similarity_edges() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("a", ""), 0.0);
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "abcx"), 0.75);
    }

    #[test]
    fn threshold_is_inclusive() {
        let config = FuzzyConfig::default();
        let base = "x".repeat(100);
        let at = format!("{}{}", "x".repeat(72), "y".repeat(28));
        let below = format!("{}{}", "x".repeat(71), "y".repeat(29));
        assert_eq!(similarity(&base, &at), 0.72);
        assert!(config.is_similar(&base, &at));
        assert!(!config.is_similar(&base, &below));
    }

    #[test]
    fn overrides_keep_unspecified_fields() {
        let config = FuzzyConfig::from_toml_str("threshold = 0.9\n").unwrap();
        assert!((config.threshold - 0.9).abs() < f64::EPSILON);
        assert!(config.stopwords.contains("and"));

        let config = FuzzyConfig::from_toml_str("[aliases]\nqa = \"quality assurance\"\n").unwrap();
        assert_eq!(config.normalize_key("QA plan"), "quality assurance plan");
        assert_eq!(config.normalize_key("auth"), "auth");
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(FuzzyConfig::from_toml_str("treshold = 0.5").is_err());
    }
}
