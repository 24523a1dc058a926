//! Fuzzy grouping of labelled entries.

use super::normalize::{FuzzyConfig, similarity};

/// Accumulators keyed by normalized label, matched fuzzily.
///
/// A key joins an existing group when it equals that group's key, or
/// otherwise when it is at least `threshold` similar to it; the most similar
/// group wins and ties go to the older group. Empty keys share one
/// "unspecified" group that never takes part in fuzzy matching.
pub struct FuzzyGroups<'c, T> {
    config: &'c FuzzyConfig,
    keys: Vec<String>,
    groups: Vec<T>,
}

impl<'c, T> FuzzyGroups<'c, T> {
    pub fn new(config: &'c FuzzyConfig) -> Self {
        Self {
            config,
            keys: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn find(&self, key: &str) -> Option<usize> {
        if let Some(exact) = self.keys.iter().position(|k| k == key) {
            return Some(exact);
        }
        if key.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, existing) in self.keys.iter().enumerate() {
            if existing.is_empty() {
                continue;
            }
            let score = similarity(existing, key);
            if score >= self.config.threshold && best.is_none_or(|(_, s)| score > s) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    /// The group for `key`, created with `init` if nothing matches.
    pub fn entry(&mut self, key: &str, init: impl FnOnce() -> T) -> &mut T {
        let index = match self.find(key) {
            Some(index) => index,
            None => {
                self.keys.push(key.to_string());
                self.groups.push(init());
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in creation order.
    pub fn into_groups(self) -> Vec<T> {
        self.groups
    }
}

/// Distinct trimmed lines, in first-seen order, rendered as a bullet list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bullets(Vec<String>);

impl Bullets {
    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if !line.is_empty() && !self.0.iter().any(|l| l == line) {
            self.0.push(line.to_string());
        }
    }

    /// `- a\n- b`; empty when nothing was added.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
