//! Binding schema fields to a document's native form fields
//!
//! Native field names are usually the label plus a control-type suffix
//! ("Given Name Text Box"). Names are normalized, tokenized and scored
//! against each schema label; schema fields claim their best match greedily
//! in schema order, and a native field is never claimed twice.

use crate::config::MatcherConfig;
use serde::{Deserialize, Serialize};
use shared_types::Schema;
use std::collections::HashSet;

/// Control-type suffixes, longest first so that the most specific one is
/// the one removed.
const CONTROL_SUFFIXES: [&str; 17] = [
    " formatted field",
    " formattedfield",
    " combo box",
    " check box",
    " formatted",
    " text box",
    " combobox",
    " list box",
    " checkbox",
    " textbox",
    " listbox",
    " combo",
    " check",
    " field",
    " text",
    " list",
    " box",
];

/// Schema field `field_id` is filled through native field `native_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeFieldAssignment {
    pub field_id: String,
    pub native_name: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct FieldMatcher {
    threshold: f64,
}

impl Default for FieldMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl FieldMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }

    /// Lowercase and trim, then drop one control-type suffix.
    pub fn normalize_native_name(name: &str) -> String {
        let normalized = name.to_lowercase();
        let normalized = normalized.trim();
        for suffix in CONTROL_SUFFIXES {
            if let Some(stem) = normalized.strip_suffix(suffix) {
                return stem.trim().to_string();
            }
        }
        normalized.to_string()
    }

    /// Lowercase, trim, treat `_` and `-` as spaces and collapse whitespace.
    pub fn normalize_label(label: &str) -> String {
        Self::tokenize(label).join(" ")
    }

    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Similarity of two token lists in `[0, 1]`.
    ///
    /// Each label token found verbatim counts 1. Each label token that
    /// contains or is contained in some native token adds 0.5, capped so the
    /// total never exceeds the label's token count. Identical token lists
    /// always score 1.
    pub fn score(label_tokens: &[String], native_tokens: &[String]) -> f64 {
        if label_tokens.is_empty() || native_tokens.is_empty() {
            return 0.0;
        }

        let exact = label_tokens
            .iter()
            .filter(|t| native_tokens.contains(t))
            .count() as f64;
        let partial = label_tokens
            .iter()
            .filter(|l| {
                native_tokens
                    .iter()
                    .any(|n| n.contains(l.as_str()) || l.contains(n.as_str()))
            })
            .count() as f64
            * 0.5;

        let total = label_tokens.len() as f64;
        if label_tokens == native_tokens {
            return 1.0;
        }
        (exact + partial.min(total - exact)) / total
    }

    /// Greedy 1:1 assignment of schema fields to native field names.
    pub fn match_fields(&self, schema: &Schema, native_names: &[String]) -> Vec<NativeFieldAssignment> {
        let native: Vec<(&str, Vec<String>)> = native_names
            .iter()
            .map(|name| {
                let tokens = Self::tokenize(&Self::normalize_native_name(name));
                (name.as_str(), tokens)
            })
            .collect();

        let mut used: HashSet<&str> = HashSet::new();
        let mut assignments = Vec::new();

        for field in &schema.fields {
            let label_tokens = Self::tokenize(&field.label);
            if label_tokens.is_empty() {
                tracing::debug!("Skipping field {}: no label", field.id);
                continue;
            }

            let mut best: Option<(&str, f64)> = None;
            for &(name, ref tokens) in &native {
                if used.contains(name) || tokens.is_empty() {
                    continue;
                }
                let score = Self::score(&label_tokens, tokens);
                tracing::trace!("'{}' vs native '{}' -> {:.2}", field.id, name, score);
                let best_score = best.map_or(0.0, |(_, s)| s);
                if score > best_score && score >= self.threshold {
                    best = Some((name, score));
                }
            }

            match best {
                Some((name, score)) => {
                    tracing::debug!(
                        "Matched '{}' ('{}') -> '{}' ({:.2})",
                        field.id,
                        field.label,
                        name,
                        score
                    );
                    used.insert(name);
                    assignments.push(NativeFieldAssignment {
                        field_id: field.id.clone(),
                        native_name: name.to_string(),
                        score,
                    });
                }
                None => tracing::debug!("No native match for '{}'", field.id),
            }
        }

        tracing::debug!(
            "Matched {} of {} schema fields to {} native fields",
            assignments.len(),
            schema.fields.len(),
            native_names.len()
        );
        assignments
    }
}
