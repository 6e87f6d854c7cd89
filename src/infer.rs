//! Semantic type inference over a sampled chunk of rows.
//!
//! Inference is deterministic and side-effect free: every non-null value in
//! a column is tested against a set of candidate types, candidates are
//! eliminated as soon as a value fails their parse, and the surviving
//! candidate with the highest priority wins. Priority order is boolean,
//! integer, float, datetime, then string (upgraded to text when any value
//! exceeds [`TEXT_THRESHOLD`] characters).
//!
//! A column holding only `"0"`/`"1"` classifies as boolean: the boolean
//! candidate additionally requires at most four distinct values, and when
//! it survives it outranks integer.

use std::collections::{BTreeMap, HashSet};

use crate::data::{Cell, SemanticType, parse_naive_date, parse_naive_datetime};

pub const TEXT_THRESHOLD: usize = 255;

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "1", "0", "yes", "no", "y", "n"];
const BOOLEAN_DISTINCT_LIMIT: usize = 4;

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_boolean: bool,
    possible_integer: bool,
    possible_float: bool,
    possible_datetime: bool,
    distinct_tokens: HashSet<String>,
    max_length: usize,
    evidence: usize,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_boolean: true,
            possible_integer: true,
            possible_float: true,
            possible_datetime: true,
            distinct_tokens: HashSet::new(),
            max_length: 0,
            evidence: 0,
        }
    }

    fn observe(&mut self, value: &str) {
        self.evidence += 1;
        self.max_length = self.max_length.max(value.chars().count());

        let lowered = value.to_ascii_lowercase();
        if self.possible_boolean {
            if BOOLEAN_TOKENS.contains(&lowered.as_str()) {
                if self.distinct_tokens.len() <= BOOLEAN_DISTINCT_LIMIT {
                    self.distinct_tokens.insert(lowered);
                }
            } else {
                self.possible_boolean = false;
            }
        }
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && value.parse::<f64>().is_err() {
            self.possible_float = false;
        }
        if self.possible_datetime
            && parse_naive_date(value).is_err()
            && parse_naive_datetime(value).is_err()
        {
            self.possible_datetime = false;
        }
    }

    fn decide(&self) -> SemanticType {
        if self.evidence == 0 {
            return SemanticType::String;
        }
        if self.possible_boolean && self.distinct_tokens.len() <= BOOLEAN_DISTINCT_LIMIT {
            SemanticType::Boolean
        } else if self.possible_integer {
            SemanticType::Integer
        } else if self.possible_float {
            SemanticType::Float
        } else if self.possible_datetime {
            SemanticType::DateTime
        } else if self.max_length > TEXT_THRESHOLD {
            SemanticType::Text
        } else {
            SemanticType::String
        }
    }
}

/// Infers a semantic type for every column from the sample rows. Rows are
/// positional; `columns` supplies the name for each position. Malformed or
/// null values never fail inference, they simply contribute no evidence.
pub fn infer_types(columns: &[String], rows: &[Vec<Cell>]) -> BTreeMap<String, SemanticType> {
    let mut candidates = vec![TypeCandidate::new(); columns.len()];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(candidates.len()) {
            if cell.is_null() {
                continue;
            }
            if let Some(text) = cell.as_display() {
                candidates[idx].observe(text.trim());
            }
        }
    }

    columns
        .iter()
        .zip(candidates.iter())
        .map(|(name, candidate)| (name.clone(), candidate.decide()))
        .collect()
}
