use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A raw value read from a source adapter before type coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl Cell {
    /// Renders the cell the way it would appear in a spreadsheet field.
    pub fn as_display(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Integer(i) => Some(i.to_string()),
            Cell::Float(f) => {
                if f.fract() == 0.0 {
                    Some(format!("{f:.1}"))
                } else {
                    Some(f.to_string())
                }
            }
            Cell::Boolean(b) => Some(b.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => is_null_token(s),
            _ => false,
        }
    }

    /// Builds a cell from free text, folding null-like sentinels into `Null`.
    pub fn from_text(value: &str) -> Cell {
        if is_null_token(value) {
            Cell::Null
        } else {
            Cell::Text(value.trim().to_string())
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display().unwrap_or_default())
    }
}

/// Semantic column types assigned by inference and carried by schemas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Integer,
    Float,
    Boolean,
    DateTime,
    String,
    Text,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::DateTime => "datetime",
            SemanticType::String => "string",
            SemanticType::Text => "text",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(SemanticType::Integer),
            "float" | "double" => Ok(SemanticType::Float),
            "boolean" | "bool" => Ok(SemanticType::Boolean),
            "datetime" | "date" | "timestamp" => Ok(SemanticType::DateTime),
            "string" => Ok(SemanticType::String),
            "text" => Ok(SemanticType::Text),
            other => Err(anyhow!("Unknown semantic type '{other}'")),
        }
    }
}

const NULL_TOKENS: &[&str] = &["null", "none", "n/a", "#n/a", "nan"];

/// True for empty strings and the placeholder spellings spreadsheets use
/// for missing data.
pub fn is_null_token(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || NULL_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str())
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = parse_naive_date(value) {
        return date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Date '{value}' has no midnight representation"));
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// A cell coerced against the column's inferred type, ready to bind as a
/// SQL parameter. Unparsable values degrade to `Null` rather than erroring.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl SqlParam {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlParam::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlParam::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SqlParam::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqlParam::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlParam::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

pub fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Coerces a raw cell against the inferred column type. Null-like values
/// and values that fail to parse both normalize to `SqlParam::Null`.
pub fn coerce_for_insert(cell: &Cell, ty: SemanticType) -> SqlParam {
    if cell.is_null() {
        return SqlParam::Null;
    }
    match ty {
        SemanticType::Integer => match cell {
            Cell::Integer(i) => SqlParam::Integer(*i),
            Cell::Float(f) if f.fract() == 0.0 => SqlParam::Integer(*f as i64),
            Cell::Boolean(b) => SqlParam::Integer(i64::from(*b)),
            Cell::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlParam::Integer)
                .unwrap_or(SqlParam::Null),
            _ => SqlParam::Null,
        },
        SemanticType::Float => match cell {
            Cell::Integer(i) => SqlParam::Float(*i as f64),
            Cell::Float(f) => SqlParam::Float(*f),
            Cell::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(SqlParam::Float)
                .unwrap_or(SqlParam::Null),
            _ => SqlParam::Null,
        },
        SemanticType::Boolean => match cell {
            Cell::Boolean(b) => SqlParam::Boolean(*b),
            Cell::Integer(0) => SqlParam::Boolean(false),
            Cell::Integer(1) => SqlParam::Boolean(true),
            Cell::Text(s) => parse_boolean_token(s)
                .map(SqlParam::Boolean)
                .unwrap_or(SqlParam::Null),
            _ => SqlParam::Null,
        },
        SemanticType::DateTime => match cell {
            Cell::Text(s) => parse_naive_datetime(s.trim())
                .map(SqlParam::DateTime)
                .unwrap_or(SqlParam::Null),
            _ => SqlParam::Null,
        },
        SemanticType::String | SemanticType::Text => match cell.as_display() {
            Some(s) => SqlParam::Text(s),
            None => SqlParam::Null,
        },
    }
}
