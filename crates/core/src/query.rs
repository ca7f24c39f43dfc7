//! Parameterized query templates.
//!
//! Templates name their inputs with `{{name}}` placeholders. Binding never
//! splices values into the SQL text: each placeholder becomes a positional
//! `?` and the value travels alongside as a typed [`QueryParam`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::error::{Error, QueryErrorCode, Result};

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("invalid placeholder pattern"));

/// Well-known placeholder for the start of the resolved date range.
pub const START_DATE: &str = "start_date";
/// Well-known placeholder for the end of the resolved date range.
pub const END_DATE: &str = "end_date";

/// A typed query parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryParam {
    Date(NaiveDate),
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Named parameter set supplied at bind time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams(BTreeMap<String, QueryParam>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters carrying only the `start_date`/`end_date` pair.
    pub fn for_range(range: DateRange) -> Self {
        Self::new().with_range(range)
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.0.insert(START_DATE.into(), QueryParam::Date(range.start));
        self.0.insert(END_DATE.into(), QueryParam::Date(range.end));
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: QueryParam) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: QueryParam) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&QueryParam> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A validated query template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueryTemplate {
    sql: String,
    placeholders: Vec<String>,
}

impl QueryTemplate {
    /// Parses a template, rejecting empty text and stray braces.
    pub fn parse(sql: impl Into<String>) -> Result<Self> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(Error::query(
                QueryErrorCode::MalformedTemplate,
                "query template is empty",
            ));
        }

        let stripped = PLACEHOLDER_REGEX.replace_all(&sql, "");
        if stripped.contains("{{") || stripped.contains("}}") {
            return Err(Error::query(
                QueryErrorCode::MalformedTemplate,
                "query template contains a malformed placeholder",
            ));
        }

        let placeholders = PLACEHOLDER_REGEX
            .captures_iter(&sql)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();

        Ok(Self { sql, placeholders })
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Placeholder names in order of appearance (repeats included).
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Whether the template references the date-range placeholders.
    pub fn uses_date_range(&self) -> bool {
        self.placeholders
            .iter()
            .any(|p| p == START_DATE || p == END_DATE)
    }

    /// Replaces each placeholder with `?` and collects values in order.
    pub fn bind(&self, params: &QueryParams) -> Result<BoundQuery> {
        let mut values = Vec::with_capacity(self.placeholders.len());
        for name in &self.placeholders {
            let value = params.get(name).ok_or_else(|| {
                Error::query(
                    QueryErrorCode::MalformedTemplate,
                    format!("placeholder {{{{{name}}}}} has no bound value"),
                )
            })?;
            values.push(value.clone());
        }

        let sql = PLACEHOLDER_REGEX.replace_all(&self.sql, "?").into_owned();
        Ok(BoundQuery {
            sql,
            params: values,
        })
    }
}

impl TryFrom<String> for QueryTemplate {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<QueryTemplate> for String {
    fn from(value: QueryTemplate) -> Self {
        value.sql
    }
}

/// SQL with positional `?` markers and their values, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}
