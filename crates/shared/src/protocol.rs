use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::UserId;

/// Header carrying the session token on every table request.
pub const AUTH_HEADER: &str = "x-zumo-auth";
/// Query parameter carrying an encoded [`Predicate`].
pub const FILTER_PARAM: &str = "$filter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

impl FilterOp {
    fn keyword(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(value) => write!(f, "{value}"),
            FilterValue::Int(value) => write!(f, "{value}"),
            FilterValue::Text(value) => write!(f, "'{}'", value.replace('\'', "''")),
        }
    }
}

/// Equality or inequality test against one scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredicateParseError {
    #[error("filter is empty")]
    Empty,
    #[error("invalid field name '{0}'")]
    InvalidField(String),
    #[error("unsupported operator '{0}'; expected eq or ne")]
    UnsupportedOperator(String),
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Ne,
            value: value.into(),
        }
    }

    /// Encodes as `(field op literal)`.
    pub fn to_filter(&self) -> String {
        format!("({} {} {})", self.field, self.op.keyword(), self.value)
    }

    pub fn parse(raw: &str) -> Result<Self, PredicateParseError> {
        let mut body = raw.trim();
        if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            body = inner.trim();
        }
        if body.is_empty() {
            return Err(PredicateParseError::Empty);
        }

        let (field, rest) = body
            .split_once(char::is_whitespace)
            .ok_or_else(|| PredicateParseError::InvalidLiteral(body.to_string()))?;
        if !is_valid_field(field) {
            return Err(PredicateParseError::InvalidField(field.to_string()));
        }

        let rest = rest.trim_start();
        let (op, literal) = rest
            .split_once(char::is_whitespace)
            .ok_or_else(|| PredicateParseError::InvalidLiteral(rest.to_string()))?;
        let op = match op {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            other => return Err(PredicateParseError::UnsupportedOperator(other.to_string())),
        };

        Ok(Self {
            field: field.to_string(),
            op,
            value: parse_literal(literal.trim())?,
        })
    }

    /// Evaluates against a JSON object. A missing field equals nothing.
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        let equal = match (record.get(&self.field), &self.value) {
            (Some(serde_json::Value::Bool(actual)), FilterValue::Bool(expected)) => {
                actual == expected
            }
            (Some(serde_json::Value::Number(actual)), FilterValue::Int(expected)) => {
                actual.as_i64() == Some(*expected)
            }
            (Some(serde_json::Value::String(actual)), FilterValue::Text(expected)) => {
                actual == expected
            }
            _ => false,
        };
        match self.op {
            FilterOp::Eq => equal,
            FilterOp::Ne => !equal,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filter())
    }
}

fn is_valid_field(field: &str) -> bool {
    let mut chars = field.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_literal(literal: &str) -> Result<FilterValue, PredicateParseError> {
    match literal {
        "true" => return Ok(FilterValue::Bool(true)),
        "false" => return Ok(FilterValue::Bool(false)),
        _ => {}
    }

    if let Some(quoted) = literal
        .strip_prefix('\'')
        .and_then(|l| l.strip_suffix('\''))
    {
        if quoted.replace("''", "").contains('\'') {
            return Err(PredicateParseError::InvalidLiteral(literal.to_string()));
        }
        return Ok(FilterValue::Text(quoted.replace("''", "'")));
    }

    literal
        .parse::<i64>()
        .map(FilterValue::Int)
        .map_err(|_| PredicateParseError::InvalidLiteral(literal.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: LoginUser,
    pub authentication_token: String,
}
