//! Filter expressions for table scans.
//!
//! Filters are built as a small AST, rendered to the store's OData-style
//! filter syntax (`PartitionKey eq 'users' and (Age ge 18)`), parsed back
//! from that syntax, and evaluated against rows by in-process stores.

mod parser;

use std::fmt;

use chrono::SecondsFormat;

use crate::row::{RowProperty, TableRow};

pub use parser::FilterParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Ge => "ge",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Le => "le",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "eq" => Some(ComparisonOp::Eq),
            "ne" => Some(ComparisonOp::Ne),
            "gt" => Some(ComparisonOp::Gt),
            "ge" => Some(ComparisonOp::Ge),
            "lt" => Some(ComparisonOp::Lt),
            "le" => Some(ComparisonOp::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        property: String,
        op: ComparisonOp,
        value: RowProperty,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(property: impl Into<String>, op: ComparisonOp, value: impl Into<RowProperty>) -> Self {
        Filter::Compare {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<RowProperty>) -> Self {
        Self::compare(property, ComparisonOp::Eq, value)
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// AND-conjunction of all filters, left to right. `None` when empty.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
        filters.into_iter().reduce(Filter::and)
    }

    pub fn parse(input: &str) -> Result<Filter, FilterParseError> {
        parser::parse(input)
    }

    /// Evaluates the filter against a row. Comparisons against a missing
    /// property, or between incompatible types, are false.
    pub fn matches(&self, row: &TableRow) -> bool {
        match self {
            Filter::Compare {
                property,
                op,
                value,
            } => {
                let Some(actual) = row.property(property) else {
                    return false;
                };
                let Some(ordering) = actual.partial_cmp_value(value) else {
                    return false;
                };
                match op {
                    ComparisonOp::Eq => ordering.is_eq(),
                    ComparisonOp::Ne => ordering.is_ne(),
                    ComparisonOp::Gt => ordering.is_gt(),
                    ComparisonOp::Ge => ordering.is_ge(),
                    ComparisonOp::Lt => ordering.is_lt(),
                    ComparisonOp::Le => ordering.is_le(),
                }
            }
            Filter::And(left, right) => left.matches(row) && right.matches(row),
            Filter::Or(left, right) => left.matches(row) || right.matches(row),
            Filter::Not(inner) => !inner.matches(row),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare {
                property,
                op,
                value,
            } => write!(f, "{} {} {}", property, op.as_str(), Literal(value)),
            Filter::And(left, right) => write!(f, "({}) and ({})", left, right),
            Filter::Or(left, right) => write!(f, "({}) or ({})", left, right),
            Filter::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

/// Renders a property value as a filter literal.
struct Literal<'a>(&'a RowProperty);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            RowProperty::String(value) => write!(f, "'{}'", value.replace('\'', "''")),
            RowProperty::Boolean(value) => write!(f, "{}", value),
            RowProperty::Int32(value) => write!(f, "{}", value),
            RowProperty::Int64(value) => write!(f, "{}L", value),
            RowProperty::Double(value) if value.is_nan() => f.write_str("NaN"),
            RowProperty::Double(value) if value.is_infinite() => {
                f.write_str(if *value > 0.0 { "INF" } else { "-INF" })
            }
            RowProperty::Double(value) => write!(f, "{:?}", value),
            RowProperty::DateTime(value) => write!(
                f,
                "datetime'{}'",
                value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ),
            RowProperty::Guid(value) => write!(f, "guid'{}'", value),
            RowProperty::Binary(bytes) => {
                f.write_str("X'")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                f.write_str("'")
            }
        }
    }
}

/// Renders a single comparison clause, e.g. `Name eq 'Ada'`.
pub fn generate_filter_condition(
    property: &str,
    op: ComparisonOp,
    value: impl Into<RowProperty>,
) -> String {
    Filter::compare(property, op, value).to_string()
}

/// Joins two rendered filters, e.g. `(a) and (b)`.
pub fn combine_filters(left: &str, op: LogicalOp, right: &str) -> String {
    format!("({}) {} ({})", left, op.as_str(), right)
}
