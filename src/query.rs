use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// A filtered scan over a table. An empty query selects every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub filter: Option<Filter>,
    /// Upper bound on rows returned per page.
    pub take: Option<usize>,
    /// Property projection; `None` returns all properties.
    pub select: Option<Vec<String>>,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(properties.into_iter().map(Into::into).collect());
        self
    }
}

/// Opaque cursor for resuming a paged scan. Valid for one query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(value: impl Into<String>) -> Self {
        ContinuationToken(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a scan. `continuation_token` is `None` on the last page.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySegment<T> {
    pub results: Vec<T>,
    pub continuation_token: Option<ContinuationToken>,
}

impl<T> QuerySegment<T> {
    pub fn last(results: Vec<T>) -> Self {
        Self {
            results,
            continuation_token: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.continuation_token.is_none()
    }
}
