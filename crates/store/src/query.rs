//! List queries and their results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Equality conditions ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FilterValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    BigInt(i64),
    Double(f64),
    Boolean(bool),
    Null,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, FilterValue)] {
        &self.conditions
    }

    /// Build from a JSON object of scalar equality conditions. Non-scalar
    /// values are refused so nothing silently turns into SQL.
    pub fn from_object(object: &serde_json::Map<String, Value>) -> Result<Self, String> {
        let mut filter = Self::new();
        for (column, value) in object {
            let value = match value {
                Value::String(s) => FilterValue::Text(s.clone()),
                Value::Bool(b) => FilterValue::Boolean(*b),
                Value::Null => FilterValue::Null,
                Value::Number(n) => match n.as_i64() {
                    Some(i) => FilterValue::BigInt(i),
                    None => FilterValue::Double(n.as_f64().unwrap_or_default()),
                },
                _ => return Err(format!("filter `{column}` must be a scalar")),
            };
            filter.conditions.push((column.clone(), value));
        }
        Ok(filter)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::BigInt(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl FilterValue {
    pub fn as_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::BigInt(i) => Value::from(*i),
            Self::Double(d) => Value::from(*d),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: Direction::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: Direction::Desc }
    }
}

/// Everything a list endpoint accepts: equality filter, optional pagination,
/// optional sort, optional substring search over the entity's text columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<Sort>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    /// Pagination window, only when both page and limit are present and
    /// positive. Page numbering starts at 1.
    pub fn window(&self) -> Option<(u32, u32)> {
        match (self.page, self.limit) {
            (Some(page), Some(limit)) if page > 0 && limit > 0 => Some((page, limit)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        Self { total, page, total_pages }
    }
}

/// A page (or the entirety) of matching records.
///
/// `meta` is present exactly when the query asked for a pagination window;
/// it serializes flattened so the wire shape is `{data, total, page,
/// totalPages}` or plain `{data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<E> {
    pub data: Vec<E>,
    #[serde(flatten)]
    pub meta: Option<PageMeta>,
}

impl<E> Listing<E> {
    pub fn full(data: Vec<E>) -> Self {
        Self { data, meta: None }
    }

    pub fn paged(data: Vec<E>, total: u64, page: u32, limit: u32) -> Self {
        Self {
            data,
            meta: Some(PageMeta::new(total, page, limit)),
        }
    }
}
