use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Comparison operators understood by the storage layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    /// Query-string suffix, e.g. `tuition[lte]=1000`
    pub fn suffix(&self) -> &'static str {
        match self {
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
        }
    }

    /// Key used inside a rewritten filter object
    pub fn key(&self) -> &'static str {
        match self {
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::In => "$in",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.suffix() == suffix)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.key() == key)
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::In => "IN",
        }
    }

    pub const ALL: [FilterOp; 5] = [FilterOp::Gt, FilterOp::Gte, FilterOp::Lt, FilterOp::Lte, FilterOp::In];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Fields returned per record. Identity is always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Fields(Vec<String>),
}

/// Limits applied when page/limit directives are missing or oversized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub default_limit: u64,
    pub max_limit: Option<u64>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self { default_limit: 25, max_limit: None }
    }
}

/// Resolved filter/projection/sort/pagination for a single read
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub filter: Map<String, Value>,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub page: u64,
    pub limit: u64,
}

impl QueryPlan {
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// One page of results plus the metadata needed to navigate
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub items: Vec<Value>,
    pub total: u64,
    pub pagination: Pagination,
}

/// Bind parameter produced by SQL generation
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    TextList(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}
