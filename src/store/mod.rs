pub mod memory;
pub mod remote;
mod schema;

use serde_json::Value;
use thiserror::Error;

/// A record as the rest of the daemon sees it: a JSON object keyed by
/// canonical (camelCase) field names, with `id` assigned by the store.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Students,
    Classes,
    Grades,
    Attendance,
}

impl Table {
    pub fn entity_label(self) -> &'static str {
        match self {
            Table::Students => "Student",
            Table::Classes => "Class",
            Table::Grades => "Grade",
            Table::Attendance => "Attendance record",
        }
    }
}

/// Uniform failure surface for every backend. NotFound is a missing Id,
/// Validation never reached the wire, Failure is the transport or the
/// service itself reporting an error. Nothing here is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Failure(String),
}

impl StoreError {
    pub fn not_found(table: Table, id: i64) -> Self {
        StoreError::NotFound(format!("{} with Id {} not found", table.entity_label(), id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// One filter predicate; a query's filters are ANDed together. Field names
/// are canonical; backends translate as needed.
#[derive(Debug, Clone)]
pub enum Filter {
    EqualTo(String, Value),
    GreaterThanOrEqualTo(String, Value),
    LessThanOrEqualTo(String, Value),
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Field-selection list; empty selects every field.
    pub fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortDir)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn all() -> Self {
        Query::default()
    }

    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.order_by = Some((field.into(), dir));
        self
    }
}

/// The record store boundary. One handle per process, owned by the
/// composition root and injected into `AppState`; business logic never
/// branches on which backend is behind it.
pub trait RecordStore: Send {
    fn backend_name(&self) -> &'static str;

    fn fetch(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError>;

    fn get_by_id(&self, table: Table, id: i64) -> Result<Record, StoreError>;

    /// Creates a record; the store assigns the Id.
    fn create(&self, table: Table, fields: Record) -> Result<Record, StoreError>;

    /// Partial update by Id; absent fields keep their stored values.
    fn update(&self, table: Table, id: i64, fields: Record) -> Result<Record, StoreError>;

    fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError>;

    /// Insert-or-update by natural key. If a record matching every `key`
    /// pair exists, only `on_update` is applied to it; otherwise a record is
    /// created from `on_insert`. Backends guarantee that two sequential
    /// calls for one key never produce a second record, and that concurrent
    /// callers within this process are serialized per key.
    fn upsert_by_key(
        &self,
        table: Table,
        key: &[(String, Value)],
        on_insert: Record,
        on_update: Record,
    ) -> Result<Record, StoreError>;
}

/// Picks the backend from the environment: remote when the record-service
/// credentials are configured, otherwise the in-memory store.
pub fn from_env() -> anyhow::Result<Box<dyn RecordStore>> {
    match remote::RemoteConfig::from_env() {
        Some(config) => Ok(Box::new(remote::RemoteStore::new(config)?)),
        None => Ok(Box::new(memory::MemoryStore::new())),
    }
}
