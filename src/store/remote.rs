//! HTTP backend for the external record service.
//!
//! One POST per operation, envelope in / envelope out. Auth is passthrough:
//! the project id and public key from the environment ride along as headers
//! on every request. There is no retry and no backoff; the first
//! human-readable message from a failed call is surfaced as-is.

use super::schema;
use super::{Filter, Query, Record, RecordStore, SortDir, StoreError, Table};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const DEFAULT_API_URL: &str = "https://records.classtrack.app";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub project_id: String,
    pub public_key: String,
}

impl RemoteConfig {
    /// `None` when the credentials are absent; the caller falls back to the
    /// in-memory store.
    pub fn from_env() -> Option<Self> {
        let project_id = std::env::var("CLASSTRACK_PROJECT_ID").ok()?;
        let public_key = std::env::var("CLASSTRACK_PUBLIC_KEY").ok()?;
        if project_id.trim().is_empty() || public_key.trim().is_empty() {
            return None;
        }
        let base_url = std::env::var("CLASSTRACK_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Some(RemoteConfig {
            base_url,
            project_id,
            public_key,
        })
    }
}

pub struct RemoteStore {
    http: reqwest::blocking::Client,
    config: RemoteConfig,
    /// Per-natural-key writer serialization for `upsert_by_key`. The service
    /// has no uniqueness constraint on composite keys, so the lookup and the
    /// write must not interleave between callers of this handle.
    write_locks: Mutex<HashMap<(Table, String), Arc<Mutex<()>>>>,
}

#[derive(Debug, Deserialize)]
struct FetchEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GetEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MutationEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<MutationResult>,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

fn service_error(message: Option<String>) -> StoreError {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "record store request failed".to_string());
    if message.to_ascii_lowercase().contains("not found") {
        StoreError::NotFound(message)
    } else {
        StoreError::Failure(message)
    }
}

fn field_selection(table: Table, fields: &[String]) -> Vec<Value> {
    let names: Vec<&str> = if fields.is_empty() {
        schema::canonical_fields(table)
    } else {
        fields.iter().map(String::as_str).collect()
    };
    names
        .into_iter()
        .map(|f| json!({ "field": { "Name": schema::to_wire_field(table, f) } }))
        .collect()
}

fn fetch_body(table: Table, query: &Query) -> Value {
    let mut body = json!({ "fields": field_selection(table, &query.fields) });

    if !query.filters.is_empty() {
        let clauses: Vec<Value> = query
            .filters
            .iter()
            .map(|f| {
                let (field, operator, value) = match f {
                    Filter::EqualTo(field, v) => (field, "EqualTo", v),
                    Filter::GreaterThanOrEqualTo(field, v) => (field, "GreaterThanOrEqualTo", v),
                    Filter::LessThanOrEqualTo(field, v) => (field, "LessThanOrEqualTo", v),
                };
                json!({
                    "FieldName": schema::to_wire_field(table, field),
                    "Operator": operator,
                    "Values": [value],
                    "Include": true
                })
            })
            .collect();
        body["where"] = Value::Array(clauses);
    }

    if let Some((field, dir)) = &query.order_by {
        let sorttype = match dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        body["orderBy"] = json!([{
            "fieldName": schema::to_wire_field(table, field),
            "sorttype": sorttype
        }]);
    }

    if query.limit.is_some() || query.offset > 0 {
        body["pagingInfo"] = json!({
            "limit": query.limit,
            "offset": query.offset
        });
    }

    body
}

fn canonical_row(table: Table, row: Value) -> Record {
    match row {
        Value::Object(map) => schema::record_to_canonical(table, &map),
        _ => Record::new(),
    }
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder().build()?;
        Ok(RemoteStore {
            http,
            config,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    fn post<T: serde::de::DeserializeOwned>(
        &self,
        table: Table,
        op: &str,
        body: &Value,
    ) -> Result<T, StoreError> {
        let url = format!(
            "{}/records/{}/{}",
            self.config.base_url,
            schema::wire_table(table),
            op
        );
        let response = self
            .http
            .post(&url)
            .header("X-Project-Id", &self.config.project_id)
            .header("X-Public-Key", &self.config.public_key)
            .json(body)
            .send()
            .map_err(|e| StoreError::Failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(service_error(Some(if message.trim().is_empty() {
                format!("record store returned HTTP {}", status)
            } else {
                message
            })));
        }
        response
            .json::<T>()
            .map_err(|e| StoreError::Failure(format!("record store response decode: {}", e)))
    }

    fn write_lock_cell(&self, table: Table, key: &[(String, Value)]) -> Arc<Mutex<()>> {
        let key_repr = key
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect::<Vec<_>>()
            .join("&");
        let mut locks = match self.write_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry((table, key_repr))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl RecordStore for RemoteStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    fn fetch(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError> {
        let envelope: FetchEnvelope = self.post(table, "fetch", &fetch_body(table, query))?;
        if !envelope.success {
            return Err(service_error(envelope.message));
        }
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|row| canonical_row(table, row))
            .collect())
    }

    fn get_by_id(&self, table: Table, id: i64) -> Result<Record, StoreError> {
        let body = json!({
            "RecordId": id,
            "fields": field_selection(table, &[])
        });
        let envelope: GetEnvelope = self.post(table, "get", &body)?;
        if !envelope.success {
            return Err(service_error(envelope.message));
        }
        match envelope.data {
            Some(row) => Ok(canonical_row(table, row)),
            None => Err(StoreError::not_found(table, id)),
        }
    }

    fn create(&self, table: Table, fields: Record) -> Result<Record, StoreError> {
        let body = json!({ "records": [schema::record_to_wire(table, &fields)] });
        let envelope: MutationEnvelope = self.post(table, "create", &body)?;
        if !envelope.success {
            return Err(service_error(envelope.message));
        }
        let Some(result) = envelope.results.into_iter().next() else {
            return Err(StoreError::Failure(
                "record store returned no result for create".to_string(),
            ));
        };
        if !result.success {
            return Err(service_error(result.message));
        }
        match result.data {
            Some(row) => Ok(canonical_row(table, row)),
            None => Err(StoreError::Failure(
                "record store returned no record for create".to_string(),
            )),
        }
    }

    fn update(&self, table: Table, id: i64, fields: Record) -> Result<Record, StoreError> {
        let mut wire = schema::record_to_wire(table, &fields);
        wire.insert("Id".to_string(), Value::from(id));
        let body = json!({ "records": [wire] });
        let envelope: MutationEnvelope = self.post(table, "update", &body)?;
        if !envelope.success {
            return Err(service_error(envelope.message));
        }
        let Some(result) = envelope.results.into_iter().next() else {
            return Err(StoreError::not_found(table, id));
        };
        if !result.success {
            return Err(service_error(result.message));
        }
        match result.data {
            Some(row) => Ok(canonical_row(table, row)),
            None => Err(StoreError::not_found(table, id)),
        }
    }

    fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError> {
        let body = json!({ "RecordIds": [id] });
        let envelope: MutationEnvelope = self.post(table, "delete", &body)?;
        if !envelope.success {
            return Err(service_error(envelope.message));
        }
        Ok(envelope
            .results
            .first()
            .map(|r| r.success)
            .unwrap_or(false))
    }

    fn upsert_by_key(
        &self,
        table: Table,
        key: &[(String, Value)],
        on_insert: Record,
        on_update: Record,
    ) -> Result<Record, StoreError> {
        if key.is_empty() {
            return Err(StoreError::Validation(
                "upsert requires at least one key field".to_string(),
            ));
        }
        let cell = self.write_lock_cell(table, key);
        let _serialized = match cell.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut query = Query::all().select(["id"]);
        for (field, value) in key {
            query = query.filter(Filter::EqualTo(field.clone(), value.clone()));
        }
        let existing = self.fetch(table, &query)?;
        match existing.first().and_then(|r| r.get("id")).and_then(Value::as_i64) {
            Some(id) => self.update(table, id, on_update),
            None => self.create(table, on_insert),
        }
    }
}
