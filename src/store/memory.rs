//! In-memory record store.
//!
//! Stands in for the remote record service when no credentials are
//! configured, and backs the test suite. Semantics mirror the service:
//! ids are assigned as `max + 1`, filters AND together, ordering is a
//! stable sort over the insertion order.

use super::{Filter, Query, Record, RecordStore, SortDir, StoreError, Table};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Mutex;

#[derive(Default)]
struct Shelves {
    students: Vec<Record>,
    classes: Vec<Record>,
    grades: Vec<Record>,
    attendance: Vec<Record>,
}

impl Shelves {
    fn table(&self, table: Table) -> &Vec<Record> {
        match table {
            Table::Students => &self.students,
            Table::Classes => &self.classes,
            Table::Grades => &self.grades,
            Table::Attendance => &self.attendance,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut Vec<Record> {
        match table {
            Table::Students => &mut self.students,
            Table::Classes => &mut self.classes,
            Table::Grades => &mut self.grades,
            Table::Attendance => &mut self.attendance,
        }
    }
}

pub struct MemoryStore {
    inner: Mutex<Shelves>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Shelves::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Shelves>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Failure("record store lock poisoned".to_string()))
    }
}

fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

fn next_id(records: &[Record]) -> i64 {
    records.iter().filter_map(record_id).max().unwrap_or(0) + 1
}

/// Ordering across JSON values of the same kind; mixed kinds do not order.
fn value_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64()?, y.as_f64()?);
            x.partial_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => value_cmp(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn matches(record: &Record, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let holds = |field: &str, op: &dyn Fn(&Value) -> bool| {
            record.get(field).map(op).unwrap_or(false)
        };
        match filter {
            Filter::EqualTo(field, want) => holds(field, &|v| value_eq(v, want)),
            Filter::GreaterThanOrEqualTo(field, want) => holds(field, &|v| {
                matches!(value_cmp(v, want), Some(Ordering::Greater | Ordering::Equal))
            }),
            Filter::LessThanOrEqualTo(field, want) => holds(field, &|v| {
                matches!(value_cmp(v, want), Some(Ordering::Less | Ordering::Equal))
            }),
        }
    })
}

fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    fields
        .iter()
        .filter_map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

fn merge(into: &mut Record, fields: &Record) {
    for (k, v) in fields {
        if k == "id" {
            continue;
        }
        into.insert(k.clone(), v.clone());
    }
}

impl RecordStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn fetch(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError> {
        let shelves = self.lock()?;
        let mut rows: Vec<Record> = shelves
            .table(table)
            .iter()
            .filter(|r| matches(r, &query.filters))
            .cloned()
            .collect();

        if let Some((field, dir)) = &query.order_by {
            // Stable, so rows without a comparable value keep store order.
            rows.sort_by(|a, b| {
                let ord = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => value_cmp(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            });
        }

        let rows: Vec<Record> = rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|r| project(&r, &query.fields))
            .collect();
        Ok(rows)
    }

    fn get_by_id(&self, table: Table, id: i64) -> Result<Record, StoreError> {
        let shelves = self.lock()?;
        shelves
            .table(table)
            .iter()
            .find(|r| record_id(r) == Some(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    fn create(&self, table: Table, fields: Record) -> Result<Record, StoreError> {
        let mut shelves = self.lock()?;
        let records = shelves.table_mut(table);
        let mut record = Record::new();
        record.insert("id".to_string(), Value::from(next_id(records)));
        merge(&mut record, &fields);
        records.push(record.clone());
        Ok(record)
    }

    fn update(&self, table: Table, id: i64, fields: Record) -> Result<Record, StoreError> {
        let mut shelves = self.lock()?;
        let records = shelves.table_mut(table);
        let Some(record) = records.iter_mut().find(|r| record_id(r) == Some(id)) else {
            return Err(StoreError::not_found(table, id));
        };
        merge(record, &fields);
        Ok(record.clone())
    }

    fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError> {
        let mut shelves = self.lock()?;
        let records = shelves.table_mut(table);
        let Some(pos) = records.iter().position(|r| record_id(r) == Some(id)) else {
            return Err(StoreError::not_found(table, id));
        };
        records.remove(pos);
        Ok(true)
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
        // One guard across the lookup and the write, so the at-most-one
        // record invariant holds for every caller of this handle.
        let mut shelves = self.lock()?;
        let records = shelves.table_mut(table);
        let filters: Vec<Filter> = key
            .iter()
            .map(|(field, value)| Filter::EqualTo(field.clone(), value.clone()))
            .collect();

        if let Some(record) = records.iter_mut().find(|r| matches(r, &filters)) {
            merge(record, &on_update);
            return Ok(record.clone());
        }

        let mut record = Record::new();
        record.insert("id".to_string(), Value::from(next_id(records)));
        merge(&mut record, &on_insert);
        records.push(record.clone());
        Ok(record)
    }
}
