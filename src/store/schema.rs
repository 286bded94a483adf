//! Canonical-to-wire field mapping for the remote record service.
//!
//! The service exposes each entity as a table with `Id`, `Name`, and
//! `_c`-suffixed columns. Everything above the store speaks canonical
//! camelCase names; this module is the only place the wire schema exists.

use super::{Record, Table};
use serde_json::Value;

pub fn wire_table(table: Table) -> &'static str {
    match table {
        Table::Students => "student_c",
        Table::Classes => "class_c",
        Table::Grades => "grade_c",
        Table::Attendance => "attendance_c",
    }
}

fn field_pairs(table: Table) -> &'static [(&'static str, &'static str)] {
    match table {
        Table::Students => &[
            ("id", "Id"),
            ("firstName", "first_name_c"),
            ("lastName", "last_name_c"),
            ("gradeLevel", "grade_level_c"),
            ("email", "email_c"),
            ("phone", "phone_c"),
            ("status", "status_c"),
            ("enrollmentDate", "enrollment_date_c"),
        ],
        Table::Classes => &[
            ("id", "Id"),
            ("name", "Name"),
            ("subject", "subject_c"),
            ("period", "period_c"),
            ("room", "room_c"),
            ("studentIds", "student_ids_c"),
        ],
        Table::Grades => &[
            ("id", "Id"),
            ("studentId", "student_id_c"),
            ("classId", "class_id_c"),
            ("assignmentName", "assignment_name_c"),
            ("score", "score_c"),
            ("totalPoints", "total_points_c"),
            ("type", "type_c"),
            ("date", "date_c"),
        ],
        Table::Attendance => &[
            ("id", "Id"),
            ("name", "Name"),
            ("studentId", "student_id_c"),
            ("classId", "class_id_c"),
            ("date", "date_c"),
            ("status", "status_c"),
            ("notes", "notes_c"),
        ],
    }
}

pub fn canonical_fields(table: Table) -> Vec<&'static str> {
    field_pairs(table).iter().map(|(c, _)| *c).collect()
}

/// Unknown names pass through unchanged in both directions; the mapping is
/// name translation, never a gate.
pub fn to_wire_field(table: Table, canonical: &str) -> &str {
    field_pairs(table)
        .iter()
        .find(|(c, _)| *c == canonical)
        .map(|(_, w)| *w)
        .unwrap_or(canonical)
}

pub fn to_canonical_field(table: Table, wire: &str) -> &str {
    field_pairs(table)
        .iter()
        .find(|(_, w)| *w == wire)
        .map(|(c, _)| *c)
        .unwrap_or(wire)
}

pub fn record_to_wire(table: Table, record: &Record) -> Record {
    record
        .iter()
        .map(|(k, v)| (to_wire_field(table, k).to_string(), v.clone()))
        .collect()
}

pub fn record_to_canonical(table: Table, wire: &serde_json::Map<String, Value>) -> Record {
    wire.iter()
        .map(|(k, v)| (to_canonical_field(table, k).to_string(), v.clone()))
        .collect()
}
