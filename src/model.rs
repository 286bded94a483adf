use serde::{Deserialize, Serialize};

/// Canonical entity shapes. The remote record service speaks a suffixed
/// field schema (`first_name_c`, `status_c`, ...); that mapping lives in
/// `store::schema` and never leaks past the store boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeType {
    Test,
    Quiz,
    Assignment,
    Project,
    Homework,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: i64,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub status: StudentStatus,
    pub enrollment_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSection {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub period: i64,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub student_ids: Vec<i64>,
}

/// At most one record exists per (student_id, class_id, date); the store's
/// `upsert_by_key` is the only write path that creates these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub student_id: i64,
    pub class_id: i64,
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub assignment_name: String,
    pub score: f64,
    pub total_points: f64,
    #[serde(rename = "type")]
    pub kind: GradeType,
    pub date: String,
}
