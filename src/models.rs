use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: i64,
    #[serde(rename = "studentId")]
    pub student_code: String,
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchType {
    #[serde(rename = "ID_Match")]
    IdMatch,
    #[serde(rename = "Name_Match")]
    NameMatch,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::IdMatch => "ID_Match",
            MatchType::NameMatch => "Name_Match",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub status: MatchType,
    #[serde(rename = "date")]
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub id: i64,
    #[serde(rename = "studentId")]
    pub student_code: String,
    pub student_name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub status: String,
    #[serde(rename = "date")]
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub class_name: String,
    pub count: usize,
    pub name_matches: usize,
}
