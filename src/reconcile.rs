use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{de_id, de_opt_id, Student};

/// One row of assessment marks for a (student, subject, term, year) tuple.
/// Score fields left as `None` have not been assessed yet; that is not the
/// same as a score of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub student_id: Option<String>,
    #[serde(deserialize_with = "de_id")]
    pub subject_id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub term_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub academic_year_id: Option<String>,
    #[serde(default)]
    pub homework: Option<f64>,
    #[serde(default)]
    pub bot: Option<f64>,
    #[serde(default)]
    pub midterm: Option<f64>,
    #[serde(default)]
    pub eot: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    /// Display name of the user who recorded the mark.
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Every place a caller may have attached marks. Built once at the request
/// boundary; the computation core never looks at raw payload shapes.
#[derive(Debug, Clone, Default)]
pub struct MarkSources {
    pub direct: Vec<MarkRecord>,
    pub report: Vec<MarkRecord>,
    pub class: Vec<MarkRecord>,
    pub request: Vec<MarkRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSource {
    Direct,
    Report,
    Class,
    Request,
    None,
}

impl MarkSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkSource::Direct => "student",
            MarkSource::Report => "report",
            MarkSource::Class => "class",
            MarkSource::Request => "request",
            MarkSource::None => "none",
        }
    }
}

fn belongs_to(record: &MarkRecord, student_id: &str) -> bool {
    record.student_id.as_deref() == Some(student_id)
}

/// Pick the authoritative mark list for `student` in fixed priority order:
/// direct attachment, report wrapper, class-level list (filtered to this
/// student), then the request's top-level list.
pub fn select_source<'a>(
    student_id: &str,
    sources: &'a MarkSources,
) -> (MarkSource, Vec<&'a MarkRecord>) {
    if !sources.direct.is_empty() {
        return (MarkSource::Direct, sources.direct.iter().collect());
    }
    if !sources.report.is_empty() {
        return (MarkSource::Report, sources.report.iter().collect());
    }
    let class_marks: Vec<&MarkRecord> = sources
        .class
        .iter()
        .filter(|m| belongs_to(m, student_id))
        .collect();
    if !class_marks.is_empty() {
        return (MarkSource::Class, class_marks);
    }
    // A shared request-level list may carry the whole class.
    let request_marks: Vec<&MarkRecord> = sources
        .request
        .iter()
        .filter(|m| m.student_id.is_none() || belongs_to(m, student_id))
        .collect();
    if !request_marks.is_empty() {
        return (MarkSource::Request, request_marks);
    }
    (MarkSource::None, Vec::new())
}

/// Keep records stamped with the student's current term and academic year.
/// A missing context on the student accepts every record for that field.
pub fn in_context(record: &MarkRecord, term_id: Option<&str>, year_id: Option<&str>) -> bool {
    let term_ok = term_id
        .map(|t| record.term_id.as_deref() == Some(t))
        .unwrap_or(true);
    let year_ok = year_id
        .map(|y| record.academic_year_id.as_deref() == Some(y))
        .unwrap_or(true);
    term_ok && year_ok
}

/// Collapse duplicates per subject: the latest `updated_at` wins, stamped
/// records beat unstamped ones, and ties keep the later record.
pub fn latest_per_subject(records: Vec<MarkRecord>) -> Vec<MarkRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, MarkRecord> = HashMap::new();
    for r in records {
        let replace = match best.get(&r.subject_id) {
            None => {
                order.push(r.subject_id.clone());
                true
            }
            Some(current) => r.updated_at >= current.updated_at,
        };
        if replace {
            best.insert(r.subject_id.clone(), r);
        }
    }
    order
        .into_iter()
        .filter_map(|id| best.remove(&id))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ResolvedMarks {
    pub source: MarkSource,
    pub records: Vec<MarkRecord>,
}

impl ResolvedMarks {
    pub fn for_subject(&self, subject_id: &str) -> Option<&MarkRecord> {
        self.records.iter().find(|m| m.subject_id == subject_id)
    }
}

pub fn resolve_marks(student_id: &str, student: &Student, sources: &MarkSources) -> ResolvedMarks {
    let (source, selected) = select_source(student_id, sources);
    let term_id = student.term_id();
    let year_id = student.academic_year_id();
    let in_scope: Vec<MarkRecord> = selected
        .into_iter()
        .filter(|m| in_context(m, term_id, year_id))
        .cloned()
        .collect();
    let records = latest_per_subject(in_scope);
    if records.is_empty() {
        tracing::debug!(student_id, source = source.as_str(), "no marks in context");
    }
    ResolvedMarks { source, records }
}
