//! Request-boundary normalization.
//!
//! Callers attach marks in different places (on the student, under a report
//! wrapper, under the class, or at the top of the request). Everything is
//! lifted into typed values here so the engine only ever sees `MarkSources`.

use serde_json::{json, Value};

use crate::calc::CalcError;
use crate::grading::GradeBand;
use crate::model::Student;
use crate::reconcile::{MarkRecord, MarkSources};

#[derive(Debug, Clone)]
pub struct StudentInput {
    pub student: Student,
    pub sources: MarkSources,
}

fn parse_marks(raw: Option<&Value>, path: &str) -> Result<Vec<MarkRecord>, CalcError> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) if v.is_array() => serde_json::from_value(v.clone()).map_err(|e| {
            CalcError::new("bad_params", format!("{} is malformed: {}", path, e))
                .with_details(json!({ "path": path }))
        }),
        Some(_) => Err(CalcError::new(
            "bad_params",
            format!("{} must be an array", path),
        )
        .with_details(json!({ "path": path }))),
    }
}

/// `request_marks` is the request's top-level `marks` list, already parsed
/// once so bulk requests do not re-parse it per student.
pub fn student_input(
    raw: Option<&Value>,
    request_marks: &[MarkRecord],
) -> Result<StudentInput, CalcError> {
    let Some(raw) = raw.filter(|v| v.is_object()) else {
        return Err(CalcError::new("bad_params", "student must be an object"));
    };

    let student: Student = serde_json::from_value(raw.clone())
        .map_err(|e| CalcError::new("bad_params", format!("student is malformed: {}", e)))?;

    let sources = MarkSources {
        direct: parse_marks(raw.get("marks"), "student.marks")?,
        report: parse_marks(
            raw.get("report").and_then(|r| r.get("marks")),
            "student.report.marks",
        )?,
        class: parse_marks(
            raw.get("class").and_then(|c| c.get("marks")),
            "student.class.marks",
        )?,
        request: request_marks.to_vec(),
    };

    Ok(StudentInput { student, sources })
}

pub fn request_marks(params: &Value) -> Result<Vec<MarkRecord>, CalcError> {
    parse_marks(params.get("marks"), "marks")
}

pub fn parse_bands(raw: &Value) -> Result<Vec<GradeBand>, String> {
    if !raw.is_array() {
        return Err("gradingBands must be an array".to_string());
    }
    serde_json::from_value(raw.clone()).map_err(|e| format!("gradingBands is malformed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{resolve_marks, MarkSource};

    fn student_json() -> Value {
        json!({
            "id": "s1",
            "name": "Auma Grace",
            "class": {
                "name": "S2 North",
                "subjects": [{ "id": "math", "name": "Mathematics", "category": "GENERAL" }],
                "marks": [
                    { "studentId": "s1", "subjectId": "math", "eot": 40 },
                    { "studentId": "s2", "subjectId": "math", "eot": 90 }
                ]
            },
            "report": { "marks": [] },
            "marks": [{ "studentId": "s1", "subjectId": "math", "eot": 66 }]
        })
    }

    #[test]
    fn lifts_every_attachment_point() {
        let raw = student_json();
        let input = student_input(Some(&raw), &[]).expect("input");
        assert_eq!(input.sources.direct.len(), 1);
        assert!(input.sources.report.is_empty());
        assert_eq!(input.sources.class.len(), 2);

        let resolved = resolve_marks("s1", &input.student, &input.sources);
        assert_eq!(resolved.source, MarkSource::Direct);
        assert_eq!(resolved.records[0].eot, Some(66.0));
    }

    #[test]
    fn report_wrapper_is_used_when_student_list_is_empty() {
        let raw = json!({
            "id": "s1",
            "class": { "subjects": [] },
            "marks": [],
            "report": { "marks": [{ "subjectId": "eng", "bot": 12.5 }] }
        });
        let input = student_input(Some(&raw), &[]).expect("input");
        let resolved = resolve_marks("s1", &input.student, &input.sources);
        assert_eq!(resolved.source, MarkSource::Report);
        assert_eq!(resolved.records[0].bot, Some(12.5));
    }

    #[test]
    fn malformed_shapes_are_bad_params() {
        let not_array = json!({ "id": "s1", "marks": { "subjectId": "x" } });
        let e = student_input(Some(&not_array), &[]).unwrap_err();
        assert_eq!(e.code, "bad_params");
        assert_eq!(e.details, Some(json!({ "path": "student.marks" })));

        let bad_score = json!({ "id": "s1", "marks": [{ "subjectId": "x", "eot": "high" }] });
        assert!(student_input(Some(&bad_score), &[]).is_err());

        assert!(student_input(Some(&json!("s1")), &[]).is_err());
        assert!(student_input(None, &[]).is_err());
    }

    #[test]
    fn bands_must_be_an_array() {
        assert!(parse_bands(&json!({})).is_err());
        let bands = parse_bands(&json!([
            { "minMark": 0, "maxMark": 100, "grade": "P", "comment": "Pass" }
        ]))
        .expect("bands");
        assert_eq!(bands[0].grade, "P");
    }
}
