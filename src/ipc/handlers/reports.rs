use crate::calc::{self, CalcError, SubjectComputedRow};
use crate::division::{self, DivisionResult};
use crate::grading::GradeBand;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::payload::{self, StudentInput};
use crate::ipc::types::{AppState, Request};
use crate::model;
use crate::reconcile::{self, MarkRecord, MarkSource};
use crate::render::{self, ReportDocument, ReportOptions};
use serde_json::json;

use super::setup;

struct ComputedStudent {
    rows: Vec<SubjectComputedRow>,
    division: DivisionResult,
    source: MarkSource,
    marks_found: bool,
}

fn compute(
    student: &model::IdentifiedStudent<'_>,
    input: &StudentInput,
    bands: &[GradeBand],
) -> ComputedStudent {
    let marks = reconcile::resolve_marks(student.id, &input.student, &input.sources);
    let rows = calc::aggregate_student(student, &marks, bands);
    let division = division::classify(&rows);
    ComputedStudent {
        rows,
        division,
        source: marks.source,
        marks_found: !marks.records.is_empty(),
    }
}

fn render_one(
    input: &StudentInput,
    bands: &[GradeBand],
    options: &ReportOptions,
) -> Result<ReportDocument, CalcError> {
    let student = model::identify(&input.student)?;
    let computed = compute(&student, input, bands);
    Ok(render::render_student(
        &student,
        computed.rows,
        computed.division,
        bands,
        computed.marks_found,
        options,
    ))
}

fn single_input(req: &Request) -> Result<StudentInput, serde_json::Value> {
    let shared = payload::request_marks(&req.params).map_err(|e| calc_err(&req.id, e))?;
    payload::student_input(req.params.get("student"), &shared).map_err(|e| calc_err(&req.id, e))
}

fn handle_reports_student_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let bands = match setup::request_bands(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match single_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let student = match model::identify(&input.student) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let computed = compute(&student, &input, &bands);
    ok(
        &req.id,
        json!({
            "studentId": student.id,
            "rows": computed.rows,
            "division": computed.division,
            "marksFound": computed.marks_found,
            "markSource": computed.source.as_str(),
        }),
    )
}

fn handle_reports_student_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let bands = match setup::request_bands(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = match setup::report_options(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match single_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match render_one(&input, &bands, &options) {
        Ok(document) => {
            tracing::info!(
                student_id = %document.student_id,
                division = document.division.division.as_str(),
                "student report rendered"
            );
            let text = document.to_text();
            ok(&req.id, json!({ "document": document, "text": text }))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_reports_class_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let bands = match setup::request_bands(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = match setup::report_options(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(students) = req.params.get("students").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "students must be an array", None);
    };
    let shared: Vec<MarkRecord> = match payload::request_marks(&req.params) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    let mut documents: Vec<ReportDocument> = Vec::with_capacity(students.len());
    for (index, raw) in students.iter().enumerate() {
        let rendered = payload::student_input(Some(raw), &shared)
            .and_then(|input| render_one(&input, &bands, &options));
        match rendered {
            Ok(doc) => documents.push(doc),
            Err(mut e) => {
                // One unidentifiable student invalidates the whole bundle.
                let mut details = e.details.take().unwrap_or_else(|| json!({}));
                if let Some(obj) = details.as_object_mut() {
                    obj.insert("index".to_string(), json!(index));
                }
                e.details = Some(details);
                return calc_err(&req.id, e);
            }
        }
    }

    let class_name = req
        .params
        .get("className")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| documents.first().map(|d| d.class_name.clone()))
        .unwrap_or_default();

    let bundle = render::render_class(&class_name, documents, &options);
    tracing::info!(
        class = %bundle.class_name,
        students = bundle.student_count,
        "class report rendered"
    );
    let text = bundle.to_text();
    ok(&req.id, json!({ "bundle": bundle, "text": text }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentRows" => Some(handle_reports_student_rows(state, req)),
        "reports.studentReport" => Some(handle_reports_student_report(state, req)),
        "reports.classReport" => Some(handle_reports_class_report(state, req)),
        _ => None,
    }
}
