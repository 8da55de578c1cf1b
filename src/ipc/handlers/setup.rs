use crate::db;
use crate::grading::{self, GradeBand};
use crate::ipc::error::{err, ok};
use crate::ipc::payload;
use crate::ipc::types::{AppState, Request};
use crate::render::ReportOptions;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
    Reports,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
            Self::Reports => "setup.reports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => json!({
            "bands": grading::default_bands()
        }),
        SetupSection::Reports => json!({
            "schoolName": "",
            "showGeneratedAt": true,
            "showLegend": true,
            "noMarksNote": "No marks recorded for this term"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "bands" => {
                    let bands = payload::parse_bands(v)?;
                    if bands.is_empty() {
                        return Err("bands must not be empty".into());
                    }
                    grading::validate_bands(&bands)?;
                    obj.insert(k.clone(), json!(bands));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::Reports => match k.as_str() {
                "schoolName" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "noMarksNote" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 200)?));
                }
                "showGeneratedAt" | "showLegend" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut out = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let (Some(dst), Some(src)) = (out.as_object_mut(), saved.as_object()) {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(out)
}

fn section_or_default(conn: Option<&Connection>, section: SetupSection) -> Value {
    let Some(conn) = conn else {
        return default_section(section);
    };
    load_section(conn, section).unwrap_or_else(|e| {
        tracing::warn!(key = section.key(), error = %e, "settings unreadable, using defaults");
        default_section(section)
    })
}

/// Grading scale for a request: explicit `gradingBands` param, then the
/// workspace setting, then the built-in scale. An explicit empty array is
/// honoured and resolves every mark to the worst grade.
pub fn request_bands(state: &AppState, req: &Request) -> Result<Vec<GradeBand>, Value> {
    if let Some(raw) = req.params.get("gradingBands").filter(|v| !v.is_null()) {
        return payload::parse_bands(raw).map_err(|m| err(&req.id, "bad_params", m, None));
    }
    let saved = section_or_default(state.db.as_ref(), SetupSection::Grading);
    match saved.get("bands").map(payload::parse_bands) {
        Some(Ok(bands)) => Ok(bands),
        _ => {
            tracing::warn!("stored grading bands unreadable, using defaults");
            Ok(grading::default_bands())
        }
    }
}

pub fn report_options(state: &AppState, req: &Request) -> Result<ReportOptions, Value> {
    let reports = section_or_default(state.db.as_ref(), SetupSection::Reports);
    let generated_on = match req.params.get("generatedOn").filter(|v| !v.is_null()) {
        None => chrono::Local::now().date_naive(),
        Some(v) => {
            let parsed = v
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let Some(d) = parsed else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "generatedOn must be a YYYY-MM-DD date",
                    Some(json!({ "generatedOn": v })),
                ));
            };
            d
        }
    };
    let text = |key: &str| {
        reports
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let flag = |key: &str| reports.get(key).and_then(|v| v.as_bool()).unwrap_or(true);
    Ok(ReportOptions {
        school_name: text("schoolName"),
        show_legend: flag("showLegend"),
        show_generated_at: flag("showGeneratedAt"),
        no_marks_note: text("noMarksNote"),
        generated_on,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let grading = match load_section(conn, SetupSection::Grading) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let reports = match load_section(conn, SetupSection::Reports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "grading": grading,
            "reports": reports
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(key = section.key(), "settings updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
