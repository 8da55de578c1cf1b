use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportcardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportcardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn student(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "class": {
            "name": "S1 West",
            "subjects": [
                { "id": "eng", "name": "English", "category": "GENERAL" },
                { "id": "math", "name": "Mathematics", "category": "GENERAL" },
                { "id": "cre", "name": "CRE", "category": "SUBSIDIARY" }
            ]
        }
    })
}

#[test]
fn class_bundle_pages_and_division_summary() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.classReport",
        json!({
            "className": "S1 West",
            "generatedOn": "2024-12-06",
            "students": [student("a", "Akello Ruth"), student("b", "Byaruhanga Tom")],
            "marks": [
                { "studentId": "a", "subjectId": "eng", "eot": 76 },
                { "studentId": "a", "subjectId": "math", "eot": 71 },
                { "studentId": "a", "subjectId": "cre", "eot": 20 }
            ]
        }),
    );

    let bundle = &result["bundle"];
    assert_eq!(bundle["className"], "S1 West");
    assert_eq!(bundle["studentCount"], 2);
    assert_eq!(bundle["generatedOn"], "2024-12-06");

    let docs = bundle["documents"].as_array().expect("documents");
    // D2 + C3 → 2.5, still inside DIVISION I.
    assert_eq!(docs[0]["division"]["averageAggregatePoints"], 2.5);
    assert_eq!(docs[0]["division"]["division"], "DIVISION I");
    assert_eq!(docs[0]["totals"]["eot"], 147.0);
    assert_eq!(docs[0]["totals"]["eotPoints"], 5);
    assert!(docs[0]["note"].is_null());
    assert_eq!(docs[1]["division"]["division"], "FAIL");
    assert!(docs[1]["note"].is_string());

    let counts = bundle["divisionCounts"].as_array().expect("counts");
    let count_of = |label: &str| {
        counts
            .iter()
            .find(|c| c["division"] == label)
            .and_then(|c| c["count"].as_u64())
            .expect("count row")
    };
    assert_eq!(count_of("DIVISION I"), 1);
    assert_eq!(count_of("FAIL"), 1);
    assert_eq!(count_of("DIVISION III"), 0);

    let text = result["text"].as_str().expect("text");
    let pages: Vec<&str> = text.split('\u{000C}').collect();
    assert_eq!(pages.len(), 3);
    assert!(pages[0].contains("Class: S1 West"));
    assert!(pages[0].contains("Students: 2"));
    assert!(pages[0].contains("Generated: 2024-12-06"));
    assert!(pages[1].contains("Akello Ruth"));
    assert!(pages[2].contains("Byaruhanga Tom"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn one_bad_student_fails_the_bundle() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let broken = json!({ "name": "No Id", "class": { "subjects": [] } });
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "reports.classReport",
        json!({ "students": [student("a", "Akello Ruth"), broken] }),
    );
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_params");
    assert_eq!(resp["error"]["details"]["index"], 1);

    let not_array = request(
        &mut stdin,
        &mut reader,
        "2",
        "reports.classReport",
        json!({ "students": {} }),
    );
    assert_eq!(not_array["error"]["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn class_name_defaults_to_first_student_class() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.classReport",
        json!({ "students": [student("a", "Akello Ruth")], "generatedOn": "2024-12-06" }),
    );
    assert_eq!(result["bundle"]["className"], "S1 West");

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.classReport",
        json!({ "className": "Empty", "students": [], "generatedOn": "2024-12-06" }),
    );
    assert_eq!(empty["bundle"]["studentCount"], 0);
    assert!(!empty["text"].as_str().unwrap_or("").contains('\u{000C}'));

    drop(stdin);
    let _ = child.wait();
}
