use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classtrackd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classtrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn raw_request(
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
    let value = raw_request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = raw_request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

fn list_questions(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    test_id: &str,
) -> Vec<serde_json::Value> {
    request_ok(
        stdin,
        reader,
        id,
        "questions.list",
        json!({ "testId": test_id }),
    )
    .get("questions")
    .and_then(|v| v.as_array())
    .expect("questions array")
    .clone()
}

fn orders(questions: &[serde_json::Value]) -> Vec<i64> {
    questions
        .iter()
        .map(|q| q.get("questionOrder").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

#[test]
fn question_order_stays_dense_through_deletes_and_appends() {
    let workspace = temp_dir("classtrack-order-invariant");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let lesson = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.create",
        json!({ "title": "Chemistry" }),
    );
    let lesson_id = lesson.get("lessonId").and_then(|v| v.as_str()).unwrap();

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "tests.create",
        json!({
            "lessonId": lesson_id,
            "title": "Elements Pretest",
            "kind": "pretest",
            "extractedText": "1. First [2 marks]\n2. Second [3 marks]\n3. Third [4 marks]"
        }),
    );
    let test_id = created
        .get("testId")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    let qs = list_questions(&mut stdin, &mut reader, "4", &test_id);
    assert_eq!(orders(&qs), vec![1, 2, 3]);

    // Delete the middle question: the remaining orders must re-pack to 1..2.
    let middle_id = qs[1].get("id").and_then(|v| v.as_str()).unwrap();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "questions.delete",
        json!({ "questionId": middle_id }),
    );
    let qs = list_questions(&mut stdin, &mut reader, "6", &test_id);
    assert_eq!(orders(&qs), vec![1, 2]);
    assert_eq!(qs[0].get("questionText"), Some(&json!("First")));
    assert_eq!(qs[1].get("questionText"), Some(&json!("Third")));

    // Appending lands at the next order, keeping the sequence contiguous.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "questions.create",
        json!({ "testId": test_id, "questionText": "Fourth", "totalMarks": 5 }),
    );
    let qs = list_questions(&mut stdin, &mut reader, "8", &test_id);
    assert_eq!(orders(&qs), vec![1, 2, 3]);
    assert_eq!(qs[2].get("questionText"), Some(&json!("Fourth")));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn total_marks_outside_range_are_rejected_not_clamped() {
    let workspace = temp_dir("classtrack-marks-range");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let lesson = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.create",
        json!({ "title": "Physics" }),
    );
    let lesson_id = lesson.get("lessonId").and_then(|v| v.as_str()).unwrap();
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "tests.create",
        json!({
            "lessonId": lesson_id,
            "title": "Forces",
            "kind": "pretest",
            "extractedText": "1. Define force [2 marks]"
        }),
    );
    let test_id = created
        .get("testId")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();
    let qs = list_questions(&mut stdin, &mut reader, "4", &test_id);
    let question_id = qs[0].get("id").and_then(|v| v.as_str()).unwrap();

    for (id, bad) in [("5", 0), ("6", 101), ("7", -3)] {
        let code = request_err_code(
            &mut stdin,
            &mut reader,
            id,
            "questions.update",
            json!({ "questionId": question_id, "totalMarks": bad }),
        );
        assert_eq!(code, "bad_params", "totalMarks {} accepted", bad);
    }
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "8",
        "questions.create",
        json!({ "testId": test_id, "questionText": "Bonus", "totalMarks": 200 }),
    );
    assert_eq!(code, "bad_params");

    // Unchanged by the rejected updates.
    let qs = list_questions(&mut stdin, &mut reader, "9", &test_id);
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].get("totalMarks"), Some(&json!(2)));

    // Boundary values are valid.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "questions.update",
        json!({ "questionId": question_id, "totalMarks": 100 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "questions.update",
        json!({ "questionId": question_id, "totalMarks": 1 }),
    );

    drop(stdin);
    let _ = child.wait();
}
