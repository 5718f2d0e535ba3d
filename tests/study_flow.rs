mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, temp_workspace};

fn session_params(student: &str) -> serde_json::Value {
    json!({
        "studentId": student,
        "subject": "수학",
        "grade": "고1",
        "pageStart": 10,
        "pageEnd": 20,
        "difficulty": "보통",
        "examType": "내신",
    })
}

#[test]
fn provided_questions_grade_once_and_feed_rankings() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    let student = sidecar.student_id("student1");

    let mut params = session_params(&student);
    params["questions"] = json!([
        { "prompt": "1+1", "answer": "2", "explanation": "덧셈" },
        { "prompt": "2*3", "answer": "6" },
        { "prompt": "10/2", "answer": "5" },
    ]);
    let created = sidecar.request_ok("1", "study.sessions.create", params);
    assert_eq!(created["totalQuestions"], 3);
    assert_eq!(created["requestedCount"], 3);
    assert_eq!(created["parseStatus"], "parsed");
    let session_id = created["sessionId"].as_str().expect("sessionId").to_string();

    let hidden = sidecar.request_ok(
        "2",
        "study.sessions.questions",
        json!({ "sessionId": session_id }),
    );
    let first = &hidden["questions"][0];
    assert_eq!(first["position"], 1);
    assert!(first.get("answer").is_none());

    let graded = sidecar.request_ok(
        "3",
        "study.sessions.submit",
        json!({ "sessionId": session_id, "answers": { "1": " 2 ", "2": "6", "3": "99" } }),
    );
    assert_eq!(graded["correctCount"], 2);
    assert_eq!(graded["score"], 66.7);
    assert!(graded["motivation"].as_str().is_some_and(|m| !m.is_empty()));

    let again = sidecar.request_err(
        "4",
        "study.sessions.submit",
        json!({ "sessionId": session_id, "answers": ["2", "6", "5"] }),
    );
    assert_eq!(again, "already_graded");

    let rankings = sidecar.request_ok("5", "rankings.list", json!({}));
    let top = &rankings["rankings"][0];
    assert_eq!(top["studentId"], student.as_str());
    assert_eq!(top["totalScore"], 66.7);
    assert_eq!(top["totalCorrect"], 2);

    let notes = sidecar.request_ok("6", "study.wrongNotes", json!({ "studentId": student }));
    let notes = notes["notes"].as_array().expect("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["answer"], "5");

    let streak = sidecar.request_ok("7", "study.streak", json!({ "studentId": student }));
    assert_eq!(streak["streak"], 1);

    let shown = sidecar.request_ok(
        "8",
        "study.sessions.questions",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(shown["questions"][2]["answer"], "5");
    assert_eq!(shown["questions"][2]["isCorrect"], false);
}

#[test]
fn mock_generation_creates_requested_count() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    let student = sidecar.student_id("student2");

    let mut params = session_params(&student);
    params["questionCount"] = json!(4);
    let created = sidecar.request_ok("1", "study.sessions.create", params);
    assert_eq!(created["source"], "mock");
    assert_eq!(created["totalQuestions"], 4);

    let session_id = created["sessionId"].as_str().expect("sessionId").to_string();
    let detail = sidecar.request_ok(
        "2",
        "study.sessions.questions",
        json!({ "sessionId": session_id, "includeAnswers": true }),
    );
    let answers: Vec<&str> = detail["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .filter_map(|q| q["answer"].as_str())
        .collect();
    assert_eq!(answers, vec!["1", "2", "3", "4"]);

    let mut params = session_params(&student);
    params["questionCount"] = json!(0);
    assert_eq!(
        sidecar.request_err("3", "study.sessions.create", params),
        "bad_params"
    );
}

#[test]
fn raw_text_shortfall_is_stored_as_partial() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    let student = sidecar.student_id("student1");

    let mut params = session_params(&student);
    params["questionCount"] = json!(3);
    params["rawText"] = json!("문제 1\nA\n정답: a\n해설: e");
    let created = sidecar.request_ok("1", "study.sessions.create", params);
    assert_eq!(created["parseStatus"], "partial");
    assert_eq!(created["totalQuestions"], 1);
    assert_eq!(created["requestedCount"], 3);

    let mut params = session_params(&student);
    params["rawText"] = json!("no headers here");
    assert_eq!(
        sidecar.request_err("2", "study.sessions.create", params),
        "generation_failed"
    );
}

#[test]
fn weekly_goal_ratio_is_capped() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    let student = sidecar.student_id("student3");

    let mut params = session_params(&student);
    params["questionCount"] = json!(3);
    sidecar.request_ok("1", "study.sessions.create", params);

    let goals = sidecar.request_ok(
        "2",
        "goals.weekly.set",
        json!({ "studentId": student, "subject": "수학", "target": 2 }),
    );
    let math = &goals["goals"][0];
    assert_eq!(math["subject"], "수학");
    assert_eq!(math["actual"], 3);
    assert_eq!(math["ratio"], 100.0);

    assert_eq!(
        sidecar.request_err(
            "3",
            "goals.weekly.set",
            json!({ "studentId": student, "subject": "수학", "target": -1 }),
        ),
        "bad_params"
    );
}

#[test]
fn psych_and_vocab_entries_round_trip_through_ipc() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    let student = sidecar.student_id("student1");

    let submitted = sidecar.request_ok(
        "1",
        "psych.submit",
        json!({ "studentId": student, "items": vec![4; 20] }),
    );
    assert_eq!(submitted["totalScore"], 80);
    assert_eq!(submitted["supportLevel"], "stable");

    let mut items = vec![3; 20];
    items[0] = 0;
    assert_eq!(
        sidecar.request_err("2", "psych.submit", json!({ "studentId": student, "items": items })),
        "bad_params"
    );

    let entry = sidecar.request_ok(
        "3",
        "vocab.search",
        json!({ "studentId": student, "subject": "과학", "term": "광합성" }),
    );
    assert_eq!(entry["entry"]["term"], "광합성");
    assert!(entry["entry"]["explanation"]
        .as_str()
        .is_some_and(|e| e.contains("광합성")));

    let listed = sidecar.request_ok(
        "4",
        "vocab.list",
        json!({ "studentId": student, "subject": "국어" }),
    );
    assert_eq!(listed["entries"].as_array().map(|e| e.len()), Some(0));
}
