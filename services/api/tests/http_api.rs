use std::str::FromStr;
use std::sync::Arc;

use api_lib::config::{Config, StoreBackend};
use api_lib::web::{router, state::AppState};
use rust_decimal::Decimal;
use school_admin_core::memory::MemoryStore;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().expect("bind address"),
        store_backend: StoreBackend::Memory,
        database_url: None,
        database_max_connections: 1,
        log_level: tracing::Level::INFO,
        cors_allowed_origins: vec![],
        seed_demo_data: 0,
        max_body_bytes: 1024 * 1024,
    }
}

async fn spawn_app() -> std::net::SocketAddr {
    let state = Arc::new(AppState {
        store: Arc::new(MemoryStore::new()),
        config: Arc::new(test_config()),
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    content_type: &str,
    body: &str,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    (status, head.to_string(), body.to_string())
}

async fn get(addr: std::net::SocketAddr, path: &str) -> (u16, String, String) {
    send_raw(addr, "GET", path, "text/plain", "").await
}

async fn post_json(addr: std::net::SocketAddr, path: &str, body: Value) -> (u16, Value) {
    let (status, _, body) = send_raw(addr, "POST", path, "application/json", &body.to_string()).await;
    (status, serde_json::from_str(&body).expect("json body"))
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let addr = spawn_app().await;
    let (status, _, body) = get(addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn import_skips_in_batch_duplicates_and_keeps_the_first() {
    let addr = spawn_app().await;

    let (status, summary) = post_json(
        addr,
        "/api/students/import",
        json!({
            "students": [
                {"admissionNumber": "S1", "name": "A"},
                {"admissionNumber": "S1", "name": "B"},
                {"admissionNumber": 1042, "name": "Numeric Key"},
                {"admissionNumber": "S3"}
            ]
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(summary["added"], 2);
    assert_eq!(summary["skipped"], 1);
    assert_eq!(summary["skippedAdmissionNumbers"], json!(["S1"]));
    assert_eq!(summary["skippedRows"], json!([2]));
    assert_eq!(summary["updated"], 0);
    assert_eq!(summary["invalid"], 1);
    assert_eq!(summary["rejected"][0]["row"], 4);

    let (_, _, body) = get(addr, "/api/students").await;
    let students: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(students.as_array().unwrap().len(), 2);
    assert_eq!(students[0]["admissionNumber"], "1042");
    assert_eq!(students[1]["name"], "A");
}

#[tokio::test]
async fn upsert_import_overwrites_and_keeps_the_id() {
    let addr = spawn_app().await;
    let (status, created) = post_json(
        addr,
        "/api/students",
        json!({"admissionNumber": "S1", "name": "Old", "grade": "9"}),
    )
    .await;
    assert_eq!(status, 201);

    let (_, summary) = post_json(
        addr,
        "/api/students/import",
        json!({
            "strategy": "upsert",
            "students": [{"admissionNumber": "S1", "name": "New", "grade": "10"}]
        }),
    )
    .await;
    assert_eq!(summary["updated"], 1);
    assert_eq!(summary["added"], 0);

    let (_, _, body) = get(addr, "/api/students").await;
    let students: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(students[0]["id"], created["id"]);
    assert_eq!(students[0]["name"], "New");
    assert_eq!(students[0]["grade"], "10");
}

#[tokio::test]
async fn unknown_strategy_is_a_bad_request() {
    let addr = spawn_app().await;
    let (status, body) = post_json(
        addr,
        "/api/students/import",
        json!({"strategy": "merge", "students": []}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap().contains("merge"));
}

#[tokio::test]
async fn create_update_and_delete_map_errors_to_status_codes() {
    let addr = spawn_app().await;

    let (status, _) = post_json(addr, "/api/students", json!({"admissionNumber": "S1", "name": "A"})).await;
    assert_eq!(status, 201);
    let (status, body) = post_json(addr, "/api/students", json!({"admissionNumber": "S1", "name": "B"})).await;
    assert_eq!(status, 409);
    assert!(body["message"].is_string());
    let (status, _) = post_json(addr, "/api/students", json!({"admissionNumber": "S2"})).await;
    assert_eq!(status, 400);

    let (status, _, _) = send_raw(addr, "PUT", "/api/students/NOPE", "application/json", r#"{"name":"X"}"#).await;
    assert_eq!(status, 404);
    let (status, _, body) = send_raw(
        addr,
        "PUT",
        "/api/students/S1",
        "application/json",
        r#"{"admissionNumber":"S1A","address":""}"#,
    )
    .await;
    assert_eq!(status, 200);
    let updated: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(updated["admissionNumber"], "S1A");
    assert_eq!(updated["name"], "A");

    let missing = uuid::Uuid::new_v4();
    let (status, _, _) = send_raw(addr, "DELETE", &format!("/api/students/{missing}"), "text/plain", "").await;
    assert_eq!(status, 404);

    let id = updated["id"].as_str().unwrap().to_string();
    let (status, _, body) = send_raw(addr, "DELETE", &format!("/api/students/{id}"), "text/plain", "").await;
    assert_eq!(status, 200);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["deleted"], id.as_str());
}

#[tokio::test]
async fn csv_import_then_export_round_trips_through_the_api() {
    let addr = spawn_app().await;
    let csv = "admissionNumber,name,grade,address,yearlyFeeAmount\n\
               STU001,Asha,10,\"12, MG Road\",\"25,000\"\n\
               STU002,Ravi,9,,abc\n";

    let (status, _, body) = send_raw(addr, "POST", "/api/students/import/csv", "text/csv", csv).await;
    assert_eq!(status, 200);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["added"], 1);
    assert_eq!(summary["invalid"], 1);

    let (status, head, body) = get(addr, "/api/students/export?grade=10").await;
    assert_eq!(status, 200);
    assert!(head.to_ascii_lowercase().contains("content-type: text/csv"));
    let mut lines = body.lines();
    assert!(lines.next().unwrap().starts_with("admissionNumber,name,dateOfBirth"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("STU001,Asha,"));
    assert!(row.contains("\"12, MG Road\""));
    assert!(lines.next().is_none());

    let (status, _, body) = send_raw(addr, "POST", "/api/students/import/csv", "text/csv", "name\nAsha\n").await;
    assert_eq!(status, 400);
    assert!(body.contains("admissionNumber"));
}

#[tokio::test]
async fn skipped_rows_come_back_as_csv_for_a_second_pass() {
    let addr = spawn_app().await;
    post_json(addr, "/api/students", json!({"admissionNumber": "S1", "name": "A"})).await;

    let batch = json!([
        {"admissionNumber": "S1", "name": "A2"},
        {"admissionNumber": "S2", "name": "B"}
    ]);
    let (_, summary) = post_json(addr, "/api/students/import", json!({"students": batch})).await;
    assert_eq!(summary["skippedAdmissionNumbers"], json!(["S1"]));

    let request = json!({
        "students": batch,
        "skippedRows": summary["skippedRows"]
    });
    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/api/students/import/skipped",
        "application/json",
        &request.to_string(),
    )
    .await;
    assert_eq!(status, 200);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("S1,A2,"));

    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/api/students/import/csv?strategy=upsert",
        "text/csv",
        &body,
    )
    .await;
    assert_eq!(status, 200);
    let second: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(second["updated"], 1);
}

#[tokio::test]
async fn resubmitting_an_in_batch_duplicate_updates_only_once() {
    let addr = spawn_app().await;
    let batch = json!([
        {"admissionNumber": "S1", "name": "A"},
        {"admissionNumber": "S1", "name": "B"}
    ]);
    let (_, summary) = post_json(addr, "/api/students/import", json!({"students": batch})).await;
    assert_eq!(summary["added"], 1);
    assert_eq!(summary["skippedRows"], json!([2]));

    let request = json!({"students": batch, "skippedRows": summary["skippedRows"]});
    let (status, _, csv) = send_raw(
        addr,
        "POST",
        "/api/students/import/skipped",
        "application/json",
        &request.to_string(),
    )
    .await;
    assert_eq!(status, 200);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("S1,B,"));

    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/api/students/import/csv?strategy=upsert",
        "text/csv",
        &csv,
    )
    .await;
    assert_eq!(status, 200);
    let second: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(second["updated"], 1);
    assert_eq!(second["added"], 0);
}

#[tokio::test]
async fn malformed_elements_are_rejected_rows_not_a_failed_request() {
    let addr = spawn_app().await;

    let (status, summary) = post_json(
        addr,
        "/api/students/import",
        json!({
            "students": [
                {"admissionNumber": "S1", "name": "A"},
                {"admissionNumber": "S2", "name": {"first": "B"}},
                "junk"
            ]
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(summary["added"], 1);
    assert_eq!(summary["invalid"], 2);
    assert_eq!(summary["rejected"][0]["row"], 2);
    assert_eq!(summary["rejected"][1]["row"], 3);
    let (_, _, body) = get(addr, "/api/students").await;
    let students: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(students.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_json_bodies_are_bad_requests_with_a_message() {
    let addr = spawn_app().await;
    let (_, student) = post_json(addr, "/api/students", json!({"admissionNumber": "S1", "name": "A"})).await;

    let (status, body) = post_json(
        addr,
        "/api/fees",
        json!({"studentId": student["id"], "amount": 100, "date": "tomorrow"}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["message"].is_string());

    let (status, head, body) =
        send_raw(addr, "POST", "/api/students", "application/json", "{not json").await;
    assert_eq!(status, 400);
    assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["message"].is_string());

    let (status, body) = post_json(
        addr,
        "/api/fees",
        json!({"studentId": student["id"], "amount": "0.001", "date": "2024-07-01"}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap().contains("two decimal places"));
}

#[tokio::test]
async fn overpayment_shows_as_a_negative_balance() {
    let addr = spawn_app().await;
    let (_, student) = post_json(
        addr,
        "/api/students",
        json!({"admissionNumber": "S1", "name": "A", "yearlyFeeAmount": 25000}),
    )
    .await;
    let id = student["id"].as_str().unwrap().to_string();

    for amount in [20000, 10000] {
        let (status, slip) = post_json(
            addr,
            "/api/fees",
            json!({"studentId": id, "amount": amount, "date": "2024-07-01", "paymentMode": "cash"}),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(slip["admissionNumber"], "S1");
        assert!(slip["transactionId"].as_str().unwrap().starts_with("TXN-20240701-"));
    }

    let (status, _, body) = get(addr, &format!("/api/students/{id}/balance")).await;
    assert_eq!(status, 200);
    let balance: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(decimal(&balance["totalPaid"]), Decimal::new(30000, 0));
    assert_eq!(decimal(&balance["balance"]), Decimal::new(-5000, 0));

    let (_, _, body) = get(addr, &format!("/api/fees?studentId={id}")).await;
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap().as_array().unwrap().len(), 2);

    let (status, _) = post_json(
        addr,
        "/api/fees",
        json!({"studentId": uuid::Uuid::new_v4(), "amount": 10, "date": "2024-07-01"}),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn marks_sheet_upload_feeds_the_report_card() {
    let addr = spawn_app().await;
    post_json(
        addr,
        "/api/students/import",
        json!({"students": [
            {"admissionNumber": "S1", "name": "A", "grade": "10", "section": "A"},
            {"admissionNumber": "S2", "name": "B", "grade": "10", "section": "B"}
        ]}),
    )
    .await;

    let (status, _, template) = get(addr, "/api/grades/template?grade=10&section=A").await;
    assert_eq!(status, 200);
    assert_eq!(template, "admissionNumber,name,marks\nS1,A,\n");

    let sheet = "admissionNumber,name,marks\nS1,A,88\nS2,B,70\n";
    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/api/grades/import/csv?subject=Science&term=Term%201&grade=10&section=A",
        "text/csv",
        sheet,
    )
    .await;
    assert_eq!(status, 200);
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["inserted"], 1);
    assert_eq!(outcome["unknownAdmissionNumbers"], json!(["S2"]));

    let (_, _, body) = get(addr, "/api/students").await;
    let students: Value = serde_json::from_str(&body).unwrap();
    let id = students[0]["id"].as_str().unwrap().to_string();

    let (status, _, body) = get(addr, &format!("/api/reports/{id}?term=Term%201")).await;
    assert_eq!(status, 200);
    let card: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(card["subjects"][0]["subject"], "Science");
    assert_eq!(decimal(&card["average"]), Decimal::new(88, 0));

    let (_, _, body) = get(addr, "/api/dashboard").await;
    let stats: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["totalStudents"], 2);
    assert_eq!(stats["gradeEntries"], 1);
}
