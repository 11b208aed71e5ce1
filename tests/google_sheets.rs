use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use picknik_forms::SubmissionService;
use picknik_forms::error::StoreError;
use picknik_forms::google_auth::StaticToken;
use picknik_forms::sheets::{GoogleSheets, SheetStore};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const TOKEN: &str = "ya29.mock-token";
const SPREADSHEET: &str = "sheet-abc";
const RANGE: &str = "Sheet1!A:J";

#[derive(Default)]
struct MockSheets {
    rows: Mutex<Vec<Value>>,
    appends: Mutex<Vec<(HashMap<String, String>, Value)>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "code": 401, "message": "Request had invalid authentication credentials." } })),
    )
        .into_response()
}

async fn get_spreadsheet(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id != SPREADSHEET {
        return (StatusCode::NOT_FOUND, "Requested entity was not found.").into_response();
    }
    Json(json!({ "spreadsheetId": id })).into_response()
}

async fn get_values(
    State(mock): State<Arc<MockSheets>>,
    Path((_id, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(range, RANGE);

    let rows = mock.rows.lock().unwrap().clone();
    if rows.is_empty() {
        // the API omits `values` for an empty range
        return Json(json!({ "range": "Sheet1!A1:J1000", "majorDimension": "ROWS" })).into_response();
    }
    Json(json!({ "range": "Sheet1!A1:J1000", "majorDimension": "ROWS", "values": rows })).into_response()
}

async fn append_values(
    State(mock): State<Arc<MockSheets>>,
    Path((_id, range)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(range, format!("{}:append", RANGE));

    for row in body["values"].as_array().cloned().unwrap_or_default() {
        mock.rows.lock().unwrap().push(row);
    }
    mock.appends.lock().unwrap().push((query, body));
    Json(json!({ "spreadsheetId": SPREADSHEET, "updates": { "updatedRows": 1 } })).into_response()
}

async fn start_mock(rows: Vec<Value>) -> (String, Arc<MockSheets>) {
    let mock = Arc::new(MockSheets {
        rows: Mutex::new(rows),
        appends: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/v4/spreadsheets/:id", get(get_spreadsheet))
        .route(
            "/v4/spreadsheets/:id/values/:range",
            get(get_values).post(append_values),
        )
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), mock)
}

fn client(base: &str, token: &str, spreadsheet: &str) -> GoogleSheets {
    GoogleSheets::new(
        GoogleSheets::http_client().unwrap(),
        Arc::new(StaticToken(token.to_string())),
        base,
        spreadsheet,
        RANGE,
    )
}

fn header_row() -> Value {
    json!(["Submission ID", "Date", "Full Name", "Phone", "Email", "Interest Type", "Message", "Contacted", "Status", "Notes"])
}

#[tokio::test]
async fn reads_rows_as_strings() {
    let (base, _mock) = start_mock(vec![
        header_row(),
        json!(["5", "2026-09-01", "Kai"]),
        json!([6, "2026-09-02", "Noor", null]),
    ])
    .await;
    let sheets = client(&base, TOKEN, SPREADSHEET);

    let rows = sheets.read_rows().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], vec!["6", "2026-09-02", "Noor", ""]);
}

#[tokio::test]
async fn empty_range_reads_as_no_rows() {
    let (base, _mock) = start_mock(Vec::new()).await;
    let sheets = client(&base, TOKEN, SPREADSHEET);

    assert!(sheets.read_rows().await.unwrap().is_empty());
}

#[tokio::test]
async fn appends_one_user_entered_row() {
    let (base, mock) = start_mock(vec![header_row()]).await;
    let sheets = client(&base, TOKEN, SPREADSHEET);

    let row: Vec<String> = (0..10).map(|i| format!("cell-{}", i)).collect();
    sheets.append_row(row.clone()).await.unwrap();

    let appends = mock.appends.lock().unwrap();
    assert_eq!(appends.len(), 1);
    let (query, body) = &appends[0];
    assert_eq!(query.get("valueInputOption").map(String::as_str), Some("USER_ENTERED"));
    assert_eq!(query.get("insertDataOption").map(String::as_str), Some("INSERT_ROWS"));
    assert_eq!(body["values"], json!([row]));
    assert_eq!(body["range"], json!(RANGE));
}

#[tokio::test]
async fn check_access_distinguishes_failures() {
    let (base, _mock) = start_mock(Vec::new()).await;

    assert!(client(&base, TOKEN, SPREADSHEET).check_access().await.is_ok());

    let missing = client(&base, TOKEN, "no-such-sheet").check_access().await;
    assert!(matches!(missing, Err(StoreError::Http { status: 404, .. })));

    let denied = client(&base, "expired", SPREADSHEET).check_access().await;
    assert!(matches!(denied, Err(StoreError::Auth(_))));
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = client(&base, TOKEN, SPREADSHEET).read_rows().await;
    assert!(matches!(result, Err(StoreError::Transport(_))));
}

#[tokio::test]
async fn pipeline_continues_sheet_sequence() {
    let (base, mock) = start_mock(vec![
        header_row(),
        json!(["0005", "2026-09-01", "Kai"]),
        json!(["6", "2026-09-02", "Noor"]),
    ])
    .await;
    let service = SubmissionService::new(Arc::new(client(&base, TOKEN, SPREADSHEET)), None);

    let submission = service
        .submit(&json!({
            "fullName": "Rae Okafor",
            "phone": "0207 946 0123",
            "email": "rae@example.org",
            "interestType": "Corporate event",
            "message": "Team social for 30 people in November."
        }))
        .await
        .unwrap();
    assert_eq!(submission.id.to_string(), "0007");

    let second = service
        .submit(&json!({
            "fullName": "Lou Baptiste",
            "phone": "0207 946 0456",
            "email": "lou@example.org",
            "interestType": "Coaching",
            "message": "Private lessons?"
        }))
        .await
        .unwrap();
    assert_eq!(second.id.to_string(), "0008");

    let rows = mock.rows.lock().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[3][0], json!("0007"));
    assert_eq!(rows[3][8], json!("Pending"));
    assert_eq!(rows[4][2], json!("Lou Baptiste"));
}
