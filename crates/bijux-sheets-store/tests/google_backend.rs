use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bijux_sheets_model::SheetRange;
use bijux_sheets_store::{
    AccessTokenSource, GoogleSheetsBackend, RetryPolicy, ServiceAccountKey,
    ServiceAccountTokenSource, SheetsBackend, StaticTokenSource, StoreError,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Responder = dyn Fn(&Recorded, usize) -> (u16, String) + Send + Sync;

fn responder(
    f: impl Fn(&Recorded, usize) -> (u16, String) + Send + Sync + 'static,
) -> Arc<Responder> {
    Arc::new(f)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let first = lines.next()?.to_string();
    let mut parts = first.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(Recorded {
        method,
        target,
        headers,
        body,
    })
}

async fn spawn_mock(reply_with: Arc<Responder>) -> (SocketAddr, Arc<Mutex<Vec<Recorded>>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("addr");
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_bg = Arc::clone(&log);
    let calls = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => break,
            };
            let Some(req) = read_request(&mut stream).await else {
                continue;
            };
            let n = calls.fetch_add(1, Ordering::Relaxed) + 1;
            let (status, body) = reply_with(&req, n);
            log_bg.lock().expect("request log").push(req);
            let reply = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    (addr, log)
}

fn backend(addr: SocketAddr, retry: RetryPolicy) -> GoogleSheetsBackend {
    let tokens: Arc<dyn AccessTokenSource> = Arc::new(StaticTokenSource::new("tok-1"));
    GoogleSheetsBackend::new("sheet-abc", Some(tokens), retry)
        .with_base_url(&format!("http://{addr}/v4/spreadsheets"))
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_backoff_ms: 1,
    }
}

#[tokio::test]
async fn get_values_sends_bearer_and_decodes_rows() {
    let (addr, log) = spawn_mock(responder(|_req, _n| {
        (
            200,
            json!({"range": "DB!A1:C3", "majorDimension": "ROWS", "values": [["id","name","quantity"],[1,"Bolt",10],[]]})
                .to_string(),
        )
    }))
    .await;
    let rows = backend(addr, fast_retry())
        .get_values(&SheetRange::sheet("DB").expect("range"))
        .await
        .expect("get values");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec![json!(1), json!("Bolt"), json!(10)]);

    let log = log.lock().expect("log").clone();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, "GET");
    assert_eq!(
        log[0].target,
        "/v4/spreadsheets/sheet-abc/values/DB?valueRenderOption=UNFORMATTED_VALUE"
    );
    assert_eq!(log[0].header("authorization"), Some("Bearer tok-1"));
}

#[tokio::test]
async fn empty_sheet_without_values_field_reads_as_no_rows() {
    let (addr, _log) = spawn_mock(responder(|_req, _n| {
        (200, json!({"range": "DB!A1:Z1000", "majorDimension": "ROWS"}).to_string())
    }))
    .await;
    let rows = backend(addr, fast_retry())
        .get_values(&SheetRange::columns("DB", 0, 0).expect("range"))
        .await
        .expect("get values");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn reads_retry_through_transient_server_errors() {
    let (addr, log) = spawn_mock(responder(|_req, n| {
        if n == 1 {
            (503, json!({"error": {"code": 503, "message": "backend busy"}}).to_string())
        } else {
            (200, json!({"values": [["id"], [7]]}).to_string())
        }
    }))
    .await;
    let rows = backend(addr, fast_retry())
        .get_values(&SheetRange::columns("DB", 0, 0).expect("range"))
        .await
        .expect("retried get");
    assert_eq!(rows, vec![vec![json!("id")], vec![json!(7)]]);
    assert_eq!(log.lock().expect("log").len(), 2);
}

#[tokio::test]
async fn appends_are_not_retried() {
    let (addr, log) = spawn_mock(responder(|_req, _n| {
        (500, json!({"error": {"code": 500, "message": "internal"}}).to_string())
    }))
    .await;
    let err = backend(addr, fast_retry())
        .append_rows("DB", vec![vec![json!(1), json!("Bolt"), json!(10)]])
        .await
        .expect_err("append fails");
    assert_eq!(
        err,
        StoreError::Status {
            status: 500,
            message: "internal".to_string()
        }
    );
    let log = log.lock().expect("log").clone();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, "POST");
    assert_eq!(
        log[0].target,
        "/v4/spreadsheets/sheet-abc/values/DB:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS"
    );
    let body: Value = serde_json::from_str(&log[0].body).expect("append body json");
    assert_eq!(body["values"], json!([[1, "Bolt", 10]]));
}

#[tokio::test]
async fn update_and_clear_target_the_row_range() {
    let (addr, log) = spawn_mock(responder(|_req, _n| (200, "{}".to_string())))
        .await;
    let backend = backend(addr, fast_retry());
    let range = SheetRange::row("DB", 0, 2, 5).expect("range");
    backend
        .update_values(&range, vec![vec![json!(1), json!("Bolt"), json!(25)]])
        .await
        .expect("update");
    backend.clear_values(&range).await.expect("clear");

    let log = log.lock().expect("log").clone();
    assert_eq!(log[0].method, "PUT");
    assert_eq!(
        log[0].target,
        "/v4/spreadsheets/sheet-abc/values/DB!A5:C5?valueInputOption=RAW"
    );
    let body: Value = serde_json::from_str(&log[0].body).expect("update body json");
    assert_eq!(body["range"], "DB!A5:C5");
    assert_eq!(body["majorDimension"], "ROWS");
    assert_eq!(log[1].method, "POST");
    assert_eq!(log[1].target, "/v4/spreadsheets/sheet-abc/values/DB!A5:C5:clear");
}

#[tokio::test]
async fn client_errors_fail_fast_with_api_message() {
    let (addr, log) = spawn_mock(responder(|_req, _n| {
        (
            400,
            json!({"error": {"code": 400, "message": "Unable to parse range: Nope!A1", "status": "INVALID_ARGUMENT"}})
                .to_string(),
        )
    }))
    .await;
    let err = backend(addr, fast_retry())
        .get_values(&SheetRange::sheet("Nope").expect("range"))
        .await
        .expect_err("bad range");
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Unable to parse range"));
    assert_eq!(log.lock().expect("log").len(), 1);
}

#[tokio::test]
async fn service_account_tokens_are_exchanged_once_and_cached() {
    let (addr, log) = spawn_mock(responder(|req, _n| {
        if req.target == "/token" {
            (200, json!({"access_token": "ya29.test", "expires_in": 3600, "token_type": "Bearer"}).to_string())
        } else {
            (200, json!({"values": []}).to_string())
        }
    }))
    .await;

    let rsa = openssl::rsa::Rsa::generate(2048).expect("rsa");
    let pkey = openssl::pkey::PKey::from_rsa(rsa).expect("pkey");
    let pem = String::from_utf8(pkey.private_key_to_pem_pkcs8().expect("pem")).expect("utf8");
    let key = ServiceAccountKey::new("svc@project.iam.gserviceaccount.com", &pem)
        .with_token_uri(format!("http://{addr}/token"));
    let tokens: Arc<dyn AccessTokenSource> = Arc::new(ServiceAccountTokenSource::new(key));
    let backend = GoogleSheetsBackend::new("sheet-abc", Some(tokens), RetryPolicy::none())
        .with_base_url(&format!("http://{addr}/v4/spreadsheets"));

    let range = SheetRange::sheet("DB").expect("range");
    backend.get_values(&range).await.expect("first get");
    backend.get_values(&range).await.expect("second get");

    let log = log.lock().expect("log").clone();
    let token_calls: Vec<_> = log.iter().filter(|r| r.target == "/token").collect();
    assert_eq!(token_calls.len(), 1);
    assert!(token_calls[0]
        .body
        .contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
    let api_calls: Vec<_> = log.iter().filter(|r| r.target != "/token").collect();
    assert_eq!(api_calls.len(), 2);
    for call in api_calls {
        assert_eq!(call.header("authorization"), Some("Bearer ya29.test"));
    }
}
