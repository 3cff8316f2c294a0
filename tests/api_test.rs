//! HTTP-level tests: the full router on a random port, backed by the
//! in-memory store, driven with reqwest.
//!
//! Run with: `cargo test --test api_test`

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use smsledger::config::AppConfig;
use smsledger::models::user::{Actor, UserRole};
use smsledger::services::auth::issue_access_token;
use smsledger::AppState;
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use uuid::Uuid;

const JWT_SECRET: &str = "api-test-secret";
const HDFC_SMS: &str = "A/c XX5678 debited for INR 2,500.00 on 10-Jan-26";

struct Server {
    base: String,
    client: Client,
    maker: String,
    checker: String,
    user: String,
}

fn token(username: &str, role: UserRole) -> String {
    let actor = Actor {
        id: Uuid::new_v4(),
        username: username.to_string(),
        role,
    };
    issue_access_token(&actor, JWT_SECRET, 3600).expect("token")
}

/// Spin up the app on a random port and mint one token per role.
async fn start_server() -> Server {
    let state = AppState::in_memory(AppConfig::for_memory(JWT_SECRET))
        .await
        .expect("state");
    let app = smsledger::routes::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    Server {
        base: format!("http://{addr}"),
        client: Client::new(),
        maker: token("maker", UserRole::Maker),
        checker: token("checker", UserRole::Checker),
        user: token("user", UserRole::User),
    }
}

fn extract_data(body: &Value) -> &Value {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        panic!(
            "API error: {}: {}",
            err["code"].as_str().unwrap_or("?"),
            err["message"].as_str().unwrap_or("?"),
        );
    }
    body.get("data").expect("missing 'data' field")
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("?")
}

impl Server {
    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base)
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("request");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    async fn put(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("request");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("request");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    /// Create, submit and approve the HDFC debit template; returns its id.
    async fn publish_hdfc(&self) -> String {
        let (status, created) = self
            .post(
                &self.maker,
                "/patterns",
                json!({
                    "bankAddress": "HDFCBK",
                    "bankName": "HDFC Bank",
                    "type": "DEBITED",
                    "regexPattern": r"A/c XX(\d+) debited for INR ([0-9,.]+) on (\d{2}-\w{3}-\d{2})",
                    "message": HDFC_SMS,
                    "fieldMap": { "account": 1, "amount": 2, "date": 3, "balance": -1 }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let pattern = extract_data(&created);
        assert_eq!(pattern["status"], "PENDING_APPROVAL");
        let id = pattern["id"].as_str().unwrap().to_string();

        let (status, decided) = self
            .put(
                &self.checker,
                &format!("/patterns/{id}/status"),
                json!({ "status": "APPROVED", "note": "looks right" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(extract_data(&decided)["status"], "ACTIVE");
        id
    }
}

#[tokio::test]
async fn health_probes_answer_without_auth() {
    let server = start_server().await;

    let resp = server
        .client
        .get(format!("{}/health/live", server.base))
        .send()
        .await
        .unwrap();
    assert_ok!(resp.error_for_status_ref());
    assert_eq!(resp.text().await.unwrap(), "OK");

    let ready: Value = server
        .client
        .get(format!("{}/health/ready", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let data = extract_data(&ready);
    assert_eq!(data["store"], "connected");
    assert_eq!(data["activePatterns"], 0);
}

#[tokio::test]
async fn parse_requires_a_bearer_token() {
    let server = start_server().await;
    let resp = server
        .client
        .post(server.url("/parse"))
        .json(&json!({ "sms": HDFC_SMS, "bankAddress": "HDFCBK" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .post("not-a-jwt", "/parse", json!({ "sms": HDFC_SMS, "bankAddress": "HDFCBK" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = start_server().await;
    let sms = "x".repeat(80 * 1024);
    let resp = server
        .client
        .post(server.url("/parse"))
        .bearer_auth(&server.user)
        .json(&json!({ "sms": sms, "bankAddress": "HDFCBK" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let (status, count) = server.get(&server.maker, "/unparsed-messages/pending/count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(extract_data(&count)["count"], 0);
}

#[tokio::test]
async fn approved_pattern_parses_sms_end_to_end() {
    let server = start_server().await;
    let pattern_id = server.publish_hdfc().await;

    let (status, body) = server
        .post(
            &server.user,
            "/parse",
            json!({ "sms": HDFC_SMS, "bankAddress": "HDFCBK" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let tx = extract_data(&body);
    assert_eq!(tx["accountNumber"], "XX5678");
    assert_eq!(tx["amount"], "2500.00");
    assert_eq!(tx["type"], "DEBITED");
    assert_eq!(tx["amountSign"], "DEBIT");
    assert!(tx["date"].as_str().unwrap().starts_with("2026-01-10"));
    assert!(tx["balance"].is_null());
    assert_eq!(tx["matchedPatternId"], pattern_id.as_str());

    let (status, ledger) = server.get(&server.user, "/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(extract_data(&ledger).as_array().unwrap().len(), 1);

    let (_, history) = server
        .get(&server.maker, &format!("/patterns/{pattern_id}/history"))
        .await;
    let statuses: Vec<&str> = extract_data(&history)
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["toStatus"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["PENDING_APPROVAL", "ACTIVE"]);
}

#[tokio::test]
async fn unmatched_sms_lands_in_the_queue() {
    let server = start_server().await;
    server.publish_hdfc().await;

    let (status, body) = server
        .post(
            &server.user,
            "/parse",
            json!({ "sms": "Your OTP is 482913", "bankAddress": "HDFCBK" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "NO_MATCH");

    let (_, count) = server.get(&server.maker, "/unparsed-messages/pending/count").await;
    assert_eq!(extract_data(&count)["count"], 1);

    let (_, pending) = server.get(&server.maker, "/unparsed-messages/pending").await;
    let message = &extract_data(&pending)[0];
    assert_eq!(message["smsMessage"], "Your OTP is 482913");
    let id = message["id"].as_str().unwrap().to_string();

    let path = format!("/unparsed-messages/{id}/mark-processed");
    let (status, claimed) = server.put(&server.maker, &path, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(extract_data(&claimed)["draft"]["bankName"], "HDFC Bank");

    let (status, again) = server.put(&server.maker, &path, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&again), "ALREADY_CLAIMED");
}

#[tokio::test]
async fn roles_gate_authoring_and_decisions() {
    let server = start_server().await;
    let body = json!({
        "bankAddress": "ICICIB",
        "bankName": "ICICI Bank",
        "regexPattern": "spent",
        "message": "INR 10 spent"
    });

    let (status, _) = server.post(&server.user, "/patterns", body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server.post(&server.checker, "/patterns", body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, created) = server.post(&server.maker, "/patterns", body).await;
    let id = extract_data(&created)["id"].as_str().unwrap().to_string();

    let (status, _) = server
        .put(&server.maker, &format!("/patterns/{id}/status"), json!({ "status": "APPROVED" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .put(&server.checker, &format!("/patterns/{id}/status"), json!({ "status": "REJECTED" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .put(&server.checker, &format!("/patterns/{id}/status"), json!({ "status": "APPROVED" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_DECIDED");
}

#[tokio::test]
async fn self_test_failure_rejects_submission() {
    let server = start_server().await;
    let (status, body) = server
        .post(
            &server.maker,
            "/patterns",
            json!({
                "bankAddress": "HDFCBK",
                "bankName": "HDFC Bank",
                "regexPattern": r"credited (\d+)",
                "message": "debited 100"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "SELF_TEST_FAILED");

    let (status, body) = server
        .post(
            &server.maker,
            "/patterns",
            json!({
                "bankAddress": "HDFCBK",
                "bankName": "HDFC Bank",
                "regexPattern": "(unclosed",
                "message": "anything"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_PATTERN");
}

#[tokio::test]
async fn test_match_previews_without_publishing() {
    let server = start_server().await;
    let (status, body) = server
        .post(
            &server.maker,
            "/patterns/test-match",
            json!({ "regexPattern": r"INR ([0-9,.]+)", "sampleMessage": "Paid INR 1,250.00 at CAFE" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let preview = extract_data(&body);
    assert_eq!(preview["success"], true);
    assert_eq!(preview["matchedText"], "INR 1,250.00");

    let (_, active) = server.get(&server.maker, "/patterns/active").await;
    assert!(extract_data(&active).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn alias_registration_routes_parse() {
    let server = start_server().await;
    server.publish_hdfc().await;

    let (status, alias) = server
        .post(
            &server.maker,
            "/bank-addresses/aliases",
            json!({ "alias": "ad-hdfcbk", "address": "HDFCBK" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(extract_data(&alias)["alias"], "AD-HDFCBK");

    let (status, body) = server
        .post(
            &server.user,
            "/parse",
            json!({ "sms": HDFC_SMS, "bankAddress": "AD-HDFCBK" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(extract_data(&body)["bankName"], "HDFC Bank");

    let (_, addresses) = server.get(&server.maker, "/patterns/bank-addresses").await;
    let addresses = extract_data(&addresses).as_array().unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0]["address"], "HDFCBK");
}
