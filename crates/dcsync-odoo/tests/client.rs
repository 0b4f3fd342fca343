//! Integration tests for `OdooClient` using wiremock HTTP mocks.

use dcsync_odoo::{Domain, ErpClient, OdooClient, OdooError, OdooSettings, Record, SearchOptions};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, max_retries: u32) -> OdooClient {
    OdooClient::new(&OdooSettings {
        base_url: base_url.to_string(),
        db: "shop".to_string(),
        username: "sync@example.com".to_string(),
        password: "secret".to_string(),
        timeout_secs: 30,
        max_retries,
        retry_backoff_base_ms: 0,
    })
    .expect("client construction should not fail")
}

async fn mount_login(server: &MockServer, uid: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "params": { "service": "common", "method": "login", "args": ["shop", "sync@example.com", "secret"] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": uid
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn search_logs_in_once_and_sends_domain() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": ["shop", 2, "secret", "sale.order", "search",
                         [[["client_order_ref", "=", "1042"]]], { "limit": 1 }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 2, "result": [777]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let domain = Domain::new().eq("client_order_ref", "1042");
    for _ in 0..2 {
        let ids = client
            .search_with("sale.order", &domain, &SearchOptions::limit(1))
            .await
            .expect("search should succeed");
        assert_eq!(ids, vec![777]);
    }

    let login_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains("\"login\""))
        .count();
    assert_eq!(login_calls, 1, "uid should be cached after the first login");
}

#[tokio::test]
async fn rejected_credentials_surface_as_auth_error() {
    let server = MockServer::start().await;
    mount_login(&server, json!(false)).await;

    let client = test_client(&server.uri(), 0);
    let err = client
        .search("res.partner", &Domain::new())
        .await
        .expect_err("login should fail");
    assert!(matches!(err, OdooError::Auth { ref db, .. } if db == "shop"));
}

#[tokio::test]
async fn create_returns_new_id_and_accepts_list_form() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "params": { "args": ["shop", 2, "secret", "res.partner", "create", [{ "name": "Dana Reyes" }], {}] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 2, "result": [55]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let mut values = Record::new();
    values.insert("name".to_string(), json!("Dana Reyes"));
    let id = client
        .create("res.partner", values)
        .await
        .expect("create should succeed");
    assert_eq!(id, 55);
}

#[tokio::test]
async fn rpc_fault_is_not_retried() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "params": { "service": "object" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": { "name": "odoo.exceptions.ValidationError", "message": "Missing required field" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let err = client
        .write("res.partner", &[55], Record::new())
        .await
        .expect_err("write should fail");
    assert!(matches!(err, OdooError::Rpc { ref message, .. } if message == "Missing required field"));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "params": { "service": "object" } })))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "params": { "service": "object" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 3, "result": 4
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let count = client
        .search_count("account.move", &Domain::new().eq("state", "posted"))
        .await
        .expect("second attempt should succeed");
    assert_eq!(count, 4);
}

#[tokio::test]
async fn create_is_not_resent_after_a_gateway_timeout() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "params": { "service": "object" } })))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "params": { "service": "object" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 3, "result": 900
        })))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let mut values = Record::new();
    values.insert("name".to_string(), json!("Dana Reyes"));
    let err = client
        .create("res.partner", values)
        .await
        .expect_err("create should surface the gateway error");
    assert!(matches!(err, OdooError::Http(_)));
}

#[tokio::test]
async fn write_is_not_resent_after_a_server_error() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "params": { "service": "object" } })))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let err = client
        .write("sale.order", &[777], Record::new())
        .await
        .expect_err("write should surface the server error");
    assert!(matches!(err, OdooError::Http(_)));
}

#[tokio::test]
async fn search_read_passes_fields_and_options() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "params": { "args": ["shop", 2, "secret", "res.partner", "search_read",
                                 [[["id", ">", 10]]],
                                 { "fields": ["name", "zip"], "limit": 2, "order": "id asc" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": [
                { "id": 11, "name": "Dana Reyes", "zip": "80202" },
                { "id": 12, "name": "Sam Ortiz", "zip": false }
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let records = client
        .search_read(
            "res.partner",
            &Domain::new().with("id", ">", 10),
            &["name", "zip"],
            &SearchOptions::limit(2).ordered("id asc"),
        )
        .await
        .expect("search_read should succeed");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["zip"], json!(false));
}

#[tokio::test]
async fn call_method_invokes_record_action() {
    let server = MockServer::start().await;
    mount_login(&server, json!(2)).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "params": { "args": ["shop", 2, "secret", "sale.order", "action_cancel", [[777]], {}] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 2, "result": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let result = client
        .call_method("sale.order", "action_cancel", &[777])
        .await
        .expect("action should succeed");
    assert_eq!(result, json!(true));
}
