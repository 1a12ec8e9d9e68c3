//! Dispatcher and batch behaviour over scripted tools.

mod common;

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use common::{call, handler, notification, request};
use gitlab_mcp::protocol::{BatchOutcome, ProtocolHandler};
use gitlab_mcp::types::DispatchOutcome;

async fn send(handler: &ProtocolHandler, msg: Value) -> Value {
    handler
        .dispatch(msg)
        .await
        .into_response()
        .expect("expected a response")
        .to_value()
}

fn tool_text(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("json payload")
}

// ─────────────────────── lifecycle ───────────────────────

#[tokio::test]
async fn test_initialize_echoes_client_version() {
    let h = handler();
    let resp = send(
        &h,
        request(
            json!(0),
            "initialize",
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0" }
            }),
        ),
    )
    .await;

    assert_eq!(resp["id"], 0);
    assert_eq!(resp["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(resp["result"]["serverInfo"]["name"], "gitlab-mcp");
    assert_eq!(resp["result"]["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn test_initialize_without_params_uses_default_version() {
    let h = handler();
    let resp = send(&h, json!({"jsonrpc": "2.0", "id": "init", "method": "initialize"})).await;
    assert_eq!(resp["id"], "init");
    assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
}

#[tokio::test]
async fn test_ping_and_initialized_notification() {
    let h = handler();
    let resp = send(&h, request(json!(7), "ping", Value::Null)).await;
    assert_eq!(resp["result"], json!({}));

    let outcome = h.dispatch(notification("notifications/initialized")).await;
    assert!(matches!(outcome, DispatchOutcome::Suppressed));
}

// ─────────────────────── tools ───────────────────────

#[tokio::test]
async fn test_tools_list_in_registration_order() {
    let h = handler();
    let resp = send(&h, request(json!(1), "tools/list", json!({}))).await;
    let names: Vec<&str> = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["echo", "refuse", "reject", "crash", "explode"]);
    assert_eq!(resp["result"]["tools"][0]["inputSchema"]["type"], "object");
}

#[tokio::test]
async fn test_tools_call_success() {
    let h = handler();
    let resp = send(&h, call(2, "echo", json!({"hello": "world"}))).await;
    assert_eq!(resp["id"], 2);
    assert!(resp.get("error").is_none());
    assert_eq!(tool_text(&resp), json!({"hello": "world"}));
}

#[tokio::test]
async fn test_tools_call_null_arguments_become_empty_object() {
    let h = handler();
    let resp = send(
        &h,
        request(json!(3), "tools/call", json!({"name": "echo", "arguments": null})),
    )
    .await;
    assert_eq!(tool_text(&resp), json!({}));
}

#[tokio::test]
async fn test_unknown_tool_is_method_not_found() {
    let h = handler();
    let resp = send(&h, call(4, "does_not_exist", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32601);
    assert_eq!(resp["error"]["message"], "Tool not found: does_not_exist");
}

#[tokio::test]
async fn test_tools_call_bad_params() {
    let h = handler();

    let missing = send(&h, json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call"})).await;
    assert_eq!(missing["error"]["code"], -32602);

    let no_name = send(&h, request(json!(6), "tools/call", json!({"arguments": {}}))).await;
    assert_eq!(no_name["error"]["code"], -32602);

    let bad_args = send(
        &h,
        request(json!(7), "tools/call", json!({"name": "echo", "arguments": [1, 2]})),
    )
    .await;
    assert_eq!(bad_args["error"]["code"], -32602);
}

#[tokio::test]
async fn test_domain_failure_is_an_error_result() {
    let h = handler();
    let resp = send(&h, call(8, "refuse", json!({}))).await;
    assert!(resp.get("error").is_none());
    assert_eq!(resp["result"]["isError"], true);
    let payload = tool_text(&resp);
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error"], "VALIDATION_ERROR");
    assert_eq!(payload["message"], "nope");
}

#[tokio::test]
async fn test_tool_chosen_rpc_code_is_preserved() {
    let h = handler();
    let resp = send(&h, call(9, "reject", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32050);
    assert_eq!(resp["error"]["message"], "Rate limited");
}

#[tokio::test]
async fn test_internal_error_detail_is_hidden() {
    let h = handler();
    let resp = send(&h, call(10, "crash", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32603);
    assert_eq!(resp["error"]["message"], "Internal error");
    assert!(!resp.to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_unknown_method() {
    let h = handler();
    let resp = send(&h, request(json!(11), "resources/list", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32601);
}

// ─────────────────────── envelopes ───────────────────────

#[tokio::test]
async fn test_notifications_never_answered() {
    let h = handler();
    for msg in [
        notification("tools/list"),
        notification("no/such/method"),
        json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "missing"}}),
    ] {
        assert!(matches!(h.dispatch(msg).await, DispatchOutcome::Suppressed));
    }
}

#[tokio::test]
async fn test_explicit_null_id_is_a_request() {
    let h = handler();
    let resp = send(&h, request(Value::Null, "ping", json!({}))).await;
    assert_eq!(resp["id"], Value::Null);
    assert_eq!(resp["result"], json!({}));
}

#[tokio::test]
async fn test_invalid_envelopes() {
    let h = handler();

    let wrong_version = send(&h, json!({"jsonrpc": "1.0", "id": 12, "method": "ping"})).await;
    assert_eq!(wrong_version["error"]["code"], -32600);
    assert_eq!(wrong_version["id"], 12);

    let not_object = send(&h, json!("ping")).await;
    assert_eq!(not_object["error"]["code"], -32600);
    assert_eq!(not_object["id"], Value::Null);

    let float_id = send(&h, json!({"jsonrpc": "2.0", "id": 1.5, "method": "ping"})).await;
    assert_eq!(float_id["error"]["code"], -32600);
    assert_eq!(float_id["id"], Value::Null);

    let no_method = send(&h, json!({"jsonrpc": "2.0", "id": "abc"})).await;
    assert_eq!(no_method["error"]["code"], -32600);
    assert_eq!(no_method["id"], "abc");
}

// ─────────────────────── batches ───────────────────────

#[tokio::test]
async fn test_batch_preserves_order_despite_latency() {
    let h = handler();
    let outcome = h
        .dispatch_batch(vec![
            call(1, "echo", json!({"delay_ms": 50, "n": 1})),
            call(2, "echo", json!({"n": 2})),
            call(3, "echo", json!({"delay_ms": 10, "n": 3})),
        ])
        .await;

    let BatchOutcome::Responses(responses) = outcome else {
        panic!("expected responses");
    };
    let ids: Vec<Value> = responses.iter().map(|r| r.to_value()["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_batch_elements_run_concurrently() {
    let h = handler();
    let batch: Vec<Value> = (1..=4)
        .map(|n| call(n, "echo", json!({"delay_ms": 300, "n": n})))
        .collect();

    let started = Instant::now();
    let outcome = h.dispatch_batch(batch).await;
    let elapsed = started.elapsed();

    let BatchOutcome::Responses(responses) = outcome else {
        panic!("expected responses");
    };
    assert_eq!(responses.len(), 4);
    // Run one after another this would take at least 1200ms.
    assert!(elapsed < Duration::from_millis(900), "batch took {elapsed:?}");
}

#[tokio::test]
async fn test_batch_omits_notifications() {
    let h = handler();
    let outcome = h
        .dispatch_batch(vec![
            notification("notifications/initialized"),
            request(json!("a"), "ping", json!({})),
            notification("no/such/method"),
            call(2, "refuse", json!({})),
        ])
        .await;

    let BatchOutcome::Responses(responses) = outcome else {
        panic!("expected responses");
    };
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].to_value()["id"], "a");
    assert_eq!(responses[1].to_value()["result"]["isError"], true);
}

#[tokio::test]
async fn test_batch_element_errors_stay_in_place() {
    let h = handler();
    let outcome = h
        .dispatch_batch(vec![json!(42), call(1, "echo", json!({}))])
        .await;

    let BatchOutcome::Responses(responses) = outcome else {
        panic!("expected responses");
    };
    let first = responses[0].to_value();
    assert_eq!(first["error"]["code"], -32600);
    assert_eq!(first["id"], Value::Null);
    assert_eq!(responses[1].to_value()["id"], 1);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let h = handler();
    let BatchOutcome::Rejected(response) = h.dispatch_batch(Vec::new()).await else {
        panic!("expected rejection");
    };
    let value = response.to_value();
    assert_eq!(value["error"]["code"], -32600);
    assert_eq!(value["id"], Value::Null);
}

#[tokio::test]
async fn test_all_notification_batch_has_no_content() {
    let h = handler();
    let outcome = h
        .dispatch_batch(vec![
            notification("notifications/initialized"),
            notification("ping"),
        ])
        .await;
    assert!(matches!(outcome, BatchOutcome::NoContent));
}
