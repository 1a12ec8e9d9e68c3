//! GitLab tools end to end against a local stand-in for the GitLab API.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{call, context, spawn_fake_gitlab, GOOD_TOKEN};
use gitlab_mcp::protocol::ProtocolHandler;
use gitlab_mcp::tools::{ToolProfile, ToolRegistry};

fn handler(profile: ToolProfile) -> ProtocolHandler {
    ProtocolHandler::new(Arc::new(ToolRegistry::build(profile)), context())
}

/// Call a tool and return `(isError, payload)`.
async fn invoke(h: &ProtocolHandler, tool: &str, arguments: Value) -> (bool, Value) {
    let resp = h
        .dispatch(call(1, tool, arguments))
        .await
        .into_response()
        .expect("response")
        .to_value();
    assert!(resp.get("error").is_none(), "unexpected rpc error: {resp}");
    let is_error = resp["result"]["isError"].as_bool().unwrap_or(false);
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    (is_error, serde_json::from_str(text).unwrap())
}

async fn registered(h: &ProtocolHandler, chat_id: &str, url: &str) {
    let (is_error, payload) = invoke(
        h,
        "register_user",
        json!({ "chat_id": chat_id, "gitlab_url": url, "access_token": GOOD_TOKEN }),
    )
    .await;
    assert!(!is_error, "{payload}");
}

// ─────────────────────── credentials ───────────────────────

#[tokio::test]
async fn test_register_and_lookup() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &format!("{gitlab}/")).await;

    let (_, info) = invoke(&h, "get_user_info", json!({ "chat_id": "chat-1" })).await;
    assert_eq!(info["registered"], true);
    assert_eq!(info["gitlab_url"], gitlab);
    assert!(info.get("access_token").is_none());
    assert!(!info.to_string().contains(GOOD_TOKEN));

    let stored = h.context().vault().get_with_secret("chat-1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, GOOD_TOKEN);
}

#[tokio::test]
async fn test_register_twice_fails() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "register_user",
        json!({ "chat_id": "chat-1", "gitlab_url": gitlab, "access_token": GOOD_TOKEN }),
    )
    .await;
    assert!(is_error);
    assert_eq!(payload["error"], "USER_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_register_with_bad_token_stores_nothing() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    let (is_error, payload) = invoke(
        &h,
        "register_user",
        json!({ "chat_id": "chat-2", "gitlab_url": gitlab, "access_token": "wrong" }),
    )
    .await;
    assert!(is_error);
    assert_eq!(payload["error"], "INVALID_CREDENTIALS");
    assert!(!h.context().vault().exists("chat-2").await.unwrap());
}

#[tokio::test]
async fn test_register_rejects_bad_url() {
    let h = handler(ToolProfile::Management);
    let (is_error, payload) = invoke(
        &h,
        "register_user",
        json!({ "chat_id": "chat-3", "gitlab_url": "ftp://nowhere", "access_token": "x" }),
    )
    .await;
    assert!(is_error);
    assert_eq!(payload["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unregister() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, _) = invoke(&h, "unregister_user", json!({ "chat_id": "chat-1" })).await;
    assert!(!is_error);
    let (is_error, payload) = invoke(&h, "unregister_user", json!({ "chat_id": "chat-1" })).await;
    assert!(is_error);
    assert_eq!(payload["error"], "USER_NOT_REGISTERED");

    let (_, info) = invoke(&h, "get_user_info", json!({ "chat_id": "chat-1" })).await;
    assert_eq!(info["registered"], false);
}

#[tokio::test]
async fn test_gitlab_tool_requires_registration() {
    let h = handler(ToolProfile::Management);
    let (is_error, payload) = invoke(&h, "list_projects", json!({ "chat_id": "ghost" })).await;
    assert!(is_error);
    assert_eq!(payload["error"], "USER_NOT_REGISTERED");
}

// ─────────────────────── GitLab operations ───────────────────────

#[tokio::test]
async fn test_list_projects_with_search() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "list_projects",
        json!({ "chat_id": "chat-1", "search": "app" }),
    )
    .await;
    assert!(!is_error, "{payload}");
    assert_eq!(payload["total"], 1);
    assert_eq!(payload["projects"][0]["full_path"], "group/app");
    assert_eq!(payload["projects"][0]["description"], "No description");
}

#[tokio::test]
async fn test_pipeline_status_uses_default_branch() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "get_pipeline_status",
        json!({ "chat_id": "chat-1", "project_path": "group/app" }),
    )
    .await;
    assert!(!is_error, "{payload}");
    assert_eq!(payload["branch"], "main");
    assert_eq!(payload["pipeline"]["id"], 500);
    assert_eq!(payload["pipeline"]["commit_sha"], "01234567");
    assert_eq!(payload["pipeline"]["stages"][1]["name"], "test");
    assert_eq!(payload["pipeline"]["stages"][1]["status"], "failed");
}

#[tokio::test]
async fn test_pipeline_status_without_pipelines() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "get_pipeline_status",
        json!({ "chat_id": "chat-1", "project_path": "group/app", "branch": "feature" }),
    )
    .await;
    assert!(!is_error);
    assert_eq!(payload["error"], "NO_PIPELINE");
}

#[tokio::test]
async fn test_upstream_404_is_gitlab_error() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "get_pipeline_status",
        json!({ "chat_id": "chat-1", "project_path": "group/missing" }),
    )
    .await;
    assert!(is_error);
    assert_eq!(payload["error"], "GITLAB_ERROR");
}

#[tokio::test]
async fn test_create_issue_with_assignee() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "create_issue",
        json!({
            "chat_id": "chat-1",
            "project_path": "group/app",
            "title": "Bug",
            "labels": ["bug", "p1"],
            "assignee": "bob"
        }),
    )
    .await;
    assert!(!is_error, "{payload}");
    assert_eq!(payload["issue"]["iid"], 42);
    assert_eq!(payload["issue"]["assignees"], json!(["bob"]));
    assert!(payload.get("warnings").is_none());
}

#[tokio::test]
async fn test_create_issue_unknown_assignee_warns() {
    let gitlab = spawn_fake_gitlab().await;
    let h = handler(ToolProfile::Management);
    registered(&h, "chat-1", &gitlab).await;

    let (is_error, payload) = invoke(
        &h,
        "create_issue",
        json!({
            "chat_id": "chat-1",
            "project_path": "group/app",
            "title": "Bug",
            "assignee": "nobody"
        }),
    )
    .await;
    assert!(!is_error);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["warnings"].as_array().unwrap().len(), 1);
}

// ─────────────────────── review profile ───────────────────────

#[tokio::test]
async fn test_review_profile_hides_management_tools() {
    let h = handler(ToolProfile::Review);
    let resp = h
        .dispatch(call(1, "register_user", json!({})))
        .await
        .into_response()
        .unwrap()
        .to_value();
    assert_eq!(resp["error"]["code"], -32601);
}

#[tokio::test]
async fn test_review_patch_without_diff() {
    let h = handler(ToolProfile::Review);
    let (is_error, payload) = invoke(&h, "review_patch", json!({})).await;
    assert!(is_error);
    assert_eq!(payload["error"], "NO_DIFF");
}

#[tokio::test]
async fn test_review_patch_from_changes() {
    let h = handler(ToolProfile::Review);
    let (is_error, payload) = invoke(
        &h,
        "review_patch",
        json!({
            "changes": [{
                "old_path": "src/app.js",
                "new_path": "src/app.js",
                "diff": "@@ -1,1 +1,2 @@\n const a = 1;\n+console.log(a);\n"
            }],
            "mr_iid": 3
        }),
    )
    .await;
    assert!(!is_error, "{payload}");
    assert_eq!(payload["stats"]["files"], 1);
    assert_eq!(payload["stats"]["additions"], 1);
    assert_eq!(payload["findings"][0]["file"], "src/app.js");
    assert_eq!(payload["findings"][0]["line"], 2);
    assert_eq!(payload["summary"][2], "MR !3");
}

#[tokio::test]
async fn test_suggest_tests_rejects_out_of_range_limit() {
    let h = handler(ToolProfile::All);
    let (is_error, payload) = invoke(
        &h,
        "suggest_tests",
        json!({ "patch": "diff --git a/x b/x\n", "max_items": 0 }),
    )
    .await;
    assert!(is_error);
    assert_eq!(payload["error"], "VALIDATION_ERROR");
}
