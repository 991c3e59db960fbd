//! End-to-end tests over a real server: each test binds 127.0.0.1:0 with
//! in-memory SQLite and a tempdir-backed store, then drives the JSON and
//! multipart API with reqwest.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use taskhive_core::user::{CreateUser, Role};
use taskhive_server::test_helpers::{spawn_test_server, TestServer};

const PASSWORD: &str = "Secret1!";

async fn register(client: &Client, base: &str, name: &str, email: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

/// Seed an admin account directly (there is no HTTP route for that), then
/// log in over HTTP like any other user.
async fn admin_session(server: &TestServer, client: &Client) -> Value {
    server
        .service
        .register_user(
            &CreateUser {
                name: "Root".into(),
                email: "root@example.com".into(),
                password: PASSWORD.into(),
            },
            Role::Admin,
        )
        .await
        .unwrap();
    let resp = client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({ "email": "root@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

fn task_form(title: &str, category: &str) -> Form {
    Form::new()
        .text("title", title.to_string())
        .text("category", category.to_string())
}

fn pdf_part(file_name: &str) -> Part {
    Part::bytes(b"%PDF-1.4 test".to_vec())
        .file_name(file_name.to_string())
        .mime_str("application/pdf")
        .unwrap()
}

fn token(session: &Value) -> String {
    session["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let server = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/api/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_round_trip() {
    let server = spawn_test_server().await;
    let client = Client::new();

    let session = register(&client, &server.base_url, "Ann", "a@x.com").await;
    assert_eq!(session["name"], "Ann");
    assert_eq!(session["role"], "user");
    assert!(session["token"].as_str().is_some());
    assert!(session.get("passwordHash").is_none());

    let resp = client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({ "email": "a@x.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let login: Value = resp.json().await.unwrap();
    assert_eq!(login["id"], session["id"]);

    let resp = client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({ "email": "a@x.com", "password": "wrong-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert!(body.get("token").is_none());
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let server = spawn_test_server().await;
    let client = Client::new();

    register(&client, &server.base_url, "Ann", "a@x.com").await;
    let resp = client
        .post(format!("{}/api/auth/register", server.base_url))
        .json(&json!({ "name": "Ann Again", "email": "a@x.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let server = spawn_test_server().await;
    let client = Client::new();

    let resp = client
        .get(format!("{}/api/tasks", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_crud_round_trip() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let token = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);

    let form = task_form("Buy milk", "Shopping")
        .text("description", "2 liters")
        .text("dueDate", "2026-09-01")
        .text("dueTime", "10:30");
    let resp = client
        .post(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["title"], "Buy milk");
    assert_eq!(created["category"], "Shopping");
    assert_eq!(created["status"], "pending");
    assert_eq!(created["dueDate"], "2026-09-01");
    assert_eq!(created["dueTime"], "10:30");
    let id = created["id"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let tasks: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"].as_str().unwrap(), id);
    assert_eq!(tasks[0]["description"], "2 liters");

    // Partial update: status flips, a present-but-empty dueTime clears,
    // everything else stays.
    let resp = client
        .put(format!("{}/api/tasks/{id}", server.base_url))
        .bearer_auth(&token)
        .multipart(Form::new().text("status", "completed").text("dueTime", ""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["title"], "Buy milk");
    assert!(updated["dueTime"].is_null());
    assert_eq!(updated["dueDate"], "2026-09-01");

    let resp = client
        .delete(format!("{}/api/tasks/{id}", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Task deleted");

    let tasks: Vec<Value> = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn attachment_lifecycle_over_http() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let token = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);

    let form = task_form("With files", "Work")
        .part("files", pdf_part("report.pdf"))
        .part("files", pdf_part("appendix.pdf"));
    let resp = client
        .post(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    let attachments = created["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0]["fileName"], "report.pdf");
    let first_url = attachments[0]["fileUrl"].as_str().unwrap().to_string();
    assert!(first_url.starts_with("/uploads/"));

    // Stored bytes are served back with the right content type.
    let resp = client
        .get(format!("{}{first_url}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"%PDF-1.4 test");

    // Remove one attachment by URL.
    let resp = client
        .put(format!("{}/api/tasks/{id}", server.base_url))
        .bearer_auth(&token)
        .multipart(Form::new().text(
            "deletedFiles",
            serde_json::to_string(&vec![first_url.clone()]).unwrap(),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["attachments"].as_array().unwrap().len(), 1);
    assert_eq!(updated["attachments"][0]["fileName"], "appendix.pdf");

    // The file itself is gone too.
    let resp = client
        .get(format!("{}{first_url}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // A URL matching nothing is a no-op.
    let resp = client
        .put(format!("{}/api/tasks/{id}", server.base_url))
        .bearer_auth(&token)
        .multipart(Form::new().text(
            "deletedFiles",
            serde_json::to_string(&vec!["/uploads/never-existed.pdf"]).unwrap(),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["attachments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn disallowed_file_type_rejects_the_whole_create() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let token = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);

    let script = Part::bytes(b"#!/bin/sh".to_vec())
        .file_name("evil.sh")
        .mime_str("text/x-shellscript")
        .unwrap();
    let form = task_form("Doomed", "Work").part("files", script);
    let resp = client
        .post(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // No partial task persisted.
    let tasks: Vec<Value> = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn cross_user_isolation() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let ann = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);
    let bob = token(&register(&client, &server.base_url, "Bob", "b@x.com").await);

    let resp = client
        .post(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&ann)
        .multipart(task_form("Buy milk", "Shopping"))
        .send()
        .await
        .unwrap();
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let tasks: Vec<Value> = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tasks.is_empty());

    let resp = client
        .put(format!("{}/api/tasks/{id}", server.base_url))
        .bearer_auth(&bob)
        .multipart(Form::new().text("status", "completed"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .delete(format!("{}/api/tasks/{id}", server.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Admin routes are forbidden for regular accounts.
    let resp = client
        .get(format!("{}/api/admin/tasks", server.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stats_for_the_caller_only() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let ann = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);
    let bob = token(&register(&client, &server.base_url, "Bob", "b@x.com").await);

    for (tok, title, status) in [
        (&ann, "A", "pending"),
        (&ann, "B", "completed"),
        (&bob, "C", "in-progress"),
    ] {
        client
            .post(format!("{}/api/tasks", server.base_url))
            .bearer_auth(tok)
            .multipart(task_form(title, "Work").text("status", status.to_string()))
            .send()
            .await
            .unwrap();
    }

    let stats: Value = client
        .get(format!("{}/api/tasks/stats", server.base_url))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalTasks"], 2);
    assert_eq!(stats["pendingTasks"], 1);
    assert_eq!(stats["completedTasks"], 1);
    assert_eq!(stats["inProgressTasks"], 0);
    assert!(stats.get("totalUsers").is_none());
}

#[tokio::test]
async fn admin_sees_everything() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let ann = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);
    let bob = token(&register(&client, &server.base_url, "Bob", "b@x.com").await);
    let admin = token(&admin_session(&server, &client).await);

    for (tok, title) in [(&ann, "Ann's"), (&bob, "Bob's")] {
        client
            .post(format!("{}/api/tasks", server.base_url))
            .bearer_auth(tok)
            .multipart(task_form(title, "Personal"))
            .send()
            .await
            .unwrap();
    }

    let tasks: Vec<Value> = client
        .get(format!("{}/api/admin/tasks", server.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
    // Owner identity is joined in.
    assert!(tasks.iter().all(|t| t["owner"]["email"].as_str().is_some()));

    let users: Vec<Value> = client
        .get(format!("{}/api/admin/users", server.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Regular accounts only; the admin itself is not listed.
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));

    let stats: Value = client
        .get(format!("{}/api/admin/stats", server.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalTasks"], 2);
    assert_eq!(stats["totalUsers"], 2);
}

#[tokio::test]
async fn admin_reassigns_a_task() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let ann_session = register(&client, &server.base_url, "Ann", "a@x.com").await;
    let bob_session = register(&client, &server.base_url, "Bob", "b@x.com").await;
    let ann = token(&ann_session);
    let bob = token(&bob_session);
    let admin = token(&admin_session(&server, &client).await);

    let created: Value = client
        .post(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&ann)
        .multipart(task_form("Handover", "Work"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let resp = client
        .put(format!("{}/api/admin/assign", server.base_url))
        .bearer_auth(&admin)
        .json(&json!({ "taskId": id, "userId": bob_session["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let assigned: Value = resp.json().await.unwrap();
    assert_eq!(assigned["owner"]["email"], "b@x.com");

    // Visibility moved from Ann to Bob.
    let ann_tasks: Vec<Value> = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ann_tasks.is_empty());
    let bob_tasks: Vec<Value> = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bob_tasks.len(), 1);

    let resp = client
        .put(format!("{}/api/admin/assign", server.base_url))
        .bearer_auth(&admin)
        .json(&json!({ "taskId": id, "userId": "ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_creates_updates_and_deletes_for_a_user() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let ann_session = register(&client, &server.base_url, "Ann", "a@x.com").await;
    let ann = token(&ann_session);
    let admin = token(&admin_session(&server, &client).await);

    // Target is required, and must exist.
    let resp = client
        .post(format!("{}/api/admin/tasks", server.base_url))
        .bearer_auth(&admin)
        .multipart(task_form("No target", "Work"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{}/api/admin/tasks", server.base_url))
        .bearer_auth(&admin)
        .multipart(task_form("Ghost target", "Work").text("assignToUserId", "ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{}/api/admin/tasks", server.base_url))
        .bearer_auth(&admin)
        .multipart(
            task_form("For Ann", "Work")
                .text("assignToUserId", ann_session["id"].as_str().unwrap().to_string()),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["owner"]["email"], "a@x.com");
    let id = created["id"].as_str().unwrap();

    // Ann sees the task the admin created for her.
    let ann_tasks: Vec<Value> = client
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ann_tasks.len(), 1);

    // The admin routes bypass the ownership gate.
    let resp = client
        .put(format!("{}/api/admin/tasks/{id}", server.base_url))
        .bearer_auth(&admin)
        .multipart(Form::new().text("status", "in-progress"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .delete(format!("{}/api/admin/tasks/{id}", server.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn promotion_takes_effect_without_a_new_token() {
    let server = spawn_test_server().await;
    let client = Client::new();
    let ann = token(&register(&client, &server.base_url, "Ann", "a@x.com").await);

    let resp = client
        .get(format!("{}/api/admin/stats", server.base_url))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The role is read fresh from the user record on every request.
    server.service.promote_user("a@x.com").await.unwrap();

    let resp = client
        .get(format!("{}/api/admin/stats", server.base_url))
        .bearer_auth(&ann)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
