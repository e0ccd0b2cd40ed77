//! Integration tests — build the router over an in-memory store and drive it
//! with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use helpdesk_api::{AppState, config::ApiConfig};
use helpdesk_core::audit::{AuditEvent, RecordingAuditSink};
use helpdesk_core::auth::password::hash_password;
use helpdesk_core::config::SecurityConfig;
use helpdesk_core::models::auth::{NewIdentity, Role};
use helpdesk_core::models::ticket::NewTicket;
use helpdesk_core::store::{IdentityStore, MemoryStore, TicketStore};
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSWORD: &str = "Start#123";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    audit: Arc<RecordingAuditSink>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_proxy_trust(false).await
    }

    async fn with_proxy_trust(trust_forwarded_for: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            trust_forwarded_for,
            security: SecurityConfig::with_secret("test-secret"),
        };
        let state = AppState::new(store.clone(), store.clone(), audit.clone(), config);
        let app = Self {
            router: helpdesk_api::router(state),
            store,
            audit,
        };
        app.seed("admin@example.com", Role::Admin, None).await;
        app.seed("client@example.com", Role::Client, None).await;
        app.seed("other@example.com", Role::Client, None).await;
        app.seed("tech@example.com", Role::Tech, Some(r#"["Linux","Networking"]"#))
            .await;
        app
    }

    async fn seed(&self, email: &str, role: Role, skills: Option<&str>) -> i64 {
        self.store
            .create_identity(NewIdentity {
                email: email.into(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
                account_id: None,
                skills: skills.map(str::to_string),
            })
            .await
            .unwrap()
            .id
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("parse JSON")
        };
        (status, headers, json)
    }

    async fn login(&self, email: &str) -> String {
        let (status, _, body) = self
            .send(post_json("/auth/login", None, json!({"email": email, "password": PASSWORD})))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().expect("token").to_string()
    }
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn with_body(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn login_sets_http_only_cookie_usable_for_me() {
    let app = TestApp::new().await;
    let (status, headers, body) = app
        .send(post_json(
            "/auth/login",
            None,
            json!({"email": "client@example.com", "password": PASSWORD}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiresIn"], 86400);

    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let pair = cookie.split(';').next().unwrap();
    let req = Request::builder()
        .uri("/auth/me")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let (status, _, me) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "client@example.com");
    assert_eq!(me["role"], "client");
}

#[tokio::test]
async fn wrong_password_is_generic_401() {
    let app = TestApp::new().await;
    let (status, _, wrong) = app
        .send(post_json(
            "/auth/login",
            None,
            json!({"email": "client@example.com", "password": "Wrong#123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, unknown) = app
        .send(post_json(
            "/auth/login",
            None,
            json!({"email": "nobody@example.com", "password": PASSWORD}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn lockout_returns_423_even_with_correct_password() {
    let app = TestApp::new().await;
    for _ in 0..5 {
        let (status, _, _) = app
            .send(
                post_json(
                    "/auth/login",
                    None,
                    json!({"email": "other@example.com", "password": "Wrong#123"}),
                ),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _, body) = app
        .send(post_json(
            "/auth/login",
            None,
            json!({"email": "other@example.com", "password": PASSWORD}),
        ))
        .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["error"], "account_locked");

    let admin = app.login("admin@example.com").await;
    let (status, _, body) = app
        .send(post_json(
            "/admin/users/unlock",
            Some(&admin),
            json!({"email": "other@example.com"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wasLocked"], true);
    app.login("other@example.com").await;
}

#[tokio::test]
async fn missing_or_bad_token_is_401() {
    let app = TestApp::new().await;
    let req = Request::builder().uri("/tickets").body(Body::empty()).unwrap();
    let (status, _, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = app.send(get("/tickets", "not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Session expired");
}

#[tokio::test]
async fn ticket_visibility_and_matching() {
    let app = TestApp::new().await;
    let client = app.login("client@example.com").await;
    let other = app.login("other@example.com").await;
    let admin = app.login("admin@example.com").await;

    let (status, _, ticket) = app
        .send(post_json(
            "/tickets",
            Some(&client),
            json!({"title": "VPN down", "description": "cannot connect", "skillsNeeded": ["networking"]}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = ticket["id"].as_i64().unwrap();

    let (status, _, mine) = app.send(get("/tickets", &client)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, _, theirs) = app.send(get("/tickets", &other)).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let (status, _, _) = app.send(get(&format!("/tickets/{id}"), &other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, matches) = app
        .send(get(&format!("/admin/tickets/{id}/matches"), &admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let candidates = matches["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["email"], "tech@example.com");
    assert_eq!(candidates[0]["score"], 1);

    let tech_id = candidates[0]["id"].as_i64().unwrap();
    let (status, _, assigned) = app
        .send(post_json(
            &format!("/admin/tickets/{id}/assign/{tech_id}"),
            Some(&admin),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["techId"], tech_id);

    let tech = app.login("tech@example.com").await;
    let (status, _, _) = app.send(get(&format!("/tickets/{id}"), &tech)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn non_admin_on_admin_route_is_forbidden_and_audited() {
    let app = TestApp::with_proxy_trust(true).await;
    let tech = app.login("tech@example.com").await;

    let mut req = post_json(
        "/admin/users/password",
        Some(&tech),
        json!({"email": "client@example.com", "newPassword": "Hacked#123"}),
    );
    req.headers_mut()
        .insert("x-forwarded-for", "198.51.100.7".parse().unwrap());
    let (status, _, body) = app.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (event, source) = app.audit.events().pop().unwrap();
    assert!(matches!(event, AuditEvent::Forbidden { role: Role::Tech, .. }));
    assert_eq!(source, "198.51.100.7");
}

#[tokio::test]
async fn self_registration_creates_client_and_rejects_weak_password() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .send(post_json(
            "/auth/register",
            None,
            json!({"email": "new@example.com", "password": "Welcome#1", "role": "admin"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "client");
    assert!(body.get("passwordHash").is_none());

    let (status, _, body) = app
        .send(post_json(
            "/auth/register",
            None,
            json!({"email": "weak@example.com", "password": "Abc12345"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn logout_expires_cookie() {
    let app = TestApp::new().await;
    let token = app.login("client@example.com").await;
    let (status, headers, _) = app.send(post_json("/auth/logout", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(app.audit.events().last().unwrap().0.kind(), "logout");
}

#[tokio::test]
async fn spoofed_forwarded_for_is_ignored_without_proxy_trust() {
    let app = TestApp::new().await;
    let tech = app.login("tech@example.com").await;

    let mut req = delete("/admin/tickets/1", &tech);
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.66".parse().unwrap());
    let (status, _, _) = app.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (event, source) = app.audit.events().pop().unwrap();
    assert_eq!(event.kind(), "forbidden");
    assert_eq!(source, "unknown");
}

#[tokio::test]
async fn assigned_tech_closes_ticket_with_patch() {
    let app = TestApp::new().await;
    let client = app.login("client@example.com").await;
    let admin = app.login("admin@example.com").await;
    let tech = app.login("tech@example.com").await;

    let (_, _, ticket) = app
        .send(post_json("/tickets", Some(&client), json!({"title": "Printer"})))
        .await;
    let id = ticket["id"].as_i64().unwrap();
    let uri = format!("/tickets/{id}");

    let (status, _, _) = app
        .send(with_body("PATCH", &uri, &tech, json!({"status": "closed"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = app
        .send(with_body("PATCH", &uri, &client, json!({"status": "closed"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let tech_id = app.store.find_identity_by_email("tech@example.com").await.unwrap().unwrap().id;
    app.send(post_json(
        &format!("/admin/tickets/{id}/assign/{tech_id}"),
        Some(&admin),
        json!({}),
    ))
    .await;

    let (status, _, closed) = app
        .send(with_body(
            "PATCH",
            &uri,
            &tech,
            json!({"status": "closed", "priority": "high"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{closed}");
    assert_eq!(closed["status"], "closed");
    assert_eq!(closed["priority"], "high");
    assert!(closed["closedAt"].is_string());

    let (status, _, body) = app
        .send(with_body("PATCH", &uri, &tech, json!({"status": "done"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn malformed_stored_skills_make_matching_400() {
    let app = TestApp::new().await;
    let admin = app.login("admin@example.com").await;
    let ticket = app
        .store
        .create_ticket(NewTicket {
            title: "Imported".into(),
            description: String::new(),
            priority: "low".into(),
            client_id: 2,
            skills_needed: Some("not json".into()),
        })
        .await
        .unwrap();

    let (status, _, body) = app
        .send(get(&format!("/admin/tickets/{}/matches", ticket.id), &admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn admin_deletes_user_and_reads_it_back_from_audit_log() {
    let app = TestApp::new().await;
    let admin = app.login("admin@example.com").await;
    let tech = app.login("tech@example.com").await;
    let tech_id = app.store.find_identity_by_email("tech@example.com").await.unwrap().unwrap().id;

    let (status, _, _) = app.send(delete(&format!("/admin/users/{tech_id}"), &tech)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, removed) = app.send(delete(&format!("/admin/users/{tech_id}"), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["email"], "tech@example.com");

    let (status, _, _) = app.send(delete(&format!("/admin/users/{tech_id}"), &admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, logs) = app
        .send(get("/admin/logs?search=deleted&limit=10", &admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = logs.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["event"], "identity_deleted");
    assert!(entries[0]["detail"].as_str().unwrap().contains("tech@example.com"));

    let (status, _, page) = app.send(get("/admin/logs?page=1&limit=2", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page.as_array().unwrap().len(), 2);

    let client = app.login("client@example.com").await;
    let (status, _, _) = app.send(get("/admin/logs", &client)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn clear_database_needs_confirmation_and_keeps_caller() {
    let app = TestApp::new().await;
    let admin = app.login("admin@example.com").await;
    let client = app.login("client@example.com").await;
    app.send(post_json("/tickets", Some(&client), json!({"title": "x"})))
        .await;

    let (status, _, _) = app
        .send(post_json("/admin/maintenance/clear", Some(&admin), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, summary) = app
        .send(post_json(
            "/admin/maintenance/clear",
            Some(&admin),
            json!({"confirm": true}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["tickets"], 1);
    assert_eq!(summary["identities"], 3);
    app.login("admin@example.com").await;
    assert!(app.store.find_identity_by_email("client@example.com").await.unwrap().is_none());
}
