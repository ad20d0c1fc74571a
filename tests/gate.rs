//! Router behaviour that is decided before any query runs: the admin gate, request validation
//! and method handling. The pool connects lazily; reads that get past the gate fail fast on it.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use f1db::{app_routes, builtin_catalog, resolve, AppState, SessionStore};
use std::time::Duration;
use tower::ServiceExt;

const TABLE_PATHS: &[&str] = &[
    "driver",
    "constructor",
    "circuit",
    "season",
    "grandprix",
    "mainrace",
    "qualificationrace",
    "qualifyingresult",
    "raceresult",
    "pitstop",
    "driverentry",
];

fn state_with_ttl(ttl: Duration) -> AppState {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://localhost/f1db_test")
        .unwrap();
    let model = resolve(&builtin_catalog().unwrap()).unwrap();
    AppState::new(pool, model, SessionStore::new(ttl))
}

fn app(state: &AppState) -> Router {
    app_routes(state.clone()).unwrap()
}

fn request(method: Method, uri: &str, body: Option<&str>, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(cookie) = session {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn login_cookie(state: &AppState) -> String {
    let id = state.sessions.create("admin");
    format!("theme=dark; sid={}", id)
}

#[tokio::test]
async fn writes_without_session_are_denied_for_every_table() {
    let state = state_with_ttl(Duration::from_secs(60));
    for path in TABLE_PATHS {
        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let uri = format!("/{}", path);
            let (status, body) = send(app(&state), request(method.clone(), &uri, Some("{}"), None)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
            assert_eq!(body, "Access denied");
        }
    }
}

#[tokio::test]
async fn reads_without_session_are_never_denied() {
    let state = state_with_ttl(Duration::from_secs(60));
    for path in TABLE_PATHS {
        for uri in [format!("/{}", path), format!("/{}", path.to_ascii_uppercase())] {
            let (status, body) = send(app(&state), request(Method::GET, &uri, None, None)).await;
            assert_ne!(status, StatusCode::FORBIDDEN, "GET {} -> {}", uri, body);
            assert!(!body.ends_with(" not found"), "GET {} -> {}", uri, body);
        }
    }
}

#[tokio::test]
async fn route_segments_ignore_case() {
    let state = state_with_ttl(Duration::from_secs(60));
    let cookie = login_cookie(&state);
    let (status, body) = send(app(&state), request(Method::PUT, "/Circuit", Some(r#"{"Name":"Monza"}"#), Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    let (status, _) = send(app(&state), request(Method::DELETE, "/PitStop", Some("{}"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_table_is_never_public() {
    let state = state_with_ttl(Duration::from_secs(60));
    let (status, _) = send(app(&state), request(Method::GET, "/admin", None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(app(&state), request(Method::DELETE, "/admin", Some("{}"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unsupported_methods_get_405() {
    let state = state_with_ttl(Duration::from_secs(60));
    let (status, body) = send(app(&state), request(Method::PATCH, "/circuit", Some("{}"), None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, "Method Not Allowed");
}

#[tokio::test]
async fn unknown_table_is_404() {
    let state = state_with_ttl(Duration::from_secs(60));
    let (status, _) = send(app(&state), request(Method::GET, "/teams", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_requires_both_fields() {
    let state = state_with_ttl(Duration::from_secs(60));
    let (status, body) = send(
        app(&state),
        request(Method::POST, "/admin/login", Some(r#"{"username":"admin"}"#), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Username and Password are required");

    let (status, _) = send(app(&state), request(Method::POST, "/admin/login", Some("not json"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_write_bodies_are_rejected_before_the_database() {
    let state = state_with_ttl(Duration::from_secs(60));
    let cookie = login_cookie(&state);
    let cases: &[(Method, &str, &str)] = &[
        (Method::PUT, "/circuit", r#"{"Name":"Monza"}"#),
        (Method::PUT, "/circuit", r#"{"Circuit_ID":1,"Name; DROP TABLE Circuit":"x"}"#),
        (Method::DELETE, "/circuit", "{}"),
        (Method::DELETE, "/driver", r#"{"Nickname":"x"}"#),
        (Method::POST, "/circuit", "[]"),
        (Method::POST, "/circuit", r#"{"Country":"UK"}"#),
        (Method::POST, "/circuit", r#"[{"Name":"A"},{"Name":"B","Country":"UK"}]"#),
        (Method::POST, "/driver", r#"{"Name":"Max","DOB":"someday"}"#),
        (Method::POST, "/pitstop", r#"{"Lap_Number":3000000000}"#),
        (Method::POST, "/pitstop", r#"{"Time_in_Pit":"banana"}"#),
        (Method::PUT, "/pitstop", r#"{"PitStop_ID":1,"Time_in_Pit":"banana"}"#),
        (Method::DELETE, "/pitstop", r#"{"Lap_Number":-3000000000}"#),
        (Method::DELETE, "/admin", r#"{"username":"admin"}"#),
    ];
    for (method, uri, body) in cases {
        let (status, text) = send(app(&state), request(method.clone(), uri, Some(body), Some(&cookie))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {} {} -> {}", method, uri, body, text);
    }
}

#[tokio::test]
async fn malformed_query_fragments_are_rejected() {
    let state = state_with_ttl(Duration::from_secs(60));
    for uri in [
        "/circuit?where=1=1%3B%20DROP%20TABLE%20Circuit",
        "/circuit?join=Admin",
        "/circuit?orderBy=Name%3B%20DELETE%20FROM%20Circuit",
        "/circuit?limit=5%20UNION%20SELECT%201",
        "/circuit?Circuit_ID=1%20OR%201%3D1",
        "/driver?where=password=x",
        "/pitstop?Lap_Number=3000000000",
        "/pitstop?where=Lap_Number%3E3000000000",
        "/pitstop?where=Time_in_Pit%3Ebanana",
        "/pitstop?Time_in_Pit=banana",
    ] {
        let (status, _) = send(app(&state), request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let state = state_with_ttl(Duration::from_secs(60));
    let cookie = login_cookie(&state);
    assert_eq!(state.sessions.len(), 1);

    let resp = app(&state)
        .oneshot(request(Method::POST, "/admin/logout", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(state.sessions.is_empty());

    let (status, _) = send(app(&state), request(Method::DELETE, "/circuit", Some("{}"), Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_sessions_are_denied() {
    let state = state_with_ttl(Duration::ZERO);
    let cookie = login_cookie(&state);
    let (status, _) = send(app(&state), request(Method::PUT, "/circuit", Some("{}"), Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn common_routes_respond() {
    let state = state_with_ttl(Duration::from_secs(60));
    let (status, body) = send(app(&state), request(Method::GET, "/api", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Hello from the server!");
    let (status, body) = send(app(&state), request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let state = state_with_ttl(Duration::from_secs(60));
    let limited = f1db::routes::with_http_layers(app(&state), 16);
    let body = r#"{"Name":"A very long circuit name indeed"}"#;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/circuit")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(limited, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
