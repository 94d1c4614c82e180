use axum::body::{Body, to_bytes};
use axum::http::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN,
};
use tower::ServiceExt;

use super::*;
use crate::state::test_helpers::{TEST_WEB_CLIENT_URL, test_app_state, test_config};

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn root_serves_banner() {
    let response = app(test_app_state())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Spirit by Greygarden.");
}

#[tokio::test]
async fn healthz_is_ok() {
    let response = app(test_app_state())
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dashboard_routes_require_session_cookie() {
    for (method, uri) in [
        (Method::GET, "/dashboards"),
        (Method::GET, "/auth/me"),
        (Method::GET, "/dashboard_components?dashboardIdentifier=1"),
        (Method::GET, "/workers"),
        (Method::GET, "/metric_min"),
        (Method::POST, "/create_dashboard"),
    ] {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app(test_app_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body_text(response).await, "Unauthorized");
    }
}

#[tokio::test]
async fn empty_session_cookie_is_unauthorized() {
    let request = Request::get("/dashboards")
        .header("cookie", "session_token=")
        .body(Body::empty())
        .unwrap();
    let response = app(test_app_state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn preflight_allows_configured_origin_with_credentials() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/create_dashboard")
        .header(ORIGIN, TEST_WEB_CLIENT_URL)
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app(test_app_state()).oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), TEST_WEB_CLIENT_URL);
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
    assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "300");
}

#[tokio::test]
async fn preflight_from_other_origin_is_answered_with_configured_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/create_dashboard")
        .header(ORIGIN, "http://elsewhere.example.test")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app(test_app_state()).oneshot(request).await.unwrap();
    // An exact origin is always echoed; the browser refuses the mismatch.
    assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), TEST_WEB_CLIENT_URL);
}

async fn post_raw(uri: &str, content_type: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
    let request = Request::post(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = app(test_app_state()).oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_text(response).await;
    (status, serde_json::from_str(&text).unwrap_or_else(|_| panic!("not json: {text}")))
}

#[tokio::test]
async fn metric_report_missing_value_is_listed_in_errors() {
    let (status, body) =
        post_raw("/metrics", "application/json", r#"{"workerIdentifier":"w","metricName":"m"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "errors": ["Missing parameter: metricValue"] }));
}

#[tokio::test]
async fn metric_report_with_wrong_type_is_200_with_errors() {
    let (status, body) = post_raw(
        "/metrics",
        "application/json",
        r#"{"workerIdentifier":"w","metricName":"m","metricValue":"hot"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn non_json_bodies_are_200_with_errors() {
    for uri in ["/create_worker_control", "/auth/login", "/metrics"] {
        let (status, body) = post_raw(uri, "text/plain", "workerIdentifier=w").await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(!body["errors"].as_array().unwrap().is_empty(), "{uri}");
    }
}

#[tokio::test]
async fn malformed_json_body_is_200_with_errors() {
    let (status, body) = post_raw("/auth/login", "application/json", r#"{"email":"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[test]
fn cors_layer_tolerates_missing_or_invalid_origin() {
    let mut config = test_config();
    config.web_client_url = None;
    let _ = cors_layer(&config);
    config.web_client_url = Some("not\na header".into());
    let _ = cors_layer(&config);
}

async fn explode() -> StatusCode {
    panic!("kaboom")
}

#[tokio::test]
async fn panic_becomes_500_with_message() {
    let router: Router = Router::new()
        .route("/boom", get(explode))
        .layer(CatchPanicLayer::custom(handle_panic));
    let response = router
        .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "kaboom");
}
