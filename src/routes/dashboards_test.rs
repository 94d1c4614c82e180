use super::*;
use crate::services::session::SessionUser;
use crate::state::test_helpers::test_app_state;

fn auth() -> AuthUser {
    AuthUser { user: SessionUser { identifier: 1, email: "ops@example.test".into() } }
}

fn validation_messages(result: ApiResult) -> Vec<String> {
    match result {
        Err(ApiError::Validation(errors)) => errors,
        Err(other) => panic!("expected validation error, got {other:?}"),
        Ok(Json(body)) => panic!("expected validation error, got {body}"),
    }
}

#[test]
fn require_reports_message() {
    assert_eq!(require(Some(3), "unused").unwrap(), 3);
    let err = require::<i64>(None, "Missing parameter: identifier").unwrap_err();
    assert!(matches!(err, ApiError::Validation(ref m) if m == &["Missing parameter: identifier"]));
}

#[tokio::test]
async fn get_dashboard_requires_identifier() {
    let result =
        get_dashboard(State(test_app_state()), auth(), ApiQuery(DashboardQuery { dashboard_identifier: None })).await;
    assert_eq!(validation_messages(result), vec!["Missing parameter: dashboardIdentifier"]);
}

#[tokio::test]
async fn update_dashboard_requires_title() {
    let body = UpdateDashboardBody { identifier: Some(1), dashboard_props: Some(DashboardProps { title: None }) };
    let result = update_dashboard(State(test_app_state()), auth(), ApiJson(body)).await;
    assert_eq!(validation_messages(result), vec!["Missing parameter: dashboardProps.title"]);
}

#[tokio::test]
async fn create_graph_requires_dashboard_and_type() {
    let body = CreateGraphBody { dashboard_identifier: Some(1), chart_type: None, component_order: Some(0) };
    let result = create_graph(State(test_app_state()), auth(), ApiJson(body)).await;
    assert_eq!(validation_messages(result), vec!["Missing parameters: dashboardIdentifier, type"]);
}

#[tokio::test]
async fn create_control_requires_dashboard() {
    let body = CreateControlBody { dashboard_identifier: None, control_type: None, component_order: None };
    let result = create_control(State(test_app_state()), auth(), ApiJson(body)).await;
    assert_eq!(validation_messages(result), vec!["Missing parameters: dashboardIdentifier"]);
}

#[tokio::test]
async fn delete_routes_require_identifier() {
    let state = test_app_state();
    let result = delete_graph(State(state.clone()), auth(), ApiJson(IdentifierBody { identifier: None })).await;
    assert_eq!(validation_messages(result), vec!["Missing parameter: identifier"]);
    let result = delete_control(State(state.clone()), auth(), ApiJson(IdentifierBody { identifier: None })).await;
    assert_eq!(validation_messages(result), vec!["Missing parameter: identifier"]);
    let result = delete_dashboard(State(state), auth(), ApiJson(IdentifierBody { identifier: None })).await;
    assert_eq!(validation_messages(result), vec!["Missing parameter: identifier"]);
}

#[test]
fn create_graph_body_reads_type_and_order() {
    let body: CreateGraphBody =
        serde_json::from_value(serde_json::json!({ "dashboardIdentifier": 4, "type": "line", "componentOrder": 2 }))
            .unwrap();
    assert_eq!(body.dashboard_identifier, Some(4));
    assert_eq!(body.chart_type.as_deref(), Some("line"));
    assert_eq!(body.component_order, Some(2));
}

#[test]
fn update_control_body_reads_nested_props() {
    let body: UpdateControlBody = serde_json::from_value(serde_json::json!({
        "identifier": 9,
        "controlProps": { "title": "Pump", "workerControlIdentifier": 3 }
    }))
    .unwrap();
    let props = body.control_props.unwrap();
    assert_eq!(body.identifier, Some(9));
    assert_eq!(props.title.as_deref(), Some("Pump"));
    assert_eq!(props.worker_control_identifier, Some(3));
}
