use super::create_test_service;
use crate::api::handlers::api_routes;
use crate::api::models::ErrorResponse;
use crate::constants::{GROUP_CREATED, MEMBER_ADDED};
use crate::core::models::{audit::AppLog, expense::Expense, group::Group};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    alice: String,
    bob: String,
    mallory: String,
}

impl TestApp {
    fn new() -> Self {
        let service = Arc::new(create_test_service());
        TestApp {
            alice: service.generate_token("alice").unwrap(),
            bob: service.generate_token("bob").unwrap(),
            mallory: service.generate_token("mallory").unwrap(),
            router: api_routes(service),
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn create_group(&self) -> Group {
        let (status, body) = self
            .send(Method::POST, "/groups", Some(&self.alice), Some(json!({ "name": "Ski week" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let group: Group = parse(&body);

        let (status, _) = self
            .send(
                Method::POST,
                &format!("/groups/{}/members", group.id),
                Some(&self.alice),
                Some(json!({ "userId": "bob" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        group
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/groups/any/logs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse::<ErrorResponse>(&body).code, "UNAUTHORIZED");

    let (status, _) = app.send(Method::GET, "/groups/any/logs", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_group_lifecycle_over_http() {
    let app = TestApp::new();
    let group = app.create_group().await;
    assert_eq!(group.name, "Ski week");

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}", group.id), Some(&app.bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Group>(&body).members.len(), 2);

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}", group.id), Some(&app.mallory), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(parse::<ErrorResponse>(&body).code, "NOT_GROUP_MEMBER");

    let (status, _) = app.send(Method::GET, "/groups/missing", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expense_endpoints() {
    let app = TestApp::new();
    let group = app.create_group().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/expenses",
            Some(&app.bob),
            Some(json!({
                "groupId": group.id,
                "description": "Lift passes",
                "paidBy": "bob",
                "amount": "100.00",
                "currency": "USD",
                "splitType": "exact",
                "participants": ["alice", "bob"],
                "splits": [
                    { "userId": "alice", "amount": "60.00" },
                    { "userId": "bob", "amount": "30.00" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "INVALID_SPLIT_TOTAL");

    let (status, body) = app
        .send(
            Method::POST,
            "/expenses",
            Some(&app.bob),
            Some(json!({
                "groupId": group.id,
                "description": "Lift passes",
                "paidBy": "bob",
                "amount": "100.00",
                "currency": "USD",
                "splitType": "equal",
                "participants": ["alice", "bob"]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let expense: Expense = parse(&body);

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}/balances", group.id), Some(&app.alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let balances: Value = parse(&body);
    assert_eq!(balances["balancesByCurrency"]["USD"]["bob"], "50.00");

    let (status, _) = app
        .send(Method::DELETE, &format!("/expenses/{}", expense.id), Some(&app.alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}/expenses", group.id), Some(&app.alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let page: Value = parse(&body);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(page["hasMore"], false);
}

#[tokio::test]
async fn test_list_query_errors_map_to_bad_request() {
    let app = TestApp::new();
    let group = app.create_group().await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/groups/{}/expenses?limit=0", group.id),
            Some(&app.alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "INVALID_QUERY_PARAMS");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/groups/{}/settlements?cursor=%25%25", group.id),
            Some(&app.alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "INVALID_CURSOR_FORMAT");
}

#[tokio::test]
async fn test_last_admin_demotion_is_a_bad_request() {
    let app = TestApp::new();
    let group = app.create_group().await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/groups/{}/members/alice/role", group.id),
            Some(&app.alice),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "INVALID_REQUEST");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/groups/{}/members/alice/role", group.id),
            Some(&app.bob),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(parse::<ErrorResponse>(&body).code, "NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_action_log_is_scoped_to_the_group() {
    let app = TestApp::new();
    let group = app.create_group().await;

    let (status, body) = app
        .send(Method::POST, "/groups", Some(&app.mallory), Some(json!({ "name": "Elsewhere" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let other: Group = parse(&body);

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}/logs", group.id), Some(&app.bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let logs: Vec<AppLog> = parse(&body);
    let actions: Vec<_> = logs.iter().map(|log| log.action.as_str()).collect();
    assert_eq!(actions, vec![GROUP_CREATED, MEMBER_ADDED]);
    assert!(logs.iter().all(|log| log.details["group_id"] == group.id.as_str()));

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}/logs", group.id), Some(&app.mallory), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(parse::<ErrorResponse>(&body).code, "NOT_GROUP_MEMBER");

    let (status, body) = app
        .send(Method::GET, &format!("/groups/{}/logs", other.id), Some(&app.mallory), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Vec<AppLog>>(&body).len(), 1);

    let (status, _) = app.send(Method::GET, "/logs", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
