mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{SUPER_ROLE, memory_app, read_json, token_for};
use http_helpers::{authed_json_request, authed_request, json_request};
use tower::ServiceExt;

#[tokio::test]
async fn health_is_public() {
    let (app, _) = memory_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/system/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("health");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["policy_loaded"], true);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = memory_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/openapi.json")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("openapi");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body["paths"].get("/admin/roles/list").is_some());
}

#[tokio::test]
async fn admin_routes_require_a_token() {
    let (app, _) = memory_app().await;
    let response = app
        .clone()
        .oneshot(json_request("POST", "/admin/roles/list", serde_json::json!({})))
        .await
        .expect("no token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(body["message"], "token is empty");

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/admin/roles/list",
            "not-a-jwt",
            serde_json::json!({}),
        ))
        .await
        .expect("bad token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "invalid token");
}

#[tokio::test]
async fn super_role_reaches_every_admin_route() {
    let (app, _) = memory_app().await;
    let token = token_for(1, SUPER_ROLE);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/admin/roles/list",
            &token,
            serde_json::json!({ "page_num": 1, "page_size": 10 }),
        ))
        .await
        .expect("roles");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["alias"], SUPER_ROLE);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/admin/admin/list",
            &token,
            serde_json::json!({ "username": "ADM" }),
        ))
        .await
        .expect("admins");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["total"], 1);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/admin/admin/info/1", &token))
        .await
        .expect("admin info");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["username"], "admin");

    let response = app
        .oneshot(authed_request("GET", "/admin/rules/list", &token))
        .await
        .expect("rules");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let groups = body["data"].as_array().expect("groups");
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0]["children"].as_array().expect("children").len(), 5);
}

#[tokio::test]
async fn unknown_records_are_not_found() {
    let (app, _) = memory_app().await;
    let token = token_for(1, SUPER_ROLE);
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/admin/roles/info/ghost", &token))
        .await
        .expect("role info");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/admin/roles/delete/ghost", &token))
        .await
        .expect("role delete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(authed_request("GET", "/admin/admin/info/99", &token))
        .await
        .expect("admin info");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn every_seeded_rule_routes_to_a_handler() {
    let (app, _) = memory_app().await;
    let token = token_for(1, SUPER_ROLE);
    for rule in bastion_rbac::default_rules()
        .into_iter()
        .filter(|rule| rule.is_grantable())
    {
        let uri = rule.path.replace(":id", "1").replace(":alias", SUPER_ROLE);
        let response = app
            .clone()
            .oneshot(authed_json_request(
                &rule.method,
                &uri,
                &token,
                serde_json::json!({}),
            ))
            .await
            .expect("response");
        assert!(
            response.status() != StatusCode::NOT_FOUND
                && response.status() != StatusCode::METHOD_NOT_ALLOWED,
            "{} {} has no route: {}",
            rule.method,
            rule.path,
            response.status()
        );
    }
}
