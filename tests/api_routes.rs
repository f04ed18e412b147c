//! In-process tests for the pricing HTTP endpoints.
//!
//! The router is driven through `tower::ServiceExt::oneshot`, so no TCP
//! socket is bound.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pricing_engine::api::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn make_state() -> Arc<AppState> {
    Arc::new(AppState::new(100))
}

async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_rule(state: &Arc<AppState>, body: Value) -> Value {
    let (status, json) = call(state, "POST", "/api/v1/rules", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

/// Audit entries are written from a spawned task; give it a chance to run.
async fn wait_for_audit(state: &Arc<AppState>, expected: usize) {
    for _ in 0..1_000 {
        if state.audit.len().await >= expected {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("audit log never reached {expected} entries");
}

#[tokio::test]
async fn health_reports_service() {
    let state = make_state();
    let (status, json) = call(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "pricing-engine");
}

#[tokio::test]
async fn strategies_lists_all_four() {
    let state = make_state();
    let (status, json) = call(&state, "GET", "/api/v1/pricing/strategies", None).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["cost_plus", "geographic", "time_based", "rule_based"]);
    assert_eq!(json[0]["required_fields"], json!(["base_cost", "markup_value"]));
}

#[tokio::test]
async fn calculate_cost_plus_with_tax() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "cost_plus",
            "inputs": {"base_cost": 100, "markup_value": 25, "markup_type": "percentage", "tax_rate": 0.08}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["final_price"], 135.0);
    assert_eq!(json["original_price"], 100.0);
    assert_eq!(json["currency"], "USD");
    assert_eq!(json["strategy"], "cost_plus");
    assert_eq!(json["breakdown"]["adjustments"][1]["type"], "tax");
    assert!(json.get("applied_rule_id").is_none());
}

#[tokio::test]
async fn calculate_geographic_with_inline_config() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "geographic",
            "inputs": {"base_price": 100, "location": "US-TX"},
            "config": {"regional_multipliers": {"US": 1.05, "US-CA": 1.15}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["final_price"], 105.0);
    assert_eq!(json["breakdown"]["details"]["region_used"], "US");
}

#[tokio::test]
async fn calculate_errors_map_to_400() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({"strategy": "auction", "inputs": {"base_price": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "invalid_strategy");

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({"strategy": "cost_plus", "inputs": {"markup_value": 10}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "missing_required_field");

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({"strategy": "rule_based", "inputs": {"base_price": 1}, "config": {"rules": []}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "configuration_invalid");
}

#[tokio::test]
async fn negative_price_is_a_server_error() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "rule_based",
            "inputs": {"base_price": 10},
            "config": {"rules": [{"condition": "true", "action": "add_fixed_amount", "value": -25}]}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["type"], "negative_price");
}

#[tokio::test]
async fn overflowing_price_is_a_server_error_not_null() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({"strategy": "cost_plus", "inputs": {"base_cost": 1e308, "markup_value": 1000}})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["type"], "negative_price");
    assert!(json.get("final_price").is_none());
}

#[tokio::test]
async fn rule_lifecycle_and_calculation_by_rule_id() {
    let state = make_state();
    let rule = create_rule(
        &state,
        json!({
            "name": "bulk discount",
            "strategy_type": "rule_based",
            "config": {"rules": [{"condition": "quantity>10", "action": "apply_discount", "value": 15}]}
        }),
    )
    .await;
    let id = rule["id"].as_str().unwrap().to_string();
    assert_eq!(rule["is_active"], true);

    let (status, json) = call(&state, "GET", &format!("/api/v1/rules/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "bulk discount");

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "rule_based",
            "rule_id": &id,
            "inputs": {"base_price": 100, "quantity": 20},
            "config": {"rules": [{"condition": "true", "action": "set_price", "value": 1}]}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    // The stored rule's configuration wins over the inline one.
    assert_eq!(json["final_price"], 85.0);
    assert_eq!(json["applied_rule_id"], id.as_str());

    let (status, json) = call(
        &state,
        "PUT",
        &format!("/api/v1/rules/{id}"),
        Some(json!({"name": "bulk discount v2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "bulk discount v2");

    let (status, _) = call(&state, "DELETE", &format!("/api/v1/rules/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = call(&state, "GET", &format!("/api/v1/rules/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["type"], "rule_not_found");
}

#[tokio::test]
async fn create_rule_rejects_invalid_config() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/rules",
        Some(json!({"name": "broken", "strategy_type": "geographic", "config": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "configuration_invalid");
}

#[tokio::test]
async fn inactive_or_mismatched_rules_are_rejected() {
    let state = make_state();
    let inactive = create_rule(
        &state,
        json!({
            "name": "paused",
            "strategy_type": "geographic",
            "config": {"regional_multipliers": {"US": 1.1}},
            "is_active": false
        }),
    )
    .await;
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "geographic",
            "rule_id": inactive["id"],
            "inputs": {"base_price": 100, "location": "US"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "rule_inactive");

    let active = create_rule(
        &state,
        json!({"name": "us", "strategy_type": "geographic", "config": {"regional_multipliers": {"US": 1.1}}}),
    )
    .await;
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "cost_plus",
            "rule_id": active["id"],
            "inputs": {"base_cost": 100, "markup_value": 10}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "strategy_mismatch");

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "bogus",
            "rule_id": active["id"],
            "inputs": {"base_price": 100, "location": "US"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "invalid_strategy");

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "geographic",
            "rule_id": "00000000-0000-0000-0000-000000000000",
            "inputs": {"base_price": 100, "location": "US"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["type"], "rule_not_found");
}

#[tokio::test]
async fn list_rules_filters_by_strategy_and_activity() {
    let state = make_state();
    create_rule(
        &state,
        json!({"name": "a", "strategy_type": "geographic", "config": {"regional_multipliers": {"US": 1.1}}}),
    )
    .await;
    create_rule(
        &state,
        json!({"name": "b", "strategy_type": "cost_plus", "config": {"markup_value": 10}, "is_active": false}),
    )
    .await;

    let (status, json) = call(&state, "GET", "/api/v1/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = call(&state, "GET", "/api/v1/rules?strategy_type=cost_plus", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["name"], "b");

    let (_, json) = call(&state, "GET", "/api/v1/rules?is_active=true", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["name"], "a");
}

#[tokio::test]
async fn validate_endpoint() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/validate",
        Some(json!({
            "strategy": "time_based",
            "config": {"time_windows": [{"days": ["friday"], "start_time": "17:00", "end_time": "20:00", "multiplier": 1.5}]}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], true);

    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/validate",
        Some(json!({"strategy": "time_based", "config": {"time_windows": [{"start_time": "5pm", "multiplier": 2}]}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "configuration_invalid");
}

#[tokio::test]
async fn batch_answers_each_item_in_order() {
    let state = make_state();
    let (status, json) = call(
        &state,
        "POST",
        "/api/v1/pricing/calculate/batch",
        Some(json!({"items": [
            {"strategy": "cost_plus", "inputs": {"base_cost": 100, "markup_value": 25}},
            {"strategy": "geographic", "rule_id": "00000000-0000-0000-0000-000000000000", "inputs": {"base_price": 1, "location": "US"}},
            {"strategy": "cost_plus", "inputs": {"base_cost": -1, "markup_value": 25}},
            {
                "strategy": "time_based",
                "inputs": {"base_price": 100, "timestamp": "2024-06-14T18:30:00Z"},
                "config": {"time_windows": [{"days": ["friday"], "start_time": "17:00", "end_time": "20:00", "multiplier": 1.5}]}
            }
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["response"]["final_price"], 125.0);
    assert_eq!(results[1]["error"]["type"], "rule_not_found");
    assert_eq!(results[2]["error"]["type"], "invalid_field_value");
    assert_eq!(results[3]["response"]["final_price"], 150.0);
}

#[tokio::test]
async fn calculations_are_recorded_in_the_audit_log() {
    let state = make_state();
    for (n, base_cost) in [10, 20].into_iter().enumerate() {
        let (status, _) = call(
            &state,
            "POST",
            "/api/v1/pricing/calculate",
            Some(json!({"strategy": "cost_plus", "inputs": {"base_cost": base_cost, "markup_value": 10}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        wait_for_audit(&state, n + 1).await;
    }
    call(
        &state,
        "POST",
        "/api/v1/pricing/calculate",
        Some(json!({
            "strategy": "geographic",
            "inputs": {"base_price": 5, "location": "US"},
            "config": {"regional_multipliers": {"US": 2}}
        })),
    )
    .await;
    wait_for_audit(&state, 3).await;

    let (status, json) = call(&state, "GET", "/api/v1/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 3);

    let (_, json) = call(&state, "GET", "/api/v1/logs?strategy_type=cost_plus&limit=1", None).await;
    let logs = json.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["strategy_type"], "cost_plus");
    assert_eq!(logs[0]["output_data"]["final_price"], 22.0);

    let (status, json) = call(&state, "GET", "/api/v1/logs?limit=500", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "bad_request");
}
