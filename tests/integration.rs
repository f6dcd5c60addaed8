use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use campus_dispatch::api::rest::router;
use campus_dispatch::geo::geocode::NoNetwork;
use campus_dispatch::geo::routing::NoRouting;
use campus_dispatch::state::AppState;
use campus_dispatch::storage::blob::MemoryBlobStore;
use campus_dispatch::storage::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "dispatch-test-boundary";
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3, 4];

fn setup() -> axum::Router {
    let state = AppState::new(
        1024,
        Arc::new(MemoryStore::new()),
        Arc::new(NoNetwork),
        Arc::new(NoRouting),
        Arc::new(MemoryBlobStore::new()),
    );
    router(Arc::new(state))
}

struct User {
    id: Uuid,
    role: &'static str,
}

impl User {
    fn new(role: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
        }
    }
}

fn request(method: &str, uri: &str, user: &User) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user.id.to_string())
        .header("x-user-role", user.role)
}

fn json_request(method: &str, uri: &str, user: &User, body: Value) -> Request<Body> {
    request(method, uri, user)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, user: &User) -> Request<Body> {
    request("GET", uri, user).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str, user: &User) -> Request<Body> {
    request("POST", uri, user).body(Body::empty()).unwrap()
}

/// Builds a multipart body from `(name, content_type, bytes)` parts; text
/// parts pass `None` as content type.
fn multipart_request(uri: &str, user: &User, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match content_type {
            Some(content_type) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    request("POST", uri, user)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn image_upload(uri: &str, user: &User) -> Request<Body> {
    multipart_request(uri, user, &[("image", Some("image/png"), PNG_BYTES)])
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn ride_body(region: &str) -> Value {
    json!({
        "kind": "RIDE",
        "pickup": {
            "address": "Stasiun UI",
            "region": region,
            "map_link": "https://maps.google.com/?q=-6.3609,106.8317"
        },
        "dropoff": {
            "address": "Perpustakaan Pusat",
            "region": region,
            "map_link": "https://maps.google.com/?q=-6.3650,106.8290"
        },
        "payment_method": "CASH"
    })
}

async fn create_ride(app: &axum::Router, customer: &User, region: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/orders", customer, ride_body(region)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn make_available(app: &axum::Router, driver: &User, region: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/drivers/me/availability",
            driver,
            json!({ "region": region, "active": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn credit(app: &axum::Router, admin: &User, user: &User, amount: i64) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/tickets",
            admin,
            json!({ "user_id": user.id, "kind": "GRANT", "amount": amount }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["stores"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    create_ride(&app, &User::new("CUSTOMER"), "NORTH").await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("orders_created_total"));
    assert!(body.contains("geocode_lookups_total"));
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn wrong_role_is_unauthorized() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            &User::new("DRIVER"),
            ride_body("NORTH"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_uses_error_envelope() {
    let app = setup();
    let response = app
        .oneshot(
            request("POST", "/orders", &User::new("CUSTOMER"))
                .header("content-type", "application/json")
                .body(Body::from("{\"kind\": \"SPACESHIP\"}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn create_order_returns_envelope() {
    let app = setup();
    let customer = User::new("CUSTOMER");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/orders", &customer, ride_body("NORTH")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "SEARCHING_DRIVER");
    assert_eq!(body["data"]["kind"], "RIDE");
    assert_eq!(body["data"]["pickup"]["coords"]["lat"], -6.3609);

    let response = app
        .oneshot(json_request("POST", "/orders", &customer, ride_body("NORTH")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn ride_flows_from_claim_to_completion() {
    let app = setup();
    let admin = User::new("ADMIN");
    let customer = User::new("CUSTOMER");
    let driver = User::new("DRIVER");

    let order_id = create_ride(&app, &customer, "NORTH").await;
    make_available(&app, &driver, "NORTH").await;
    credit(&app, &admin, &driver, 1).await;

    let response = app
        .clone()
        .oneshot(get_request("/drivers/me/available-orders", &driver))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["available"], true);
    assert_eq!(body["data"]["orders"][0]["id"], order_id.as_str());
    assert!(body["data"]["orders"][0]["estimate"]["fare"].as_i64().unwrap() >= 4000);

    let response = app
        .clone()
        .oneshot(post_empty(&format!("/orders/{order_id}/claim"), &driver))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "DRIVER_ASSIGNED");

    let response = app
        .clone()
        .oneshot(image_upload(&format!("/orders/{order_id}/pickup-proof"), &driver))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "ON_DELIVERY");

    let response = app
        .clone()
        .oneshot(image_upload(&format!("/orders/{order_id}/delivery-proof"), &driver))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "COMPLETED");

    let response = app
        .clone()
        .oneshot(get_request("/tickets/me", &driver))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["balance"], 0);
    assert_eq!(body["data"]["transactions"][0]["kind"], "CONSUMPTION");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}/proofs"), &customer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let pickup = body["data"]["pickup"][0].as_str().unwrap().to_string();
    assert_eq!(body["data"]["delivery"].as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get_request(&format!("/files/{pickup}"), &customer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
}

#[tokio::test]
async fn claim_without_tickets_is_quota_exceeded() {
    let app = setup();
    let customer = User::new("CUSTOMER");
    let driver = User::new("DRIVER");

    let order_id = create_ride(&app, &customer, "SOUTH").await;
    make_available(&app, &driver, "SOUTH").await;

    let response = app
        .clone()
        .oneshot(post_empty(&format!("/orders/{order_id}/claim"), &driver))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);

    let response = app
        .oneshot(get_request(&format!("/orders/{order_id}"), &customer))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["status"], "SEARCHING_DRIVER");
}

#[tokio::test]
async fn proof_upload_rejects_non_images() {
    let app = setup();
    let admin = User::new("ADMIN");
    let customer = User::new("CUSTOMER");
    let driver = User::new("DRIVER");

    let order_id = create_ride(&app, &customer, "EAST").await;
    make_available(&app, &driver, "EAST").await;
    credit(&app, &admin, &driver, 1).await;
    app.clone()
        .oneshot(post_empty(&format!("/orders/{order_id}/claim"), &driver))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/orders/{order_id}/pickup-proof"),
            &driver,
            &[("image", Some("application/pdf"), b"%PDF-1.4".as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get_request(&format!("/orders/{order_id}"), &customer))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["status"], "DRIVER_ASSIGNED");
}

#[tokio::test]
async fn reports_are_limited_per_reporter() {
    let app = setup();
    let customer = User::new("CUSTOMER");
    let order_id = create_ride(&app, &customer, "WEST").await;
    let uri = format!("/orders/{order_id}/reports");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(multipart_request(
                &uri,
                &customer,
                &[
                    ("category", None, b"DRIVER_FAULT".as_slice()),
                    ("detail", None, b"driver never showed up".as_slice()),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(multipart_request(
            &uri,
            &customer,
            &[
                ("category", None, b"DRIVER_FAULT".as_slice()),
                ("detail", None, b"still waiting".as_slice()),
                ("photo", Some("image/png"), PNG_BYTES),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.oneshot(get_request(&uri, &customer)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["status"], "PENDING");
}

#[tokio::test]
async fn pricing_is_admin_only_and_drives_quotes() {
    let app = setup();
    let admin = User::new("ADMIN");
    let customer = User::new("CUSTOMER");
    let table = json!({
        "under_1km": 5000,
        "band_1_to_1_5": 6000,
        "band_1_5_to_2": 7000,
        "band_2_to_2_5": 8000,
        "band_2_5_to_3": 9000,
        "per_km_beyond_3": 2500
    });

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/admin/pricing", &customer, table.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/admin/pricing", &admin, table))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request("/pricing", &customer))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["under_1km"], 5000);

    let point = json!({ "lat": -6.3609, "lng": 106.8317 });
    let response = app
        .oneshot(json_request(
            "POST",
            "/fares/quote",
            &customer,
            json!({ "from": point, "to": point }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["fare"], 5000);
    assert_eq!(body["data"]["source"], "STRAIGHT_LINE");
}

#[tokio::test]
async fn store_accepts_and_readies_registered_order() {
    let app = setup();
    let admin = User::new("ADMIN");
    let store = User::new("STORE");
    let customer = User::new("CUSTOMER");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/stores/me",
            &store,
            json!({
                "name": "Kantin Teknik",
                "address": "Kantin Fakultas Teknik",
                "map_link": "https://maps.google.com/?q=-6.3621,106.8235",
                "region": "CENTRAL",
                "status": "ACTIVE"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    credit(&app, &admin, &store, 1).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            &customer,
            json!({
                "kind": "FOOD_REGISTERED_STORE",
                "store_id": store.id,
                "item_id": Uuid::new_v4(),
                "quantity": 2,
                "dropoff": { "address": "Asrama UI", "region": "CENTRAL" },
                "payment_method": "E_WALLET"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "WAITING_STORE_CONFIRM");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_empty(&format!("/orders/{order_id}/accept"), &store))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["status"], "CONFIRMED_COOKING");

    let response = app
        .clone()
        .oneshot(post_empty(&format!("/orders/{order_id}/ready"), &store))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["status"], "SEARCHING_DRIVER");

    let response = app
        .oneshot(get_request("/stores/me/orders", &store))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
