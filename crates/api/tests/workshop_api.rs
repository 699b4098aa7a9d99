//! End-to-end exercises against the assembled router, driven through
//! `tower::ServiceExt::oneshot` so no listener is needed.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    pitstop_api::app::build_app(b"integration-test-secret")
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, email: &str, name: &str, extra: Value) -> Value {
    let mut body = json!({
        "email": email,
        "password": "s3cret-pass",
        "display_name": name,
    });
    if let (Some(map), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }
    let (status, value) = send(app, Method::POST, "/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {value}");
    value["principal"].clone()
}

async fn login(app: &Router, email: &str) -> String {
    let body = json!({ "email": email, "password": "s3cret-pass" });
    let (status, value) = send(app, Method::POST, "/auth/login", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "login failed: {value}");
    value["token"].as_str().unwrap().to_string()
}

async fn register_and_login(app: &Router, email: &str, name: &str, extra: Value) -> (Value, String) {
    let principal = register(app, email, name, extra).await;
    let token = login(app, email).await;
    (principal, token)
}

fn id_of(value: &Value, field: &str) -> String {
    value[field].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router) -> String {
    register_and_login(
        app,
        "admin@pitstop.test",
        "Admin",
        json!({ "role": "admin", "department": "administration" }),
    )
    .await
    .1
}

async fn customer_with_vehicle(app: &Router, email: &str, registration: &str) -> (String, String) {
    let (_, token) = register_and_login(app, email, "Customer", json!({ "phone": "0700" })).await;
    let (status, value) = send(
        app,
        Method::POST,
        "/vehicles",
        Some(&token),
        Some(json!({
            "registration": registration,
            "chassis_number": "CH-1001",
            "engine_number": "EN-1001",
            "make": "Toyota",
            "model": "Hilux",
            "year": 2020,
            "mileage": 42_000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "vehicle register failed: {value}");
    (token, id_of(&value["vehicle"], "vehicle_id"))
}

async fn create_booking(app: &Router, token: &str, vehicle: &str, date: &str, slot: &str) -> Value {
    let (status, value) = send(
        app,
        Method::POST,
        "/bookings",
        Some(token),
        Some(json!({
            "vehicle": vehicle,
            "scheduled_date": date,
            "slot": slot,
            "service_description": "full service",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "booking create failed: {value}");
    value["booking"].clone()
}

/// Drives a booking from pending to completed: assign an inspector,
/// then walk the status chain.
async fn complete_booking(app: &Router, admin: &str, booking: &str) {
    let (_, advisor) = register_and_login(
        app,
        &format!("advisor-{booking}@pitstop.test"),
        "Advisor",
        json!({ "role": "service_advisor", "department": "front_desk" }),
    )
    .await;
    let advisor_me = send(app, Method::GET, "/auth/me", Some(&advisor), None).await.1;
    let advisor_id = id_of(&advisor_me["principal"], "principal_id");

    let (status, value) = send(
        app,
        Method::POST,
        &format!("/bookings/{booking}/inspector"),
        Some(admin),
        Some(json!({ "inspector": advisor_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "assign inspector failed: {value}");

    for next in ["inspecting", "working", "completed"] {
        let (status, value) = send(
            app,
            Method::PATCH,
            &format!("/bookings/{booking}/status"),
            Some(admin),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "transition to {next} failed: {value}");
    }
}

async fn create_item(app: &Router, admin: &str, name: &str, stock: u32) -> String {
    let (status, value) = send(
        app,
        Method::POST,
        "/inventory/items",
        Some(admin),
        Some(json!({
            "name": name,
            "category": "parts",
            "unit_price": 500,
            "initial_stock": stock,
            "minimum": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "item create failed: {value}");
    id_of(&value["item"], "item_id")
}

#[tokio::test]
async fn health_is_public_and_everything_else_is_not() {
    let app = app();

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, value) = send(&app, Method::GET, "/whoami", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["error"], json!("unauthenticated"));

    let (status, _) = send(&app, Method::GET, "/bookings", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_login_and_profile() {
    let app = app();

    let principal = register(
        &app,
        "jane@pitstop.test",
        "Jane",
        json!({ "phone": "0711" }),
    )
    .await;
    assert_eq!(principal["role"], json!("customer"));
    assert!(principal["reference"].as_str().unwrap().starts_with('C'));
    assert!(principal.get("password_hash").is_none());

    // Same address twice fails regardless of case.
    let (status, value) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "JANE@pitstop.test",
            "password": "other-pass",
            "display_name": "Jane Again",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("conflict"));

    let (status, value) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "jane@pitstop.test", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{value}");

    let token = login(&app, "jane@pitstop.test").await;
    let (status, value) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["principal"]["email"], json!("jane@pitstop.test"));

    let (status, value) = send(&app, Method::GET, "/whoami", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["role"], json!("customer"));
}

#[tokio::test]
async fn staff_registration_requires_department() {
    let app = app();
    let (status, value) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "tech@pitstop.test",
            "password": "s3cret-pass",
            "display_name": "Tech",
            "role": "technician",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("validation_error"));
}

#[tokio::test]
async fn customers_cannot_touch_inventory() {
    let app = app();
    let (_, token) =
        register_and_login(&app, "cust@pitstop.test", "Cust", json!({ "phone": "0712" })).await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/inventory/items",
        Some(&token),
        Some(json!({
            "name": "Oil filter",
            "category": "parts",
            "unit_price": 900,
            "initial_stock": 4,
            "minimum": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{value}");
    assert_eq!(value["error"], json!("forbidden"));
}

#[tokio::test]
async fn double_booked_slot_is_refused() {
    let app = app();

    let (alice, alice_car) =
        customer_with_vehicle(&app, "alice@pitstop.test", "KDA 001A").await;
    let (bob, bob_car) = customer_with_vehicle(&app, "bob@pitstop.test", "KDB 002B").await;

    create_booking(&app, &alice, &alice_car, "2026-09-10", "morning").await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/bookings",
        Some(&bob),
        Some(json!({
            "vehicle": bob_car,
            "scheduled_date": "2026-09-10",
            "slot": "morning",
            "service_description": "brake check",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("conflict"));

    // A different slot on the same day is fine.
    create_booking(&app, &bob, &bob_car, "2026-09-10", "midday").await;
}

#[tokio::test]
async fn duplicate_registration_plate_is_refused() {
    let app = app();
    let _ = customer_with_vehicle(&app, "carol@pitstop.test", "KDC 003C").await;

    let (_, other) =
        register_and_login(&app, "dan@pitstop.test", "Dan", json!({ "phone": "0713" })).await;
    let (status, value) = send(
        &app,
        Method::POST,
        "/vehicles",
        Some(&other),
        Some(json!({
            "registration": "kdc 003c",
            "chassis_number": "CH-2",
            "engine_number": "EN-2",
            "make": "Mazda",
            "model": "Demio",
            "year": 2018,
            "mileage": 60_000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("conflict"));
}

#[tokio::test]
async fn invoice_totals_and_paid_lockdown() {
    let app = app();
    let admin = admin_token(&app).await;

    let (customer, vehicle) =
        customer_with_vehicle(&app, "erin@pitstop.test", "KDE 005E").await;
    let booking = create_booking(&app, &customer, &vehicle, "2026-09-11", "morning").await;
    let booking_id = id_of(&booking, "booking_id");

    // An invoice against a booking still in progress is refused.
    let invoice_body = json!({
        "booking": booking_id,
        "lines": [{ "description": "spark plugs", "quantity": 2, "unit_price": 65 }],
        "labor_charges": 20,
        "tax": 10,
        "discount": 5,
    });
    let (status, value) = send(
        &app,
        Method::POST,
        "/invoices",
        Some(&admin),
        Some(invoice_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("invariant_violation"));

    complete_booking(&app, &admin, &booking_id).await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/invoices",
        Some(&admin),
        Some(invoice_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    let invoice = &value["invoice"];
    assert_eq!(invoice["subtotal"], json!(150));
    assert_eq!(invoice["total"], json!(155));
    let invoice_id = id_of(invoice, "invoice_id");

    // One invoice per booking.
    let (status, value) = send(
        &app,
        Method::POST,
        "/invoices",
        Some(&admin),
        Some(invoice_body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("conflict"));

    let (status, value) = send(
        &app,
        Method::POST,
        &format!("/invoices/{invoice_id}/pay"),
        Some(&admin),
        Some(json!({ "payment_method": "cash" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");

    // Amounts are frozen once paid; notes are not.
    let (status, value) = send(
        &app,
        Method::PATCH,
        &format!("/invoices/{invoice_id}"),
        Some(&admin),
        Some(json!({ "tax": 20 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("invariant_violation"));

    let (status, value) = send(
        &app,
        Method::PATCH,
        &format!("/invoices/{invoice_id}"),
        Some(&admin),
        Some(json!({ "notes": "settled in cash at the counter" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["invoice"]["notes"], json!("settled in cash at the counter"));

    // The customer can read, but not pay or edit.
    let (status, value) = send(
        &app,
        Method::GET,
        &format!("/invoices/{invoice_id}"),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["invoice"]["status"], json!("paid"));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/invoices/{invoice_id}"),
        Some(&customer),
        Some(json!({ "notes": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn goods_approval_fails_closed_on_short_stock() {
    let app = app();
    let admin = admin_token(&app).await;

    let (customer, vehicle) =
        customer_with_vehicle(&app, "fay@pitstop.test", "KDF 006F").await;
    let booking = create_booking(&app, &customer, &vehicle, "2026-09-12", "morning").await;
    let booking_id = id_of(&booking, "booking_id");

    let (status, value) = send(
        &app,
        Method::POST,
        "/jobs",
        Some(&admin),
        Some(json!({ "booking": booking_id, "description": "replace brake pads" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    let job_id = id_of(&value["job"], "job_id");

    let item_id = create_item(&app, &admin, "Brake pads", 3).await;

    let (_, tech) = register_and_login(
        &app,
        "gus@pitstop.test",
        "Gus",
        json!({ "role": "technician", "department": "mechanical" }),
    )
    .await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/goods-requests",
        Some(&tech),
        Some(json!({
            "job": job_id,
            "lines": [{ "item": item_id, "quantity": 5 }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    let request_id = id_of(&value["request"], "request_id");

    let (status, value) = send(
        &app,
        Method::POST,
        &format!("/goods-requests/{request_id}/approve"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("insufficient_stock"));

    // The request survives the failed approval untouched.
    let (status, value) = send(
        &app,
        Method::GET,
        &format!("/goods-requests/{request_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["request"]["status"], json!("pending"));

    // And the stock is still fully available.
    let (status, value) = send(
        &app,
        Method::GET,
        &format!("/inventory/items/{item_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["item"]["available"], json!(3));
}

#[tokio::test]
async fn goods_release_issues_reserved_stock() {
    let app = app();
    let admin = admin_token(&app).await;

    let (customer, vehicle) =
        customer_with_vehicle(&app, "hal@pitstop.test", "KDH 008H").await;
    let booking = create_booking(&app, &customer, &vehicle, "2026-09-13", "morning").await;
    let booking_id = id_of(&booking, "booking_id");

    let (_, value) = send(
        &app,
        Method::POST,
        "/jobs",
        Some(&admin),
        Some(json!({ "booking": booking_id, "description": "oil change" })),
    )
    .await;
    let job_id = id_of(&value["job"], "job_id");

    let item_id = create_item(&app, &admin, "Engine oil 5W30", 10).await;

    let (_, tech) = register_and_login(
        &app,
        "ivy@pitstop.test",
        "Ivy",
        json!({ "role": "technician", "department": "mechanical" }),
    )
    .await;

    let (_, value) = send(
        &app,
        Method::POST,
        "/goods-requests",
        Some(&tech),
        Some(json!({
            "job": job_id,
            "lines": [{ "item": item_id, "quantity": 4 }],
        })),
    )
    .await;
    let request_id = id_of(&value["request"], "request_id");

    let (status, value) = send(
        &app,
        Method::POST,
        &format!("/goods-requests/{request_id}/approve"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");

    // Approved means reserved: on hand 10, available 6.
    let (_, value) = send(
        &app,
        Method::GET,
        &format!("/inventory/items/{item_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(value["item"]["available"], json!(6));

    let (status, value) = send(
        &app,
        Method::POST,
        &format!("/goods-requests/{request_id}/release"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");

    let (_, value) = send(
        &app,
        Method::GET,
        &format!("/inventory/items/{item_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(value["item"]["on_hand"], json!(6));
    assert_eq!(value["item"]["available"], json!(6));
}

#[tokio::test]
async fn bulk_adjust_reports_partial_success() {
    let app = app();
    let admin = admin_token(&app).await;

    let plenty = create_item(&app, &admin, "Washers", 10).await;
    let scarce = create_item(&app, &admin, "Head gasket", 2).await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/inventory/items/bulk-adjust",
        Some(&admin),
        Some(json!({
            "adjustments": [
                { "item": plenty, "direction": "add", "quantity": 5 },
                { "item": scarce, "direction": "subtract", "quantity": 5 },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["processed"], json!(1));
    assert_eq!(value["errors"], json!(1));

    let (_, value) = send(
        &app,
        Method::GET,
        &format!("/inventory/items/{plenty}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(value["item"]["on_hand"], json!(15));
}

#[tokio::test]
async fn overlapping_leave_is_refused() {
    let app = app();
    let admin = admin_token(&app).await;

    let (_, tech) = register_and_login(
        &app,
        "kim@pitstop.test",
        "Kim",
        json!({ "role": "technician", "department": "electrical" }),
    )
    .await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/leave-requests",
        Some(&tech),
        Some(json!({
            "leave_type": "annual",
            "start": "2026-10-01",
            "end": "2026-10-03",
            "reason": "family visit",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    assert_eq!(value["request"]["totalDays"], json!(3));
    let first = id_of(&value["request"], "request_id");

    let (status, value) = send(
        &app,
        Method::POST,
        "/leave-requests",
        Some(&tech),
        Some(json!({
            "leave_type": "sick",
            "start": "2026-10-03",
            "end": "2026-10-04",
            "reason": "clinic",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(value["error"], json!("conflict"));

    // Rejection frees the days for a retry.
    let (status, value) = send(
        &app,
        Method::POST,
        &format!("/leave-requests/{first}/reject"),
        Some(&admin),
        Some(json!({ "reason": "short staffed that week" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");

    let (status, value) = send(
        &app,
        Method::POST,
        "/leave-requests",
        Some(&tech),
        Some(json!({
            "leave_type": "annual",
            "start": "2026-10-02",
            "end": "2026-10-03",
            "reason": "family visit, take two",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");

    // Customers have no leave to request.
    let (_, cust) =
        register_and_login(&app, "leo@pitstop.test", "Leo", json!({ "phone": "0714" })).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/leave-requests",
        Some(&cust),
        Some(json!({
            "leave_type": "annual",
            "start": "2026-10-05",
            "end": "2026-10-06",
            "reason": "n/a",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customers_only_see_their_own_bookings() {
    let app = app();
    let (alice, alice_car) =
        customer_with_vehicle(&app, "mia@pitstop.test", "KDM 013M").await;
    let (bob, bob_car) = customer_with_vehicle(&app, "ned@pitstop.test", "KDN 014N").await;

    create_booking(&app, &alice, &alice_car, "2026-09-14", "morning").await;
    let bobs = create_booking(&app, &bob, &bob_car, "2026-09-14", "midday").await;

    let (status, value) = send(&app, Method::GET, "/bookings", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["count"], json!(1));

    // Reading someone else's booking by id is forbidden.
    let bob_booking = id_of(&bobs, "booking_id");
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/bookings/{bob_booking}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
