// topup_app/src/web/routes.rs

use actix_web::middleware::from_fn;
use actix_web::web;

use crate::errors::AppError;
use crate::web::handlers::{admin_handlers, order_handlers, webhook_handlers};
use crate::web::middleware::rate_limit;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

// Malformed JSON bodies answer 400 with the same error shape as validation failures.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .limit(64 * 1024)
    .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.app_data(json_config()).service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      // Buyer storefront, rate limited per client
      .service(
        web::scope("/order")
          .wrap(from_fn(rate_limit))
          .route("/create", web::post().to(order_handlers::create_order_handler))
          .route("/status/{username}", web::get().to(order_handlers::order_status_handler)),
      )
      // Gateway callbacks, never rate limited
      .service(
        web::scope("/payment").route("/webhook", web::post().to(webhook_handlers::payment_webhook_handler)),
      )
      // Operator dashboard, bearer-token guarded
      .service(
        web::scope("/admin")
          .wrap(from_fn(rate_limit))
          .route("/orders", web::get().to(admin_handlers::list_orders_handler))
          .route(
            "/orders/{order_id}/{action}",
            web::post().to(admin_handlers::order_action_handler),
          ),
      ),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::services::MockGateway;
  use crate::state::AppState;
  use crate::pipelines::webhook_pipeline::expected_signature;
  use crate::web::middleware::cors_policy;
  use actix_web::http::{header, Method, StatusCode};
  use actix_web::{test, App};
  use serde_json::{json, Value};
  use std::sync::Arc;
  use std::time::Duration;
  use topup_core::{GatewayNotification, InMemoryOrderStore, OrderService, PricingEngine, TracingNotifier, TransactionStatus};

  const ADMIN: &str = "Bearer test-admin-token";

  fn state_with(config: AppConfig) -> AppState {
    let service = OrderService::new(
      Arc::new(InMemoryOrderStore::new()),
      Arc::new(MockGateway::new("http://localhost:8080").with_latency(Duration::ZERO)),
      Arc::new(TracingNotifier),
      PricingEngine::new(config.pricing_config()),
      config.service_settings(),
    );
    AppState::new(service, config)
  }

  macro_rules! app {
    ($state:expr) => {
      test::init_service(
        App::new()
          .app_data(web::Data::new($state.clone()))
          .wrap(cors_policy(&$state.config))
          .configure(configure_app_routes),
      )
      .await
    };
  }

  fn order_body(amount: u32, method: &str) -> Value {
    json!({
      "username": "builderman",
      "userId": 156,
      "email": "builder@example.com",
      "amount": amount,
      "paymentMethod": method,
      "whatsapp": "081234567890",
      "gamepassLink": "https://www.roblox.com/game-pass/123456/topup"
    })
  }

  #[actix_web::test]
  async fn health_is_ok() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[actix_web::test]
  async fn create_order_returns_token_and_prices() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);
    let req = test::TestRequest::post()
      .uri("/api/order/create")
      .set_json(order_body(500, "bca"))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["orderId"].as_str().is_some());
    assert!(body["token"].as_str().unwrap().starts_with("mock_snap_"));
    assert!(body["redirect_url"].as_str().is_some());
    assert_eq!(body["grossAmount"], 71750);
    assert_eq!(body["adminFee"], 3000);
    assert_eq!(body["gamepassPrice"], 715);
  }

  #[actix_web::test]
  async fn invalid_orders_are_bad_requests() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);

    let too_small = test::TestRequest::post()
      .uri("/api/order/create")
      .set_json(order_body(99, "qris"))
      .to_request();
    assert_eq!(test::call_service(&app, too_small).await.status(), StatusCode::BAD_REQUEST);

    let mut bad_email = order_body(100, "qris");
    bad_email["email"] = json!("nope");
    let req = test::TestRequest::post().uri("/api/order/create").set_json(bad_email).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let missing_field = test::TestRequest::post()
      .uri("/api/order/create")
      .set_json(json!({ "username": "builderman", "amount": 100 }))
      .to_request();
    let resp = test::call_service(&app, missing_field).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid order data");

    let status = test::TestRequest::get().uri("/api/order/status/builderman").to_request();
    let orders: Value = test::call_and_read_body_json(&app, status).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(0));
  }

  // Places a 500-unit order and returns its id.
  macro_rules! create {
    ($app:expr, $method:expr) => {{
      let req = test::TestRequest::post()
        .uri("/api/order/create")
        .set_json(order_body(500, $method))
        .to_request();
      let body: Value = test::call_and_read_body_json($app, req).await;
      body["orderId"].as_str().unwrap().to_string()
    }};
  }

  #[actix_web::test]
  async fn settlement_webhook_moves_order_to_awaiting_fulfillment() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);
    let order_id = create!(&app, "bca");

    let webhook = json!({ "order_id": order_id, "transaction_status": "settlement", "status_code": "200" });
    for _ in 0..2 {
      let req = test::TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(&webhook)
        .to_request();
      assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get().uri("/api/order/status/builderman").to_request();
    let orders: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(orders[0]["id"], order_id.as_str());
    assert_eq!(orders[0]["status"], "AWAITING_FULFILLMENT");
    assert_eq!(orders[0]["paymentStatus"], "PAID");
  }

  #[actix_web::test]
  async fn webhook_acknowledges_unknown_orders_and_unreadable_bodies() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);

    let unknown = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .set_json(json!({ "order_id": uuid::Uuid::new_v4(), "transaction_status": "expire" }))
      .to_request();
    assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::OK);

    let refund = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .set_json(json!({ "order_id": "whatever", "transaction_status": "refund" }))
      .to_request();
    assert_eq!(test::call_service(&app, refund).await.status(), StatusCode::OK);

    let garbage = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .insert_header(("content-type", "application/json"))
      .set_payload("{not json")
      .to_request();
    assert_eq!(test::call_service(&app, garbage).await.status(), StatusCode::OK);
  }

  #[actix_web::test]
  async fn webhook_tolerates_odd_field_shapes() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);
    let order_id = create!(&app, "bca");

    let payloads = [
      json!({ "order_id": order_id, "transaction_status": null }),
      json!({ "order_id": order_id }),
      json!({ "order_id": 12345, "transaction_status": "settlement" }),
      json!({ "transaction_status": "capture", "fraud_status": 7, "gross_amount": 71750 }),
    ];
    for payload in payloads {
      let req = test::TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(&payload)
        .to_request();
      assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK, "{}", payload);
    }

    // none of them was a usable settlement for this order
    let req = test::TestRequest::get().uri("/api/order/status/builderman").to_request();
    let orders: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(orders[0]["status"], "PENDING_PAYMENT");
  }

  #[actix_web::test]
  async fn webhook_signature_is_enforced_when_enabled() {
    let mut config = AppConfig::for_tests();
    config.midtrans_server_key = Some("server-key".to_string());
    config.verify_webhook_signature = true;
    let state = state_with(config);
    let app = app!(state);
    let order_id = create!(&app, "qris");

    let mut notification = GatewayNotification::new(order_id.clone(), TransactionStatus::Expire);
    notification.status_code = Some("407".to_string());
    notification.gross_amount = Some("71750.00".to_string());
    let good = expected_signature(&notification, "server-key");

    let payload = |signature: &str| {
      json!({
        "order_id": order_id,
        "transaction_status": "expire",
        "status_code": "407",
        "gross_amount": "71750.00",
        "signature_key": signature,
      })
    };

    let forged = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .set_json(payload("00ff"))
      .to_request();
    assert_eq!(test::call_service(&app, forged).await.status(), StatusCode::UNAUTHORIZED);

    let unverifiable = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .insert_header(("content-type", "application/json"))
      .set_payload("{not json")
      .to_request();
    assert_eq!(test::call_service(&app, unverifiable).await.status(), StatusCode::UNAUTHORIZED);

    let genuine = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .set_json(payload(&good))
      .to_request();
    assert_eq!(test::call_service(&app, genuine).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/order/status/builderman").to_request();
    let orders: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(orders[0]["status"], "FAILED");
  }

  #[actix_web::test]
  async fn operator_routes_require_the_token() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);

    let anonymous = test::TestRequest::get().uri("/api/admin/orders").to_request();
    assert_eq!(test::call_service(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let wrong = test::TestRequest::get()
      .uri("/api/admin/orders")
      .insert_header(("authorization", "Bearer nope"))
      .to_request();
    assert_eq!(test::call_service(&app, wrong).await.status(), StatusCode::UNAUTHORIZED);

    let mut config = AppConfig::for_tests();
    config.admin_api_token = None;
    let disabled_state = state_with(config);
    let disabled = app!(disabled_state);
    let req = test::TestRequest::get()
      .uri("/api/admin/orders")
      .insert_header(("authorization", ADMIN))
      .to_request();
    assert_eq!(test::call_service(&disabled, req).await.status(), StatusCode::NOT_FOUND);
  }

  #[actix_web::test]
  async fn operator_fulfilment_flow() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);
    let order_id = create!(&app, "gopay");

    let action = |action: &str| {
      test::TestRequest::post()
        .uri(&format!("/api/admin/orders/{}/{}", order_id, action))
        .insert_header(("authorization", ADMIN))
        .to_request()
    };

    // not paid yet
    assert_eq!(test::call_service(&app, action("fulfill")).await.status(), StatusCode::CONFLICT);
    assert_eq!(test::call_service(&app, action("ship")).await.status(), StatusCode::BAD_REQUEST);

    let settle = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .set_json(json!({ "order_id": order_id, "transaction_status": "capture", "fraud_status": "accept" }))
      .to_request();
    assert_eq!(test::call_service(&app, settle).await.status(), StatusCode::OK);

    let list = test::TestRequest::get()
      .uri("/api/admin/orders?status=AWAITING_FULFILLMENT&search=builder")
      .insert_header(("authorization", ADMIN))
      .to_request();
    let views: Value = test::call_and_read_body_json(&app, list).await;
    assert_eq!(views.as_array().map(Vec::len), Some(1));
    assert_eq!(views[0]["resalePriceWarning"], Value::Null);

    let resp = test::call_service(&app, action("fulfill")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = test::read_body_json(resp).await;
    assert_eq!(order["status"], "FULFILLED");

    let resp = test::call_service(&app, action("revise")).await;
    let order: Value = test::read_body_json(resp).await;
    assert_eq!(order["status"], "AWAITING_FULFILLMENT");

    let missing = test::TestRequest::post()
      .uri(&format!("/api/admin/orders/{}/fail", uuid::Uuid::new_v4()))
      .insert_header(("authorization", ADMIN))
      .to_request();
    assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::NOT_FOUND);

    let bad_status = test::TestRequest::get()
      .uri("/api/admin/orders?status=SHIPPED")
      .insert_header(("authorization", ADMIN))
      .to_request();
    assert_eq!(test::call_service(&app, bad_status).await.status(), StatusCode::BAD_REQUEST);
  }

  #[actix_web::test]
  async fn cors_preflight_allows_the_storefront() {
    let state = state_with(AppConfig::for_tests());
    let app = app!(state);

    let preflight = test::TestRequest::default()
      .method(Method::OPTIONS)
      .uri("/api/order/create")
      .insert_header((header::ORIGIN, "https://shop.example"))
      .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
      .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type"))
      .to_request();
    let resp = test::call_service(&app, preflight).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let methods = resp
      .headers()
      .get(header::ACCESS_CONTROL_ALLOW_METHODS)
      .and_then(|v| v.to_str().ok())
      .unwrap_or_default()
      .to_string();
    assert!(methods.contains("POST"), "{}", methods);

    let simple = test::TestRequest::get()
      .uri("/api/health")
      .insert_header((header::ORIGIN, "https://shop.example"))
      .to_request();
    let resp = test::call_service(&app, simple).await;
    assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
  }

  #[actix_web::test]
  async fn clients_over_the_limit_get_429() {
    let mut config = AppConfig::for_tests();
    config.rate_limit_max_requests = 2;
    let state = state_with(config);
    let app = app!(state);

    let status_from = |client: &str| {
      test::TestRequest::get()
        .uri("/api/order/status/builderman")
        .insert_header(("x-forwarded-for", client.to_string()))
        .to_request()
    };

    assert_eq!(test::call_service(&app, status_from("10.0.0.1")).await.status(), StatusCode::OK);
    assert_eq!(test::call_service(&app, status_from("10.0.0.1")).await.status(), StatusCode::OK);
    let resp = test::call_service(&app, status_from("10.0.0.1")).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Too many requests, please try again later");

    // other clients keep their own window
    assert_eq!(test::call_service(&app, status_from("10.0.0.2")).await.status(), StatusCode::OK);

    // gateway callbacks are never limited
    let webhook = test::TestRequest::post()
      .uri("/api/payment/webhook")
      .insert_header(("x-forwarded-for", "10.0.0.1"))
      .set_json(json!({ "order_id": uuid::Uuid::new_v4(), "transaction_status": "settlement" }))
      .to_request();
    assert_eq!(test::call_service(&app, webhook).await.status(), StatusCode::OK);
  }
}
