use actix_web::{http::{header, StatusCode}, test, web, App};
use cv_billing_engine::{
    db_types::{NewTransaction, PaymentOutcome},
    plans::PlanProduct,
    traits::{ActivationApplied, OutcomeResolution},
    ActivationApi,
    CallbackApi,
};

use super::mocks::MockBillingDb;
use crate::{
    config::ServerConfig,
    routes::{gateway_return, gateway_webhook, subscription},
};

fn webhook_app_data(
    callback_db: MockBillingDb,
    activation_db: MockBillingDb,
) -> (web::Data<CallbackApi<MockBillingDb>>, web::Data<ActivationApi<MockBillingDb>>) {
    let callbacks = CallbackApi::new(callback_db, super::test_resolver());
    let activations = ActivationApi::new(activation_db);
    (web::Data::new(callbacks), web::Data::new(activations))
}

#[actix_web::test]
async fn webhook_records_and_activates_a_successful_payment() {
    let _ = env_logger::try_init().ok();
    let pending = super::pending_transaction(NewTransaction::for_plan("U1", PlanProduct::SinglePurchase));
    let order_id = pending.order_id.clone();
    let succeeded = super::settled(&pending, PaymentOutcome::Succeeded, "SUCCESS");

    let mut db = MockBillingDb::new();
    let fetched = pending.clone();
    db.expect_fetch_transaction_by_order_id().returning(move |_| Ok(Some(fetched.clone())));
    let recorded = succeeded.clone();
    db.expect_record_gateway_outcome().returning(move |_| Ok(OutcomeResolution::Transitioned(recorded.clone())));

    let mut activation_db = MockBillingDb::new();
    let fetched = succeeded.clone();
    activation_db.expect_fetch_transaction().returning(move |_| Ok(Some(fetched.clone())));
    activation_db.expect_fetch_subscription().returning(|_| Ok(None));
    let activated = super::active_subscription(&succeeded);
    activation_db.expect_apply_activation().returning(move |_| Ok(ActivationApplied::Applied(activated.clone())));

    let (callbacks, activations) = webhook_app_data(db, activation_db);
    let app = App::new()
        .app_data(callbacks)
        .app_data(activations)
        .route("/gateway/webhook", web::post().to(gateway_webhook::<MockBillingDb>));
    let app = test::init_service(app).await;

    let body = super::signed_body(&[
        ("merchantOrderId", order_id.as_str()),
        ("paymentStatus", "SUCCESS"),
        ("transactionId", "GW-9911"),
        ("maskedCard", "xxxx-xxxx-xxxx-1111"),
    ]);
    let req = test::TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(header::ContentType::form_url_encoded())
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = test::read_body(res).await;
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("activated"), "unexpected response: {body}");
}

#[actix_web::test]
async fn webhook_with_a_forged_signature_is_forbidden() {
    let _ = env_logger::try_init().ok();
    let pending = super::pending_transaction(NewTransaction::for_plan("U1", PlanProduct::SinglePurchase));
    let order_id = pending.order_id.clone();
    let mut db = MockBillingDb::new();
    db.expect_fetch_transaction_by_order_id().returning(move |_| Ok(Some(pending.clone())));
    // record_gateway_outcome must never run for an unverified callback; no expectation is set for it

    let (callbacks, activations) = webhook_app_data(db, MockBillingDb::new());
    let app = App::new()
        .app_data(callbacks)
        .app_data(activations)
        .route("/gateway/webhook", web::post().to(gateway_webhook::<MockBillingDb>));
    let app = test::init_service(app).await;

    let mut body = super::signed_body(&[("merchantOrderId", order_id.as_str()), ("paymentStatus", "FAILED")]);
    // Flip the reported status after signing
    body = body.replace("FAILED", "SUCCESS");
    let req = test::TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(header::ContentType::form_url_encoded())
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn webhook_for_an_unknown_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBillingDb::new();
    db.expect_fetch_transaction_by_order_id().returning(|_| Ok(None));
    let (callbacks, activations) = webhook_app_data(db, MockBillingDb::new());
    let app = App::new()
        .app_data(callbacks)
        .app_data(activations)
        .route("/gateway/webhook", web::post().to(gateway_webhook::<MockBillingDb>));
    let app = test::init_service(app).await;

    let body = super::signed_body(&[("merchantOrderId", "never-created"), ("paymentStatus", "SUCCESS")]);
    let req = test::TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(header::ContentType::form_url_encoded())
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn browser_return_redirects_to_the_success_page() {
    let _ = env_logger::try_init().ok();
    let pending = super::pending_transaction(NewTransaction::for_plan("U1", PlanProduct::CreditPack));
    let order_id = pending.order_id.clone();
    let succeeded = super::settled(&pending, PaymentOutcome::Succeeded, "SUCCESS");

    let mut db = MockBillingDb::new();
    let fetched = pending.clone();
    db.expect_fetch_transaction_by_order_id().returning(move |_| Ok(Some(fetched.clone())));
    let recorded = succeeded.clone();
    db.expect_record_gateway_outcome().returning(move |_| Ok(OutcomeResolution::Transitioned(recorded.clone())));

    let mut activation_db = MockBillingDb::new();
    let fetched = succeeded.clone();
    activation_db.expect_fetch_transaction().returning(move |_| Ok(Some(fetched.clone())));
    activation_db.expect_fetch_subscription().returning(|_| Ok(None));
    let activated = super::active_subscription(&succeeded);
    activation_db.expect_apply_activation().returning(move |_| Ok(ActivationApplied::Applied(activated.clone())));

    let config = ServerConfig::default();
    let success_url = config.success_url.clone();
    let (callbacks, activations) = webhook_app_data(db, activation_db);
    let app = App::new()
        .app_data(web::Data::new(config))
        .app_data(callbacks)
        .app_data(activations)
        .route("/gateway/return", web::get().to(gateway_return::<MockBillingDb>));
    let app = test::init_service(app).await;

    let query = super::signed_body(&[
        ("merchantOrderId", order_id.as_str()),
        ("paymentStatus", "SUCCESS"),
        ("transactionId", "GW-9911"),
    ]);
    let req = test::TestRequest::get().uri(&format!("/gateway/return?{query}")).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let location = res.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with(&success_url), "unexpected redirect target: {location}");
    assert!(location.contains("outcome=Succeeded"));
}

#[actix_web::test]
async fn subscription_reports_the_baseline_for_new_buyers() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBillingDb::new();
    db.expect_fetch_subscription().returning(|_| Ok(None));
    let activations = web::Data::new(ActivationApi::new(db));
    let app = App::new()
        .app_data(activations)
        .route("/api/subscription/{buyer_id}", web::get().to(subscription::<MockBillingDb>));
    let app = test::init_service(app).await;

    let req = test::TestRequest::get().uri("/api/subscription/newcomer@example.com").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["buyer_id"], "newcomer@example.com");
    assert_eq!(body["status"], "None");
    assert_eq!(body["plan"], serde_json::Value::Null);
}
