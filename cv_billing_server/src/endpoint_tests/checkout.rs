use actix_web::{http::StatusCode, test, web, App};
use cv_billing_engine::{
    db_types::PaymentOutcome,
    helpers::sign_order,
    plans::PlanProduct,
    traits::OutcomeResolution,
    ActivationApi,
    CheckoutApi,
    CheckoutResponse,
    PaymentStrategy,
};
use cvb_common::Secret;

use super::mocks::MockBillingDb;
use crate::routes::create_checkout;

#[actix_web::test]
async fn checkout_returns_a_signed_gateway_config() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBillingDb::new();
    db.expect_insert_transaction().returning(|tx| Ok(super::pending_transaction(tx)));
    let checkouts = CheckoutApi::new(db, super::test_resolver(), super::checkout_options(PaymentStrategy::Gateway));
    let activations = ActivationApi::new(MockBillingDb::new());
    let app = App::new()
        .app_data(web::Data::new(checkouts))
        .app_data(web::Data::new(activations))
        .route("/api/checkout", web::post().to(create_checkout::<MockBillingDb>));
    let app = test::init_service(app).await;

    let req = test::TestRequest::post()
        .uri("/api/checkout")
        .set_json(serde_json::json!({"buyer_id": "U1", "plan": "single_purchase", "buyer_name": "One Buyer"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: CheckoutResponse = test::read_body_json(res).await;
    let gateway = body.gateway.expect("gateway configuration missing");
    assert_eq!(gateway.merchant_id, super::MERCHANT_ID);
    assert_eq!(gateway.amount, "49.00");
    assert_eq!(gateway.currency, "EGP");
    let expected = sign_order(
        super::MERCHANT_ID,
        &body.order_id,
        body.amount,
        "EGP",
        &Secret::new(super::API_KEY.to_string()),
        None,
    );
    assert_eq!(gateway.signature, expected);
}

#[actix_web::test]
async fn checkout_without_credentials_is_service_unavailable() {
    let _ = env_logger::try_init().ok();
    let resolver = cv_billing_engine::credentials::CredentialResolver::new(
        super::MERCHANT_ID.into(),
        cv_billing_engine::credentials::GatewayMode::Sandbox,
        None,
        None,
        vec![],
    );
    let checkouts =
        CheckoutApi::new(MockBillingDb::new(), resolver, super::checkout_options(PaymentStrategy::Gateway));
    let activations = ActivationApi::new(MockBillingDb::new());
    let app = App::new()
        .app_data(web::Data::new(checkouts))
        .app_data(web::Data::new(activations))
        .route("/api/checkout", web::post().to(create_checkout::<MockBillingDb>));
    let app = test::init_service(app).await;

    let req = test::TestRequest::post()
        .uri("/api/checkout")
        .set_json(serde_json::json!({"buyer_id": "U1", "plan": "annual_pass"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = test::read_body(res).await;
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("temporarily unavailable"));
    // The response must not leak which variables are missing
    assert!(!body.contains("CVB_"));
}

#[actix_web::test]
async fn direct_grant_checkout_settles_and_activates() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBillingDb::new();
    db.expect_insert_transaction().returning(|tx| Ok(super::pending_transaction(tx)));
    db.expect_record_gateway_outcome().returning(|update| {
        let new_tx = cv_billing_engine::db_types::NewTransaction::for_plan("staff@example.com", PlanProduct::AnnualPass);
        let mut tx = super::pending_transaction(new_tx);
        tx.order_id = update.order_id;
        tx.outcome = update.outcome;
        tx.raw_status = Some(update.raw_status);
        Ok(OutcomeResolution::Transitioned(tx))
    });
    let mut activation_db = MockBillingDb::new();
    activation_db.expect_fetch_transaction().returning(|id| {
        let new_tx = cv_billing_engine::db_types::NewTransaction::for_plan("staff@example.com", PlanProduct::AnnualPass);
        let mut tx = super::pending_transaction(new_tx);
        tx.transaction_id = id.clone();
        tx.outcome = PaymentOutcome::Succeeded;
        Ok(Some(tx))
    });
    activation_db.expect_fetch_subscription().returning(|_| Ok(None));
    activation_db.expect_apply_activation().returning(|grant| {
        let new_tx = cv_billing_engine::db_types::NewTransaction::for_plan(&grant.buyer_id, grant.plan);
        let mut tx = super::pending_transaction(new_tx);
        tx.transaction_id = grant.transaction_id;
        Ok(cv_billing_engine::traits::ActivationApplied::Applied(super::active_subscription(&tx)))
    });

    let checkouts =
        CheckoutApi::new(db, super::test_resolver(), super::checkout_options(PaymentStrategy::DirectGrant));
    let activations = ActivationApi::new(activation_db);
    let app = App::new()
        .app_data(web::Data::new(checkouts))
        .app_data(web::Data::new(activations))
        .route("/api/checkout", web::post().to(create_checkout::<MockBillingDb>));
    let app = test::init_service(app).await;

    let req = test::TestRequest::post()
        .uri("/api/checkout")
        .set_json(serde_json::json!({"buyer_id": "staff@example.com", "plan": "annual_pass"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: CheckoutResponse = test::read_body_json(res).await;
    assert!(body.gateway.is_none());
    assert_eq!(body.strategy, PaymentStrategy::DirectGrant);
}
