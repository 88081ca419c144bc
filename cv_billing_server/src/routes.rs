//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the [`BillingDatabase`] backend, so they are registered with an explicit turbofish
//! in [`crate::server`] (actix's attribute macros cannot register generic handlers).

use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use cv_billing_engine::{
    db_types::{PaymentOutcome, Transaction},
    traits::BillingDatabase,
    ActivationApi,
    CallbackApi,
    CheckoutApi,
    CheckoutRequest,
};
use log::*;

use crate::{
    config::ServerConfig,
    data_objects::{JsonResponse, SubscriptionSummary},
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Checkout  ----------------------------------------------------
/// Route handler for the checkout endpoint
///
/// Creates a pending transaction for the requested plan and returns the signed configuration the front end needs
/// to open the hosted payment page. Under the direct-grant strategy the purchase is settled and activated in the
/// same call and no gateway configuration is returned.
pub async fn create_checkout<B: BillingDatabase>(
    body: web::Json<CheckoutRequest>,
    checkouts: web::Data<CheckoutApi<B>>,
    activations: web::Data<ActivationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST checkout for buyer {} ({})", request.buyer_id, request.plan);
    let response = checkouts.create_checkout(request).await?;
    if response.gateway.is_none() {
        activations.activate(&response.transaction_id).await?;
    }
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------  Gateway callbacks  -------------------------------------------
/// Route handler for the browser redirect back from the hosted payment page.
///
/// The gateway signs the query string it sends, so the parameters are taken in wire order. After verification
/// and recording, a successful payment is activated before the buyer's browser is forwarded; the buyer lands on
/// the success page with their benefits already applied.
pub async fn gateway_return<B: BillingDatabase>(
    req: HttpRequest,
    config: web::Data<ServerConfig>,
    callbacks: web::Data<CallbackApi<B>>,
    activations: web::Data<ActivationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = parse_params(req.query_string())?;
    debug!("💻️ GET gateway return with {} parameters", params.len());
    let resolution = callbacks.process_callback(&params).await?;
    activations.activate_if_eligible(&resolution.transaction).await?;
    let target = redirect_target(&resolution.transaction, &config)?;
    Ok(HttpResponse::SeeOther().insert_header((header::LOCATION, target)).finish())
}

/// Route handler for the gateway's server-to-server webhook.
///
/// Both callback paths are peers: whichever arrives first settles the transaction and activates the purchase,
/// and the loser becomes a no-op. Duplicate and conflicting deliveries are acknowledged with a 200 so the gateway
/// stops retrying; only verification and backend failures produce error statuses.
pub async fn gateway_webhook<B: BillingDatabase>(
    body: String,
    callbacks: web::Data<CallbackApi<B>>,
    activations: web::Data<ActivationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = parse_params(&body)?;
    debug!("💻️ POST gateway webhook with {} parameters", params.len());
    let resolution = callbacks.process_callback(&params).await?;
    let activation = activations.activate_if_eligible(&resolution.transaction).await?;
    let message = match (resolution.transitioned, activation) {
        (_, Some(a)) if a.applied => "Payment recorded and subscription activated",
        (_, Some(_)) => "Payment already activated",
        (true, None) => "Payment outcome recorded",
        (false, None) => "Duplicate notification ignored",
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

//----------------------------------------------  Subscription  ------------------------------------------------
/// Route handler for the subscription endpoint
///
/// Reports the buyer's current entitlement. Buyers who have never purchased anything get the implicit "no plan"
/// baseline rather than a 404.
pub async fn subscription<B: BillingDatabase>(
    path: web::Path<String>,
    activations: web::Data<ActivationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = path.into_inner();
    debug!("💻️ GET subscription for {buyer_id}");
    let sub = activations.subscription_for(&buyer_id).await?;
    Ok(HttpResponse::Ok().json(SubscriptionSummary::from_subscription(&sub, chrono::Utc::now())))
}

//----------------------------------------------  Helpers  -----------------------------------------------------
/// Parses callback parameters preserving wire order, which the signature scheme depends on.
fn parse_params(raw: &str) -> Result<Vec<(String, String)>, ServerError> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(raw).map_err(|e| {
        debug!("💻️ Could not parse callback parameters. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })
}

fn redirect_target(tx: &Transaction, config: &ServerConfig) -> Result<String, ServerError> {
    let base =
        if tx.outcome == PaymentOutcome::Succeeded { &config.success_url } else { &config.failure_url };
    let outcome = tx.outcome.to_string();
    let query = serde_urlencoded::to_string([("order_id", tx.order_id.as_str()), ("outcome", outcome.as_str())])
        .map_err(|e| ServerError::Unspecified(e.to_string()))?;
    Ok(format!("{base}?{query}"))
}
