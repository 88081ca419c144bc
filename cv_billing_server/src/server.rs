use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use cv_billing_engine::{ActivationApi, CallbackApi, CheckoutApi, SqliteDatabase};
use log::info;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{create_checkout, gateway_return, gateway_webhook, health, subscription},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database ready at {}", config.database_url);
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let resolver = config.credential_resolver();
        let checkouts = CheckoutApi::new(db.clone(), resolver.clone(), config.checkout_options());
        let callbacks = CallbackApi::new(db.clone(), resolver);
        let activations = ActivationApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cvb::access_log"))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(checkouts))
            .app_data(web::Data::new(callbacks))
            .app_data(web::Data::new(activations))
            .service(health)
            .service(
                web::scope("/api")
                    .route("/checkout", web::post().to(create_checkout::<SqliteDatabase>))
                    .route("/subscription/{buyer_id}", web::get().to(subscription::<SqliteDatabase>)),
            )
            .service(
                web::scope("/gateway")
                    .route("/return", web::get().to(gateway_return::<SqliteDatabase>))
                    .route("/webhook", web::post().to(gateway_webhook::<SqliteDatabase>)),
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
