//! HTTP frontend: route table and middleware wiring.
//!
//! The update scopes carry the full framing chain; the view scope carries
//! logging, the subnet gate and the gzip layer; `/ping` is bare.

use std::sync::Arc;

use actix_web::web;
use ipnet::IpNet;
use rsa::RsaPrivateKey;

use crate::service::MetricsService;

pub mod error;
pub mod middleware;
pub mod ping;
pub mod update;
pub mod view;

#[cfg(test)]
mod tests;

use middleware::{GzipFraming, HmacVerify, RequestLogger, RsaDecrypt, TrustedSubnet};

/// Request-framing configuration shared by every worker.
#[derive(Clone, Default)]
pub struct HttpConfig {
    /// HMAC key for body verification.
    pub key: Option<String>,
    /// RSA private key for body decryption.
    pub private_key: Option<Arc<RsaPrivateKey>>,
    /// CIDR allowlist for `X-Real-IP`.
    pub trusted_subnet: Option<IpNet>,
}

/// Build the route configuration for one worker.
///
/// Middlewares run outermost-first in reverse registration order, so each
/// scope registers the innermost layer first.
pub fn configure(
    service: MetricsService,
    cfg: HttpConfig,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |app| {
        app.app_data(web::Data::new(service))
            .route("/ping", web::get().to(ping::ping))
            .service(
                web::scope("/update")
                    .wrap(GzipFraming)
                    .wrap(RsaDecrypt::new(cfg.private_key.clone()))
                    .wrap(HmacVerify::new(cfg.key.clone()))
                    .wrap(TrustedSubnet::new(cfg.trusted_subnet))
                    .wrap(RequestLogger)
                    .route("/", web::post().to(update::update_json))
                    .route(
                        "/{category}/{name}/{value}",
                        web::post().to(update::update_path),
                    ),
            )
            .service(
                web::scope("/updates")
                    .wrap(GzipFraming)
                    .wrap(RsaDecrypt::new(cfg.private_key))
                    .wrap(HmacVerify::new(cfg.key))
                    .wrap(TrustedSubnet::new(cfg.trusted_subnet))
                    .wrap(RequestLogger)
                    .route("/", web::post().to(update::updates)),
            )
            .service(
                web::scope("")
                    .wrap(GzipFraming)
                    .wrap(TrustedSubnet::new(cfg.trusted_subnet))
                    .wrap(RequestLogger)
                    .route("/", web::get().to(view::home))
                    .route("/value/", web::post().to(view::value_json))
                    .route("/value/{category}/{name}", web::get().to(view::value_path)),
            );
    }
}
