//! Storage liveness probe.

use actix_web::error::ErrorInternalServerError;
use actix_web::{web, HttpResponse};

use crate::service::MetricsService;

/// GET /ping
pub async fn ping(service: web::Data<MetricsService>) -> actix_web::Result<HttpResponse> {
    service
        .ping()
        .await
        .map_err(|e| ErrorInternalServerError(format!("{e}\n")))?;

    Ok(HttpResponse::Ok().finish())
}
