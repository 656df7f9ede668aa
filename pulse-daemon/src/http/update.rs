//! Metric update handlers: path-style single update, JSON single update and
//! the JSON batch.

use actix_web::error::{ErrorBadRequest, ErrorInternalServerError, ErrorNotImplemented};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use pulse_core::{Metric, PulseError};

use crate::service::MetricsService;

use super::error::{to_http_error, UNSUPPORTED_KIND_BODY};

/// Incoming JSON record with the kind kept raw so unknown categories map to
/// 501 instead of a decode failure.
#[derive(Deserialize)]
struct RawMetric {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    delta: Option<i64>,
    value: Option<f64>,
}

/// POST /update/{category}/{name}/{value}
pub async fn update_path(
    service: web::Data<MetricsService>,
    path: web::Path<(String, String, String)>,
) -> actix_web::Result<HttpResponse> {
    let (category, name, value) = path.into_inner();

    match category.as_str() {
        "gauge" => {
            let value: f64 =
                value.parse().map_err(|_| ErrorBadRequest("Invalid metric value\n"))?;
            service.update_gauge(&name, value).await.map_err(to_http_error)?;
        }
        "counter" => {
            let delta: i64 =
                value.parse().map_err(|_| ErrorBadRequest("Invalid metric value\n"))?;
            service.update_counter(&name, delta).await.map_err(to_http_error)?;
        }
        _ => return Err(ErrorNotImplemented(UNSUPPORTED_KIND_BODY)),
    }

    Ok(HttpResponse::Ok().finish())
}

/// POST /update/ — apply one JSON record and echo it back with the
/// post-update value filled in.
pub async fn update_json(
    service: web::Data<MetricsService>,
    body: web::Bytes,
) -> actix_web::Result<HttpResponse> {
    let req: RawMetric =
        serde_json::from_slice(&body).map_err(|e| ErrorBadRequest(format!("{e}\n")))?;

    let response = match req.kind.as_str() {
        "gauge" => {
            let value = req.value.ok_or_else(|| ErrorBadRequest("Metric value not found\n"))?;

            service.update_gauge(&req.id, value).await.map_err(to_http_error)?;

            let stored = service
                .gauge(&req.id)
                .await
                .map_err(|e| ErrorInternalServerError(format!("{e}\n")))?;
            Metric::gauge(req.id, stored)
        }
        "counter" => {
            let delta = req.delta.ok_or_else(|| ErrorBadRequest("Metric value not found\n"))?;

            service.update_counter(&req.id, delta).await.map_err(to_http_error)?;

            let stored = service
                .counter(&req.id)
                .await
                .map_err(|e| ErrorInternalServerError(format!("{e}\n")))?;
            Metric::counter(req.id, stored)
        }
        _ => return Err(ErrorNotImplemented(UNSUPPORTED_KIND_BODY)),
    };

    Ok(HttpResponse::Ok().content_type("application/json").json(response))
}

/// POST /updates/ — apply a JSON batch in order.
pub async fn updates(
    service: web::Data<MetricsService>,
    body: web::Bytes,
) -> actix_web::Result<HttpResponse> {
    let metrics: Vec<Metric> =
        serde_json::from_slice(&body).map_err(|e| ErrorBadRequest(format!("{e}\n")))?;

    service.updates(&metrics).await.map_err(|e| match e {
        PulseError::MalformedMetric { .. } => to_http_error(e),
        other => ErrorInternalServerError(format!("{other}\n")),
    })?;

    Ok(HttpResponse::Ok().finish())
}
