//! Metric retrieval handlers: the HTML summary page, the plaintext value
//! route and the JSON value route.

use actix_web::error::{ErrorBadRequest, ErrorNotImplemented};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use pulse_core::Metric;

use crate::service::MetricsService;

use super::error::{to_http_error, UNSUPPORTED_KIND_BODY};

/// Body of POST /value/ — a metric reference without a value.
#[derive(Deserialize)]
struct MetricQuery {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

/// GET / — HTML table of everything in the store.
pub async fn home(service: web::Data<MetricsService>) -> actix_web::Result<HttpResponse> {
    let mut gauges = service.gauges().await.map_err(to_http_error)?;
    let mut counters = service.counters().await.map_err(to_http_error)?;

    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    counters.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rows = String::new();
    for (name, value) in &gauges {
        rows.push_str(&format!(
            "<tr><th style='{STYLE_CELL}'>{name}</th><td style='{STYLE_CELL}'>{value:.3}</td></tr>\n"
        ));
    }
    for (name, value) in &counters {
        rows.push_str(&format!(
            "<tr><th style='{STYLE_CELL}'>{name}</th><td style='{STYLE_CELL}'>{value}</td></tr>\n"
        ));
    }

    let body = format!(
        "<table style='border-collapse: collapse; border: 2px solid rgb(140 140 140);'>\n\
         <caption style='font-weight: bold; padding: 10px;'>Metrics</caption>\n\
         <thead style='background-color: rgb(228 240 245);'>\n\
         <tr style='text-align: left'>\
         <th style='{STYLE_CELL}'>Name</th>\
         <th style='{STYLE_CELL}'>Value</th>\
         </tr>\n\
         </thead>\n\
         <tbody>\n{rows}</tbody>\n\
         </table>\n"
    );

    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

const STYLE_CELL: &str = "border: 1px solid rgb(160 160 160); padding: 8px 10px; text-align: left";

/// GET /value/{category}/{name} — plaintext metric value.
pub async fn value_path(
    service: web::Data<MetricsService>,
    path: web::Path<(String, String)>,
) -> actix_web::Result<HttpResponse> {
    let (category, name) = path.into_inner();

    let rendered = match category.as_str() {
        "gauge" => {
            let value = service.gauge(&name).await.map_err(to_http_error)?;
            value.to_string()
        }
        "counter" => {
            let value = service.counter(&name).await.map_err(to_http_error)?;
            value.to_string()
        }
        _ => return Err(ErrorNotImplemented(UNSUPPORTED_KIND_BODY)),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/plain;charset=utf-8")
        .body(rendered))
}

/// POST /value/ — JSON metric lookup; echoes the reference with the stored
/// value filled into the matching field.
pub async fn value_json(
    service: web::Data<MetricsService>,
    body: web::Bytes,
) -> actix_web::Result<HttpResponse> {
    let query: MetricQuery =
        serde_json::from_slice(&body).map_err(|e| ErrorBadRequest(format!("{e}\n")))?;

    let response = match query.kind.as_str() {
        "gauge" => {
            let value = service.gauge(&query.id).await.map_err(to_http_error)?;
            Metric::gauge(query.id, value)
        }
        "counter" => {
            let value = service.counter(&query.id).await.map_err(to_http_error)?;
            Metric::counter(query.id, value)
        }
        _ => return Err(ErrorNotImplemented(UNSUPPORTED_KIND_BODY)),
    };

    Ok(HttpResponse::Ok().content_type("application/json").json(response))
}
