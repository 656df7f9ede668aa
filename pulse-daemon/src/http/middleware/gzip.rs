//! Gzip framing.
//!
//! Requests with `Content-Encoding: gzip` are decompressed before they reach
//! the handler. Responses are compressed on the way back when the client
//! advertised gzip support, the content type is `text/html` or
//! `application/json`, and the status is 2xx.

use std::future::{ready, Future, Ready};
use std::io::{Read, Write};
use std::pin::Pin;
use std::rc::Rc;

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::{ErrorBadRequest, ErrorInternalServerError};
use actix_web::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use actix_web::Error;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{collect_body, set_body};

const COMPRESSIBLE_TYPES: [&str; 2] = ["text/html", "application/json"];

pub struct GzipFraming;

impl<S, B> Transform<S, ServiceRequest> for GzipFraming
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = GzipFramingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GzipFramingMiddleware { service: Rc::new(service) }))
    }
}

pub struct GzipFramingMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for GzipFramingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let accepts_gzip = req
                .headers()
                .get_all(ACCEPT_ENCODING)
                .filter_map(|v| v.to_str().ok())
                .any(|v| v.contains("gzip"));

            let sends_gzip = req
                .headers()
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("gzip"));

            if sends_gzip {
                let body = collect_body(&mut req).await?;

                let mut decoder = GzDecoder::new(body.as_ref());
                let mut plain = Vec::new();
                decoder
                    .read_to_end(&mut plain)
                    .map_err(|e| { eprintln!("GZIP DEBUG ERR: {e}"); ErrorBadRequest(format!("failed to decode gzip body: {e}\n")) })?;

                set_body(&mut req, plain.into());
            }

            let res = service.call(req).await?;

            if accepts_gzip && res.status().is_success() && is_compressible(&res) {
                return compress_response(res).await;
            }

            Ok(res.map_into_boxed_body())
        })
    }
}

fn is_compressible<B>(res: &ServiceResponse<B>) -> bool {
    let content_type = res
        .response()
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    match content_type {
        Some(essence) => COMPRESSIBLE_TYPES.contains(&essence.as_str()),
        None => false,
    }
}

async fn compress_response<B: MessageBody + 'static>(
    res: ServiceResponse<B>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let (request, response) = res.into_parts();

    let status = response.status();
    let headers = response.headers().clone();

    let bytes = actix_web::body::to_bytes(response.into_body())
        .await
        .map_err(|_| ErrorInternalServerError("failed to read response body"))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let compressed = encoder
        .write_all(&bytes)
        .and_then(|_| encoder.finish())
        .map_err(|e| ErrorInternalServerError(format!("failed to compress response: {e}")))?;

    let mut response = actix_web::HttpResponse::with_body(status, BoxBody::new(compressed));
    *response.headers_mut() = headers;
    response.headers_mut().insert(
        CONTENT_ENCODING,
        actix_web::http::header::HeaderValue::from_static("gzip"),
    );

    Ok(ServiceResponse::new(request, response))
}
