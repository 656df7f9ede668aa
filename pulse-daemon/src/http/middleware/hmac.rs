//! HMAC body verification.
//!
//! With a configured key and a `Hash` header other than "none", the full
//! body is read, the HMAC-SHA256 tag recomputed and compared in constant
//! time; a mismatch is 400. The buffered body is then re-exposed to the
//! inner handlers.

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ErrorBadRequest;
use actix_web::Error;

use pulse_core::crypto;

use super::{collect_body, set_body};

pub struct HmacVerify {
    key: Option<String>,
}

impl HmacVerify {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacVerify
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = HmacVerifyMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacVerifyMiddleware { service: Rc::new(service), key: self.key.clone() }))
    }
}

pub struct HmacVerifyMiddleware<S> {
    service: Rc<S>,
    key: Option<String>,
}

impl<S, B> Service<ServiceRequest> for HmacVerifyMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Hash")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            let check = match (key, header) {
                (Some(key), Some(hash)) if !hash.eq_ignore_ascii_case("none") => Some((key, hash)),
                _ => None,
            };

            if let Some((key, hash)) = check {
                let body = collect_body(&mut req).await?;

                crypto::verify_body_hash(&key, &body, &hash)
                    .map_err(|e| ErrorBadRequest(format!("{e}\n")))?;

                set_body(&mut req, body);
            }

            service.call(req).await
        })
    }
}
