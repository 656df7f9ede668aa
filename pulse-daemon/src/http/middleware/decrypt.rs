//! RSA body decryption.
//!
//! With a configured private key, the body is a concatenation of fixed-size
//! PKCS#1 v1.5 blocks; every block is decrypted and the joined plaintext
//! replaces the payload. Decryption failure is 500.

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ErrorInternalServerError;
use actix_web::Error;
use rsa::RsaPrivateKey;

use pulse_core::crypto;

use super::{collect_body, set_body};

pub struct RsaDecrypt {
    key: Option<Arc<RsaPrivateKey>>,
}

impl RsaDecrypt {
    pub fn new(key: Option<Arc<RsaPrivateKey>>) -> Self {
        Self { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RsaDecrypt
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RsaDecryptMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RsaDecryptMiddleware { service: Rc::new(service), key: self.key.clone() }))
    }
}

pub struct RsaDecryptMiddleware<S> {
    service: Rc<S>,
    key: Option<Arc<RsaPrivateKey>>,
}

impl<S, B> Service<ServiceRequest> for RsaDecryptMiddleware<S>
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
            if let Some(key) = key {
                let body = collect_body(&mut req).await?;

                let plain = crypto::decrypt_blocks(&key, &body)
                    .map_err(|e| ErrorInternalServerError(format!("{e}\n")))?;

                set_body(&mut req, plain.into());
            }

            service.call(req).await
        })
    }
}
