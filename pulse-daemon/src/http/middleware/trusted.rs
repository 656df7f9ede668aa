//! Trusted-subnet gate.
//!
//! With a configured CIDR, only requests whose `X-Real-IP` header parses to
//! an address inside it pass; everything else is 403. The CIDR itself is
//! validated at startup.

use std::future::{ready, Future, Ready};
use std::net::IpAddr;
use std::pin::Pin;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ErrorForbidden;
use actix_web::Error;
use ipnet::IpNet;

pub struct TrustedSubnet {
    subnet: Option<IpNet>,
}

impl TrustedSubnet {
    pub fn new(subnet: Option<IpNet>) -> Self {
        Self { subnet }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TrustedSubnet
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = TrustedSubnetMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TrustedSubnetMiddleware { service, subnet: self.subnet }))
    }
}

pub struct TrustedSubnetMiddleware<S> {
    service: S,
    subnet: Option<IpNet>,
}

impl<S, B> Service<ServiceRequest> for TrustedSubnetMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(subnet) = &self.subnet {
            let ip = req
                .headers()
                .get("X-Real-IP")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<IpAddr>().ok());

            let allowed = match ip {
                Some(ip) => subnet.contains(&ip),
                None => {
                    return Box::pin(ready(Err(ErrorForbidden(
                        "failed to parse ip from http header\n",
                    ))))
                }
            };

            if !allowed {
                return Box::pin(ready(Err(ErrorForbidden("ip not in trusted network\n"))));
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}
