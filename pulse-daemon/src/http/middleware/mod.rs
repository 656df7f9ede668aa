//! Request-framing middlewares.
//!
//! Request processing order on the update routes: request logger → trusted
//! subnet gate → HMAC verifier → RSA decryptor → gzip layer → handler. The
//! HMAC tag covers the body exactly as transmitted, so verification runs
//! before any unwrapping; the agent compresses before it encrypts, so
//! decryption runs before decompression.

use actix_web::dev::ServiceRequest;
use actix_web::error::ErrorBadRequest;
use actix_web::web::{Bytes, BytesMut};
use actix_web::{Error, HttpMessage};
use futures_util::StreamExt;

pub mod decrypt;
pub mod gzip;
pub mod hmac;
pub mod logger;
pub mod trusted;

pub use decrypt::RsaDecrypt;
pub use gzip::GzipFraming;
pub use hmac::HmacVerify;
pub use logger::RequestLogger;
pub use trusted::TrustedSubnet;

/// Drain the request payload into one buffer.
pub(crate) async fn collect_body(req: &mut ServiceRequest) -> Result<Bytes, Error> {
    let mut payload = req.take_payload();
    let mut buf = BytesMut::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ErrorBadRequest(format!("{e}\n")))?;
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

/// Re-expose a buffered body to the inner handlers.
pub(crate) fn set_body(req: &mut ServiceRequest, body: Bytes) {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body);
    req.set_payload(payload.into());
}
