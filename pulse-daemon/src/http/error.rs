//! Status mapping for service errors.

use actix_web::error::{
    ErrorBadRequest, ErrorInternalServerError, ErrorNotFound, ErrorNotImplemented,
};

use pulse_core::PulseError;

/// Canonical 501 body for unknown metric categories.
pub const UNSUPPORTED_KIND_BODY: &str = "Metric type is not supported\n";

/// Map a service error to the HTTP status the route table promises.
pub fn to_http_error(e: PulseError) -> actix_web::Error {
    match e {
        PulseError::GaugeNotFound { .. } | PulseError::CounterNotFound { .. } => {
            ErrorNotFound(format!("{e}\n"))
        }
        PulseError::MalformedMetric { .. } => ErrorBadRequest(format!("{e}\n")),
        PulseError::UnsupportedKind { .. } => ErrorNotImplemented(UNSUPPORTED_KIND_BODY),
        other => ErrorInternalServerError(format!("{other}\n")),
    }
}
