//! PULSE gRPC API
//!
//! This crate defines the gRPC protocol for agent → daemon metric delivery.
//! The protobuf definitions are in `proto/pulse.proto` and code-generated via
//! `tonic-build`.

// Include the generated code
pub mod pulse {
    pub mod v1 {
        tonic::include_proto!("pulse.v1");
    }
}
