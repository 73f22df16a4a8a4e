//! Application Layer - Use cases and port definitions.
//!
//! This layer wires the domain to the exchange adapters and downstream
//! consumers.

/// Port interfaces for outbound integrations.
pub mod ports;

/// Per-exchange pipelines, the connection supervisor and the alert consumer.
pub mod services;
