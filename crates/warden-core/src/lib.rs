//! Warden Core — shared types for the decision gateway.
//!
//! This crate has no internal Warden dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`request`]: Inbound request view and per-request pipeline context
//! - [`subject`]: The identity established by authentication
//! - [`cache`]: Result cache trait, in-memory TTL cache and fingerprints
//! - [`endpoint`]: Outbound HTTP endpoints with retry and auth strategies
//! - [`config`]: Strict decoding of mechanism configuration documents
//! - [`template`]: Payload and header templates

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod request;
pub mod subject;
pub mod template;

// Re-export key types at crate root for convenience
pub use cache::{Cache, MemoryCache, NoopCache, fingerprint};
pub use config::MechanismConfig;
pub use endpoint::{Endpoint, EndpointConfig};
pub use error::{Error, ErrorKind, Result};
pub use request::{Request, RequestContext};
pub use subject::Subject;
pub use template::{Template, TemplateData};
