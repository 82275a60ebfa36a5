//! The MCPay gateway: an authenticating, metering HTTP reverse proxy for
//! the Model Context Protocol. See `pipeline` for the request-processing
//! core; everything else in this crate is a leaf dependency it consumes.

pub mod auto_signer;
pub mod cache;
pub mod context;
pub mod errors;
pub mod facilitator;
pub mod http_server;
pub mod identity;
pub mod metrics_exporter;
pub mod payment;
pub mod pipeline;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod upstream;

pub use state::AppState;
