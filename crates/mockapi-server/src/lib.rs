//! Mockapi: serves weighted-random mock HTTP responses per team project, with
//! a global per-IP rate limit, latency simulation and an optional
//! forward-proxy relay to a remote instance.

pub mod auth;
pub mod body;
pub mod codec;
pub mod config;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod ratelimit;
pub mod relay;
pub mod request_log;
pub mod resolver;
pub mod selector;
pub mod server;
pub mod store;
pub mod tls;

pub use config::Config;
pub use pipeline::MockPipeline;
pub use server::{build_pipeline, MockServer};
