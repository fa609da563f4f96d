//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the service's core workflows.
//!
//! Use cases:
//! - `PayloadValidator`: semantic check with schema fallback
//! - `IngestPipeline`: one fetch/validate/extract/persist cycle
//! - `Feed`: heartbeat loop and Inactive/Active lifecycle
//! - `FeedRegistry`: name -> feed mapping and lifecycle operations

pub mod feed;
pub mod pipeline;
pub mod registry;
pub mod validator;

pub use feed::Feed;
pub use pipeline::IngestPipeline;
pub use registry::{FeedRegistry, RegistryError};
pub use validator::PayloadValidator;
