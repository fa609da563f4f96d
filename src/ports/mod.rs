//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `SourceAdapter`: market-data provider fetch + payload knowledge
//! - `SemanticJudge`: external yes/no reasoning service
//! - `MarketCapStore`: append-only durable log (JSONL-based)

pub mod repository;
pub mod semantic;
pub mod source;

pub use repository::MarketCapStore;
pub use semantic::SemanticJudge;
pub use source::SourceAdapter;
