//! # NeuroChat Core
//!
//! Domain types and error definitions for the NeuroChat backend.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Value objects live here; behavior lives in the crates that own it
//! (`neurochat-engine` for generation, `neurochat-storage` for
//! persistence). All crates depend inward on core, never sideways.

pub mod error;
pub mod message;
pub mod observability;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use error::{AuthError, EngineError, Error, Result, StorageError};
pub use message::{GenerationResult, GenerationStatus, Role, Session, StoredMessage, Utterance};
pub use observability::{MetricSample, RequestLog};
pub use user::{User, UserProfile};
