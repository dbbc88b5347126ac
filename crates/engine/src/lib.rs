//! # NeuroChat Engine
//!
//! The generation core: turns a conversation history into one bounded
//! model call and one sanitized reply.
//!
//! Pipeline:
//!
//! 1. [`context::assemble`] — trim the stored history to a bounded,
//!    validated window (pure, deterministic).
//! 2. [`ChatTemplate::render`] — format the model-specific prompt,
//!    ending with an open assistant turn.
//! 3. [`GenerationEngine::generate`] — invoke the underlying
//!    [`TextGenerator`] under the single-writer lock.
//! 4. [`sanitize`] — strip the echoed prompt, cut at turn markers,
//!    filter disallowed scripts, normalize whitespace.
//!
//! The engine is explicitly constructed and dependency-injected: load
//! once at startup, call `generate` many times. A failed load leaves
//! the engine in a terminal unavailable state in which every call
//! fails fast with a fixed fallback reply.

pub mod context;
pub mod engine;
pub mod generator;
pub mod sanitize;
pub mod template;

pub use context::{ContextLimits, assemble};
pub use engine::{FALLBACK_REPLY, GenerationEngine, INVALID_INPUT_REPLY, UNAVAILABLE_REPLY};
pub use generator::{CandleGenerator, RawGeneration, SamplingParams, TextGenerator};
pub use sanitize::{Script, ScriptFilter, sanitize};
pub use template::ChatTemplate;
