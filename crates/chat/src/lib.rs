//! Orchestration core: turns one inbound chat request into a streamed,
//! multi-step model conversation with tools, then persists the outcome.
//!
//! The pipeline is assembled per request from configuration read at
//! request time; nothing here caches across requests except what the
//! model registry and bridge own themselves.

pub mod assembler;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod sink;
pub mod title;

pub use {
    assembler::{ActiveToolSet, BridgeLoader, ToolEntry, assemble},
    error::{ChatError, Result},
    orchestrator::{ChatService, ModelFactory, ProviderFactory},
    prompt::{DEFAULT_SYSTEM_PROMPT, compose},
    sink::estimate_cost,
    title::derive_title,
};
