//! # homehub-domain
//!
//! Pure domain model for the homehub automation hub.
//!
//! ## Responsibilities
//! - Foundational types: entity identifiers, error conventions, timestamps
//! - Define **States** (what every connected thing currently is)
//! - Define **Events** (immutable records flowing over the event bus)
//! - Define **Service calls** (one dispatch of a named action)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `core`, components, or external IO
//! crates. Everything that talks to the outside world lives above it.

pub mod entity_id;
pub mod error;
pub mod event;
pub mod id;
pub mod service;
pub mod state;
pub mod time;
