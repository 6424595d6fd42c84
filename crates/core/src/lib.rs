//! # homehub-core
//!
//! Concurrency and orchestration kernel for homehub.
//!
//! ## Responsibilities
//! - **Event bus** — in-memory pub/sub ([`event_bus`])
//! - **State store** — entity states and derived change events
//!   ([`state_store`])
//! - **Service registry** — named action dispatch with optional blocking
//!   semantics ([`service_registry`])
//! - **Worker pool** — executes all listener/handler/integration code off
//!   the calling thread ([`worker_pool`])
//! - **Bootstrap engine** — dependency resolution and at-most-once
//!   component setup ([`bootstrap`])
//! - **Hub** — composition root and process lifecycle ([`hub`])
//!
//! ## Dependency rule
//! Depends on `homehub-domain` only. Integrations depend on *this* crate,
//! never the reverse; they reach the kernel through the [`Hub`] handed to
//! their [`Component::setup`](component::Component::setup).

pub mod bootstrap;
pub mod component;
pub mod event_bus;
pub mod hub;
pub mod platform;
pub mod service_registry;
pub mod state_store;
pub mod worker_pool;

pub use bootstrap::Bootstrapper;
pub use component::{Component, ComponentRegistry, Configuration};
pub use hub::{Hub, HubConfig, RESTART_EXIT_CODE};
pub use platform::Platform;
