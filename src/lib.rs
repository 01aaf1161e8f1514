//! Event-sourced command processing for cat care records.
//!
//! Commands are decided by [`domain::catcare::CatCareAggregate`], persisted
//! through an [`event_sourcing::EventStore`] with optimistic concurrency, and
//! folded into read models such as [`domain::catcare::RegisteredCats`].

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod utils;
