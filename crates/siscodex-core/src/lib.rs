//! Core types and resolution engine for SIS-CodEx group management.
//!
//! This crate is deliberately free of HTTP and runtime dependencies. It turns
//! a flat snapshot of groups into an augmented forest, indexes group
//! attributes, and resolves which groups may host or be bound to a SIS
//! scheduling event. Mutations are only ever requested through the traits in
//! [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod candidates;
pub mod collate;
pub mod error;
pub mod event;
pub mod group;
pub mod index;
pub mod snapshot;
pub mod store;
pub mod term;
pub mod tree;
pub mod validate;

pub use error::{Error, Result};
