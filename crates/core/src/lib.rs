//! Velvet Bean Core - Shared types library.
//!
//! This crate provides common types used across all Velvet Bean components:
//! - `sync` - Cart/wishlist synchronization core
//! - `integration-tests` - End-to-end scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no store access, no async
//! code. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
