//! Quitanda Core - Shared domain types.
//!
//! This crate provides the types shared by every Quitanda component:
//! - `storefront` - JSON storefront API and the checkout transaction
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is opt-in via the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, money, quantities, order status and payment methods

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
