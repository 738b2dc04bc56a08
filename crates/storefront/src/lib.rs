//! Quitanda storefront library.
//!
//! Catalog, cart and the checkout transaction that turns a cart into an
//! order, exposed as a library so the binary and the integration tests share
//! one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
