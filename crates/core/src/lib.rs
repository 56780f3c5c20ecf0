//! ShopEZ Core - Shared types library.
//!
//! This crate provides common types used across all ShopEZ components:
//! - `storefront` - Catalog, auth and cart synchronization library
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Path-safe IDs, emails, prices and the cart data model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
