//! ShopEZ storefront library.
//!
//! Catalog browsing, email/password accounts and a per-user shopping cart
//! kept in a realtime database, with a local cache for the last known cart.
//! Front ends build a [`state::Storefront`] and drive it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
