//! Emporium Storefront library.
//!
//! Catalog browsing, cart and orders, account flows (signup, login, password
//! reset) and product administration, served as server-rendered HTML. The
//! binary in `main.rs` wires these modules to `PostgreSQL`; tests drive the
//! same router over in-memory stores (feature `test-util`).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
