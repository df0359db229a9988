//! Shopfloor Admin library.
//!
//! This crate provides the storefront dashboard as a library, allowing it
//! to be tested end to end against the in-memory backend.
//!
//! # Security
//!
//! The dashboard writes to the product catalog on behalf of a signed-in
//! admin. Store access is authorized by the identity provider's ID token;
//! the session cookie never carries a password.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
