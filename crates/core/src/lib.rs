//! Shopfloor Core - Shared types library.
//!
//! This crate provides the domain types used by the Shopfloor components:
//! - `admin` - The storefront dashboard (login gate, product uploads, product list)
//! - `integration-tests` - End-to-end tests against the in-memory backend
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no network
//! clients, no image processing. This keeps it lightweight and allows it to
//! be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Validated wrappers for emails, prices, product fields and
//!   document identifiers, plus the product record itself

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
