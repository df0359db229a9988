//! Core types for Shopfloor.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod product;

pub use email::{Email, EmailError};
pub use id::{DocumentId, DocumentIdError, ProductId};
pub use price::{Price, PriceError};
pub use product::{
    Category, FieldError, NewProduct, Product, ProductName, field_names, PRODUCTS_COLLECTION,
};
