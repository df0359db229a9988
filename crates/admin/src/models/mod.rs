//! Domain models for admin.
//!
//! - [`session`] - What the admin session cookie carries
//! - [`product`] - Product record ↔ store document mapping

pub mod product;
pub mod session;

pub use product::{ProductDocumentError, new_product_fields, product_from_document};
pub use session::{CurrentAdmin, Flash, FlashKind};
