//! Business logic services for admin.
//!
//! # Services
//!
//! - `upload` - Upload guard: validate, encode, size-check, store
//! - `catalog` - Live product list and delete
//! - `session_gate` - One navigation decision per page load

pub mod catalog;
pub mod session_gate;
pub mod upload;

pub use catalog::{CatalogService, DeleteError, ListError};
pub use session_gate::{GateDecision, Page, SessionGate};
pub use upload::{UploadError, UploadForm, UploadOutcome, UploadService, ValidationError};
