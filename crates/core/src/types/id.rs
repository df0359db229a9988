//! Newtype IDs for type-safe document references.
//!
//! Documents in the hosted store are addressed by opaque string IDs. Use the
//! `define_document_id!` macro to create wrappers that prevent accidentally
//! mixing IDs of different collections.

use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

/// Errors that can occur when validating a document ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentIdError {
    /// The ID is empty.
    #[error("document id cannot be empty")]
    Empty,
    /// The ID exceeds the store's size limit.
    #[error("document id must be at most {max} bytes")]
    TooLong {
        /// Maximum allowed length in bytes.
        max: usize,
    },
    /// The ID contains a path separator.
    #[error("document id cannot contain '/'")]
    ContainsSlash,
    /// The ID is one of the reserved names (`.`, `..`, `__name__`).
    #[error("document id '{0}' is reserved")]
    Reserved(String),
}

/// Maximum length of a document ID in bytes.
pub const MAX_DOCUMENT_ID_BYTES: usize = 1500;

/// Validate a raw document ID against the store's naming rules.
///
/// # Errors
///
/// Returns [`DocumentIdError`] describing the first rule that is violated.
pub fn validate_document_id(id: &str) -> Result<(), DocumentIdError> {
    if id.is_empty() {
        return Err(DocumentIdError::Empty);
    }
    if id.len() > MAX_DOCUMENT_ID_BYTES {
        return Err(DocumentIdError::TooLong {
            max: MAX_DOCUMENT_ID_BYTES,
        });
    }
    if id.contains('/') {
        return Err(DocumentIdError::ContainsSlash);
    }
    if id == "." || id == ".." || (id.len() > 4 && id.starts_with("__") && id.ends_with("__")) {
        return Err(DocumentIdError::Reserved(id.to_owned()));
    }
    Ok(())
}

/// Macro to define a type-safe document ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - A validating `parse()` and an infallible `as_str()`
///
/// # Example
///
/// ```rust
/// # use shopfloor_core::define_document_id;
/// define_document_id!(ListingId);
///
/// let id = ListingId::parse("a1B2c3").unwrap();
/// assert_eq!(id.as_str(), "a1B2c3");
/// assert!(ListingId::parse("nested/path").is_err());
/// ```
#[macro_export]
macro_rules! define_document_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse a document ID, enforcing the store's naming rules.
            ///
            /// # Errors
            ///
            /// Returns an error if the ID is empty, too long, contains a
            /// slash, or is a reserved name.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::DocumentIdError> {
                $crate::types::id::validate_document_id(id)?;
                Ok(Self(id.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::DocumentIdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Any document in any collection.
define_document_id!(DocumentId);
// A document in the products collection.
define_document_id!(ProductId);

/// Length of store-assigned document IDs.
pub const AUTO_ID_LENGTH: usize = 20;

impl DocumentId {
    /// Generate a random 20-character alphanumeric ID, the same shape the
    /// hosted store's client SDKs assign.
    #[must_use]
    pub fn random() -> Self {
        Self(
            rand::rng()
                .sample_iter(&Alphanumeric)
                .take(AUTO_ID_LENGTH)
                .map(char::from)
                .collect(),
        )
    }
}

impl From<DocumentId> for ProductId {
    fn from(id: DocumentId) -> Self {
        Self(id.0)
    }
}

impl From<ProductId> for DocumentId {
    fn from(id: ProductId) -> Self {
        Self(id.0)
    }
}
