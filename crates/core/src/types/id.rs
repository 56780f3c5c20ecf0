//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! IDs are string-backed because they double as path segments in the realtime
//! database (`carts/{user_id}/items/{product_id}`). Parsing rejects anything
//! that cannot be used as a database key.

use core::fmt;

use serde::de::{self, Deserializer, Visitor};

/// Maximum length of a key in the realtime database, in bytes.
pub const MAX_ID_LENGTH: usize = 768;

/// Characters the realtime database refuses in keys.
const FORBIDDEN_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Errors that can occur when parsing an ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("id must be at most {max} bytes")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that is not allowed in a key.
    #[error("id contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

/// Check that a string can be used as an ID.
///
/// # Errors
///
/// Returns an error if the string is empty, longer than [`MAX_ID_LENGTH`]
/// bytes, or contains a path or control character.
pub fn validate_id(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > MAX_ID_LENGTH {
        return Err(IdError::TooLong { max: MAX_ID_LENGTH });
    }

    if let Some(c) = s
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(IdError::ForbiddenChar(c));
    }

    Ok(())
}

/// Deserialize an ID from either a JSON string or a JSON integer.
///
/// The catalog API hands out numeric product IDs, while the database keys
/// them as strings; both spellings are accepted.
#[doc(hidden)]
pub fn deserialize_raw_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct RawIdVisitor;

    impl Visitor<'_> for RawIdVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or integer id")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(RawIdVisitor)
}

/// Macro to define a type-safe, string-backed ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - Validating `parse()` (see [`validate_id`]) and `FromStr`
/// - `Serialize` as a plain string, `Deserialize` from a string or integer
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - `as_str()`, `into_inner()`, `Display` and `AsRef<str>`
///
/// # Example
///
/// ```rust
/// # use shopez_core::define_id;
/// define_id!(OrderId);
/// define_id!(ShipmentId);
///
/// let order_id = OrderId::parse("o-1").unwrap();
/// let shipment_id = ShipmentId::parse("o-1").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: OrderId = shipment_id;
/// # let _ = (order_id, shipment_id);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Parse an ID, rejecting strings that cannot be database keys.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is empty, too long, or contains
            /// a forbidden character.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::IdError> {
                $crate::types::id::validate_id(s)?;
                Ok(Self(s.to_owned()))
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the ID and returns its inner string.
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
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let raw = $crate::types::id::deserialize_raw_id(deserializer)?;
                Self::parse(&raw).map_err(<D::Error as ::serde::de::Error>::custom)
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ProductId);

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        // Decimal digits are always valid keys.
        Self(id.to_string())
    }
}
