//! Composite Cache Keys
//!
//! A key is an ordered tuple of opaque parts reduced to a single canonical
//! value. Two keys are equal iff their canonical forms are equal.
//!
//! # Encoding
//!
//! - no parts: [`CacheKey::Empty`]
//! - one part: its string form, or [`CacheKey::Absent`] when the part is absent
//! - several parts: each part length-prefixed (`<len>:<repr>;`, absent parts
//!   as `-;`), so `["a_b", "c"]` and `["a", "b_c"]` never collide

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// A value usable as one element of a composite key
pub trait KeyPart {
    /// String form of this part, `None` when the part is absent
    fn key_repr(&self) -> Option<Cow<'_, str>>;
}

macro_rules! impl_key_part_via_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyPart for $ty {
                fn key_repr(&self) -> Option<Cow<'_, str>> {
                    Some(Cow::Owned(self.to_string()))
                }
            }
        )*
    };
}

impl_key_part_via_display!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
);

impl KeyPart for str {
    fn key_repr(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl KeyPart for String {
    fn key_repr(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl<T: KeyPart + ?Sized> KeyPart for &T {
    fn key_repr(&self) -> Option<Cow<'_, str>> {
        (**self).key_repr()
    }
}

impl<T: KeyPart + ?Sized> KeyPart for Box<T> {
    fn key_repr(&self) -> Option<Cow<'_, str>> {
        (**self).key_repr()
    }
}

impl<T: KeyPart + ?Sized> KeyPart for Arc<T> {
    fn key_repr(&self) -> Option<Cow<'_, str>> {
        (**self).key_repr()
    }
}

impl<T: KeyPart> KeyPart for Option<T> {
    fn key_repr(&self) -> Option<Cow<'_, str>> {
        self.as_ref().and_then(KeyPart::key_repr)
    }
}

/// Canonical form of a composite key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Key built from zero parts
    Empty,
    /// Key built from a single absent part
    Absent,
    /// Key built from a single present part
    Single(String),
    /// Length-prefixed encoding of two or more parts
    Composite(String),
}

impl CacheKey {
    /// Canonicalize an ordered sequence of parts
    pub fn from_parts<P: KeyPart + ?Sized>(parts: &[&P]) -> Self {
        match parts {
            [] => CacheKey::Empty,
            [only] => match only.key_repr() {
                Some(repr) => CacheKey::Single(repr.into_owned()),
                None => CacheKey::Absent,
            },
            many => {
                let mut encoded = String::new();
                for part in many {
                    match part.key_repr() {
                        Some(repr) => {
                            // Writing into a String cannot fail
                            let _ = write!(encoded, "{}:{};", repr.len(), repr);
                        }
                        None => encoded.push_str("-;"),
                    }
                }
                CacheKey::Composite(encoded)
            }
        }
    }

    /// True for the reserved empty and absent keys
    pub fn is_sentinel(&self) -> bool {
        matches!(self, CacheKey::Empty | CacheKey::Absent)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Empty => write!(f, "<empty>"),
            CacheKey::Absent => write!(f, "<absent>"),
            CacheKey::Single(s) | CacheKey::Composite(s) => write!(f, "{}", s),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
