//! Encoded metadata usage tokens.
//!
//! Ahead-of-time compiled code does not reference runtime structures by pointer; it
//! references them through 32-bit usage tokens that the runtime patches at load time.
//! A token packs a 3-bit usage kind into its top bits and a 29-bit table index into
//! the rest. Two whole-token values are reserved as sentinels and carry no index.
//!
//! # Token Structure
//!
//! ```text
//! ┌─────────┬──────────────────────────────┐
//! │ 31 .. 29│            28 .. 0           │
//! │  kind   │            index             │
//! └─────────┴──────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use aotcore::metadata::token::{UsageKind, UsageToken};
//!
//! let token = UsageToken::encode(UsageKind::StringLiteral, 42)?;
//! assert_eq!(token.kind()?, UsageKind::StringLiteral);
//! assert_eq!(token.index(), 42);
//! # Ok::<(), aotcore::Error>(())
//! ```

use std::fmt;

/// Maximum index a usage token can carry (29 bits).
pub const USAGE_INDEX_MAX: u32 = (1 << 29) - 1;

/// Whole-token sentinel: the usage slot has no data to patch.
pub const USAGE_NO_DATA: u32 = 0;

/// Whole-token sentinel: the usage slot referenced a method the conversion step
/// could not disambiguate. Resolving it is an error surfaced at patch time, not
/// at load time.
pub const USAGE_AMBIGUOUS_METHOD: u32 = 1;

/// What kind of runtime structure a usage token references.
///
/// The discriminants are the on-disk encoding and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UsageKind {
    /// A fully built runtime class (`TypeInfo` pointer)
    TypeInfo = 1,
    /// An interned type descriptor
    TypeDesc = 2,
    /// A method definition's entry point
    MethodDef = 3,
    /// A field information record
    FieldInfo = 4,
    /// An interned string literal object
    StringLiteral = 5,
    /// A generic method reference, resolved through instantiation
    MethodRef = 6,
    /// The RVA-backed initial data of a field
    FieldRva = 7,
}

impl UsageKind {
    /// Decode a 3-bit kind value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for `0` (reserved, only valid as part of
    /// a whole-token sentinel) and for values above 7.
    pub fn from_bits(bits: u32) -> crate::Result<Self> {
        match bits {
            1 => Ok(UsageKind::TypeInfo),
            2 => Ok(UsageKind::TypeDesc),
            3 => Ok(UsageKind::MethodDef),
            4 => Ok(UsageKind::FieldInfo),
            5 => Ok(UsageKind::StringLiteral),
            6 => Ok(UsageKind::MethodRef),
            7 => Ok(UsageKind::FieldRva),
            _ => Err(malformed_error!("Invalid usage kind - {}", bits)),
        }
    }
}

/// A 32-bit encoded usage token.
///
/// `UsageToken` is a plain value type; it performs no resolution on its own.
/// Decoding against live metadata happens in [`crate::metadata::usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsageToken(u32);

impl UsageToken {
    /// Create a token from its raw 32-bit representation.
    #[must_use]
    pub fn new(value: u32) -> Self {
        UsageToken(value)
    }

    /// Encode a kind and index into a token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` does not fit in 29 bits, or if
    /// the resulting token would collide with one of the reserved sentinels.
    pub fn encode(kind: UsageKind, index: u32) -> crate::Result<Self> {
        if index > USAGE_INDEX_MAX {
            return Err(malformed_error!(
                "Usage index {} exceeds the 29-bit maximum",
                index
            ));
        }
        Ok(UsageToken((kind as u32) << 29 | index))
    }

    /// Raw 32-bit value of the token.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Whether this token is one of the reserved whole-token sentinels.
    ///
    /// Sentinels carry no kind or index; callers must check this before calling
    /// [`UsageToken::kind`].
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == USAGE_NO_DATA || self.0 == USAGE_AMBIGUOUS_METHOD
    }

    /// The usage kind stored in the top 3 bits.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for sentinel tokens and for kind bits
    /// outside the defined range.
    pub fn kind(&self) -> crate::Result<UsageKind> {
        UsageKind::from_bits(self.0 >> 29)
    }

    /// The 29-bit table index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.0 & USAGE_INDEX_MAX
    }
}

impl From<u32> for UsageToken {
    fn from(value: u32) -> Self {
        UsageToken(value)
    }
}

impl fmt::Display for UsageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_all_kinds() {
        let kinds = [
            UsageKind::TypeInfo,
            UsageKind::TypeDesc,
            UsageKind::MethodDef,
            UsageKind::FieldInfo,
            UsageKind::StringLiteral,
            UsageKind::MethodRef,
            UsageKind::FieldRva,
        ];
        for kind in kinds {
            let token = UsageToken::encode(kind, 0x1234).unwrap();
            assert_eq!(token.kind().unwrap(), kind);
            assert_eq!(token.index(), 0x1234);
            assert!(!token.is_sentinel());
        }
    }

    #[test]
    fn test_index_limits() {
        let token = UsageToken::encode(UsageKind::FieldRva, USAGE_INDEX_MAX).unwrap();
        assert_eq!(token.index(), USAGE_INDEX_MAX);
        assert!(UsageToken::encode(UsageKind::FieldRva, USAGE_INDEX_MAX + 1).is_err());
    }

    #[test]
    fn test_sentinels() {
        assert!(UsageToken::new(USAGE_NO_DATA).is_sentinel());
        assert!(UsageToken::new(USAGE_AMBIGUOUS_METHOD).is_sentinel());
        assert!(!UsageToken::new(2).is_sentinel());

        // Sentinels have no decodable kind.
        assert!(UsageToken::new(USAGE_NO_DATA).kind().is_err());
    }

    #[test]
    fn test_kind_bits_rejects_invalid() {
        assert!(UsageKind::from_bits(0).is_err());
        assert!(UsageKind::from_bits(8).is_err());
        for bits in 1..=7 {
            assert!(UsageKind::from_bits(bits).is_ok());
        }
    }

    #[test]
    fn test_display() {
        let token = UsageToken::encode(UsageKind::TypeInfo, 1).unwrap();
        assert_eq!(format!("{token}"), "0x20000001");
    }
}
