//! Field & Byte Codec
//!
//! Converts between BN254 scalar-field elements and 32-byte buffers in both
//! big-endian (canonical storage/wire encoding) and little-endian (legacy
//! boundary encoding some upstream systems still use) conventions.
//!
//! All conversions reduce modulo
//! `p = 21888242871839275222246405745257275088548364400416034343698204186575808495617`.
//! A value whose raw bytes exceed `p` is accepted and silently reduced —
//! callers that need to reject out-of-range input should check
//! [`FieldElement::is_canonical`] against the raw bytes before constructing.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalSerialize;
use std::fmt;
use thiserror::Error;

/// A BN254 scalar-field element, canonical (reduced mod `p`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldElement(Fr);

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("decimal string is not a valid field element: {0}")]
    InvalidDecimal(String),
}

impl FieldElement {
    pub const ZERO: FieldElement = FieldElement(Fr::new_unchecked(ark_ff::BigInt::<4>([0, 0, 0, 0])));

    /// Build from a `u64`, useful for tests and leaf indices below 2^64.
    pub fn from_u64(v: u64) -> Self {
        FieldElement(Fr::from(v))
    }

    /// Decode 32 big-endian bytes, reducing mod `p`.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        FieldElement(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Decode 32 little-endian bytes, reducing mod `p`.
    pub fn from_le_bytes(bytes: &[u8; 32]) -> Self {
        FieldElement(Fr::from_le_bytes_mod_order(bytes))
    }

    /// Encode as 32 big-endian bytes (canonical storage/wire encoding).
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut le = [0u8; 32];
        self.0
            .serialize_compressed(&mut le[..])
            .expect("Fr is always 32 bytes");
        le.reverse();
        le
    }

    /// Encode as 32 little-endian bytes (legacy boundary encoding).
    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut le = [0u8; 32];
        self.0
            .serialize_compressed(&mut le[..])
            .expect("Fr is always 32 bytes");
        le
    }

    /// Parse from a lowercase or uppercase hex string, with or without `0x`,
    /// interpreted as big-endian bytes.
    pub fn from_hex_be(s: &str) -> Result<Self, FieldError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let padded = if stripped.len() % 2 == 1 {
            format!("0{}", stripped)
        } else {
            stripped.to_string()
        };
        let bytes = hex::decode(&padded).map_err(|e| FieldError::InvalidHex(e.to_string()))?;
        if bytes.len() > 32 {
            return Err(FieldError::WrongLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; 32];
        buf[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(Self::from_be_bytes(&buf))
    }

    /// Render as a 64-character lowercase hex string, big-endian.
    pub fn to_hex_be(&self) -> String {
        hex::encode(self.to_be_bytes())
    }

    /// Parse a base-10 decimal string (the wire format the circuits use for
    /// public signals).
    pub fn from_decimal(s: &str) -> Result<Self, FieldError> {
        use std::str::FromStr;
        let fr = Fr::from_str(s).map_err(|_| FieldError::InvalidDecimal(s.to_string()))?;
        Ok(FieldElement(fr))
    }

    /// Render as a base-10 decimal string.
    pub fn to_decimal(&self) -> String {
        self.0.into_bigint().to_string()
    }

    /// Returns true if `bytes` (interpreted as big-endian) is already the
    /// canonical reduced representation of this element's value, i.e. the
    /// byte string a strict validator would have accepted outright instead
    /// of silently reducing.
    pub fn is_canonical_be(bytes: &[u8; 32]) -> bool {
        FieldElement::from_be_bytes(bytes).to_be_bytes() == *bytes
    }

    pub(crate) fn inner(&self) -> Fr {
        self.0
    }

    pub(crate) fn from_inner(fr: Fr) -> Self {
        FieldElement(fr)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement(0x{})", self.to_hex_be())
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex_be())
    }
}

impl Default for FieldElement {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_le_roundtrip() {
        let fe = FieldElement::from_u64(0xdead_beef_u64);
        let be = fe.to_be_bytes();
        assert_eq!(FieldElement::from_be_bytes(&be), fe);
        let le = fe.to_le_bytes();
        assert_eq!(FieldElement::from_le_bytes(&le), fe);
    }

    #[test]
    fn be_le_are_byte_reversals() {
        let fe = FieldElement::from_u64(0x0102_0304_0506_0708);
        let be = fe.to_be_bytes();
        let mut le = fe.to_le_bytes();
        le.reverse();
        assert_eq!(be, le);
    }

    #[test]
    fn hex_roundtrip() {
        let fe = FieldElement::from_u64(42);
        let hex = fe.to_hex_be();
        assert_eq!(hex.len(), 64);
        assert_eq!(FieldElement::from_hex_be(&hex).unwrap(), fe);
        assert_eq!(FieldElement::from_hex_be("0x2a").unwrap(), fe);
    }

    #[test]
    fn zero_is_zero() {
        assert_eq!(FieldElement::ZERO, FieldElement::from_u64(0));
    }

    #[test]
    fn hex_injective_for_distinct_values() {
        let a = FieldElement::from_u64(1).to_hex_be();
        let b = FieldElement::from_u64(2).to_hex_be();
        assert_ne!(a, b);
    }
}
