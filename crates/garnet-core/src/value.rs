//! Tagged reference encoding (64-bit)
//!
//! A [`Value`] is either an immediate (fixnum, boolean, nil, undefined)
//! encoded entirely in its bits, or a heap reference carrying a packed
//! [`Address`]. The lowest 3 bits are the tag:
//!
//! ```text
//! reference: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa000
//! fixnum:    iiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiii001
//! bool:      000000000000000000000000000000000000000000000000000000000000b010
//! undef:     0000000000000000000000000000000000000000000000000000000000000100
//! nil:       0000000000000000000000000000000000000000000000000000000000000110
//! ```
//!
//! Decoding an immediate never dereferences memory. The `undef` singleton is
//! an internal "absent" sentinel used by lookups; programs only ever see nil.

use crate::heap::Address;
use std::fmt;

/// Largest integer representable as an immediate fixnum
pub const FIXNUM_MAX: i64 = (1 << 60) - 1;

/// Smallest integer representable as an immediate fixnum
pub const FIXNUM_MIN: i64 = -(1 << 60);

/// Tagged value representation
///
/// 8 bytes, `Copy`, compared by bit pattern. Two references are equal exactly
/// when they name the same heap slot.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    const TAG_MASK: u64 = 0b111;
    const TAG_REF: u64 = 0b000;
    const TAG_FIXNUM: u64 = 0b001;
    const TAG_BOOL: u64 = 0b010;
    const TAG_UNDEF: u64 = 0b100;
    const TAG_NIL: u64 = 0b110;

    const NIL: u64 = Self::TAG_NIL;
    const UNDEF: u64 = Self::TAG_UNDEF;
    const TRUE: u64 = (1 << 3) | Self::TAG_BOOL;
    const FALSE: u64 = Self::TAG_BOOL;

    /// The nil singleton
    #[inline]
    pub const fn nil() -> Self {
        Value(Self::NIL)
    }

    /// The undefined singleton (internal "absent" marker)
    #[inline]
    pub const fn undef() -> Self {
        Value(Self::UNDEF)
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Value(if b { Self::TRUE } else { Self::FALSE })
    }

    /// Create a fixnum value
    ///
    /// The integer must be within [`FIXNUM_MIN`]..=[`FIXNUM_MAX`]; larger
    /// integers are the bootstrap layer's problem (boxed bignums).
    #[inline]
    pub const fn fixnum(i: i64) -> Self {
        debug_assert!(i >= FIXNUM_MIN && i <= FIXNUM_MAX);
        Value(((i as u64) << 3) | Self::TAG_FIXNUM)
    }

    /// Create a heap reference from a packed address
    #[inline]
    pub fn reference(addr: Address) -> Self {
        Value((addr.raw() << 3) | Self::TAG_REF)
    }

    /// Check if this value is nil
    #[inline]
    pub const fn is_nil(&self) -> bool {
        self.0 == Self::NIL
    }

    /// Check if this value is the undefined sentinel
    #[inline]
    pub const fn is_undef(&self) -> bool {
        self.0 == Self::UNDEF
    }

    /// Check if this value is a boolean
    #[inline]
    pub const fn is_bool(&self) -> bool {
        (self.0 & Self::TAG_MASK) == Self::TAG_BOOL
    }

    /// Check if this value is a fixnum
    #[inline]
    pub const fn is_fixnum(&self) -> bool {
        (self.0 & Self::TAG_MASK) == Self::TAG_FIXNUM
    }

    /// Check if this value is a heap reference
    #[inline]
    pub const fn is_reference(&self) -> bool {
        (self.0 & Self::TAG_MASK) == Self::TAG_REF
    }

    /// Check if this value is an immediate (non-heap) value
    #[inline]
    pub const fn is_immediate(&self) -> bool {
        !self.is_reference()
    }

    /// Extract a boolean
    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        if self.is_bool() {
            Some((self.0 >> 3) != 0)
        } else {
            None
        }
    }

    /// Extract a fixnum
    #[inline]
    pub const fn as_fixnum(&self) -> Option<i64> {
        if self.is_fixnum() {
            Some((self.0 as i64) >> 3)
        } else {
            None
        }
    }

    /// Extract the heap address of a reference
    #[inline]
    pub fn as_address(&self) -> Option<Address> {
        if self.is_reference() {
            Some(Address::from_raw(self.0 >> 3))
        } else {
            None
        }
    }

    /// Raw bits (for identity derivation and debugging)
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Tag bits
    #[inline]
    pub const fn tag(&self) -> u64 {
        self.0 & Self::TAG_MASK
    }

    /// Truthiness: nil and false are falsy, everything else is truthy
    #[inline]
    pub const fn is_truthy(&self) -> bool {
        self.0 != Self::NIL && self.0 != Self::FALSE && self.0 != Self::UNDEF
    }

    /// Tag name for diagnostics
    pub const fn tag_name(&self) -> &'static str {
        match self.0 & Self::TAG_MASK {
            Self::TAG_REF => "reference",
            Self::TAG_FIXNUM => "fixnum",
            Self::TAG_BOOL => "bool",
            Self::TAG_UNDEF => "undef",
            Self::TAG_NIL => "nil",
            _ => "unknown",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::nil()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Self::TAG_NIL => write!(f, "nil"),
            Self::TAG_UNDEF => write!(f, "undef"),
            Self::TAG_BOOL => write!(f, "bool({})", self.as_bool().unwrap()),
            Self::TAG_FIXNUM => write!(f, "fixnum({})", self.as_fixnum().unwrap()),
            Self::TAG_REF => write!(f, "ref({:?})", Address::from_raw(self.0 >> 3)),
            _ => write!(f, "Value({:#x})", self.0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Self::TAG_NIL => write!(f, "nil"),
            Self::TAG_UNDEF => write!(f, "undef"),
            Self::TAG_BOOL => write!(f, "{}", self.as_bool().unwrap()),
            Self::TAG_FIXNUM => write!(f, "{}", self.as_fixnum().unwrap()),
            Self::TAG_REF => write!(f, "[object@{:#x}]", self.0 >> 3),
            _ => write!(f, "<??>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Address;

    #[test]
    fn test_nil_and_undef() {
        let nil = Value::nil();
        assert!(nil.is_nil());
        assert!(nil.is_immediate());
        assert!(!nil.is_truthy());
        assert_eq!(nil.tag_name(), "nil");

        let undef = Value::undef();
        assert!(undef.is_undef());
        assert!(!undef.is_nil());
        assert_ne!(nil, undef);
    }

    #[test]
    fn test_bool() {
        let t = Value::bool(true);
        let f = Value::bool(false);
        assert_eq!(t.as_bool(), Some(true));
        assert_eq!(f.as_bool(), Some(false));
        assert!(t.is_truthy());
        assert!(!f.is_truthy());
        assert_ne!(t, f);
    }

    #[test]
    fn test_fixnum() {
        assert_eq!(Value::fixnum(42).as_fixnum(), Some(42));
        assert_eq!(Value::fixnum(-100).as_fixnum(), Some(-100));
        assert_eq!(Value::fixnum(0).as_fixnum(), Some(0));
        assert_eq!(Value::fixnum(FIXNUM_MAX).as_fixnum(), Some(FIXNUM_MAX));
        assert_eq!(Value::fixnum(FIXNUM_MIN).as_fixnum(), Some(FIXNUM_MIN));
    }

    #[test]
    fn test_fixnum_zero_is_truthy() {
        // Ruby-style truthiness: only nil and false are falsy
        assert!(Value::fixnum(0).is_truthy());
    }

    #[test]
    fn test_reference_round_trip() {
        let addr = Address::young(17);
        let v = Value::reference(addr);
        assert!(v.is_reference());
        assert!(!v.is_immediate());
        assert_eq!(v.as_address(), Some(addr));

        let m = Address::mature(3, 12);
        assert_eq!(Value::reference(m).as_address(), Some(m));

        let l = Address::large(5);
        assert_eq!(Value::reference(l).as_address(), Some(l));
    }

    #[test]
    fn test_immediate_decode_never_yields_address() {
        assert_eq!(Value::nil().as_address(), None);
        assert_eq!(Value::bool(true).as_address(), None);
        assert_eq!(Value::fixnum(7).as_address(), None);
    }

    #[test]
    fn test_value_size() {
        assert_eq!(std::mem::size_of::<Value>(), 8);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::nil()), "nil");
        assert_eq!(format!("{}", Value::bool(true)), "true");
        assert_eq!(format!("{}", Value::fixnum(-3)), "-3");
    }
}
