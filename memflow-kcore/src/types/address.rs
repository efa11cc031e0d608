/*!
Abstraction over a address on the target system.
*/

use std::default::Default;
use std::fmt;
use std::ops;

/**
This type represents a address on the target system.
It internally holds a `u64` value but is also used for the 32-bit targets this crate supports,
virtual and physical addresses share the type.

Arithmetic on this type is wrapping-free: overflowing an address is a programming error and
callers that deal with untrusted values use the `checked_*` helpers instead.
*/
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[repr(transparent)]
pub struct Address(u64);

/// Constructs an `Address` from a `i32` value.
impl From<i32> for Address {
    fn from(item: i32) -> Self {
        Self(item as u64)
    }
}

/// Constructs an `Address` from a `u32` value.
impl From<u32> for Address {
    fn from(item: u32) -> Self {
        Self(u64::from(item))
    }
}

/// Constructs an `Address` from a `u64` value.
impl From<u64> for Address {
    fn from(item: u64) -> Self {
        Self(item)
    }
}

/// Constructs an `Address` from a `usize` value.
impl From<usize> for Address {
    fn from(item: usize) -> Self {
        Self(item as u64)
    }
}

impl Address {
    /// A address with the value of zero.
    pub const NULL: Address = Address(0);

    /// A address with an invalid value.
    pub const INVALID: Address = Address(!0);

    /// Constructs an `Address` in a const context.
    pub const fn new(addr: u64) -> Self {
        Address(addr)
    }

    /// Returns an address with a value of zero.
    pub const fn null() -> Self {
        Address::NULL
    }

    /// Checks wether the address is zero or not.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns an address with a invalid value.
    pub const fn invalid() -> Self {
        Address::INVALID
    }

    /// Checks wether the address is valid or not.
    pub const fn is_valid(self) -> bool {
        self.0 != !0
    }

    /// Creates a bit mask covering the inclusive bit range `low..=high`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memflow_kcore::types::Address;
    ///
    /// assert_eq!(Address::bit_mask(12, 21).as_u64(), 0x003f_f000);
    /// ```
    pub const fn bit_mask(low: u8, high: u8) -> Address {
        Address((!0u64 >> (63 - high)) & !((1u64 << low) - 1))
    }

    /// Converts the address into a `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Converts the address into a `u64` value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Converts the address into a `usize` value.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Aligns the containing address to the given page size. It returns the base address of the containing page.
    pub const fn as_page_aligned(self, page_size: usize) -> Address {
        Address(self.0 - self.0 % page_size as u64)
    }

    /// Returns the offset of the address into a page of the given size.
    pub const fn page_offset(self, page_size: usize) -> usize {
        (self.0 % page_size as u64) as usize
    }

    /// Returns true if the bit at `idx` is set.
    pub const fn bit_at(self, idx: u8) -> bool {
        (self.0 & (1 << idx)) != 0
    }

    /// Adds `len` to the address, returning `None` on overflow.
    pub fn checked_add(self, len: u64) -> Option<Address> {
        self.0.checked_add(len).map(Address)
    }

    /// Subtracts `other`, returning `None` if `other` is above `self`.
    pub fn checked_sub(self, other: Address) -> Option<u64> {
        self.0.checked_sub(other.0)
    }
}

/// Returns a address with a value of zero.
impl Default for Address {
    fn default() -> Self {
        Self::null()
    }
}

/// Adds a `usize` to a `Address` which results in a `Address`.
impl ops::Add<usize> for Address {
    type Output = Self;

    fn add(self, other: usize) -> Self {
        Self(self.0 + other as u64)
    }
}

/// Adds a `u64` to a `Address` which results in a `Address`.
impl ops::Add<u64> for Address {
    type Output = Self;

    fn add(self, other: u64) -> Self {
        Self(self.0 + other)
    }
}

/// Adds a `usize` to a `Address`.
impl ops::AddAssign<usize> for Address {
    fn add_assign(&mut self, other: usize) {
        self.0 += other as u64;
    }
}

/// Subtracts a `Address` from a `Address` resulting in the distance between them.
impl ops::Sub for Address {
    type Output = u64;

    fn sub(self, other: Self) -> u64 {
        self.0 - other.0
    }
}

/// Subtracts a `usize` from a `Address` resulting in a `Address`.
impl ops::Sub<usize> for Address {
    type Output = Address;

    fn sub(self, other: usize) -> Address {
        Address(self.0 - other as u64)
    }
}

impl ops::BitAnd<u64> for Address {
    type Output = Address;

    fn bitand(self, other: u64) -> Address {
        Address(self.0 & other)
    }
}

impl ops::BitOr<u64> for Address {
    type Output = Address;

    fn bitor(self, other: u64) -> Address {
        Address(self.0 | other)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_valid() {
        assert_eq!(Address::null().is_null(), true);
        assert_eq!(Address::invalid().is_valid(), false);
    }

    #[test]
    fn test_bit_mask() {
        assert_eq!(Address::bit_mask(0, 11).as_u64(), 0xfff);
        assert_eq!(Address::bit_mask(12, 31).as_u64(), 0xffff_f000);
        assert_eq!(Address::bit_mask(22, 31).as_u64(), 0xffc0_0000);
        assert_eq!(Address::bit_mask(0, 63).as_u64(), !0);
    }

    #[test]
    fn test_page_helpers() {
        let addr = Address::from(0x1234_5678u64);
        assert_eq!(addr.as_page_aligned(0x1000), Address::from(0x1234_5000u64));
        assert_eq!(addr.page_offset(0x1000), 0x678);
        assert_eq!(addr.bit_at(3), true);
        assert_eq!(addr.bit_at(0), false);
    }

    #[test]
    fn test_checked() {
        assert_eq!(Address::from(!0u64 - 1).checked_add(2), None);
        assert_eq!(
            Address::from(0x2000u64).checked_sub(Address::from(0x1000u64)),
            Some(0x1000)
        );
        assert_eq!(Address::from(0x1000u64).checked_sub(Address::from(0x2000u64)), None);
    }

    #[test]
    fn test_ops() {
        let addr = Address::from(0x1000u64);
        assert_eq!(addr + 0x10usize, Address::from(0x1010u64));
        assert_eq!(addr + 0x10u64, Address::from(0x1010u64));
        assert_eq!(Address::from(0x1010u64) - addr, 0x10);
        assert_eq!(Address::from(0x1234u64) & 0xf00, Address::from(0x200u64));
        assert_eq!(Address::from(0x1000u64) | 0x123, Address::from(0x1123u64));
    }
}
