//! Token-ring arithmetic.
//!
//! The ring is the signed 64-bit space `[i64::MIN, i64::MAX]` with
//! wrap-around: a range whose `start >= end` crosses the `i64::MAX` /
//! `i64::MIN` seam rather than being empty or inverted. Sizes are
//! arbitrary-precision because a full-ring range's size (`2^64`) does not
//! fit in any signed or unsigned 64-bit integer.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::TokenRingError;

/// Non-negative size of a token range, up to and including a full ring
/// rotation (`2^64`).
pub type TokenRangeSize = BigUint;

/// A contiguous span on the token ring, identified by its exclusive
/// `(start, end)` endpoints.
///
/// `start == end` denotes a full-ring range (size `2^64`), not an empty
/// one -- this representation has no way to express an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: i64,
    pub end: i64,
}

impl TokenRange {
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Size of this range on the ring, counting through the wrap-around
    /// seam when `start >= end`.
    #[must_use]
    pub fn size(&self) -> TokenRangeSize {
        if self.start < self.end {
            BigUint::from((self.end as i128 - self.start as i128) as u128)
        } else {
            let diff = (self.start as i128 - self.end as i128) as u128;
            TokenRing::full_range_size() - BigUint::from(diff)
        }
    }

    /// A range is valid when its size lies in `(0, 2^64]`. Every
    /// `(start, end)` pair produces a size in that interval by
    /// construction, so this is always `true`; kept as an explicit,
    /// testable invariant rather than assumed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let size = self.size();
        size > BigUint::from(0u8) && size <= TokenRing::full_range_size()
    }
}

/// Arithmetic over the token ring: total ring size, range sizing, and
/// reducing an out-of-range `BigInt` endpoint back onto the ring.
pub struct TokenRing;

impl TokenRing {
    /// `2^64`, the number of distinct points on the ring.
    #[must_use]
    pub fn full_range_size() -> TokenRangeSize {
        BigUint::from(1u8) << 64
    }

    #[must_use]
    pub fn range_size(range: TokenRange) -> TokenRangeSize {
        range.size()
    }

    /// Reduces `big` back onto `[i64::MIN, i64::MAX]` by adding or
    /// subtracting one full ring rotation, for endpoints produced by
    /// [`crate::partition::RangePartitioner`] stepping past the seam.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRingError::OutOfRing`] if `big` lies more than one
    /// full rotation outside the range -- a partitioner bug, since every
    /// endpoint it computes is reachable from a valid range in at most one
    /// rotation.
    pub fn wrap_to_i64(big: &BigInt) -> Result<i64, TokenRingError> {
        let min = BigInt::from(i64::MIN);
        let max = BigInt::from(i64::MAX);

        if *big >= min && *big <= max {
            return Ok(big.to_i64().expect("bounded by i64::MIN/MAX above"));
        }

        let full = BigInt::from_biguint(Sign::Plus, Self::full_range_size());
        let candidate = if *big > max { big - &full } else { big + &full };

        if candidate >= min && candidate <= max {
            Ok(candidate.to_i64().expect("bounded by i64::MIN/MAX above"))
        } else {
            Err(TokenRingError::OutOfRing(big.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn full_ring_range_has_full_size() {
        let range = TokenRange::new(5, 5);
        assert_eq!(range.size(), TokenRing::full_range_size());
    }

    #[test]
    fn simple_forward_range() {
        let range = TokenRange::new(10, 20);
        assert_eq!(range.size(), BigUint::from(10u8));
    }

    #[test]
    fn wrap_around_range_size() {
        // Crosses the seam: from near MAX to near MIN.
        let start = i64::MAX - 4;
        let end = i64::MIN + 5;
        let range = TokenRange::new(start, end);
        let diff = BigUint::from((start as i128 - end as i128) as u128);
        assert_eq!(range.size(), TokenRing::full_range_size() - diff);
    }

    #[test]
    fn wrap_to_i64_identity_within_range() {
        let big = BigInt::from(42i64);
        assert_eq!(TokenRing::wrap_to_i64(&big).unwrap(), 42);
    }

    #[test]
    fn wrap_to_i64_reduces_one_rotation_over_max() {
        let big = BigInt::from(i64::MAX) + BigInt::from(10i64);
        let wrapped = TokenRing::wrap_to_i64(&big).unwrap();
        assert_eq!(wrapped, i64::MIN + 9);
    }

    #[test]
    fn wrap_to_i64_reduces_one_rotation_under_min() {
        let big = BigInt::from(i64::MIN) - BigInt::from(10i64);
        let wrapped = TokenRing::wrap_to_i64(&big).unwrap();
        assert_eq!(wrapped, i64::MAX - 9);
    }

    #[test]
    fn wrap_to_i64_rejects_more_than_one_rotation() {
        let full = BigInt::from_biguint(Sign::Plus, TokenRing::full_range_size());
        let big = BigInt::from(i64::MAX) + &full + BigInt::from(1i64);
        assert!(TokenRing::wrap_to_i64(&big).is_err());
    }

    proptest! {
        /// Property: every (start, end) pair produces a range whose size
        /// lies in (0, 2^64].
        #[test]
        fn prop_every_range_is_valid(start: i64, end: i64) {
            let range = TokenRange::new(start, end);
            prop_assert!(range.is_valid());
        }

        /// Property: wrap_to_i64 is the identity for any value already
        /// inside [i64::MIN, i64::MAX].
        #[test]
        fn prop_wrap_identity_in_range(v: i64) {
            let big = BigInt::from(v);
            prop_assert_eq!(TokenRing::wrap_to_i64(&big).unwrap(), v);
        }
    }
}
