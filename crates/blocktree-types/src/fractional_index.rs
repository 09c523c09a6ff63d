//! Fractional index codec: dense total order over siblings via opaque byte
//! keys, ending in a terminator byte. Ported from `original_source`'s
//! `fractional.go`, in turn credited there to
//! `drifting-in-space/fractional_index`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Marks end-of-key; participates in byte comparison like any other byte.
const TERMINATOR: u8 = 128;

/// An opaque, lexicographically-ordered byte key identifying a sibling's
/// position among its structural siblings.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FractionalIndex(Vec<u8>);

impl fmt::Debug for FractionalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FractionalIndex({:?})", self.0)
    }
}

impl PartialOrd for FractionalIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FractionalIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl FractionalIndex {
    /// The first key any sibling set would use: `[terminator]`.
    pub fn default_index() -> Self {
        Self(vec![TERMINATOR])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn from_unterminated(mut bytes: Vec<u8>) -> Self {
        bytes.push(TERMINATOR);
        Self(bytes)
    }

    /// A key strictly less than `next`.
    pub fn before(next: &FractionalIndex) -> Self {
        Self::from_unterminated(before_bytes(&next.0))
    }

    /// A key strictly greater than `prev`.
    pub fn after(prev: &FractionalIndex) -> Self {
        Self::from_unterminated(after_bytes(&prev.0))
    }

    /// A key strictly between `left` and `right`. Fails with
    /// `Error::InvalidOrder` unless `left < right`.
    pub fn between(left: &FractionalIndex, right: &FractionalIndex) -> Result<Self> {
        if left >= right {
            return Err(Error::InvalidOrder);
        }

        let shorter_len = left.0.len().min(right.0.len()) - 1;

        for i in 0..shorter_len {
            let (l, r) = (left.0[i] as u16, right.0[i] as u16);
            if l + 2 <= r {
                let mut buf = left.0[..=i].to_vec();
                buf[i] = ((l + r) / 2) as u8;
                return Ok(Self::from_unterminated(buf));
            }
            if l + 1 == r {
                let mut buf = left.0[..=i].to_vec();
                buf.extend(after_bytes(&left.0[i + 1..]));
                return Ok(Self::from_unterminated(buf));
            }
            if l > r {
                return Err(Error::InvalidOrder);
            }
        }

        match left.0.len().cmp(&right.0.len()) {
            Ordering::Less => {
                if right.0[shorter_len] < TERMINATOR {
                    return Err(Error::InvalidOrder);
                }
                let mut buf = right.0[..=shorter_len].to_vec();
                buf.extend(before_bytes(&right.0[shorter_len + 1..]));
                Ok(Self::from_unterminated(buf))
            }
            Ordering::Greater => {
                if left.0[shorter_len] >= TERMINATOR {
                    return Err(Error::InvalidOrder);
                }
                let mut buf = left.0[..=shorter_len].to_vec();
                buf.extend(after_bytes(&left.0[shorter_len + 1..]));
                Ok(Self::from_unterminated(buf))
            }
            Ordering::Equal => Err(Error::InvalidOrder),
        }
    }
}

/// Bytes strictly less than `bytes` when re-terminated; bytes greater than
/// the terminator are kept verbatim since they never affect comparison
/// outcome ahead of the first byte that does.
fn before_bytes(bytes: &[u8]) -> Vec<u8> {
    for (i, &b) in bytes.iter().enumerate() {
        if b > TERMINATOR {
            return bytes[..i].to_vec();
        }
        if b > 0 {
            let mut buf = bytes[..=i].to_vec();
            buf[i] -= 1;
            return buf;
        }
    }
    unreachable!(
        "a well-formed fractional index never runs past its terminator without a byte > 0"
    );
}

fn after_bytes(bytes: &[u8]) -> Vec<u8> {
    for (i, &b) in bytes.iter().enumerate() {
        if b < TERMINATOR {
            return bytes[..i].to_vec();
        }
        if b < 255 {
            let mut buf = bytes[..=i].to_vec();
            buf[i] += 1;
            return buf;
        }
    }
    unreachable!(
        "a well-formed fractional index never runs past its terminator without a byte < 255"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_single_terminator() {
        assert_eq!(FractionalIndex::default_index().as_bytes(), &[TERMINATOR]);
    }

    #[test]
    fn before_and_after_bracket_the_default() {
        let mid = FractionalIndex::default_index();
        let before = FractionalIndex::before(&mid);
        let after = FractionalIndex::after(&mid);
        assert!(before < mid);
        assert!(mid < after);
    }

    #[test]
    fn between_is_strictly_in_range() {
        let a = FractionalIndex::default_index();
        let b = FractionalIndex::after(&a);
        let mid = FractionalIndex::between(&a, &b).unwrap();
        assert!(a < mid);
        assert!(mid < b);
    }

    #[test]
    fn between_rejects_out_of_order() {
        let a = FractionalIndex::default_index();
        let b = FractionalIndex::after(&a);
        assert!(FractionalIndex::between(&b, &a).is_err());
        assert!(FractionalIndex::between(&a, &a).is_err());
    }

    #[test]
    fn repeated_between_stays_dense() {
        let mut left = FractionalIndex::default_index();
        let right = FractionalIndex::after(&left);
        let mut right = right;
        for _ in 0..64 {
            let mid = FractionalIndex::between(&left, &right).unwrap();
            assert!(left < mid && mid < right);
            // alternate which side we tighten so the gap keeps shrinking
            // from both directions instead of degenerating to one side.
            if mid.as_bytes().len() % 2 == 0 {
                left = mid;
            } else {
                right = mid;
            }
        }
    }

    #[test]
    fn all_constructions_end_in_terminator() {
        let a = FractionalIndex::default_index();
        let b = FractionalIndex::after(&a);
        let before_a = FractionalIndex::before(&a);
        let between = FractionalIndex::between(&a, &b).unwrap();
        for k in [&a, &b, &before_a, &between] {
            assert_eq!(*k.as_bytes().last().unwrap(), TERMINATOR);
        }
    }
}
