use crate::error::{EcsError, Result};
use std::cell::Cell;

/// Number of bytes needed to hold `bits` bits.
#[inline]
pub const fn bytes_for(bits: usize) -> usize {
    (bits + 7) / 8
}

/// First set bit, last set bit and number of set bits of a bit buffer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BitSummary {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub count: usize,
}

impl BitSummary {
    /// Byte range `[first, last]` containing every set bit.
    pub fn byte_range(&self) -> Option<(usize, usize)> {
        Some((self.first? / 8, self.last? / 8))
    }
}

/// A view of `size` bits over a byte buffer owned by someone else.
///
/// `B` is the buffer handle: a borrowed slice for short-lived views
/// or an owned `Vec<u8>` (see [`Signature`](crate::Signature)).
/// The view never allocates; whoever resizes the buffer must [`rebind`](Self::rebind) it.
///
/// The summary is computed lazily: mutating calls only mark it dirty
/// and the next read rescans the buffer once.
#[derive(Clone)]
pub struct BitView<B> {
    bits: B,
    size: usize,
    summary: Cell<Option<BitSummary>>,
}

impl<B: AsRef<[u8]>> BitView<B> {
    pub fn new(bits: B, size: usize) -> Self {
        debug_assert!(bits.as_ref().len() >= bytes_for(size));
        BitView {
            bits,
            size,
            summary: Cell::new(None),
        }
    }

    /// Points the view at a new buffer and returns the previous one.
    pub fn rebind(&mut self, bits: B, size: usize) -> B {
        debug_assert!(bits.as_ref().len() >= bytes_for(size));
        self.size = size;
        self.summary.set(None);
        std::mem::replace(&mut self.bits, bits)
    }

    /// Number of addressable bits.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits.as_ref()[..bytes_for(self.size)]
    }

    #[inline]
    fn check(&self, i: usize) -> Result<(usize, u8)> {
        if i >= self.size {
            return Err(EcsError::OutOfRange {
                index: i,
                len: self.size,
            });
        }
        Ok((i / 8, 1 << (i % 8)))
    }

    pub fn get(&self, i: usize) -> Result<bool> {
        let (byte, mask) = self.check(i)?;
        Ok(self.bits.as_ref()[byte] & mask != 0)
    }

    pub fn summary(&self) -> BitSummary {
        if let Some(summary) = self.summary.get() {
            return summary;
        }

        let mut summary = BitSummary::default();
        for (i, &byte) in self.as_bytes().iter().enumerate() {
            if byte == 0 {
                continue;
            }
            let first = i * 8 + byte.trailing_zeros() as usize;
            let last = i * 8 + 7 - byte.leading_zeros() as usize;
            summary.first.get_or_insert(first);
            summary.last = Some(last);
            summary.count += byte.count_ones() as usize;
        }

        self.summary.set(Some(summary));
        summary
    }

    pub fn first_set_bit(&self) -> Option<usize> {
        self.summary().first
    }

    pub fn last_set_bit(&self) -> Option<usize> {
        self.summary().last
    }

    pub fn count_ones(&self) -> usize {
        self.summary().count
    }

    /// Calls `visit` with the index of every set bit, lowest first.
    pub fn for_each_set_bit(&self, mut visit: impl FnMut(usize)) {
        let Some((first, last)) = self.summary().byte_range() else {
            return;
        };
        let bytes = self.as_bytes();

        for i in first..=last {
            let mut byte = bytes[i];
            while byte != 0 {
                let bit = byte.trailing_zeros() as usize;
                visit(i * 8 + bit);
                byte &= byte - 1;
            }
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BitView<B> {
    pub fn set(&mut self, i: usize) -> Result<()> {
        let (byte, mask) = self.check(i)?;
        self.bits.as_mut()[byte] |= mask;
        self.summary.set(None);
        Ok(())
    }

    pub fn unset(&mut self, i: usize) -> Result<()> {
        let (byte, mask) = self.check(i)?;
        self.bits.as_mut()[byte] &= !mask;
        self.summary.set(None);
        Ok(())
    }

    pub fn unset_all(&mut self) {
        let len = bytes_for(self.size);
        self.bits.as_mut()[..len].fill(0);
        self.summary.set(Some(BitSummary::default()));
    }
}

impl<B: AsRef<[u8]>> std::fmt::Debug for BitView<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::with_capacity(self.size);
        for i in 0..self.size {
            s.push(if self.as_bytes()[i / 8] & (1 << (i % 8)) != 0 { '1' } else { '0' });
        }
        f.debug_tuple("BitView").field(&s).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_unset() {
        let mut bytes = [0u8; 3];
        let mut view = BitView::new(&mut bytes[..], 20);

        view.set(0).unwrap();
        view.set(9).unwrap();
        view.set(19).unwrap();
        assert!(view.get(9).unwrap());
        assert!(!view.get(10).unwrap());

        view.unset(9).unwrap();
        assert!(!view.get(9).unwrap());

        assert_eq!(
            view.set(20),
            Err(EcsError::OutOfRange { index: 20, len: 20 })
        );
        assert!(view.get(21).is_err());
        assert!(view.unset(100).is_err());
    }

    #[test]
    fn summary_is_recomputed_after_mutation() {
        let mut bytes = vec![0u8; 4];
        let mut view = BitView::new(&mut bytes[..], 32);
        assert_eq!(view.summary(), BitSummary::default());

        view.set(5).unwrap();
        view.set(17).unwrap();
        view.set(30).unwrap();
        assert_eq!(view.first_set_bit(), Some(5));
        assert_eq!(view.last_set_bit(), Some(30));
        assert_eq!(view.count_ones(), 3);

        view.unset(30).unwrap();
        assert_eq!(view.last_set_bit(), Some(17));
        assert_eq!(view.count_ones(), 2);

        view.unset_all();
        assert_eq!(view.count_ones(), 0);
        assert_eq!(view.first_set_bit(), None);
        drop(view);
        assert_eq!(bytes, vec![0u8; 4]);
    }

    #[test]
    fn visits_set_bits_in_order() {
        let mut view = BitView::new(vec![0u8; 8], 60);
        for i in [59, 3, 24, 8, 0, 43] {
            view.set(i).unwrap();
        }

        let mut visited = vec![];
        view.for_each_set_bit(|i| visited.push(i));
        assert_eq!(visited, vec![0, 3, 8, 24, 43, 59]);
    }

    #[test]
    fn rebind_returns_previous_buffer() {
        let mut view = BitView::new(vec![0b0000_0100u8], 8);
        assert_eq!(view.first_set_bit(), Some(2));

        let old = view.rebind(vec![0, 0b1000_0000], 16);
        assert_eq!(old, vec![0b0000_0100]);
        assert_eq!(view.size(), 16);
        assert_eq!(view.first_set_bit(), Some(15));
    }
}
