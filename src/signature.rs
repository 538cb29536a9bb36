pub mod bit_view;
pub mod matrix;

use crate::error::{EcsError, Result};
use bit_view::{bytes_for, BitSummary, BitView};

/// An owned, growable set of component type bits.
///
/// Bit `t` is set when component type `t` is part of the set.
/// Cloning duplicates the buffer together with its cached summary.
#[derive(Clone)]
pub struct Signature {
    view: BitView<Vec<u8>>,
}

impl Signature {
    /// Creates an empty signature `width` bits wide.
    pub fn new(width: usize) -> Self {
        Signature {
            view: BitView::new(vec![0; bytes_for(width)], width),
        }
    }

    /// Creates a signature `width` bits wide with the given bits set.
    pub fn from_bits(width: usize, bits: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut signature = Self::new(width);
        for bit in bits {
            signature.set(bit)?;
        }
        Ok(signature)
    }

    pub fn width(&self) -> usize {
        self.view.size()
    }

    /// Grows the signature to `new_width` bits, keeping every set bit.
    pub fn resize(&mut self, new_width: usize) -> Result<()> {
        let width = self.width();
        if new_width < width {
            return Err(EcsError::SizeReduced {
                from: width,
                to: new_width,
            });
        }

        let new_len = bytes_for(new_width);
        let mut bits = self.view.rebind(Vec::new(), 0);
        if new_len > bits.len() {
            if bits.try_reserve_exact(new_len - bits.len()).is_err() {
                self.view.rebind(bits, width);
                return Err(EcsError::Allocation { bytes: new_len });
            }
            bits.resize(new_len, 0);
        }
        self.view.rebind(bits, new_width);
        Ok(())
    }

    pub fn get(&self, bit: usize) -> Result<bool> {
        self.view.get(bit)
    }

    pub fn set(&mut self, bit: usize) -> Result<()> {
        self.view.set(bit)
    }

    pub fn unset(&mut self, bit: usize) -> Result<()> {
        self.view.unset(bit)
    }

    pub fn unset_all(&mut self) {
        self.view.unset_all()
    }

    pub fn summary(&self) -> BitSummary {
        self.view.summary()
    }

    pub fn first_set_bit(&self) -> Option<usize> {
        self.view.first_set_bit()
    }

    pub fn last_set_bit(&self) -> Option<usize> {
        self.view.last_set_bit()
    }

    pub fn count_ones(&self) -> usize {
        self.view.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.count_ones() == 0
    }

    pub fn for_each_set_bit(&self, visit: impl FnMut(usize)) {
        self.view.for_each_set_bit(visit)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.width() == other.width() && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Signature {}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bits = Vec::with_capacity(self.count_ones());
        self.for_each_set_bit(|bit| bits.push(bit));
        f.debug_struct("Signature")
            .field("width", &self.width())
            .field("bits", &bits)
            .finish()
    }
}
