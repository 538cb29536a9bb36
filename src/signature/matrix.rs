use crate::error::{EcsError, Result};
use crate::signature::bit_view::{bytes_for, BitView};
use crate::Signature;
use std::ops::Range;

/// Signatures of all live entities, one row each.
///
/// Rows are stored back to back in a single buffer, each padded to a whole number
/// of bytes. All rows share the same width, which can only grow.
pub struct SignatureMatrix {
    data: Vec<u8>,
    rows: usize,
    width: usize,
    row_bytes: usize,
    reserve_step: usize,
}

impl SignatureMatrix {
    /// Creates an empty matrix whose buffer grows in steps of `reserve_step` bytes.
    pub fn new(reserve_step: usize) -> Self {
        SignatureMatrix {
            data: Vec::new(),
            rows: 0,
            width: 0,
            row_bytes: 0,
            reserve_step: reserve_step.max(1),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of bits in every row.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Size of the allocated buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn row_range(&self, row: usize) -> Result<Range<usize>> {
        if row >= self.rows {
            return Err(EcsError::OutOfRange {
                index: row,
                len: self.rows,
            });
        }
        let start = row * self.row_bytes;
        Ok(start..start + self.row_bytes)
    }

    /// Makes sure the buffer holds at least `bytes` bytes, growing it in whole steps.
    fn reserve_bytes(&mut self, bytes: usize) -> Result<()> {
        let capacity = self.data.capacity();
        if bytes <= capacity {
            return Ok(());
        }

        let steps = (bytes - capacity + self.reserve_step - 1) / self.reserve_step;
        let new_capacity = capacity + steps * self.reserve_step;
        self.data
            .try_reserve_exact(new_capacity - self.data.len())
            .map_err(|_| EcsError::Allocation {
                bytes: new_capacity,
            })
    }

    /// Reserves memory for a total of `rows` rows.
    pub fn reserve_rows(&mut self, rows: usize) -> Result<()> {
        self.reserve_bytes(rows * self.row_bytes)
    }

    /// Appends a zeroed row and returns its index.
    pub fn add(&mut self) -> Result<usize> {
        self.reserve_rows(self.rows + 1)?;
        self.data.resize(self.data.len() + self.row_bytes, 0);
        self.rows += 1;
        Ok(self.rows - 1)
    }

    /// Removes `row` by moving the last row into its place.
    ///
    /// Returns the former index of the moved row, or `None` if `row` was the last one.
    pub fn remove(&mut self, row: usize) -> Result<Option<usize>> {
        let range = self.row_range(row)?;
        let last = self.rows - 1;

        if row != last {
            self.data.copy_within(last * self.row_bytes.., range.start);
        }
        self.data.truncate(last * self.row_bytes);
        self.rows = last;

        Ok((row != last).then_some(last))
    }

    /// Grows every row to `new_width` bits, preserving every set bit.
    pub fn set_width(&mut self, new_width: usize) -> Result<()> {
        if new_width < self.width {
            return Err(EcsError::SizeReduced {
                from: self.width,
                to: new_width,
            });
        }

        let old_row_bytes = self.row_bytes;
        let new_row_bytes = bytes_for(new_width);

        if new_row_bytes > old_row_bytes {
            let new_len = self.rows * new_row_bytes;
            self.reserve_bytes(new_len + self.reserve_step)?;
            self.data.resize(new_len, 0);

            // Back to front: row `r` lands at or after its old position,
            // so moving it can only overwrite rows that have already been moved.
            for r in (0..self.rows).rev() {
                let src = r * old_row_bytes;
                let dst = r * new_row_bytes;
                self.data.copy_within(src..src + old_row_bytes, dst);
                self.data[dst + old_row_bytes..dst + new_row_bytes].fill(0);
            }

            tracing::trace!(
                rows = self.rows,
                from = old_row_bytes,
                to = new_row_bytes,
                "signature rows re-laid out"
            );
            self.row_bytes = new_row_bytes;
        }

        self.width = new_width;
        Ok(())
    }

    /// Returns a view of the bits of `row`.
    pub fn row(&self, row: usize) -> Result<BitView<&[u8]>> {
        let range = self.row_range(row)?;
        Ok(BitView::new(&self.data[range], self.width))
    }

    fn row_mut(&mut self, row: usize) -> Result<BitView<&mut [u8]>> {
        let range = self.row_range(row)?;
        Ok(BitView::new(&mut self.data[range], self.width))
    }

    pub fn set_bit(&mut self, row: usize, bit: usize) -> Result<()> {
        self.row_mut(row)?.set(bit)
    }

    pub fn unset_bit(&mut self, row: usize, bit: usize) -> Result<()> {
        self.row_mut(row)?.unset(bit)
    }

    pub fn get_bit(&self, row: usize, bit: usize) -> Result<bool> {
        self.row(row)?.get(bit)
    }

    /// Calls `visit` with the index of every row containing all bits of `query`, in row order.
    pub fn for_matching_rows(&self, query: &Signature, mut visit: impl FnMut(usize)) {
        let Some((first, last)) = query.summary().byte_range() else {
            // Every row is a superset of the empty set.
            (0..self.rows).for_each(visit);
            return;
        };

        if last >= self.row_bytes {
            return;
        }

        let wanted = &query.as_bytes()[first..=last];
        for (row, bytes) in self.data.chunks_exact(self.row_bytes).enumerate() {
            let matches = bytes[first..=last]
                .iter()
                .zip(wanted)
                .all(|(have, want)| have & want == *want);

            if matches {
                visit(row);
            }
        }
    }

    /// Removes all rows and releases the buffer. The width is kept.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.rows = 0;
    }
}
