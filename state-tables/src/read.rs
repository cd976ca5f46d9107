//! Bounds-checked reading of subtable regions.

use read_fonts::FontData;

use crate::error::DecodeError;

/// A cursor over one region of a subtable.
///
/// Positions are absolute offsets from the start of the subtable, so errors
/// report where in the subtable a read failed. Reads never cross the end of
/// the region, even when the underlying data continues.
#[derive(Clone, Copy)]
pub(crate) struct Cursor<'a> {
    data: FontData<'a>,
    pos: usize,
    end: usize,
    context: &'static str,
}

impl<'a> Cursor<'a> {
    /// A cursor over all of `data`.
    pub(crate) fn new(data: FontData<'a>, context: &'static str) -> Self {
        Cursor {
            data,
            pos: 0,
            end: data.len(),
            context,
        }
    }

    /// A cursor over `start..end`, clamped to the data.
    pub(crate) fn region(
        data: FontData<'a>,
        start: usize,
        end: usize,
        context: &'static str,
    ) -> Self {
        let end = end.min(data.len());
        Cursor {
            data,
            pos: start.min(end),
            end,
            context,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.check(1)?;
        let value = self.data.read_at::<u8>(self.pos).map_err(|_| self.short(1))?;
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.check(2)?;
        let value = self
            .data
            .read_at::<u16>(self.pos)
            .map_err(|_| self.short(2))?;
        self.pos += 2;
        Ok(value)
    }

    /// Read `len` bytes.
    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        self.check(len)?;
        (0..len).map(|_| self.read_u8()).collect()
    }

    fn check(&self, needed: usize) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            Err(self.short(needed))
        } else {
            Ok(())
        }
    }

    fn short(&self, needed: usize) -> DecodeError {
        DecodeError::InsufficientBytes {
            context: self.context,
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }
}

/// The end of the region starting at `offset`.
///
/// A region runs until the next greater offset among `offsets`, or to the
/// end of the data if there is none.
pub(crate) fn region_end(offset: usize, offsets: &[usize], len: usize) -> usize {
    offsets
        .iter()
        .copied()
        .filter(|other| *other > offset)
        .min()
        .unwrap_or(len)
        .min(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_stop_at_region_end() {
        let bytes = [0, 1, 0, 2, 0, 3];
        let data = FontData::new(&bytes);
        let mut cursor = Cursor::region(data, 2, 4, "test");
        assert_eq!(cursor.read_u16(), Ok(2));
        assert_eq!(
            cursor.read_u16(),
            Err(DecodeError::InsufficientBytes {
                context: "test",
                offset: 4,
                needed: 2,
                available: 0
            })
        );
    }

    #[test]
    fn truncated_word() {
        let bytes = [0, 1, 7];
        let mut cursor = Cursor::new(FontData::new(&bytes), "header");
        assert_eq!(cursor.read_u16(), Ok(1));
        assert_eq!(
            cursor.read_u16(),
            Err(DecodeError::InsufficientBytes {
                context: "header",
                offset: 2,
                needed: 2,
                available: 1
            })
        );
        assert_eq!(cursor.read_u8(), Ok(7));
    }

    #[test]
    fn regions_end_at_next_offset() {
        let offsets = [12, 20, 36, 48];
        assert_eq!(region_end(12, &offsets, 60), 20);
        assert_eq!(region_end(36, &offsets, 60), 48);
        assert_eq!(region_end(48, &offsets, 60), 60);
        assert_eq!(region_end(20, &[20, 100], 60), 60);
    }
}
