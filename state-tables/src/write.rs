//! A byte writer with deferred offsets.
//!
//! Offsets in a state table often point forward, at structures whose
//! position is not known until they are written. The writer hands out
//! [`Stake`]s: a stake names a position that will be placed later, and an
//! offset field may be written against it immediately. Every recorded offset
//! is patched in a final pass once all stakes are placed.

use crate::error::EncodeError;

/// A named position in the output, placed at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stake(usize);

/// Writes big-endian data and resolves offsets between stakes.
#[derive(Debug, Default)]
pub struct LinkedWriter {
    bytes: Vec<u8>,
    stakes: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
}

/// The position and shape of an unresolved offset.
#[derive(Debug)]
struct Fixup {
    /// the position of the offset field in the buffer
    pos: usize,
    base: Stake,
    target: Stake,
    /// added to the distance between base and target
    delta: usize,
    /// the bits of the field holding the offset; other bits are kept
    mask: u16,
    field: &'static str,
}

impl LinkedWriter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a stake that has not been placed yet.
    pub fn stake(&mut self) -> Stake {
        self.stakes.push(None);
        Stake(self.stakes.len() - 1)
    }

    /// Bind a stake to the current position.
    pub fn place(&mut self, stake: Stake) {
        let slot = &mut self.stakes[stake.0];
        assert!(slot.is_none(), "stake placed twice");
        *slot = Some(self.bytes.len());
    }

    /// Create a stake at the current position.
    pub fn stake_here(&mut self) -> Stake {
        let stake = self.stake();
        self.place(stake);
        stake
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Pad with zeros to a multiple of `align` bytes.
    pub fn align(&mut self, align: usize) {
        while self.bytes.len() % align != 0 {
            self.bytes.push(0);
        }
    }

    /// Write a 16-bit offset from `base` to `target` plus `delta`.
    pub fn write_offset(
        &mut self,
        base: Stake,
        target: Stake,
        delta: usize,
        field: &'static str,
    ) {
        self.write_masked_offset(base, target, delta, 0xFFFF, 0, field);
    }

    /// Write a word whose `mask` bits hold an offset and whose other bits are `bits`.
    pub fn write_masked_offset(
        &mut self,
        base: Stake,
        target: Stake,
        delta: usize,
        mask: u16,
        bits: u16,
        field: &'static str,
    ) {
        self.fixups.push(Fixup {
            pos: self.bytes.len(),
            base,
            target,
            delta,
            mask,
            field,
        });
        self.write_u16(bits & !mask);
    }

    /// Resolve every offset, returning the finished bytes.
    ///
    /// # Panics
    ///
    /// Panics if an offset refers to a stake that was never placed, or if
    /// a target precedes its base; both indicate a defect in the caller.
    pub fn finish(mut self) -> Result<Vec<u8>, EncodeError> {
        for fixup in &self.fixups {
            let base = self.stakes[fixup.base.0].expect("offset base never placed");
            let target = self.stakes[fixup.target.0].expect("offset target never placed");
            let value = target
                .checked_sub(base)
                .expect("offset target precedes its base")
                + fixup.delta;
            let mask = fixup.mask as usize;
            if value & !mask != 0 || value == mask && mask != 0xFFFF {
                return Err(EncodeError::OffsetOverflow {
                    field: fixup.field,
                    value,
                });
            }
            let existing = u16::from_be_bytes([self.bytes[fixup.pos], self.bytes[fixup.pos + 1]]);
            let resolved = existing | value as u16;
            self.bytes[fixup.pos..fixup.pos + 2].copy_from_slice(&resolved.to_be_bytes());
        }
        log::trace!(
            "resolved {} offsets in {} bytes",
            self.fixups.len(),
            self.bytes.len()
        );
        Ok(self.bytes)
    }
}
