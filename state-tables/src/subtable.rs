//! A state table of any kind.

use crate::{
    codec::DecodeArgs,
    error::{DecodeError, EncodeError},
    validate::{Validate, ValidationCtx},
    ContextualAction, Coverage, InsertionAction, KerningAction, StateTable, TableKind,
};

/// One state table subtable, of whichever kind.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subtable {
    Contextual(StateTable<ContextualAction>),
    Insertion(StateTable<InsertionAction>),
    Kerning(StateTable<KerningAction>),
}

impl Subtable {
    pub fn kind(&self) -> TableKind {
        match self {
            Subtable::Contextual(_) => TableKind::Contextual,
            Subtable::Insertion(_) => TableKind::Insertion,
            Subtable::Kerning(_) => TableKind::Kerning,
        }
    }

    pub fn coverage(&self) -> Coverage {
        match self {
            Subtable::Contextual(table) => table.coverage,
            Subtable::Insertion(table) => table.coverage,
            Subtable::Kerning(table) => table.coverage,
        }
    }

    /// Decode a subtable of the given kind, with a default selector.
    ///
    /// The coverage's kind nibble alone cannot tell contextual and kerning
    /// subtables apart, so the caller names the kind.
    pub fn decode(
        kind: TableKind,
        data: &[u8],
        glyph_count: u16,
        coverage: Coverage,
    ) -> Result<Self, DecodeError> {
        Ok(match kind {
            TableKind::Contextual => Subtable::Contextual(StateTable::decode(
                data,
                &DecodeArgs::new(glyph_count, coverage),
            )?),
            TableKind::Insertion => Subtable::Insertion(StateTable::decode(
                data,
                &DecodeArgs::new(glyph_count, coverage),
            )?),
            TableKind::Kerning => Subtable::Kerning(StateTable::decode(
                data,
                &DecodeArgs::new(glyph_count, coverage),
            )?),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            Subtable::Contextual(table) => table.encode(),
            Subtable::Insertion(table) => table.encode(),
            Subtable::Kerning(table) => table.encode(),
        }
    }
}

impl Validate for Subtable {
    fn validate_impl(&self, ctx: &mut ValidationCtx) {
        match self {
            Subtable::Contextual(table) => table.validate_impl(ctx),
            Subtable::Insertion(table) => table.validate_impl(ctx),
            Subtable::Kerning(table) => table.validate_impl(ctx),
        }
    }
}

impl From<StateTable<ContextualAction>> for Subtable {
    fn from(src: StateTable<ContextualAction>) -> Self {
        Subtable::Contextual(src)
    }
}

impl From<StateTable<InsertionAction>> for Subtable {
    fn from(src: StateTable<InsertionAction>) -> Self {
        Subtable::Insertion(src)
    }
}

impl From<StateTable<KerningAction>> for Subtable {
    fn from(src: StateTable<KerningAction>) -> Self {
        Subtable::Kerning(src)
    }
}

#[cfg(test)]
mod tests {
    use state_table_test_data::{contextual, kerning};

    use super::*;

    #[test]
    fn decode_by_kind() {
        let coverage = Coverage::new(TableKind::Kerning);
        let subtable = Subtable::decode(TableKind::Kerning, kerning::SIMPLE, 20, coverage).unwrap();
        assert_eq!(subtable.kind(), TableKind::Kerning);
        assert!(subtable.validate().is_ok());

        // the same bytes do not make sense as a contextual subtable
        assert!(Subtable::decode(TableKind::Contextual, kerning::SIMPLE, 20, coverage).is_err());

        let coverage = Coverage::new(TableKind::Contextual);
        let subtable =
            Subtable::decode(TableKind::Contextual, contextual::SWAP, 20, coverage).unwrap();
        assert_eq!(subtable.coverage(), coverage);
        let options = crate::EncodeOptions::new().with_names(false);
        match &subtable {
            Subtable::Contextual(table) => {
                assert_eq!(table.encode_with_options(&options).unwrap(), contextual::SWAP)
            }
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn encode_dispatches() {
        let subtable = Subtable::from(StateTable::<InsertionAction>::new());
        let bytes = subtable.encode().unwrap();
        let decoded =
            Subtable::decode(TableKind::Insertion, &bytes, 1, subtable.coverage()).unwrap();
        assert_eq!(decoded, Subtable::from(StateTable::<InsertionAction>::new().normalized()));
    }
}
