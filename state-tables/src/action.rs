//! The seam between the generic state machine and each table kind.

use std::{fmt::Debug, hash::Hash};

use crate::{
    codec::ActionCodec, coverage::TableKind, validate::ValidationCtx, walker::RunContext,
    StateTable,
};

/// The payload carried by the entries of one kind of state table.
///
/// The generic machinery (names, normalization, pooling, the binary layout
/// of the class table, state array and entry table, and the walker loop) is
/// shared by every kind; implementors supply the payload's canonical form,
/// its extra validation rules, its binary encoding and its effect on a glyph
/// run.
///
/// This trait is sealed: the binary hooks live in a private supertrait.
pub trait Action: Clone + Debug + Default + Eq + Hash + Send + Sync + ActionCodec {
    /// The value stored alongside tables of this kind: a sub-feature mask
    /// or a variation tuple index.
    type Selector: Clone + Debug + Default + PartialEq + Eq + Send + Sync;

    const KIND: TableKind;

    /// `true` if the payload does nothing.
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Rewrite the payload into its canonical form.
    ///
    /// This must be idempotent; tables are normalized before they are
    /// encoded, and a decoded payload is always canonical.
    fn canonicalize(&mut self) {}

    /// Check rules specific to this kind.
    ///
    /// `table` has already been normalized.
    fn validate_kind(table: &StateTable<Self>, ctx: &mut ValidationCtx) {
        let _ = (table, ctx);
    }

    /// Apply the payload to a run, returning `true` if the glyphs changed.
    ///
    /// `push` is the entry's mark flag.
    fn apply(&self, run: &mut RunContext, push: bool) -> bool;
}
