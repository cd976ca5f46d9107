//! Building, compiling and running AAT state tables
//!
//! This crate models the extended state tables used by the `morx` contextual
//! and insertion subtables and by the `kerx` format 1 (state machine kerning)
//! subtable. A [`StateTable`] is a finite state machine over glyph classes,
//! with every class and state named; its [`Entry`] records carry a
//! kind-specific [`Action`].
//!
//! Tables can be:
//!
//! - validated, with every problem reported at once ([`Validate`])
//! - compiled to binary and read back ([`StateTable::encode`],
//!   [`StateTable::decode`]), with class and state names optionally kept in
//!   the binary
//! - run over a glyph sequence ([`Walker`])
//! - built from two-axis class kerning ([`ClassKerningTable`])
//!
//! # Example
//!
//! ```
//! use state_tables::{
//!     names::state, types::GlyphId16, ContextualAction, DecodeArgs, Entry, StateTable,
//! };
//!
//! let (f, i, fi) = (GlyphId16::new(10), GlyphId16::new(11), GlyphId16::new(20));
//! let mut table = StateTable::<ContextualAction>::new();
//! table.class_table.insert(f, "f");
//! table.class_table.insert(i, "i");
//! for start in state::RESERVED {
//!     table.set_entry(start, "f", Entry::new("Saw f").with_mark());
//! }
//! table.set_entry(
//!     "Saw f",
//!     "i",
//!     Entry::new(state::START_OF_TEXT)
//!         .with_action(ContextualAction::new().with_marked(f, fi)),
//! );
//! let bytes = table.encode().unwrap();
//! let args = DecodeArgs::new(30, table.coverage);
//! let decoded = StateTable::<ContextualAction>::decode(&bytes, &args).unwrap();
//! assert_eq!(decoded, table.normalized());
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![forbid(unsafe_code)]

mod action;
mod class_table;
mod codec;
pub mod contextual;
mod convert;
mod coverage;
mod entry;
pub mod error;
pub mod insertion;
pub mod kerning;
pub mod names;
mod pool;
mod read;
mod subtable;
mod table;
pub mod validate;
pub mod walker;
mod write;

pub use action::Action;
pub use class_table::{ClassTable, ClassTableFormat};
pub use codec::{DecodeArgs, EncodeOptions};
pub use contextual::ContextualAction;
pub use convert::ClassKerningTable;
pub use coverage::{Coverage, TableKind};
pub use entry::{Entry, StateRow};
pub use error::{DecodeError, EncodeError, NameError};
pub use insertion::{Insertion, InsertionAction};
pub use kerning::{KernValue, KerningAction};
pub use names::NameRegistry;
pub use subtable::Subtable;
pub use table::{StateTable, MAX_ENTRIES};
pub use validate::{Validate, ValidationReport};
pub use walker::{RunContext, RunGlyph, RunOutcome, Walker, WalkerOptions};

/// Public re-export of the font-types crate.
pub extern crate font_types as types;
