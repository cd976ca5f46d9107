//! Glyph to class assignments, and their two binary forms.
//!
//! Both forms start with a `u16` format field:
//!
//! * format 0, a contiguous array: `firstGlyph: u16`, `count: u16`, then one
//!   `u8` class index per glyph. This is only used when the assigned glyphs
//!   form a single run.
//! * format 2, a range list: `segmentCount: u16`, then one
//!   `(firstGlyph, lastGlyph, class)` triple of `u16`s per segment.
//!
//! The encoder measures both and writes the shorter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use read_fonts::{types::GlyphId16, FontData};

use crate::{
    error::{DecodeError, NameError},
    names::{class, NameRegistry},
    read::Cursor,
};

const U16_LEN: usize = std::mem::size_of::<u16>();
const CONTIGUOUS_HEADER_LEN: usize = U16_LEN * 3;
const RANGES_HEADER_LEN: usize = U16_LEN * 2;
const RANGE_RECORD_LEN: usize = U16_LEN * 3;

/// The binary form of a class table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClassTableFormat {
    /// One class index per glyph over a single run of glyphs (format 0).
    Contiguous,
    /// Runs of glyphs sharing a class (format 2).
    Ranges,
}

impl ClassTableFormat {
    pub fn format_id(self) -> u16 {
        match self {
            ClassTableFormat::Contiguous => 0,
            ClassTableFormat::Ranges => 2,
        }
    }
}

/// A mapping from glyphs to class names.
///
/// The mapping need not be total: glyphs that are absent are treated as
/// "Out of bounds" when a table is run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassTable {
    classes: BTreeMap<GlyphId16, String>,
}

/// A run of glyphs sharing a class index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ClassRange {
    first: u16,
    last: u16,
    class: u8,
}

impl ClassTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Assign a glyph to a class, returning its previous class.
    pub fn insert(&mut self, glyph: GlyphId16, class: impl Into<String>) -> Option<String> {
        self.classes.insert(glyph, class.into())
    }

    pub fn remove(&mut self, glyph: GlyphId16) -> Option<String> {
        self.classes.remove(&glyph)
    }

    pub fn get(&self, glyph: GlyphId16) -> Option<&str> {
        self.classes.get(&glyph).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over assignments in glyph order.
    pub fn iter(&self) -> impl Iterator<Item = (GlyphId16, &str)> + '_ {
        self.classes.iter().map(|(gid, name)| (*gid, name.as_str()))
    }

    /// The glyphs assigned to a class, in order.
    pub fn glyphs_in<'a>(&'a self, class: &'a str) -> impl Iterator<Item = GlyphId16> + 'a {
        self.iter()
            .filter(move |(_, name)| *name == class)
            .map(|(gid, _)| gid)
    }

    /// The distinct class names used by the table.
    pub fn class_names(&self) -> BTreeSet<&str> {
        self.classes.values().map(String::as_str).collect()
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&GlyphId16, &mut String) -> bool) {
        self.classes.retain(f)
    }

    pub(crate) fn rename(&mut self, renames: &HashMap<String, String>) {
        for name in self.classes.values_mut() {
            if let Some(new) = renames.get(name) {
                *name = new.clone();
            }
        }
    }

    /// Resolve class names to indices.
    fn indices(&self, names: &NameRegistry) -> Result<BTreeMap<GlyphId16, u8>, NameError> {
        self.classes
            .iter()
            .map(|(gid, name)| {
                names
                    .class_index(name)
                    .map(|idx| (*gid, idx))
                    .ok_or_else(|| NameError::UnknownName(name.clone()))
            })
            .collect()
    }

    /// The format the encoder will choose for this table.
    pub fn best_format(&self, names: &NameRegistry) -> Result<ClassTableFormat, NameError> {
        Ok(choose_format(&self.indices(names)?, None))
    }

    /// Encode the table, using `preferred` if it can represent the data.
    pub fn encode(
        &self,
        names: &NameRegistry,
        preferred: Option<ClassTableFormat>,
    ) -> Result<Vec<u8>, NameError> {
        let indices = self.indices(names)?;
        let format = choose_format(&indices, preferred);
        log::debug!(
            "class table for {} glyphs uses {format:?} format",
            indices.len()
        );
        let mut out = Vec::new();
        out.extend_from_slice(&format.format_id().to_be_bytes());
        match format {
            ClassTableFormat::Contiguous => {
                let first = indices.keys().next().map(|g| g.to_u16()).unwrap_or(0);
                out.extend_from_slice(&first.to_be_bytes());
                out.extend_from_slice(&(indices.len() as u16).to_be_bytes());
                out.extend(indices.values());
            }
            ClassTableFormat::Ranges => {
                let ranges = iter_class_ranges(&indices).collect::<Vec<_>>();
                out.extend_from_slice(&(ranges.len() as u16).to_be_bytes());
                for range in ranges {
                    out.extend_from_slice(&range.first.to_be_bytes());
                    out.extend_from_slice(&range.last.to_be_bytes());
                    out.extend_from_slice(&(range.class as u16).to_be_bytes());
                }
            }
        }
        Ok(out)
    }

    /// Decode a class table, naming classes from `class_names`.
    pub fn decode(
        data: &[u8],
        class_names: &[String],
        glyph_count: u16,
    ) -> Result<ClassTable, DecodeError> {
        let mut cursor = Cursor::new(FontData::new(data), "class table");
        let indices = decode_indices(&mut cursor, class_names.len(), glyph_count)?;
        Ok(ClassTable::from_indices(&indices, class_names))
    }

    pub(crate) fn from_indices(indices: &BTreeMap<GlyphId16, u8>, class_names: &[String]) -> Self {
        ClassTable {
            classes: indices
                .iter()
                .filter_map(|(gid, idx)| Some((*gid, class_names.get(*idx as usize)?.clone())))
                .collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<(GlyphId16, S)> for ClassTable {
    fn from_iter<T: IntoIterator<Item = (GlyphId16, S)>>(iter: T) -> Self {
        ClassTable {
            classes: iter
                .into_iter()
                .map(|(gid, name)| (gid, name.into()))
                .collect(),
        }
    }
}

/// The encoded size of the contiguous form, if the glyphs form one run.
fn contiguous_len(indices: &BTreeMap<GlyphId16, u8>) -> Option<usize> {
    let first = indices.keys().next()?.to_u16() as usize;
    let last = indices.keys().next_back()?.to_u16() as usize;
    if last - first + 1 != indices.len() {
        return None;
    }
    let len = CONTIGUOUS_HEADER_LEN + indices.len();
    // the following structure starts on a word boundary
    Some(len + len % 2)
}

fn ranges_len(indices: &BTreeMap<GlyphId16, u8>) -> usize {
    RANGES_HEADER_LEN + iter_class_ranges(indices).count() * RANGE_RECORD_LEN
}

fn choose_format(
    indices: &BTreeMap<GlyphId16, u8>,
    preferred: Option<ClassTableFormat>,
) -> ClassTableFormat {
    let contiguous = contiguous_len(indices);
    match preferred {
        Some(ClassTableFormat::Ranges) => return ClassTableFormat::Ranges,
        Some(ClassTableFormat::Contiguous) if contiguous.is_some() => {
            return ClassTableFormat::Contiguous
        }
        Some(ClassTableFormat::Contiguous) => {
            log::warn!("class table glyphs are not contiguous, ignoring preferred format")
        }
        None => (),
    }
    // the range list is the most efficient way to represent an empty table
    match contiguous {
        Some(len) if len < ranges_len(indices) => ClassTableFormat::Contiguous,
        _ => ClassTableFormat::Ranges,
    }
}

fn iter_class_ranges(
    values: &BTreeMap<GlyphId16, u8>,
) -> impl Iterator<Item = ClassRange> + '_ {
    let mut iter = values.iter();
    let mut prev: Option<ClassRange> = None;

    #[allow(clippy::while_let_on_iterator)]
    std::iter::from_fn(move || {
        while let Some((gid, class)) = iter.next() {
            let gid = gid.to_u16();
            match prev.take() {
                None => prev = Some(ClassRange::single(gid, *class)),
                Some(range) if range.last.checked_add(1) == Some(gid) && range.class == *class => {
                    prev = Some(ClassRange { last: gid, ..range })
                }
                Some(range) => {
                    prev = Some(ClassRange::single(gid, *class));
                    return Some(range);
                }
            }
        }
        prev.take()
    })
}

impl ClassRange {
    fn single(glyph: u16, class: u8) -> Self {
        ClassRange {
            first: glyph,
            last: glyph,
            class,
        }
    }
}

/// Read a class table, returning each glyph's class index.
///
/// Glyphs whose class is "Out of bounds" are left out, since absence already
/// means that.
pub(crate) fn decode_indices(
    cursor: &mut Cursor,
    num_classes: usize,
    glyph_count: u16,
) -> Result<BTreeMap<GlyphId16, u8>, DecodeError> {
    let check_glyph = |glyph: u32| {
        if glyph >= glyph_count as u32 {
            Err(DecodeError::GlyphOutOfRange {
                glyph: glyph.min(u16::MAX as u32) as u16,
                glyph_count,
            })
        } else {
            Ok(())
        }
    };
    let check_class = |glyph: u16, class: u16| {
        if class as usize >= num_classes {
            Err(DecodeError::ClassIndexOutOfRange {
                glyph,
                class,
                num_classes,
            })
        } else {
            Ok(class as u8)
        }
    };

    let mut indices = BTreeMap::new();
    match cursor.read_u16()? {
        0 => {
            let first = cursor.read_u16()?;
            let count = cursor.read_u16()?;
            if count > 0 {
                check_glyph(first as u32 + count as u32 - 1)?;
            }
            for i in 0..count {
                let glyph = first + i;
                let class = check_class(glyph, cursor.read_u8()? as u16)?;
                if class != class::OUT_OF_BOUNDS_INDEX {
                    indices.insert(GlyphId16::new(glyph), class);
                }
            }
        }
        2 => {
            let count = cursor.read_u16()?;
            for _ in 0..count {
                let first = cursor.read_u16()?;
                let last = cursor.read_u16()?;
                let class = cursor.read_u16()?;
                if last < first {
                    return Err(DecodeError::InvalidSegment { first, last });
                }
                check_glyph(last as u32)?;
                let class = check_class(first, class)?;
                if class == class::OUT_OF_BOUNDS_INDEX {
                    continue;
                }
                for glyph in first..=last {
                    indices.insert(GlyphId16::new(glyph), class);
                }
            }
        }
        other => return Err(DecodeError::InvalidClassTableFormat(other)),
    }
    Ok(indices)
}
