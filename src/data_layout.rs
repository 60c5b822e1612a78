//! Target data layout: sizes and alignments of base types.
//!
//! A layout is an ordered list of [`DataTypeSpecification`]s. Queries map a
//! type to its category and width and take the first entry that matches.
//! A query with no matching entry is an error; the layout is expected to
//! describe every type the module actually uses.

use log::debug;
use thiserror::Error;

use crate::ir::types::{ScalarKind, Type, TypeId, TypeTable};

/// Aggregates nested deeper than this are rejected instead of recursed into.
const MAX_TYPE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("malformed data layout token `{0}`")]
    Malformed(String),
    #[error("data layout has no {category:?} entry for width {width:?}")]
    NoSpecification {
        category: LayoutCategory,
        width: Option<u32>,
    },
    #[error("type has no size")]
    Unsized,
    #[error("type nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("type size does not fit in 64 bits")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutCategory {
    Integer,
    Float,
    Pointer,
    Vector,
    Aggregate,
}

/// One `category:size:abi:pref` entry. All values are in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTypeSpecification {
    pub category: LayoutCategory,
    pub size: u32,
    pub abi_alignment: u32,
    pub preferred_alignment: u32,
    /// Only meaningful for pointers.
    pub address_space: u32,
}

impl DataTypeSpecification {
    /// An entry whose preferred alignment equals its ABI alignment.
    #[must_use]
    pub fn new(category: LayoutCategory, size: u32, abi_alignment: u32) -> Self {
        Self {
            category,
            size,
            abi_alignment,
            preferred_alignment: abi_alignment,
            address_space: 0,
        }
    }

    #[must_use]
    pub fn with_preferred_alignment(mut self, alignment: u32) -> Self {
        self.preferred_alignment = alignment;
        self
    }

    #[must_use]
    pub fn with_address_space(mut self, address_space: u32) -> Self {
        self.address_space = address_space;
        self
    }

    /// Whether a later token should replace this entry.
    fn same_slot(&self, other: &Self) -> bool {
        self.category == other.category
            && match self.category {
                LayoutCategory::Pointer => self.address_space == other.address_space,
                LayoutCategory::Aggregate => true,
                _ => self.size == other.size,
            }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    specifications: Vec<DataTypeSpecification>,
    big_endian: bool,
    stack_alignment: Option<u32>,
    native_integer_widths: Vec<u32>,
}

impl DataLayout {
    /// A layout made of exactly these entries, in this order.
    #[must_use]
    pub fn new(specifications: Vec<DataTypeSpecification>) -> Self {
        Self {
            specifications,
            big_endian: false,
            stack_alignment: None,
            native_integer_widths: Vec::new(),
        }
    }

    /// Parses an LLVM data layout string such as
    /// `e-m:e-p:64:64-i64:64-f80:128-n8:16:32:64-S128`.
    ///
    /// Starts from LLVM's default entries and lets each token override the
    /// entry with the same category and width (or address space).
    pub fn parse(layout: &str) -> Result<Self, LayoutError> {
        let mut this = Self::new(default_specifications());
        for token in layout.split('-').filter(|t| !t.is_empty()) {
            this.apply_token(token)?;
        }
        Ok(this)
    }

    fn apply_token(&mut self, token: &str) -> Result<(), LayoutError> {
        let malformed = || LayoutError::Malformed(token.to_owned());
        let Some(head) = token.get(..1) else {
            return Err(malformed());
        };
        let tail = &token[1..];
        match head {
            "e" if tail.is_empty() => self.big_endian = false,
            "E" if tail.is_empty() => self.big_endian = true,
            "S" => self.stack_alignment = Some(tail.parse().map_err(|_| malformed())?),
            "n" if tail.starts_with('i') => debug!("ignoring non-integral pointer spaces `{token}`"),
            "n" => {
                self.native_integer_widths = tail
                    .split(':')
                    .map(|w| w.parse().map_err(|_| malformed()))
                    .collect::<Result<_, _>>()?;
            }
            "i" | "f" | "v" | "a" | "p" => {
                let mut parts = tail.split(':');
                let first = parts.next().unwrap_or_default();
                let numbers = parts
                    .map(|n| n.parse::<u32>().map_err(|_| malformed()))
                    .collect::<Result<Vec<_>, _>>()?;
                let parse_first = || -> Result<u32, LayoutError> {
                    if first.is_empty() {
                        Ok(0)
                    } else {
                        first.parse().map_err(|_| malformed())
                    }
                };
                let spec = match head {
                    // p[n]:size:abi[:pref[:idx]]
                    "p" => {
                        let [size, abi, rest @ ..] = numbers.as_slice() else {
                            return Err(malformed());
                        };
                        DataTypeSpecification::new(LayoutCategory::Pointer, *size, *abi)
                            .with_preferred_alignment(rest.first().copied().unwrap_or(*abi))
                            .with_address_space(parse_first()?)
                    }
                    // a[0]:abi[:pref]
                    "a" => {
                        let [abi, rest @ ..] = numbers.as_slice() else {
                            return Err(malformed());
                        };
                        DataTypeSpecification::new(LayoutCategory::Aggregate, 0, *abi)
                            .with_preferred_alignment(rest.first().copied().unwrap_or(*abi))
                    }
                    _ => {
                        let category = match head {
                            "i" => LayoutCategory::Integer,
                            "f" => LayoutCategory::Float,
                            _ => LayoutCategory::Vector,
                        };
                        let [abi, rest @ ..] = numbers.as_slice() else {
                            return Err(malformed());
                        };
                        let size = parse_first()?;
                        if size == 0 {
                            return Err(malformed());
                        }
                        DataTypeSpecification::new(category, size, *abi)
                            .with_preferred_alignment(rest.first().copied().unwrap_or(*abi))
                    }
                };
                self.insert(spec);
            }
            "m" | "A" | "P" | "G" | "F" => debug!("ignoring data layout token `{token}`"),
            _ => return Err(malformed()),
        }
        Ok(())
    }

    fn insert(&mut self, spec: DataTypeSpecification) {
        match self.specifications.iter_mut().find(|s| s.same_slot(&spec)) {
            Some(existing) => *existing = spec,
            None => self.specifications.push(spec),
        }
    }

    pub fn specifications(&self) -> &[DataTypeSpecification] {
        &self.specifications
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    pub fn stack_alignment(&self) -> Option<u32> {
        self.stack_alignment
    }

    pub fn native_integer_widths(&self) -> &[u32] {
        &self.native_integer_widths
    }

    /// First entry of `category`, matching `width` when given.
    fn find(
        &self,
        category: LayoutCategory,
        width: Option<u32>,
    ) -> Result<&DataTypeSpecification, LayoutError> {
        self.specifications
            .iter()
            .find(|s| s.category == category && width.is_none_or(|w| s.size == w))
            .ok_or(LayoutError::NoSpecification { category, width })
    }

    fn find_pointer(&self, address_space: u32) -> Result<&DataTypeSpecification, LayoutError> {
        let pointers = || {
            self.specifications
                .iter()
                .filter(|s| s.category == LayoutCategory::Pointer)
        };
        pointers()
            .find(|s| s.address_space == address_space)
            .or_else(|| pointers().find(|s| s.address_space == 0))
            .ok_or(LayoutError::NoSpecification {
                category: LayoutCategory::Pointer,
                width: None,
            })
    }

    fn scalar_entry(&self, kind: &ScalarKind) -> Result<&DataTypeSpecification, LayoutError> {
        match *kind {
            ScalarKind::Integer(width) => self.find(LayoutCategory::Integer, Some(width)),
            ScalarKind::Pointer { address_space } => self.find_pointer(address_space),
            ScalarKind::X86Mmx => self.find(LayoutCategory::Vector, Some(64)),
            _ => match kind.float_width() {
                Some(width) => self.find(LayoutCategory::Float, Some(width)),
                None => Err(LayoutError::Unsized),
            },
        }
    }

    pub fn bit_size(&self, kind: &ScalarKind) -> Result<u32, LayoutError> {
        Ok(self.scalar_entry(kind)?.size)
    }

    /// ABI alignment in bits.
    pub fn bit_alignment(&self, kind: &ScalarKind) -> Result<u32, LayoutError> {
        Ok(self.scalar_entry(kind)?.abi_alignment)
    }

    pub fn byte_size(&self, kind: &ScalarKind) -> Result<u32, LayoutError> {
        Ok(self.bit_size(kind)? / 8)
    }

    /// Size in bits of any sized type, with struct fields padded to their
    /// alignment unless the struct is packed.
    pub fn type_bit_size(&self, types: &TypeTable, ty: TypeId) -> Result<u64, LayoutError> {
        self.size_at(types, ty, 0)
    }

    pub fn type_bit_alignment(&self, types: &TypeTable, ty: TypeId) -> Result<u32, LayoutError> {
        self.alignment_at(types, ty, 0)
    }

    fn size_at(&self, types: &TypeTable, ty: TypeId, depth: usize) -> Result<u64, LayoutError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(LayoutError::TooDeep(MAX_TYPE_DEPTH));
        }
        match types.get(ty).ok_or(LayoutError::Unsized)? {
            Type::Scalar(kind) => self.bit_size(kind).map(u64::from),
            Type::Array { element, len } => {
                let stride = self.stride(types, *element, depth + 1)?;
                stride.checked_mul(*len).ok_or(LayoutError::Overflow)
            }
            Type::Vector { element, len, .. } => self
                .size_at(types, *element, depth + 1)?
                .checked_mul(*len)
                .ok_or(LayoutError::Overflow),
            Type::Struct(s) if s.opaque => Err(LayoutError::Unsized),
            Type::Struct(s) => {
                let mut offset = 0u64;
                for &field in &s.fields {
                    if !s.packed {
                        offset = align_to(offset, self.alignment_at(types, field, depth + 1)?)?;
                    }
                    offset = offset
                        .checked_add(self.size_at(types, field, depth + 1)?)
                        .ok_or(LayoutError::Overflow)?;
                }
                if !s.packed {
                    offset = align_to(offset, self.alignment_at(types, ty, depth)?)?;
                }
                Ok(offset)
            }
            Type::Function(_) | Type::Unknown(_) => Err(LayoutError::Unsized),
        }
    }

    /// Size rounded up to alignment: the distance between array elements.
    fn stride(&self, types: &TypeTable, ty: TypeId, depth: usize) -> Result<u64, LayoutError> {
        let size = self.size_at(types, ty, depth)?;
        align_to(size, self.alignment_at(types, ty, depth)?)
    }

    fn alignment_at(&self, types: &TypeTable, ty: TypeId, depth: usize) -> Result<u32, LayoutError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(LayoutError::TooDeep(MAX_TYPE_DEPTH));
        }
        match types.get(ty).ok_or(LayoutError::Unsized)? {
            Type::Scalar(kind) => self.bit_alignment(kind),
            Type::Array { element, .. } => self.alignment_at(types, *element, depth + 1),
            Type::Vector { .. } => {
                let size = self.size_at(types, ty, depth)?;
                let width = u32::try_from(size).map_err(|_| LayoutError::Unsized)?;
                match self.find(LayoutCategory::Vector, Some(width)) {
                    Ok(spec) => Ok(spec.abi_alignment),
                    // Vectors without an entry are aligned to their size.
                    Err(_) => Ok(width.max(8).next_power_of_two()),
                }
            }
            Type::Struct(s) if s.packed => Ok(8),
            Type::Struct(s) => {
                let mut alignment = self
                    .find(LayoutCategory::Aggregate, None)
                    .map_or(8, |spec| spec.abi_alignment.max(8));
                for &field in &s.fields {
                    alignment = alignment.max(self.alignment_at(types, field, depth + 1)?);
                }
                Ok(alignment)
            }
            Type::Function(_) | Type::Unknown(_) => Err(LayoutError::Unsized),
        }
    }
}

fn align_to(value: u64, alignment: u32) -> Result<u64, LayoutError> {
    match u64::from(alignment) {
        0 => Ok(value),
        a => value.div_ceil(a).checked_mul(a).ok_or(LayoutError::Overflow),
    }
}

fn default_specifications() -> Vec<DataTypeSpecification> {
    use LayoutCategory::*;

    vec![
        DataTypeSpecification::new(Integer, 1, 8),
        DataTypeSpecification::new(Integer, 8, 8),
        DataTypeSpecification::new(Integer, 16, 16),
        DataTypeSpecification::new(Integer, 32, 32),
        DataTypeSpecification::new(Integer, 64, 32).with_preferred_alignment(64),
        DataTypeSpecification::new(Float, 16, 16),
        DataTypeSpecification::new(Float, 32, 32),
        DataTypeSpecification::new(Float, 64, 64),
        DataTypeSpecification::new(Float, 128, 128),
        DataTypeSpecification::new(Vector, 64, 64),
        DataTypeSpecification::new(Vector, 128, 128),
        DataTypeSpecification::new(Aggregate, 0, 0).with_preferred_alignment(64),
        DataTypeSpecification::new(Pointer, 64, 64),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ir::types::StructType;

    #[test]
    fn lookup_needs_an_exact_integer_width() {
        let layout = DataLayout::new(vec![DataTypeSpecification::new(
            LayoutCategory::Integer,
            32,
            32,
        )]);
        assert_eq!(layout.bit_alignment(&ScalarKind::Integer(32)), Ok(32));
        assert_eq!(layout.bit_size(&ScalarKind::Integer(32)), Ok(32));
        assert_eq!(layout.byte_size(&ScalarKind::Integer(32)), Ok(4));
        assert_eq!(
            layout.bit_alignment(&ScalarKind::Integer(64)),
            Err(LayoutError::NoSpecification {
                category: LayoutCategory::Integer,
                width: Some(64),
            })
        );
    }

    #[test]
    fn first_matching_entry_wins() {
        let layout = DataLayout::new(vec![
            DataTypeSpecification::new(LayoutCategory::Float, 64, 32),
            DataTypeSpecification::new(LayoutCategory::Float, 64, 64),
        ]);
        assert_eq!(layout.bit_alignment(&ScalarKind::Double), Ok(32));
    }

    #[test]
    fn parse_overrides_defaults() {
        let layout = DataLayout::parse("E-m:e-p:32:32-i64:64-f80:128-n8:16:32-S128").unwrap();
        assert!(layout.is_big_endian());
        assert_eq!(layout.stack_alignment(), Some(128));
        assert_eq!(layout.native_integer_widths(), &[8, 16, 32]);
        assert_eq!(layout.bit_alignment(&ScalarKind::Integer(64)), Ok(64));
        assert_eq!(layout.bit_size(&ScalarKind::X86Fp80), Ok(80));
        assert_eq!(layout.bit_alignment(&ScalarKind::X86Fp80), Ok(128));
        let pointer = ScalarKind::Pointer { address_space: 0 };
        assert_eq!(layout.bit_size(&pointer), Ok(32));
        assert_eq!(layout.byte_size(&pointer), Ok(4));
    }

    #[test]
    fn pointers_fall_back_to_address_space_zero() {
        let layout = DataLayout::parse("p:64:64-p270:32:32").unwrap();
        assert_eq!(layout.bit_size(&ScalarKind::Pointer { address_space: 270 }), Ok(32));
        assert_eq!(layout.bit_size(&ScalarKind::Pointer { address_space: 5 }), Ok(64));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            DataLayout::parse("e-ix:32"),
            Err(LayoutError::Malformed("ix:32".into()))
        );
        assert_eq!(DataLayout::parse("e-q8"), Err(LayoutError::Malformed("q8".into())));
        assert!(DataLayout::parse("").is_ok());
    }

    #[test]
    fn label_has_no_size() {
        let layout = DataLayout::parse("").unwrap();
        assert_eq!(layout.bit_size(&ScalarKind::Label), Err(LayoutError::Unsized));
    }

    #[test]
    fn struct_fields_are_padded() {
        let mut types = TypeTable::new();
        let i8 = types.push(Type::Scalar(ScalarKind::Integer(8)));
        let i32 = types.push(Type::Scalar(ScalarKind::Integer(32)));
        let fields = vec![i8, i32, i8];
        let padded = types.push(Type::Struct(StructType {
            name: None,
            packed: false,
            fields: fields.clone(),
            opaque: false,
        }));
        let packed = types.push(Type::Struct(StructType {
            name: None,
            packed: true,
            fields,
            opaque: false,
        }));
        let array = types.push(Type::Array {
            element: padded,
            len: 3,
        });

        let layout = DataLayout::parse("e-i64:64").unwrap();
        assert_eq!(layout.type_bit_size(&types, padded), Ok(96));
        assert_eq!(layout.type_bit_alignment(&types, padded), Ok(32));
        assert_eq!(layout.type_bit_size(&types, packed), Ok(48));
        assert_eq!(layout.type_bit_size(&types, array), Ok(288));
    }

    #[test]
    fn oversized_aggregates_report_overflow() {
        let mut types = TypeTable::new();
        let i8 = types.push(Type::Scalar(ScalarKind::Integer(8)));
        let i64 = types.push(Type::Scalar(ScalarKind::Integer(64)));
        let huge = types.push(Type::Array {
            element: i64,
            len: u64::MAX / 2,
        });
        // Fits on its own, but not after the leading field.
        let almost = types.push(Type::Array {
            element: i64,
            len: u64::MAX / 64,
        });
        let mut strukt = |fields| {
            types.push(Type::Struct(StructType {
                name: None,
                packed: false,
                fields,
                opaque: false,
            }))
        };
        let with_huge = strukt(vec![i8, huge]);
        let with_almost = strukt(vec![i8, almost]);

        let layout = DataLayout::parse("").unwrap();
        assert_eq!(layout.type_bit_size(&types, huge), Err(LayoutError::Overflow));
        assert_eq!(layout.type_bit_size(&types, with_huge), Err(LayoutError::Overflow));
        assert!(layout.type_bit_size(&types, almost).is_ok());
        assert_eq!(layout.type_bit_size(&types, with_almost), Err(LayoutError::Overflow));
    }
}
