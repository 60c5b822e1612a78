use bitflags::bitflags;
use log::{debug, warn};

use super::symbol::{Symbol, SymbolId, SymbolKind};
use super::symbol_table::SymbolTable;
use super::types::{ScalarKind, Type, TypeId, TypeTable};
use super::{Error, Result};
use crate::bitcode::{Fields, Record, decode_signed};
use crate::schema::blocks::ConstantsCode;
use crate::schema::enums::{BinOpcode, CastOpcode};

bitflags! {
    /// Optional flag operand of a `CE_BINOP` record. Which bits mean what
    /// depends on the opcode: bit 0 is no-unsigned-wrap for add, sub, mul
    /// and shl, and exact for divisions and right shifts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OperatorFlags: u8 {
        const NO_UNSIGNED_WRAP = 1;
        const NO_SIGNED_WRAP = 1 << 1;
        const EXACT = 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Undef,
    Poison,
    Integer(i64),
    /// Words of an integer wider than 64 bits, least significant first.
    WideInteger(Vec<u64>),
    /// Bit pattern of a floating point value of at most 64 bits.
    Float(u64),
    /// Bit pattern of an `x86_fp80`, `fp128` or `ppc_fp128` value.
    WideFloat(Vec<u64>),
    Aggregate(AggregateConstant),
    BinaryOperation(BinaryOperationConstant),
    Cast {
        opcode: CastOpcode,
        operand: SymbolId,
    },
    Compare {
        predicate: u64,
        lhs: SymbolId,
        rhs: SymbolId,
    },
    Select {
        condition: SymbolId,
        if_true: SymbolId,
        if_false: SymbolId,
    },
    GetElementPtr(GetElementPtrConstant),
    BlockAddress {
        function: SymbolId,
        block: u64,
    },
    /// A constant record that is numbered but not decoded.
    Opaque {
        code: u64,
    },
}

impl Constant {
    pub(crate) fn operands(&self) -> Vec<SymbolId> {
        match self {
            Self::Null
            | Self::Undef
            | Self::Poison
            | Self::Integer(_)
            | Self::WideInteger(_)
            | Self::Float(_)
            | Self::WideFloat(_)
            | Self::Opaque { .. } => Vec::new(),
            Self::Aggregate(aggregate) => aggregate.elements.to_vec(),
            Self::BinaryOperation(op) => vec![op.lhs, op.rhs],
            Self::Cast { operand, .. } => vec![*operand],
            Self::Compare { lhs, rhs, .. } => vec![*lhs, *rhs],
            Self::Select {
                condition,
                if_true,
                if_false,
            } => vec![*condition, *if_true, *if_false],
            Self::GetElementPtr(gep) => gep.operands.clone(),
            Self::BlockAddress { function, .. } => vec![*function],
        }
    }

    pub(crate) fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut SymbolId)) {
        match self {
            Self::Null
            | Self::Undef
            | Self::Poison
            | Self::Integer(_)
            | Self::WideInteger(_)
            | Self::Float(_)
            | Self::WideFloat(_)
            | Self::Opaque { .. } => {}
            Self::Aggregate(aggregate) => aggregate.elements.iter_mut().for_each(f),
            Self::BinaryOperation(op) => {
                f(&mut op.lhs);
                f(&mut op.rhs);
            }
            Self::Cast { operand, .. } => f(operand),
            Self::Compare { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Self::Select {
                condition,
                if_true,
                if_false,
            } => {
                f(condition);
                f(if_true);
                f(if_false);
            }
            Self::GetElementPtr(gep) => gep.operands.iter_mut().for_each(f),
            Self::BlockAddress { function, .. } => f(function),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateShape {
    Array,
    Vector,
    Struct,
}

/// An array, vector or struct constant. The number of elements is fixed when
/// the constant is built; only the element handles may change afterwards,
/// when placeholders get replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateConstant {
    shape: AggregateShape,
    elements: Box<[SymbolId]>,
}

impl AggregateConstant {
    pub fn new(shape: AggregateShape, elements: Vec<SymbolId>) -> Self {
        Self {
            shape,
            elements: elements.into_boxed_slice(),
        }
    }

    /// Builds a packed array or vector from raw element values, as found in
    /// `DATA`, `STRING` and `CSTRING` records. Every element becomes a fresh
    /// scalar constant of the element type.
    pub fn from_data(
        symbols: &mut SymbolTable,
        types: &TypeTable,
        ty: TypeId,
        raw: &[u64],
    ) -> Result<Self> {
        let (shape, element) = match types.get(ty) {
            Some(Type::Array { element, .. }) => (AggregateShape::Array, *element),
            Some(Type::Vector { element, .. }) => (AggregateShape::Vector, *element),
            _ => {
                return Err(Error::UnexpectedType {
                    ty,
                    expected: "an array or vector type",
                });
            }
        };
        let make: fn(u64, u32) -> Constant = match types.get(element) {
            Some(Type::Scalar(ScalarKind::Integer(_))) => {
                |value, width| Constant::Integer(sign_extend(value, width))
            }
            Some(Type::Scalar(kind)) if kind.float_width().is_some() => {
                |value, _| Constant::Float(value)
            }
            _ => {
                return Err(Error::UnexpectedType {
                    ty: element,
                    expected: "an integer or floating point type",
                });
            }
        };
        let width = types.integer_width(element).unwrap_or(64);
        let elements = raw
            .iter()
            .map(|&value| symbols.alloc(Symbol::constant(element, make(value, width))))
            .collect();
        Ok(Self::new(shape, elements))
    }

    /// Builds an aggregate whose elements are other values. Elements that are
    /// not defined yet come back as placeholders owned by `owner`.
    pub fn from_symbols(
        symbols: &mut SymbolTable,
        types: &TypeTable,
        ty: TypeId,
        owner: SymbolId,
        indices: &[u64],
    ) -> Result<Self> {
        let (shape, fields) = match types.get(ty) {
            Some(Type::Array { element, .. }) => (AggregateShape::Array, vec![*element]),
            Some(Type::Vector { element, .. }) => (AggregateShape::Vector, vec![*element]),
            Some(Type::Struct(s)) => {
                if s.fields.len() != indices.len() {
                    return Err(Error::InvalidRecord("struct constant"));
                }
                (AggregateShape::Struct, s.fields.clone())
            }
            _ => {
                return Err(Error::UnexpectedType {
                    ty,
                    expected: "an aggregate type",
                });
            }
        };
        let elements = indices
            .iter()
            .enumerate()
            .map(|(i, &index)| {
                let element_type = fields.get(i).or(fields.first()).copied().unwrap_or(ty);
                symbols.get_forward_referenced(index, element_type, owner)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(shape, elements))
    }

    pub fn shape(&self) -> AggregateShape {
        self.shape
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[SymbolId] {
        &self.elements
    }
}

/// `lhs <op> rhs` over two other constants. Nothing is computed while
/// parsing; see [`evaluate`](Self::evaluate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryOperationConstant {
    pub opcode: BinOpcode,
    pub flags: OperatorFlags,
    pub lhs: SymbolId,
    pub rhs: SymbolId,
}

impl BinaryOperationConstant {
    /// Resolves both operands, which share the result type `ty`.
    pub fn from_symbols(
        symbols: &mut SymbolTable,
        ty: TypeId,
        owner: SymbolId,
        opcode: BinOpcode,
        lhs: u64,
        rhs: u64,
    ) -> Result<Self> {
        Ok(Self {
            opcode,
            flags: OperatorFlags::empty(),
            lhs: symbols.get_forward_referenced(lhs, ty, owner)?,
            rhs: symbols.get_forward_referenced(rhs, ty, owner)?,
        })
    }

    #[must_use]
    pub fn with_flags(mut self, flags: OperatorFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Folds the operation if both operands are integer constants (or
    /// foldable operations themselves). The result is sign-extended from the
    /// operand width. Division by zero and oversized shifts give `None`.
    pub fn evaluate(&self, symbols: &SymbolTable, types: &TypeTable) -> Option<i64> {
        self.evaluate_at(symbols, types, 0)
    }

    fn evaluate_at(&self, symbols: &SymbolTable, types: &TypeTable, depth: usize) -> Option<i64> {
        // Forward references can make an expression refer to itself.
        const MAX_DEPTH: usize = 64;
        if depth > MAX_DEPTH {
            return None;
        }
        let width = types.integer_width(symbols.symbol(self.lhs).ty)?;
        if width > 64 {
            return None;
        }
        let operand = |id: SymbolId| match symbols.symbol(id).as_constant()? {
            Constant::Integer(value) => Some(*value),
            Constant::Null => Some(0),
            Constant::BinaryOperation(op) => op.evaluate_at(symbols, types, depth + 1),
            _ => None,
        };
        let (lhs, rhs) = (operand(self.lhs)?, operand(self.rhs)?);
        let mask = if width == 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        let (ul, ur) = (lhs as u64 & mask, rhs as u64 & mask);
        let (sl, sr) = (sign_extend(ul, width), sign_extend(ur, width));
        let result = match self.opcode {
            BinOpcode::Add => ul.wrapping_add(ur),
            BinOpcode::Sub => ul.wrapping_sub(ur),
            BinOpcode::Mul => ul.wrapping_mul(ur),
            BinOpcode::UDiv => ul.checked_div(ur)?,
            BinOpcode::URem => ul.checked_rem(ur)?,
            BinOpcode::SDiv => sl.checked_div(sr)? as u64,
            BinOpcode::SRem => sl.checked_rem(sr)? as u64,
            BinOpcode::Shl if ur < u64::from(width) => ul << ur,
            BinOpcode::LShr if ur < u64::from(width) => ul >> ur,
            BinOpcode::AShr if ur < u64::from(width) => (sl >> ur) as u64,
            BinOpcode::Shl | BinOpcode::LShr | BinOpcode::AShr => return None,
            BinOpcode::And => ul & ur,
            BinOpcode::Or => ul | ur,
            BinOpcode::Xor => ul ^ ur,
        };
        Some(sign_extend(result & mask, width))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetElementPtrConstant {
    pub source_type: Option<TypeId>,
    pub inbounds: bool,
    /// Base pointer followed by the indices.
    pub operands: Vec<SymbolId>,
}

/// Interprets `value` as a `width`-bit two's complement integer.
pub(crate) fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

/// State of one `CONSTANTS` block: the type set by the last `SETTYPE`.
#[derive(Debug, Default)]
pub(crate) struct ConstantsParser {
    current_type: Option<TypeId>,
}

impl ConstantsParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decodes one record. Every record except `SETTYPE` defines the next
    /// value index, even when its contents are not understood.
    pub(crate) fn parse_record(
        &mut self,
        symbols: &mut SymbolTable,
        types: &TypeTable,
        record: &Record,
    ) -> Result<()> {
        let code = u8::try_from(record.id)
            .ok()
            .and_then(|c| ConstantsCode::try_from(c).ok());
        let mut ops = record.operands();
        if code == Some(ConstantsCode::SetType) {
            self.current_type = Some(types.resolve(ops.u64()?)?);
            return Ok(());
        }
        let ty = self.current_type.ok_or(Error::MissingConstantType)?;
        let id = symbols.build(ty, |symbols, owner| {
            let constant = decode(code, record.id, &mut ops, symbols, types, ty, owner)?;
            Ok(SymbolKind::Constant(constant))
        })?;
        symbols.push(id)?;
        Ok(())
    }
}

fn decode(
    code: Option<ConstantsCode>,
    raw_code: u64,
    ops: &mut Fields,
    symbols: &mut SymbolTable,
    types: &TypeTable,
    ty: TypeId,
    owner: SymbolId,
) -> Result<Constant> {
    let Some(code) = code else {
        debug!("unknown constant record {raw_code}");
        return Ok(Constant::Opaque { code: raw_code });
    };
    let constant = match code {
        ConstantsCode::Null => Constant::Null,
        ConstantsCode::Undef => Constant::Undef,
        ConstantsCode::Poison => Constant::Poison,
        ConstantsCode::Integer => Constant::Integer(ops.i64()?),
        ConstantsCode::WideInteger => {
            if ops.is_empty() {
                return Err(Error::InvalidRecord("wide integer constant"));
            }
            Constant::WideInteger(
                ops.rest()
                    .into_iter()
                    .map(|word| decode_signed(word) as u64)
                    .collect(),
            )
        }
        ConstantsCode::Float => {
            let words = ops.rest();
            match words.as_slice() {
                [] => return Err(Error::InvalidRecord("float constant")),
                [bits] => Constant::Float(*bits),
                _ => Constant::WideFloat(words),
            }
        }
        ConstantsCode::Aggregate => Constant::Aggregate(AggregateConstant::from_symbols(
            symbols,
            types,
            ty,
            owner,
            &ops.rest(),
        )?),
        ConstantsCode::String | ConstantsCode::CString | ConstantsCode::Data => {
            let mut raw = ops.rest();
            if code == ConstantsCode::CString {
                raw.push(0);
            }
            Constant::Aggregate(AggregateConstant::from_data(symbols, types, ty, &raw)?)
        }
        ConstantsCode::BinOp => {
            let opcode = ops.u64()?;
            let lhs = ops.u64()?;
            let rhs = ops.u64()?;
            let flags = OperatorFlags::from_bits_truncate(ops.u64_or_default() as u8);
            match u8::try_from(opcode).ok().and_then(|op| BinOpcode::try_from(op).ok()) {
                Some(opcode) => Constant::BinaryOperation(
                    BinaryOperationConstant::from_symbols(symbols, ty, owner, opcode, lhs, rhs)?
                        .with_flags(flags),
                ),
                None => {
                    warn!("unknown binary opcode {opcode} in constant expression");
                    Constant::Opaque { code: raw_code }
                }
            }
        }
        ConstantsCode::Cast => {
            let opcode = ops.u64()?;
            let operand_type = types.resolve(ops.u64()?)?;
            let operand = ops.u64()?;
            match u8::try_from(opcode).ok().and_then(|op| CastOpcode::try_from(op).ok()) {
                Some(opcode) => Constant::Cast {
                    opcode,
                    operand: symbols.get_forward_referenced(operand, operand_type, owner)?,
                },
                None => {
                    warn!("unknown cast opcode {opcode} in constant expression");
                    Constant::Opaque { code: raw_code }
                }
            }
        }
        ConstantsCode::Select => {
            let (condition, if_true, if_false) = (ops.u64()?, ops.u64()?, ops.u64()?);
            // The condition's placeholder borrows the result type; it is
            // replaced before anyone looks at it.
            Constant::Select {
                condition: symbols.get_forward_referenced(condition, ty, owner)?,
                if_true: symbols.get_forward_referenced(if_true, ty, owner)?,
                if_false: symbols.get_forward_referenced(if_false, ty, owner)?,
            }
        }
        ConstantsCode::Cmp => {
            let operand_type = types.resolve(ops.u64()?)?;
            let lhs = ops.u64()?;
            let rhs = ops.u64()?;
            Constant::Compare {
                lhs: symbols.get_forward_referenced(lhs, operand_type, owner)?,
                rhs: symbols.get_forward_referenced(rhs, operand_type, owner)?,
                predicate: ops.u64()?,
            }
        }
        ConstantsCode::GepOld
        | ConstantsCode::InboundsGep
        | ConstantsCode::GepWithInrangeIndexOld
        | ConstantsCode::GepWithInrange
        | ConstantsCode::Gep => {
            Constant::GetElementPtr(decode_gep(code, ops, symbols, types, owner)?)
        }
        ConstantsCode::BlockAddress => {
            let function_type = types.resolve(ops.u64()?)?;
            let function = ops.u64()?;
            Constant::BlockAddress {
                function: symbols.get_forward_referenced(function, function_type, owner)?,
                block: ops.u64()?,
            }
        }
        _ => {
            debug!("constant record {code:?} kept opaque");
            Constant::Opaque { code: raw_code }
        }
    };
    Ok(constant)
}

fn decode_gep(
    code: ConstantsCode,
    ops: &mut Fields,
    symbols: &mut SymbolTable,
    types: &TypeTable,
    owner: SymbolId,
) -> Result<GetElementPtrConstant> {
    let explicit_source = matches!(
        code,
        ConstantsCode::GepWithInrangeIndexOld | ConstantsCode::GepWithInrange | ConstantsCode::Gep
    );
    let source_type = if explicit_source || ops.len() % 2 == 1 {
        Some(types.resolve(ops.u64()?)?)
    } else {
        None
    };
    let inbounds = match code {
        ConstantsCode::InboundsGep => true,
        ConstantsCode::GepWithInrangeIndexOld | ConstantsCode::Gep => ops.u64()? & 1 != 0,
        ConstantsCode::GepWithInrange => {
            let flags = ops.u64()?;
            let bit_width = ops.u64()?;
            if bit_width > 64 {
                return Err(Error::InvalidRecord("gep inrange"));
            }
            let _range = (ops.i64()?, ops.i64()?);
            flags & 1 != 0
        }
        _ => false,
    };
    if ops.len() % 2 != 0 {
        return Err(Error::InvalidRecord("gep constant"));
    }
    let mut operands = Vec::with_capacity(ops.len() / 2);
    while !ops.is_empty() {
        let operand_type = types.resolve(ops.u64()?)?;
        let index = ops.u64()?;
        operands.push(symbols.get_forward_referenced(index, operand_type, owner)?);
    }
    Ok(GetElementPtrConstant {
        source_type,
        inbounds,
        operands,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn table_with(types: &[Type]) -> TypeTable {
        let mut table = TypeTable::new();
        for ty in types {
            table.push(ty.clone());
        }
        table
    }

    fn integer(symbols: &mut SymbolTable, ty: TypeId, value: i64) -> SymbolId {
        let id = symbols.alloc(Symbol::constant(ty, Constant::Integer(value)));
        symbols.push(id).unwrap();
        id
    }

    fn binop(
        symbols: &mut SymbolTable,
        ty: TypeId,
        opcode: BinOpcode,
        lhs: u64,
        rhs: u64,
    ) -> SymbolId {
        symbols
            .build(ty, |symbols, owner| {
                let op = BinaryOperationConstant::from_symbols(symbols, ty, owner, opcode, lhs, rhs)?;
                Ok(SymbolKind::Constant(Constant::BinaryOperation(op)))
            })
            .unwrap()
    }

    fn evaluate(symbols: &SymbolTable, types: &TypeTable, id: SymbolId) -> Option<i64> {
        match symbols.symbol(id).as_constant() {
            Some(Constant::BinaryOperation(op)) => op.evaluate(symbols, types),
            _ => None,
        }
    }

    proptest! {
        #[test]
        fn aggregate_arity_matches_indices(indices in proptest::collection::vec(0u64..64, 0..32)) {
            let types = table_with(&[
                Type::Scalar(ScalarKind::Integer(32)),
                Type::Array { element: TypeId(0), len: indices.len() as u64 },
            ]);
            let mut symbols = SymbolTable::new();
            let owner = symbols.alloc(Symbol::constant(TypeId(1), Constant::Undef));
            let aggregate =
                AggregateConstant::from_symbols(&mut symbols, &types, TypeId(1), owner, &indices)
                    .unwrap();
            prop_assert_eq!(aggregate.element_count(), indices.len());
        }
    }

    #[test]
    fn empty_aggregate_is_valid() {
        let types = table_with(&[
            Type::Scalar(ScalarKind::Integer(8)),
            Type::Array { element: TypeId(0), len: 0 },
        ]);
        let mut symbols = SymbolTable::new();
        let owner = symbols.alloc(Symbol::constant(TypeId(1), Constant::Undef));
        let aggregate =
            AggregateConstant::from_symbols(&mut symbols, &types, TypeId(1), owner, &[]).unwrap();
        assert_eq!(aggregate.element_count(), 0);
        assert_eq!(aggregate.shape(), AggregateShape::Array);
    }

    #[test]
    fn data_elements_are_sign_extended() {
        let types = table_with(&[
            Type::Scalar(ScalarKind::Integer(8)),
            Type::Vector { element: TypeId(0), len: 3, scalable: false },
        ]);
        let mut symbols = SymbolTable::new();
        let aggregate =
            AggregateConstant::from_data(&mut symbols, &types, TypeId(1), &[1, 0x7f, 0xff]).unwrap();
        let values: Vec<_> = aggregate
            .elements()
            .iter()
            .map(|&id| symbols.symbol(id).as_constant().cloned())
            .collect();
        assert_eq!(
            values,
            vec![
                Some(Constant::Integer(1)),
                Some(Constant::Integer(127)),
                Some(Constant::Integer(-1)),
            ]
        );
    }

    #[test]
    fn from_data_rejects_struct_type() {
        let types = table_with(&[Type::Struct(crate::ir::types::StructType {
            name: None,
            packed: false,
            fields: vec![],
            opaque: false,
        })]);
        let mut symbols = SymbolTable::new();
        let err = AggregateConstant::from_data(&mut symbols, &types, TypeId(0), &[1]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedType { .. }));
    }

    #[test]
    fn evaluate_folds_nested_operations() {
        let i32_ty = TypeId(0);
        let types = table_with(&[Type::Scalar(ScalarKind::Integer(32))]);
        let mut symbols = SymbolTable::new();
        integer(&mut symbols, i32_ty, 7);
        integer(&mut symbols, i32_ty, 3);
        let sum = binop(&mut symbols, i32_ty, BinOpcode::Add, 0, 1);
        symbols.push(sum).unwrap();
        let product = binop(&mut symbols, i32_ty, BinOpcode::Mul, 2, 0);
        symbols.push(product).unwrap();

        assert_eq!(evaluate(&symbols, &types, sum), Some(10));
        assert_eq!(evaluate(&symbols, &types, product), Some(70));
    }

    #[test]
    fn evaluate_wraps_at_operand_width() {
        let i8_ty = TypeId(0);
        let types = table_with(&[Type::Scalar(ScalarKind::Integer(8))]);
        let mut symbols = SymbolTable::new();
        integer(&mut symbols, i8_ty, 127);
        integer(&mut symbols, i8_ty, 1);
        integer(&mut symbols, i8_ty, 0);
        let add = binop(&mut symbols, i8_ty, BinOpcode::Add, 0, 1);
        let udiv = binop(&mut symbols, i8_ty, BinOpcode::UDiv, 0, 2);
        let lshr = binop(&mut symbols, i8_ty, BinOpcode::LShr, 0, 0);

        assert_eq!(evaluate(&symbols, &types, add), Some(-128));
        assert_eq!(evaluate(&symbols, &types, udiv), None);
        assert_eq!(evaluate(&symbols, &types, lshr), None);
    }

    #[test]
    fn unknown_constant_code_still_defines_a_value() {
        let types = table_with(&[Type::Scalar(ScalarKind::Integer(32))]);
        let mut symbols = SymbolTable::new();
        let mut parser = ConstantsParser::new();
        parser
            .parse_record(&mut symbols, &types, &Record::new(ConstantsCode::SetType as u64, vec![0]))
            .unwrap();
        parser
            .parse_record(&mut symbols, &types, &Record::new(60, vec![1, 2]))
            .unwrap();
        parser
            .parse_record(&mut symbols, &types, &Record::new(ConstantsCode::Integer as u64, vec![84]))
            .unwrap();

        assert_eq!(symbols.next_index(), 2);
        let first = symbols.get(0).unwrap();
        let second = symbols.get(1).unwrap();
        assert_eq!(
            symbols.symbol(first).as_constant(),
            Some(&Constant::Opaque { code: 60 })
        );
        assert_eq!(
            symbols.symbol(second).as_constant(),
            Some(&Constant::Integer(42))
        );
    }

    #[test]
    fn constant_without_settype_is_rejected() {
        let types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let err = ConstantsParser::new()
            .parse_record(&mut symbols, &types, &Record::new(ConstantsCode::Null as u64, vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::MissingConstantType));
    }
}
