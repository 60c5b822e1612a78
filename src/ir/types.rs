use std::collections::HashMap;

use log::debug;

use super::{Error, Result};
use crate::bitcode::Record;
use crate::schema::blocks::TypeCode;

/// Index into the module's [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Void,
    Label,
    Metadata,
    Token,
    X86Mmx,
    X86Amx,
    Integer(u32),
    Half,
    BFloat,
    Float,
    Double,
    X86Fp80,
    Fp128,
    PpcFp128,
    Pointer { address_space: u32 },
}

impl ScalarKind {
    /// Width of floating point kinds, `None` for everything else.
    #[must_use]
    pub fn float_width(self) -> Option<u32> {
        match self {
            Self::Half | Self::BFloat => Some(16),
            Self::Float => Some(32),
            Self::Double => Some(64),
            Self::X86Fp80 => Some(80),
            Self::Fp128 | Self::PpcFp128 => Some(128),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: Option<String>,
    pub packed: bool,
    pub fields: Vec<TypeId>,
    /// Declared with a name but no body.
    pub opaque: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub ret: TypeId,
    pub params: Vec<TypeId>,
    pub vararg: bool,
}

/// An entry of the type table. Types are immutable once pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Scalar(ScalarKind),
    Array { element: TypeId, len: u64 },
    Vector { element: TypeId, len: u64, scalable: bool },
    Struct(StructType),
    Function(FunctionType),
    /// A type record this crate does not decode. It still takes up its slot.
    Unknown(u64),
}

impl Type {
    fn references(&self) -> Vec<TypeId> {
        match self {
            Self::Scalar(_) | Self::Unknown(_) => Vec::new(),
            Self::Array { element, .. } | Self::Vector { element, .. } => vec![*element],
            Self::Struct(s) => s.fields.clone(),
            Self::Function(f) => std::iter::once(f.ret).chain(f.params.iter().copied()).collect(),
        }
    }
}

/// The `TYPE_BLOCK_ID_NEW` block, decoded.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<Type>,
    /// Element types of typed (pre opaque pointer) pointers.
    pointees: HashMap<TypeId, TypeId>,
    pending_name: Option<String>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    /// Checks a type operand of a record against the table.
    pub fn resolve(&self, raw: u64) -> Result<TypeId> {
        match usize::try_from(raw) {
            Ok(index) if index < self.types.len() => Ok(TypeId(index as u32)),
            _ => Err(Error::UnknownType(raw)),
        }
    }

    pub fn integer_width(&self, id: TypeId) -> Option<u32> {
        match self.get(id)? {
            Type::Scalar(ScalarKind::Integer(width)) => Some(*width),
            _ => None,
        }
    }

    /// Element type of a typed pointer. Opaque pointers have none.
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        self.pointees.get(&id).copied()
    }

    pub fn function_type(&self, id: TypeId) -> Option<&FunctionType> {
        match self.get(id)? {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn parse_record(&mut self, record: &Record) -> Result<()> {
        let mut ops = record.operands();
        let Some(code) = u8::try_from(record.id)
            .ok()
            .and_then(|c| TypeCode::try_from(c).ok())
        else {
            debug!("unknown type record {}", record.id);
            self.push(Type::Unknown(record.id));
            return Ok(());
        };
        let scalar = |kind| Type::Scalar(kind);
        let ty = match code {
            TypeCode::NumEntry => {
                let n = ops.u64()? as usize;
                self.types.reserve(n.min(1 << 16));
                return Ok(());
            }
            TypeCode::StructName => {
                self.pending_name = Some(ops.string());
                return Ok(());
            }
            TypeCode::Void => scalar(ScalarKind::Void),
            TypeCode::Float => scalar(ScalarKind::Float),
            TypeCode::Double => scalar(ScalarKind::Double),
            TypeCode::Label => scalar(ScalarKind::Label),
            TypeCode::Half => scalar(ScalarKind::Half),
            TypeCode::BFloat => scalar(ScalarKind::BFloat),
            TypeCode::X86Fp80 => scalar(ScalarKind::X86Fp80),
            TypeCode::Fp128 => scalar(ScalarKind::Fp128),
            TypeCode::PpcFp128 => scalar(ScalarKind::PpcFp128),
            TypeCode::Metadata => scalar(ScalarKind::Metadata),
            TypeCode::X86Mmx => scalar(ScalarKind::X86Mmx),
            TypeCode::X86Amx => scalar(ScalarKind::X86Amx),
            TypeCode::Token => scalar(ScalarKind::Token),
            TypeCode::Integer => {
                let width = ops.u32()?;
                if width == 0 || width > 1 << 23 {
                    return Err(Error::InvalidRecord("integer type"));
                }
                scalar(ScalarKind::Integer(width))
            }
            TypeCode::Pointer => {
                let pointee = TypeId(ops.u32()?);
                let address_space = u32::try_from(ops.u64_or_default())
                    .map_err(|_| Error::InvalidRecord("pointer address space"))?;
                let id = self.push(scalar(ScalarKind::Pointer { address_space }));
                self.pointees.insert(id, pointee);
                return Ok(());
            }
            TypeCode::OpaquePointer => scalar(ScalarKind::Pointer {
                address_space: u32::try_from(ops.u64_or_default())
                    .map_err(|_| Error::InvalidRecord("pointer address space"))?,
            }),
            TypeCode::FunctionOld => {
                let vararg = ops.bool()?;
                let _attributes = ops.u64()?;
                self.function(vararg, &mut ops)?
            }
            TypeCode::Function => {
                let vararg = ops.bool()?;
                self.function(vararg, &mut ops)?
            }
            TypeCode::Array => {
                let len = ops.u64()?;
                let element = TypeId(ops.u32()?);
                Type::Array { element, len }
            }
            TypeCode::Vector => {
                let len = ops.u64()?;
                let element = TypeId(ops.u32()?);
                let scalable = ops.next().is_some_and(|v| v != 0);
                if len == 0 {
                    return Err(Error::InvalidRecord("vector type"));
                }
                Type::Vector {
                    element,
                    len,
                    scalable,
                }
            }
            TypeCode::StructAnon => Type::Struct(StructType {
                name: None,
                packed: ops.bool()?,
                fields: Self::type_list(&mut ops)?,
                opaque: false,
            }),
            TypeCode::StructNamed => Type::Struct(StructType {
                name: self.pending_name.take(),
                packed: ops.bool()?,
                fields: Self::type_list(&mut ops)?,
                opaque: false,
            }),
            TypeCode::Opaque => Type::Struct(StructType {
                name: self.pending_name.take(),
                packed: false,
                fields: Vec::new(),
                opaque: true,
            }),
            TypeCode::TargetType => {
                self.pending_name = None;
                Type::Unknown(record.id)
            }
        };
        self.push(ty);
        Ok(())
    }

    fn function(&self, vararg: bool, ops: &mut crate::bitcode::Fields) -> Result<Type> {
        let ret = TypeId(ops.u32()?);
        let params = Self::type_list(ops)?;
        Ok(Type::Function(FunctionType {
            ret,
            params,
            vararg,
        }))
    }

    fn type_list(ops: &mut crate::bitcode::Fields) -> Result<Vec<TypeId>> {
        let mut list = Vec::with_capacity(ops.len());
        while !ops.is_empty() {
            list.push(TypeId(ops.u32()?));
        }
        Ok(list)
    }

    /// Called when the type block closes. Records may refer to types that
    /// come later in the block, so references are only checked here.
    pub(crate) fn finish(&mut self) -> Result<()> {
        self.pending_name = None;
        let len = self.types.len();
        let dangling = self
            .types
            .iter()
            .flat_map(Type::references)
            .chain(self.pointees.values().copied())
            .find(|id| id.index() >= len);
        match dangling {
            Some(id) => Err(Error::UnknownType(u64::from(id.0))),
            None => Ok(()),
        }
    }
}
