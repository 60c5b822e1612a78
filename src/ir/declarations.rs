//! Functions and global values declared by `MODULE` block records.

use std::hash::{Hash, Hasher};

use bitflags::bitflags;

use super::symbol::{SymbolId, SymbolKind};
use super::symbol_table::SymbolTable;
use super::types::{ScalarKind, Type, TypeId, TypeTable};
use super::{Error, Result};
use crate::bitcode::Fields;
use crate::schema::enums::{
    DllStorageClass, Linkage, ThreadLocalMode, UnnamedAddr, Visibility, decode_or_default,
};

bitflags! {
    /// Low bits of the second `GLOBALVAR` operand. The address space sits
    /// above them when `EXPLICIT_TYPE` is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlobalVarFlags: u64 {
        const CONSTANT = 1;
        const EXPLICIT_TYPE = 1 << 1;
    }
}

/// A function declaration or definition.
///
/// Two functions are equal when their names and types are; the remaining
/// fields do not take part in comparisons.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub function_type: TypeId,
    pub calling_convention: u32,
    pub linkage: Linkage,
    /// Index into [`AttributeTable::lists`](super::AttributeTable::lists).
    pub attributes: Option<usize>,
    pub alignment: Option<u64>,
    pub section: Option<String>,
    pub visibility: Visibility,
    pub gc: Option<String>,
    pub unnamed_addr: UnnamedAddr,
    pub dll_storage_class: DllStorageClass,
    pub address_space: u32,
    pub prologue: Option<SymbolId>,
    pub prefix: Option<SymbolId>,
    pub personality: Option<SymbolId>,
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.function_type == other.function_type
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.function_type.hash(state);
    }
}

impl Function {
    pub(crate) fn operands(&self) -> Vec<SymbolId> {
        [self.prologue, self.prefix, self.personality]
            .into_iter()
            .flatten()
            .collect()
    }

    pub(crate) fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut SymbolId)) {
        for slot in [&mut self.prologue, &mut self.prefix, &mut self.personality] {
            if let Some(id) = slot {
                f(id);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalValue {
    pub name: String,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub unnamed_addr: UnnamedAddr,
    pub dll_storage_class: DllStorageClass,
    pub thread_local: ThreadLocalMode,
    pub address_space: u32,
    pub kind: GlobalKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalKind {
    Variable {
        constant: bool,
        initializer: Option<SymbolId>,
        alignment: Option<u64>,
        section: Option<String>,
        externally_initialized: bool,
    },
    Alias {
        aliasee: SymbolId,
    },
    IFunc {
        resolver: SymbolId,
    },
}

impl GlobalValue {
    pub(crate) fn operands(&self) -> Vec<SymbolId> {
        match &self.kind {
            GlobalKind::Variable { initializer, .. } => initializer.iter().copied().collect(),
            GlobalKind::Alias { aliasee } => vec![*aliasee],
            GlobalKind::IFunc { resolver } => vec![*resolver],
        }
    }

    pub(crate) fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut SymbolId)) {
        match &mut self.kind {
            GlobalKind::Variable { initializer, .. } => {
                if let Some(id) = initializer {
                    f(id);
                }
            }
            GlobalKind::Alias { aliasee } => f(aliasee),
            GlobalKind::IFunc { resolver } => f(resolver),
        }
    }
}

/// `offset, size` of a name in the module's string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StrtabRef {
    pub offset: u64,
    pub size: u64,
}

impl StrtabRef {
    pub(crate) fn read(ops: &mut Fields) -> Result<Self> {
        Ok(Self {
            offset: ops.u64()?,
            size: ops.u64()?,
        })
    }

    pub(crate) fn resolve(self, strtab: &[u8]) -> Result<String> {
        let range = usize::try_from(self.offset)
            .ok()
            .zip(usize::try_from(self.size).ok())
            .and_then(|(start, size)| Some(start..start.checked_add(size)?))
            .filter(|range| range.end <= strtab.len());
        match range {
            Some(range) => Ok(String::from_utf8_lossy(&strtab[range]).into_owned()),
            None => Err(Error::StringTableOverrun {
                offset: self.offset,
                size: self.size,
            }),
        }
    }
}

/// Module level names that records refer to by index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NameLists<'a> {
    pub sections: &'a [String],
    pub gc_names: &'a [String],
}

fn decode_alignment(value: u64) -> Result<Option<u64>> {
    match value {
        0 => Ok(None),
        1..=33 => Ok(Some(1 << (value - 1))),
        _ => Err(Error::InvalidRecord("alignment")),
    }
}

fn lookup(names: &[String], index_plus_one: u64, what: &'static str) -> Result<Option<String>> {
    match index_plus_one.checked_sub(1) {
        None => Ok(None),
        Some(index) => usize::try_from(index)
            .ok()
            .and_then(|i| names.get(i))
            .cloned()
            .map(Some)
            .ok_or(Error::InvalidRecord(what)),
    }
}

fn optional_value(
    symbols: &mut SymbolTable,
    index_plus_one: u64,
    ty: TypeId,
    owner: SymbolId,
) -> Result<Option<SymbolId>> {
    index_plus_one
        .checked_sub(1)
        .map(|index| symbols.get_forward_referenced(index, ty, owner))
        .transpose()
}

/// Value type and address space of a global whose record gives a typed
/// pointer instead of the value type.
fn split_pointer(types: &TypeTable, ty: TypeId) -> (TypeId, u32) {
    let address_space = match types.get(ty) {
        Some(Type::Scalar(ScalarKind::Pointer { address_space })) => *address_space,
        _ => 0,
    };
    (types.pointee(ty).unwrap_or(ty), address_space)
}

/// `[type, callingconv, isproto, linkage, paramattr, alignment, section,
/// visibility, gc, unnamed_addr, prologuedata, dllstorageclass, comdat,
/// prefixdata, personalityfn, dso_local, addrspace]`
pub(crate) fn parse_function(
    ops: &mut Fields,
    names: NameLists<'_>,
    symbols: &mut SymbolTable,
    types: &TypeTable,
) -> Result<SymbolId> {
    let raw_type = types.resolve(ops.u64()?)?;
    let function_type = if types.function_type(raw_type).is_some() {
        raw_type
    } else {
        types
            .pointee(raw_type)
            .filter(|&pointee| types.function_type(pointee).is_some())
            .ok_or(Error::UnexpectedType {
                ty: raw_type,
                expected: "a function type",
            })?
    };
    let calling_convention = ops.u32()?;
    let is_proto = ops.bool()?;
    let linkage = Linkage::decode(ops.u64()?);
    let attributes = ops.index_plus_one()?.map(|i| i as usize);
    let alignment = decode_alignment(ops.u64()?)?;
    let section = lookup(names.sections, ops.u64()?, "section index")?;
    let visibility = decode_or_default(ops.u64()?);
    let gc = lookup(names.gc_names, ops.u64_or_default(), "gc index")?;
    let unnamed_addr = decode_or_default(ops.u64_or_default());
    let prologue = ops.u64_or_default();
    let dll_storage_class = decode_or_default(ops.u64_or_default());
    let _comdat = ops.u64_or_default();
    let prefix = ops.u64_or_default();
    let personality = ops.u64_or_default();
    let _dso_local = ops.u64_or_default();
    let address_space = u32::try_from(ops.u64_or_default())
        .map_err(|_| Error::InvalidRecord("function address space"))?;

    symbols.build(function_type, |symbols, owner| {
        let function = Function {
            name: String::new(),
            function_type,
            calling_convention,
            linkage,
            attributes,
            alignment,
            section,
            visibility,
            gc,
            unnamed_addr,
            dll_storage_class,
            address_space,
            prologue: optional_value(symbols, prologue, function_type, owner)?,
            prefix: optional_value(symbols, prefix, function_type, owner)?,
            personality: optional_value(symbols, personality, function_type, owner)?,
        };
        Ok(if is_proto {
            SymbolKind::FunctionDeclaration(function)
        } else {
            SymbolKind::FunctionDefinition(function)
        })
    })
}

/// `[type, flags, initid, linkage, alignment, section, visibility,
/// threadlocal, unnamed_addr, externally_initialized, dllstorageclass,
/// comdat, attributes, dso_local]`
pub(crate) fn parse_global_var(
    ops: &mut Fields,
    names: NameLists<'_>,
    symbols: &mut SymbolTable,
    types: &TypeTable,
) -> Result<SymbolId> {
    let ty = types.resolve(ops.u64()?)?;
    let raw_flags = ops.u64()?;
    let flags = GlobalVarFlags::from_bits_truncate(raw_flags);
    let (value_type, address_space) = if flags.contains(GlobalVarFlags::EXPLICIT_TYPE) {
        let address_space = u32::try_from(raw_flags >> 2)
            .map_err(|_| Error::InvalidRecord("global address space"))?;
        (ty, address_space)
    } else {
        split_pointer(types, ty)
    };
    let initializer = ops.u64()?;
    let linkage = Linkage::decode(ops.u64()?);
    let alignment = decode_alignment(ops.u64()?)?;
    let section = lookup(names.sections, ops.u64()?, "section index")?;
    let visibility = decode_or_default(ops.u64_or_default());
    let thread_local = decode_or_default(ops.u64_or_default());
    let unnamed_addr = decode_or_default(ops.u64_or_default());
    let externally_initialized = ops.u64_or_default() != 0;
    let dll_storage_class = decode_or_default(ops.u64_or_default());

    symbols.build(value_type, |symbols, owner| {
        Ok(SymbolKind::GlobalValue(GlobalValue {
            name: String::new(),
            linkage,
            visibility,
            unnamed_addr,
            dll_storage_class,
            thread_local,
            address_space,
            kind: GlobalKind::Variable {
                constant: flags.contains(GlobalVarFlags::CONSTANT),
                initializer: optional_value(symbols, initializer, value_type, owner)?,
                alignment,
                section,
                externally_initialized,
            },
        }))
    })
}

/// The kinds of indirect symbol a module can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndirectKind {
    /// `[alias type, aliasee, linkage, visibility, dllstorageclass,
    /// threadlocal, unnamed_addr]` with a pointer type
    AliasOld,
    /// `[alias type, addrspace, aliasee, linkage, visibility,
    /// dllstorageclass, threadlocal, unnamed_addr, dso_local]`
    Alias,
    /// `[ifunc type, addrspace, resolver, linkage, visibility]`
    IFunc,
}

pub(crate) fn parse_indirect(
    kind: IndirectKind,
    ops: &mut Fields,
    symbols: &mut SymbolTable,
    types: &TypeTable,
) -> Result<SymbolId> {
    let ty = types.resolve(ops.u64()?)?;
    let (value_type, address_space) = match kind {
        IndirectKind::AliasOld => split_pointer(types, ty),
        IndirectKind::Alias | IndirectKind::IFunc => {
            (ty, u32::try_from(ops.u64()?).map_err(|_| Error::InvalidRecord("address space"))?)
        }
    };
    let target = ops.u64()?;
    let linkage = Linkage::decode(ops.u64()?);
    let visibility = decode_or_default(ops.u64_or_default());
    let (dll_storage_class, thread_local, unnamed_addr) = match kind {
        IndirectKind::IFunc => Default::default(),
        IndirectKind::Alias | IndirectKind::AliasOld => (
            decode_or_default(ops.u64_or_default()),
            decode_or_default(ops.u64_or_default()),
            decode_or_default(ops.u64_or_default()),
        ),
    };

    symbols.build(value_type, |symbols, owner| {
        let target = symbols.get_forward_referenced(target, value_type, owner)?;
        Ok(SymbolKind::GlobalValue(GlobalValue {
            name: String::new(),
            linkage,
            visibility,
            unnamed_addr,
            dll_storage_class,
            thread_local,
            address_space,
            kind: match kind {
                IndirectKind::IFunc => GlobalKind::IFunc { resolver: target },
                IndirectKind::Alias | IndirectKind::AliasOld => GlobalKind::Alias { aliasee: target },
            },
        }))
    })
}
