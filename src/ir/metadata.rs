//! Module-level debug metadata.
//!
//! Nodes are stored in definition order and refer to each other through
//! [`MetadataRef`], which is resolved only when asked for. Most debug info
//! records write references as `index + 1` with zero meaning null.

use std::collections::BTreeMap;

use log::{debug, warn};

use super::expression::{self, CURRENT_EXPRESSION_VERSION};
use super::symbol::SymbolId;
use super::symbol_table::SymbolTable;
use super::types::{TypeId, TypeTable};
use super::{Error, Result};
use crate::bitcode::Record;
use crate::bits::Cursor;
use crate::schema::blocks::MetadataCode;

static VOID: Metadata = Metadata::Void;

/// A possibly null reference to a metadata node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MetadataRef(Option<u32>);

impl MetadataRef {
    pub const NULL: Self = Self(None);

    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self(Some(index))
    }

    /// Decodes an `index + 1` operand.
    pub fn from_raw(raw: u64) -> Result<Self> {
        match raw.checked_sub(1) {
            None => Ok(Self::NULL),
            Some(index) => u32::try_from(index)
                .map(Self::from_index)
                .map_err(|_| Error::UnknownMetadata(index)),
        }
    }

    pub fn index(self) -> Option<u32> {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    /// The referenced node, or [`Metadata::Void`] for null and dangling
    /// references.
    pub fn resolve(self, table: &MetadataTable) -> &Metadata {
        table.get(self).unwrap_or(&VOID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub distinct: bool,
    pub line: u32,
    pub column: u32,
    pub scope: MetadataRef,
    pub inlined_at: MetadataRef,
    pub implicit_code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub distinct: bool,
    pub filename: MetadataRef,
    pub directory: MetadataRef,
    /// Checksum kind and value.
    pub checksum: Option<(u64, MetadataRef)>,
    pub source: MetadataRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    pub language: u32,
    pub file: MetadataRef,
    pub producer: MetadataRef,
    pub optimized: bool,
    pub flags: MetadataRef,
    pub runtime_version: u32,
    pub split_debug_filename: MetadataRef,
    pub emission_kind: u32,
    pub enums: MetadataRef,
    pub retained_types: MetadataRef,
    /// Only written by old producers; newer ones point from the subprogram
    /// to its unit instead.
    pub subprograms: MetadataRef,
    pub globals: MetadataRef,
    pub imports: MetadataRef,
    pub dwo_id: u64,
    pub macros: MetadataRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subprogram {
    pub distinct: bool,
    pub scope: MetadataRef,
    pub name: MetadataRef,
    pub linkage_name: MetadataRef,
    pub file: MetadataRef,
    pub line: u32,
    pub ty: MetadataRef,
    pub scope_line: u32,
    pub containing_type: MetadataRef,
    pub flags: u64,
    pub definition: bool,
    pub unit: MetadataRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicType {
    pub tag: u32,
    pub name: MetadataRef,
    pub size: u64,
    pub align: u32,
    pub encoding: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedType {
    pub tag: u32,
    pub name: MetadataRef,
    pub file: MetadataRef,
    pub line: u32,
    pub scope: MetadataRef,
    pub base_type: MetadataRef,
    pub size: u64,
    pub align: u32,
    pub offset: u64,
    pub flags: u64,
    pub extra_data: MetadataRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeType {
    pub tag: u32,
    pub name: MetadataRef,
    pub file: MetadataRef,
    pub line: u32,
    pub scope: MetadataRef,
    pub base_type: MetadataRef,
    pub size: u64,
    pub align: u32,
    pub offset: u64,
    pub flags: u64,
    pub elements: MetadataRef,
    pub runtime_lang: u32,
    pub vtable_holder: MetadataRef,
    pub template_params: MetadataRef,
    pub identifier: MetadataRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubroutineType {
    pub flags: u64,
    pub types: MetadataRef,
    pub calling_convention: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalBlock {
    pub scope: MetadataRef,
    pub file: MetadataRef,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    pub scope: MetadataRef,
    pub name: MetadataRef,
    pub linkage_name: MetadataRef,
    pub file: MetadataRef,
    pub line: u32,
    pub ty: MetadataRef,
    pub local: bool,
    pub definition: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub scope: MetadataRef,
    pub name: MetadataRef,
    pub file: MetadataRef,
    pub line: u32,
    pub ty: MetadataRef,
    pub arg: u32,
    pub flags: u64,
}

/// A `DIExpression`. `elements` are in the current encoding unless the
/// parse was told not to upgrade, in which case `version` says what they
/// are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub distinct: bool,
    pub version: u64,
    pub elements: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    /// Stands in for null and missing references.
    Void,
    String(String),
    /// A value from the module's value table, looked up on demand.
    Value {
        ty: TypeId,
        value: u32,
    },
    Node {
        distinct: bool,
        operands: Vec<MetadataRef>,
    },
    Location(Location),
    File(File),
    CompileUnit(CompileUnit),
    Subprogram(Subprogram),
    BasicType(BasicType),
    DerivedType(DerivedType),
    CompositeType(CompositeType),
    SubroutineType(SubroutineType),
    LexicalBlock(LexicalBlock),
    GlobalVariable(GlobalVariable),
    LocalVariable(LocalVariable),
    Expression(Expression),
    GlobalVariableExpression {
        distinct: bool,
        variable: MetadataRef,
        expression: MetadataRef,
    },
    /// A node whose record is not decoded. It keeps its index.
    Unknown {
        code: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMetadata {
    pub name: String,
    pub operands: Vec<MetadataRef>,
}

/// Metadata attached to a global value by `GLOBAL_DECL_ATTACHMENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalAttachment {
    pub value: u32,
    /// Kind id and attached node.
    pub attachments: Vec<(u64, MetadataRef)>,
}

/// Positional access to record operands; absent trailing operands read as
/// zero, the way older writers left them out.
struct Ops<'a> {
    values: &'a [u64],
}

impl Ops<'_> {
    fn require(&self, count: usize, what: &'static str) -> Result<()> {
        if self.values.len() < count {
            return Err(Error::InvalidRecord(what));
        }
        Ok(())
    }

    fn get(&self, i: usize) -> u64 {
        self.values.get(i).copied().unwrap_or_default()
    }

    fn flag(&self, i: usize) -> bool {
        self.get(i) != 0
    }

    fn u32(&self, i: usize) -> Result<u32> {
        u32::try_from(self.get(i)).map_err(|_| Error::InvalidRecord("metadata operand"))
    }

    fn md(&self, i: usize) -> Result<MetadataRef> {
        MetadataRef::from_raw(self.get(i))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    nodes: Vec<Metadata>,
    named: Vec<NamedMetadata>,
    kinds: BTreeMap<u64, String>,
    global_attachments: Vec<GlobalAttachment>,
    pending_name: Option<String>,
    upgrade_expressions: bool,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::with_expression_upgrade(true)
    }

    pub fn with_expression_upgrade(upgrade: bool) -> Self {
        Self {
            upgrade_expressions: upgrade,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, reference: MetadataRef) -> Option<&Metadata> {
        self.nodes.get(reference.index()? as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataRef, &Metadata)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, md)| (MetadataRef::from_index(i as u32), md))
    }

    /// Contents of a string node.
    pub fn string(&self, reference: MetadataRef) -> Option<&str> {
        match self.get(reference)? {
            Metadata::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn named(&self) -> &[NamedMetadata] {
        &self.named
    }

    pub fn named_node(&self, name: &str) -> Option<&NamedMetadata> {
        self.named.iter().find(|n| n.name == name)
    }

    pub fn kinds(&self) -> &BTreeMap<u64, String> {
        &self.kinds
    }

    pub fn kind_id(&self, name: &str) -> Option<u64> {
        self.kinds
            .iter()
            .find_map(|(id, kind)| (kind == name).then_some(*id))
    }

    pub fn global_attachments(&self) -> &[GlobalAttachment] {
        &self.global_attachments
    }

    /// Looks up the symbol behind a [`Metadata::Value`] node.
    pub fn value(&self, reference: MetadataRef, symbols: &SymbolTable) -> Option<SymbolId> {
        match self.get(reference)? {
            Metadata::Value { value, .. } => symbols.get(*value),
            _ => None,
        }
    }

    /// `[n x [id, name]]`, from the `METADATA_KIND` block or, in old
    /// streams, the `METADATA` block itself.
    pub(crate) fn parse_kind_record(&mut self, record: &Record) -> Result<()> {
        if record.id != MetadataCode::Kind as u64 {
            debug!("ignoring metadata kind record {}", record.id);
            return Ok(());
        }
        let mut ops = record.operands();
        let id = ops.u64()?;
        self.kinds.insert(id, ops.string());
        Ok(())
    }

    pub(crate) fn parse_record(&mut self, record: &Record, types: &TypeTable) -> Result<()> {
        let Some(code) = u8::try_from(record.id)
            .ok()
            .and_then(|c| MetadataCode::try_from(c).ok())
        else {
            warn!("unknown metadata record {}", record.id);
            self.nodes.push(Metadata::Unknown { code: record.id });
            return Ok(());
        };

        let values = record.operands().rest();
        let ops = Ops { values: &values };
        let distinct = ops.get(0) & 1 != 0;
        let node = match code {
            MetadataCode::Name => {
                self.pending_name = Some(record.operands().string());
                return Ok(());
            }
            MetadataCode::Kind => return self.parse_kind_record(record),
            MetadataCode::NamedNode => {
                let name = self
                    .pending_name
                    .take()
                    .ok_or(Error::InvalidRecord("named metadata without a name"))?;
                let operands = values
                    .iter()
                    .map(|&i| {
                        u32::try_from(i)
                            .map(MetadataRef::from_index)
                            .map_err(|_| Error::UnknownMetadata(i))
                    })
                    .collect::<Result<_>>()?;
                self.named.push(NamedMetadata { name, operands });
                return Ok(());
            }
            MetadataCode::Strings => {
                let strings = parse_strings(&ops, record.blob())?;
                self.nodes.extend(strings.into_iter().map(Metadata::String));
                return Ok(());
            }
            MetadataCode::GlobalDeclAttachment => {
                if values.len() % 2 == 0 {
                    return Err(Error::InvalidRecord("global attachment"));
                }
                let value = ops.u32(0)?;
                let attachments = values[1..]
                    .chunks_exact(2)
                    .map(|pair| {
                        let node = u32::try_from(pair[1]).map_err(|_| Error::UnknownMetadata(pair[1]))?;
                        Ok((pair[0], MetadataRef::from_index(node)))
                    })
                    .collect::<Result<_>>()?;
                self.global_attachments.push(GlobalAttachment { value, attachments });
                return Ok(());
            }
            MetadataCode::Attachment | MetadataCode::Index | MetadataCode::IndexOffset => {
                return Ok(());
            }
            MetadataCode::StringOld => Metadata::String(record.operands().string()),
            MetadataCode::Value => {
                ops.require(2, "metadata value")?;
                Metadata::Value {
                    ty: types.resolve(ops.get(0))?,
                    value: ops.u32(1)?,
                }
            }
            MetadataCode::Node | MetadataCode::DistinctNode => Metadata::Node {
                distinct: code == MetadataCode::DistinctNode,
                operands: values
                    .iter()
                    .map(|&raw| MetadataRef::from_raw(raw))
                    .collect::<Result<_>>()?,
            },
            MetadataCode::Location => {
                ops.require(5, "location")?;
                Metadata::Location(Location {
                    distinct,
                    line: ops.u32(1)?,
                    column: ops.u32(2)?,
                    // The scope is never null and is written without the +1.
                    scope: MetadataRef::from_index(ops.u32(3)?),
                    inlined_at: ops.md(4)?,
                    implicit_code: ops.flag(5),
                })
            }
            MetadataCode::File => {
                ops.require(3, "file")?;
                Metadata::File(File {
                    distinct,
                    filename: ops.md(1)?,
                    directory: ops.md(2)?,
                    checksum: match ops.get(3) {
                        0 => None,
                        kind => Some((kind, ops.md(4)?)),
                    },
                    source: ops.md(5)?,
                })
            }
            MetadataCode::CompileUnit => {
                ops.require(14, "compile unit")?;
                Metadata::CompileUnit(CompileUnit {
                    language: ops.u32(1)?,
                    file: ops.md(2)?,
                    producer: ops.md(3)?,
                    optimized: ops.flag(4),
                    flags: ops.md(5)?,
                    runtime_version: ops.u32(6)?,
                    split_debug_filename: ops.md(7)?,
                    emission_kind: ops.u32(8)?,
                    enums: ops.md(9)?,
                    retained_types: ops.md(10)?,
                    subprograms: ops.md(11)?,
                    globals: ops.md(12)?,
                    imports: ops.md(13)?,
                    dwo_id: ops.get(14),
                    macros: ops.md(15)?,
                })
            }
            MetadataCode::Subprogram => {
                ops.require(7, "subprogram")?;
                Metadata::Subprogram(parse_subprogram(&ops, distinct)?)
            }
            MetadataCode::BasicType => {
                ops.require(6, "basic type")?;
                Metadata::BasicType(BasicType {
                    tag: ops.u32(1)?,
                    name: ops.md(2)?,
                    size: ops.get(3),
                    align: ops.u32(4)?,
                    encoding: ops.u32(5)?,
                })
            }
            MetadataCode::DerivedType => {
                ops.require(12, "derived type")?;
                Metadata::DerivedType(DerivedType {
                    tag: ops.u32(1)?,
                    name: ops.md(2)?,
                    file: ops.md(3)?,
                    line: ops.u32(4)?,
                    scope: ops.md(5)?,
                    base_type: ops.md(6)?,
                    size: ops.get(7),
                    align: ops.u32(8)?,
                    offset: ops.get(9),
                    flags: ops.get(10),
                    extra_data: ops.md(11)?,
                })
            }
            MetadataCode::CompositeType => {
                ops.require(16, "composite type")?;
                Metadata::CompositeType(CompositeType {
                    tag: ops.u32(1)?,
                    name: ops.md(2)?,
                    file: ops.md(3)?,
                    line: ops.u32(4)?,
                    scope: ops.md(5)?,
                    base_type: ops.md(6)?,
                    size: ops.get(7),
                    align: ops.u32(8)?,
                    offset: ops.get(9),
                    flags: ops.get(10),
                    elements: ops.md(11)?,
                    runtime_lang: ops.u32(12)?,
                    vtable_holder: ops.md(13)?,
                    template_params: ops.md(14)?,
                    identifier: ops.md(15)?,
                })
            }
            MetadataCode::SubroutineType => {
                ops.require(3, "subroutine type")?;
                Metadata::SubroutineType(SubroutineType {
                    flags: ops.get(1),
                    types: ops.md(2)?,
                    calling_convention: ops.u32(3)?,
                })
            }
            MetadataCode::LexicalBlock => {
                ops.require(5, "lexical block")?;
                Metadata::LexicalBlock(LexicalBlock {
                    scope: ops.md(1)?,
                    file: ops.md(2)?,
                    line: ops.u32(3)?,
                    column: ops.u32(4)?,
                })
            }
            MetadataCode::GlobalVar => {
                ops.require(9, "global variable")?;
                Metadata::GlobalVariable(GlobalVariable {
                    scope: ops.md(1)?,
                    name: ops.md(2)?,
                    linkage_name: ops.md(3)?,
                    file: ops.md(4)?,
                    line: ops.u32(5)?,
                    ty: ops.md(6)?,
                    local: ops.flag(7),
                    definition: ops.flag(8),
                })
            }
            MetadataCode::LocalVar => {
                ops.require(8, "local variable")?;
                // Before alignment was added the tag was still written out.
                let has_alignment = ops.get(0) & 2 != 0;
                let shift = usize::from(!has_alignment && values.len() > 8);
                Metadata::LocalVariable(LocalVariable {
                    scope: ops.md(1 + shift)?,
                    name: ops.md(2 + shift)?,
                    file: ops.md(3 + shift)?,
                    line: ops.u32(4 + shift)?,
                    ty: ops.md(5 + shift)?,
                    arg: ops.u32(6 + shift)?,
                    flags: ops.get(7 + shift),
                })
            }
            MetadataCode::Expression => {
                ops.require(1, "expression")?;
                let version = ops.get(0) >> 1;
                let elements = &values[1..];
                Metadata::Expression(if self.upgrade_expressions {
                    Expression {
                        distinct,
                        version: version.max(CURRENT_EXPRESSION_VERSION),
                        elements: expression::upgrade(version, elements),
                    }
                } else {
                    Expression {
                        distinct,
                        version,
                        elements: elements.to_vec(),
                    }
                })
            }
            MetadataCode::GlobalVarExpr => {
                ops.require(2, "global variable expression")?;
                Metadata::GlobalVariableExpression {
                    distinct,
                    variable: ops.md(1)?,
                    expression: ops.md(2)?,
                }
            }
            _ => {
                debug!("metadata record {code:?} kept opaque");
                Metadata::Unknown { code: record.id }
            }
        };
        self.nodes.push(node);
        Ok(())
    }

    /// Named metadata uses plain indices, so they are checked once every
    /// node is known.
    pub(crate) fn finish(&self) -> Result<()> {
        let len = self.nodes.len();
        for named in &self.named {
            if let Some(index) = named
                .operands
                .iter()
                .filter_map(|r| r.index())
                .find(|&i| i as usize >= len)
            {
                return Err(Error::UnknownMetadata(u64::from(index)));
            }
        }
        Ok(())
    }
}

/// Two layouts exist. When bit 2 of the first operand is set, the
/// definition/local/optimized bits are packed into one flag word:
/// `[distinct, scope, name, linkage_name, file, line, type, scope_line,
/// containing_type, sp_flags, virtual_index, flags, unit, ...]`.
/// Otherwise they are separate operands:
/// `[distinct, scope, name, linkage_name, file, line, type, is_local,
/// is_definition, scope_line, containing_type, virtuality, virtual_index,
/// flags, is_optimized, unit, ...]`.
fn parse_subprogram(ops: &Ops<'_>, distinct: bool) -> Result<Subprogram> {
    const SP_FLAG_DEFINITION: u64 = 1 << 3;
    let has_sp_flags = ops.get(0) & 4 != 0;
    let (scope_line, containing_type, flags, definition, unit) = if has_sp_flags {
        (
            ops.u32(7)?,
            ops.md(8)?,
            ops.get(11),
            ops.get(9) & SP_FLAG_DEFINITION != 0,
            ops.md(12)?,
        )
    } else {
        (ops.u32(9)?, ops.md(10)?, ops.get(13), ops.flag(8), ops.md(15)?)
    };
    Ok(Subprogram {
        distinct,
        scope: ops.md(1)?,
        name: ops.md(2)?,
        linkage_name: ops.md(3)?,
        file: ops.md(4)?,
        line: ops.u32(5)?,
        ty: ops.md(6)?,
        scope_line,
        containing_type,
        flags,
        definition,
        unit,
    })
}

/// `[count, offset]` followed by a blob holding `count` vbr6 lengths, then
/// the characters starting at byte `offset`.
fn parse_strings(ops: &Ops<'_>, blob: Option<&[u8]>) -> Result<Vec<String>> {
    let invalid = || Error::InvalidRecord("metadata strings");
    ops.require(2, "metadata strings")?;
    let blob = blob.ok_or_else(invalid)?;
    let count = usize::try_from(ops.get(0)).map_err(|_| invalid())?;
    let offset = usize::try_from(ops.get(1)).map_err(|_| invalid())?;
    if count == 0 || offset > blob.len() {
        return Err(invalid());
    }
    let (lengths, mut chars) = blob.split_at(offset);
    let mut cursor = Cursor::new(lengths);
    let mut strings = Vec::with_capacity(count.min(chars.len()));
    for _ in 0..count {
        let (length, next) = cursor.read_vbr(6).map_err(|_| invalid())?;
        cursor = next;
        let length = usize::try_from(length).map_err(|_| invalid())?;
        if length > chars.len() {
            return Err(invalid());
        }
        let (s, rest) = chars.split_at(length);
        strings.push(String::from_utf8_lossy(s).into_owned());
        chars = rest;
    }
    Ok(strings)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bitcode::Payload;

    fn record(code: MetadataCode, fields: &[u64]) -> Record {
        Record::new(code as u64, fields.to_vec())
    }

    fn chars(s: &str) -> Vec<u64> {
        s.bytes().map(u64::from).collect()
    }

    #[test]
    fn null_reference_resolves_to_void() {
        let table = MetadataTable::new();
        assert_eq!(MetadataRef::from_raw(0).unwrap(), MetadataRef::NULL);
        assert_eq!(MetadataRef::NULL.resolve(&table), &Metadata::Void);
        assert_eq!(MetadataRef::from_index(3).resolve(&table), &Metadata::Void);
    }

    #[test]
    fn bulk_strings_define_one_node_each() {
        // vbr6 lengths 3 and 4 packed LSB first: 0b000100_000011
        let blob = vec![0x03, 0x01, 0, 0, b'a', b'b', b'c', b'm', b'a', b'i', b'n'];
        let strings = Record::with_payload(
            MetadataCode::Strings as u64,
            vec![2, 4],
            Payload::Blob(blob),
        );
        let mut table = MetadataTable::new();
        table.parse_record(&strings, &TypeTable::new()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.string(MetadataRef::from_index(0)), Some("abc"));
        assert_eq!(table.string(MetadataRef::from_index(1)), Some("main"));
    }

    #[test]
    fn named_node_takes_preceding_name() {
        let types = TypeTable::new();
        let mut table = MetadataTable::new();
        table
            .parse_record(&record(MetadataCode::StringOld, &chars("x")), &types)
            .unwrap();
        table
            .parse_record(&record(MetadataCode::Node, &[1, 0]), &types)
            .unwrap();
        table
            .parse_record(&record(MetadataCode::Name, &chars("llvm.ident")), &types)
            .unwrap();
        table
            .parse_record(&record(MetadataCode::NamedNode, &[1]), &types)
            .unwrap();
        table.finish().unwrap();

        let named = table.named_node("llvm.ident").unwrap();
        assert_eq!(named.operands, vec![MetadataRef::from_index(1)]);
        assert_eq!(
            named.operands[0].resolve(&table),
            &Metadata::Node {
                distinct: false,
                operands: vec![MetadataRef::from_index(0), MetadataRef::NULL],
            }
        );
    }

    #[test]
    fn location_scope_is_a_direct_index() {
        let mut table = MetadataTable::new();
        table
            .parse_record(&record(MetadataCode::Location, &[0, 12, 5, 0, 0]), &TypeTable::new())
            .unwrap();
        let Some(Metadata::Location(location)) = table.get(MetadataRef::from_index(0)) else {
            panic!("expected a location");
        };
        assert_eq!(location.scope, MetadataRef::from_index(0));
        assert!(location.inlined_at.is_null());
        assert_eq!((location.line, location.column), (12, 5));
    }

    #[test]
    fn expression_upgrade_follows_options() {
        use crate::ir::expression::{DW_OP_PLUS, DW_OP_PLUS_UCONST};

        let old = record(MetadataCode::Expression, &[2 << 1, DW_OP_PLUS, 4]);
        let types = TypeTable::new();

        let mut upgraded = MetadataTable::new();
        upgraded.parse_record(&old, &types).unwrap();
        assert_eq!(
            upgraded.get(MetadataRef::from_index(0)),
            Some(&Metadata::Expression(Expression {
                distinct: false,
                version: CURRENT_EXPRESSION_VERSION,
                elements: vec![DW_OP_PLUS_UCONST, 4],
            }))
        );

        let mut raw = MetadataTable::with_expression_upgrade(false);
        raw.parse_record(&old, &types).unwrap();
        assert_eq!(
            raw.get(MetadataRef::from_index(0)),
            Some(&Metadata::Expression(Expression {
                distinct: false,
                version: 2,
                elements: vec![DW_OP_PLUS, 4],
            }))
        );
    }

    #[test]
    fn unknown_code_keeps_numbering() {
        let types = TypeTable::new();
        let mut table = MetadataTable::new();
        table.parse_record(&Record::new(200, vec![1]), &types).unwrap();
        table
            .parse_record(&record(MetadataCode::StringOld, &chars("after")), &types)
            .unwrap();
        assert_eq!(
            table.get(MetadataRef::from_index(0)),
            Some(&Metadata::Unknown { code: 200 })
        );
        assert_eq!(table.string(MetadataRef::from_index(1)), Some("after"));
    }

    #[test]
    fn named_node_with_dangling_operand_fails_finish() {
        let types = TypeTable::new();
        let mut table = MetadataTable::new();
        table
            .parse_record(&record(MetadataCode::Name, &chars("n")), &types)
            .unwrap();
        table
            .parse_record(&record(MetadataCode::NamedNode, &[4]), &types)
            .unwrap();
        assert!(matches!(table.finish(), Err(Error::UnknownMetadata(4))));
    }
}
