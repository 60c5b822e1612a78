use std::collections::HashMap;
use std::collections::hash_map::Entry;

use log::{debug, trace, warn};

use super::attributes::{AttributeList, AttributeTable};
use super::constants::ConstantsParser;
use super::declarations::{self, Function, GlobalValue, IndirectKind, NameLists, StrtabRef};
use super::metadata::MetadataTable;
use super::symbol::{Symbol, SymbolId, SymbolKind};
use super::symbol_table::SymbolTable;
use super::types::TypeTable;
use super::{Error, Result};
use crate::bitcode::{Bitcode, Payload, Record};
use crate::data_layout::{DataLayout, LayoutError};
use crate::schema::blocks::{
    BlockId, IdentificationCode, ModuleCode, StrtabCode, ValueSymtabCode,
};
use crate::visitor::BitStreamVisitor;

/// Newest `MODULE_CODE_VERSION` this parser understands.
const MAX_MODULE_VERSION: u64 = 2;

/// Knobs for [`Module::parse_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Upper bound on value indices. Defaults to the stream size in bits.
    pub max_values: Option<u32>,
    /// Decode `METADATA` and `METADATA_KIND` blocks. When off they are
    /// skipped by length.
    pub parse_metadata: bool,
    /// Rewrite old `DIExpression` encodings while decoding.
    pub upgrade_debug_info: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_values: None,
            parse_metadata: true,
            upgrade_debug_info: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_values(mut self, max_values: u32) -> Self {
        self.max_values = Some(max_values);
        self
    }

    #[must_use]
    pub fn parse_metadata(mut self, parse_metadata: bool) -> Self {
        self.parse_metadata = parse_metadata;
        self
    }

    #[must_use]
    pub fn upgrade_debug_info(mut self, upgrade_debug_info: bool) -> Self {
        self.upgrade_debug_info = upgrade_debug_info;
        self
    }
}

/// Contents of the `IDENTIFICATION` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identification {
    pub producer: String,
    pub epoch: Option<u64>,
}

/// A decoded module.
///
/// Every symbol is owned by [`symbols`](Self::symbols); functions and
/// globals are listed in declaration order by handle. A successfully parsed
/// module has no placeholders left.
#[derive(Debug, Clone)]
pub struct Module {
    pub version: u64,
    pub triple: String,
    /// The layout string as written. See [`Module::layout`].
    pub data_layout: String,
    pub source_filename: Option<String>,
    pub identification: Option<Identification>,
    pub section_names: Vec<String>,
    pub gc_names: Vec<String>,
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub attributes: AttributeTable,
    pub metadata: MetadataTable,
    globals: Vec<SymbolId>,
    functions: Vec<SymbolId>,
}

impl Module {
    /// Parses a module with the default [`ParseOptions`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, &ParseOptions::default())
    }

    pub fn parse_with(data: &[u8], options: &ParseOptions) -> Result<Self> {
        let limit = options.max_values.unwrap_or_else(|| {
            u32::try_from(data.len().saturating_mul(8)).unwrap_or(u32::MAX)
        });
        let mut parser = ModuleParser::new(options, limit);
        Bitcode::read(data, &mut parser)?;
        parser.finish()
    }

    /// The target data layout, parsed.
    pub fn layout(&self) -> Result<DataLayout, LayoutError> {
        DataLayout::parse(&self.data_layout)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.symbols.symbol(id)
    }

    /// Global variables, aliases and ifuncs in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = (SymbolId, &GlobalValue)> {
        self.globals
            .iter()
            .filter_map(|&id| Some((id, self.symbol(id).as_global()?)))
    }

    /// Functions in declaration order. A definition takes the place of an
    /// earlier declaration with the same name and type.
    pub fn functions(&self) -> impl Iterator<Item = (SymbolId, &Function)> {
        self.functions
            .iter()
            .filter_map(|&id| Some((id, self.symbol(id).as_function()?)))
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions()
            .map(|(_, f)| f)
            .find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalValue> {
        self.globals().map(|(_, g)| g).find(|g| g.name == name)
    }

    pub fn is_definition(&self, id: SymbolId) -> bool {
        matches!(self.symbol(id).kind, SymbolKind::FunctionDefinition(_))
    }

    /// Parameter, return and function attributes of `function`.
    pub fn attributes_of(&self, function: &Function) -> Option<&AttributeList> {
        self.attributes.list(function.attributes?)
    }
}

/// Routes each block's records to the table that owns them.
struct ModuleParser<'a> {
    options: &'a ParseOptions,
    module: Module,
    seen_module_block: bool,
    constants: ConstantsParser,
    /// Symbols named through the string table, resolved once it is read.
    pending_names: Vec<(SymbolId, StrtabRef)>,
    strtab: Option<Vec<u8>>,
}

impl<'a> ModuleParser<'a> {
    fn new(options: &'a ParseOptions, limit: u32) -> Self {
        Self {
            options,
            module: Module {
                version: 0,
                triple: String::new(),
                data_layout: String::new(),
                source_filename: None,
                identification: None,
                section_names: Vec::new(),
                gc_names: Vec::new(),
                types: TypeTable::new(),
                symbols: SymbolTable::with_limit(limit),
                attributes: AttributeTable::new(),
                metadata: MetadataTable::with_expression_upgrade(options.upgrade_debug_info),
                globals: Vec::new(),
                functions: Vec::new(),
            },
            seen_module_block: false,
            constants: ConstantsParser::new(),
            pending_names: Vec::new(),
            strtab: None,
        }
    }

    fn parse_identification_record(&mut self, record: &Record) -> Result<()> {
        let identification = self.module.identification.get_or_insert_with(Default::default);
        let mut ops = record.operands();
        match u8::try_from(record.id)
            .ok()
            .and_then(|c| IdentificationCode::try_from(c).ok())
        {
            Some(IdentificationCode::String) => identification.producer = ops.string(),
            Some(IdentificationCode::Epoch) => identification.epoch = Some(ops.u64()?),
            None => debug!("ignoring identification record {}", record.id),
        }
        Ok(())
    }

    fn parse_module_record(&mut self, record: &Record) -> Result<()> {
        let Some(code) = u8::try_from(record.id)
            .ok()
            .and_then(|c| ModuleCode::try_from(c).ok())
        else {
            debug!("ignoring unknown module record {}", record.id);
            return Ok(());
        };
        let mut ops = record.operands();
        let module = &mut self.module;
        match code {
            ModuleCode::Version => {
                let version = ops.u64()?;
                if version > MAX_MODULE_VERSION {
                    return Err(Error::UnsupportedVersion(version));
                }
                module.version = version;
            }
            ModuleCode::Triple => module.triple = ops.string(),
            ModuleCode::Datalayout => module.data_layout = ops.string(),
            ModuleCode::SourceFilename => module.source_filename = Some(ops.string()),
            ModuleCode::SectionName => module.section_names.push(ops.string()),
            ModuleCode::GCName => module.gc_names.push(ops.string()),
            ModuleCode::GlobalVar
            | ModuleCode::Function
            | ModuleCode::Alias
            | ModuleCode::AliasOld
            | ModuleCode::Ifunc => {
                let name = if module.version >= 2 {
                    Some(StrtabRef::read(&mut ops)?)
                } else {
                    None
                };
                let names = NameLists {
                    sections: &module.section_names,
                    gc_names: &module.gc_names,
                };
                let (symbols, types) = (&mut module.symbols, &module.types);
                let id = match code {
                    ModuleCode::GlobalVar => {
                        declarations::parse_global_var(&mut ops, names, symbols, types)?
                    }
                    ModuleCode::Function => {
                        declarations::parse_function(&mut ops, names, symbols, types)?
                    }
                    ModuleCode::AliasOld => {
                        declarations::parse_indirect(IndirectKind::AliasOld, &mut ops, symbols, types)?
                    }
                    ModuleCode::Alias => {
                        declarations::parse_indirect(IndirectKind::Alias, &mut ops, symbols, types)?
                    }
                    _ => declarations::parse_indirect(IndirectKind::IFunc, &mut ops, symbols, types)?,
                };
                let index = symbols.push(id)?;
                trace!("value {index} declared by {code:?}");
                if code == ModuleCode::Function {
                    module.functions.push(id);
                } else {
                    module.globals.push(id);
                }
                if let Some(name) = name {
                    self.pending_names.push((id, name));
                }
            }
            _ => debug!("ignoring module record {code:?}"),
        }
        Ok(())
    }

    /// Names for modules older than version 2, which have no string table.
    fn parse_symtab_record(&mut self, record: &Record) -> Result<()> {
        let mut ops = record.operands();
        let (value, name) = match u8::try_from(record.id)
            .ok()
            .and_then(|c| ValueSymtabCode::try_from(c).ok())
        {
            // [valueid, namechar x N]
            Some(ValueSymtabCode::Entry) => (ops.u64()?, ops.string()),
            // [valueid, offset, namechar x N]
            Some(ValueSymtabCode::FnEntry) => {
                let value = ops.u64()?;
                let _offset = ops.u64()?;
                (value, ops.string())
            }
            _ => {
                debug!("ignoring value symbol table record {}", record.id);
                return Ok(());
            }
        };
        // Version 2 writers still emit function offsets, without names.
        if name.is_empty() {
            return Ok(());
        }
        let symbols = &mut self.module.symbols;
        let id = u32::try_from(value)
            .ok()
            .and_then(|index| symbols.get(index))
            .ok_or(Error::SymbolOutOfRange {
                index: value,
                limit: symbols.limit(),
            })?;
        symbols.symbol_mut(id).set_name(name);
        Ok(())
    }

    fn finish(mut self) -> Result<Module> {
        if !self.seen_module_block {
            return Err(Error::MissingModuleBlock);
        }
        for (id, name) in std::mem::take(&mut self.pending_names) {
            let name = match (&self.strtab, name.size) {
                (_, 0) => String::new(),
                (Some(strtab), _) => name.resolve(strtab)?,
                (None, _) => return Err(Error::MissingStringTable),
            };
            self.module.symbols.symbol_mut(id).set_name(name);
        }
        self.module.symbols.finish()?;
        self.module.metadata.finish()?;
        self.module.functions = deduplicate_functions(&self.module.symbols, &self.module.functions);
        Ok(self.module)
    }
}

/// Keeps one symbol per named function, preferring a definition over a
/// declaration. Unnamed functions are never merged.
fn deduplicate_functions(symbols: &SymbolTable, functions: &[SymbolId]) -> Vec<SymbolId> {
    let mut seen: HashMap<&Function, usize> = HashMap::new();
    let mut unique = Vec::with_capacity(functions.len());
    for &id in functions {
        let symbol = symbols.symbol(id);
        let Some(function) = symbol.as_function() else {
            continue;
        };
        if function.name.is_empty() {
            unique.push(id);
            continue;
        }
        match seen.entry(function) {
            Entry::Occupied(slot) => {
                if matches!(symbol.kind, SymbolKind::FunctionDefinition(_)) {
                    unique[*slot.get()] = id;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(unique.len());
                unique.push(id);
            }
        }
    }
    unique
}

impl BitStreamVisitor for ModuleParser<'_> {
    type Error = Error;

    fn should_enter_block(&mut self, id: u64) -> bool {
        let enter = match BlockId::from_id(id) {
            Some(BlockId::Module) => {
                if self.seen_module_block {
                    warn!("only the first module in a stream is decoded");
                    false
                } else {
                    self.seen_module_block = true;
                    true
                }
            }
            Some(BlockId::Constants) => {
                self.constants = ConstantsParser::new();
                true
            }
            Some(
                BlockId::Identification
                | BlockId::Type
                | BlockId::ParamAttr
                | BlockId::ParamAttrGroup
                | BlockId::ValueSymtab
                | BlockId::Strtab,
            ) => true,
            Some(BlockId::Metadata | BlockId::MetadataKind) => self.options.parse_metadata,
            _ => false,
        };
        if !enter {
            debug!("skipping block {id}");
        }
        enter
    }

    fn did_exit_block(&mut self, id: u64) -> Result<()> {
        if BlockId::from_id(id) == Some(BlockId::Type) {
            self.module.types.finish()?;
        }
        Ok(())
    }

    fn visit(&mut self, block_id: u64, mut record: Record) -> Result<()> {
        match BlockId::from_id(block_id) {
            Some(BlockId::Module) => self.parse_module_record(&record),
            Some(BlockId::Identification) => self.parse_identification_record(&record),
            Some(BlockId::Type) => self.module.types.parse_record(&record),
            Some(BlockId::Constants) => {
                let module = &mut self.module;
                self.constants
                    .parse_record(&mut module.symbols, &module.types, &record)
            }
            Some(BlockId::ParamAttrGroup) => self.module.attributes.parse_group_record(&record),
            Some(BlockId::ParamAttr) => self.module.attributes.parse_list_record(&record),
            Some(BlockId::ValueSymtab) => self.parse_symtab_record(&record),
            Some(BlockId::Metadata) => {
                let module = &mut self.module;
                module.metadata.parse_record(&record, &module.types)
            }
            Some(BlockId::MetadataKind) => self.module.metadata.parse_kind_record(&record),
            Some(BlockId::Strtab) if record.id == StrtabCode::Blob as u64 => {
                match record.take_payload() {
                    Some(Payload::Blob(blob)) => {
                        self.strtab = Some(blob);
                        Ok(())
                    }
                    _ => Err(Error::InvalidRecord("string table")),
                }
            }
            _ => {
                debug!("ignoring record {} in block {block_id}", record.id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    #[test]
    fn default_options_decode_everything() {
        let options = ParseOptions::default();
        assert_eq!(options.max_values, None);
        assert!(options.parse_metadata);
        assert!(options.upgrade_debug_info);

        let options = ParseOptions::new()
            .max_values(16)
            .parse_metadata(false)
            .upgrade_debug_info(false);
        assert_eq!(options.max_values, Some(16));
        assert!(!options.parse_metadata);
        assert!(!options.upgrade_debug_info);
    }

    #[test]
    fn rejects_foreign_magic() {
        let err = Module::parse(b"\x7fELF\x02\x01\x01\x00").unwrap_err();
        assert!(matches!(
            err,
            Error::Read(read::Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn stream_without_module_block_is_an_error() {
        // Magic word only.
        let err = Module::parse(&[b'B', b'C', 0xC0, 0xDE]).unwrap_err();
        assert!(matches!(err, Error::MissingModuleBlock));
    }
}
