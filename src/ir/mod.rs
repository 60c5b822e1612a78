//! The module graph: everything the `MODULE` block declares, decoded from
//! records into typed Rust values.

use thiserror::Error;

use crate::bitcode::FieldError;
use crate::read;

pub mod attributes;
pub mod constants;
pub mod declarations;
pub mod expression;
pub mod metadata;
pub mod module;
pub mod symbol;
pub mod symbol_table;
pub mod types;

pub use self::attributes::{Attribute, AttributeGroup, AttributeList, AttributePosition, AttributeTable};
pub use self::constants::{AggregateConstant, AggregateShape, BinaryOperationConstant, Constant};
pub use self::declarations::{Function, GlobalKind, GlobalValue};
pub use self::metadata::{Metadata, MetadataRef, MetadataTable};
pub use self::module::{Identification, Module, ParseOptions};
pub use self::symbol::{Symbol, SymbolId, SymbolKind};
pub use self::symbol_table::SymbolTable;
pub use self::types::{ScalarKind, Type, TypeId, TypeTable};

/// Errors raised while building a module from a well-formed bitstream.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] read::Error),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("value index {index} is outside the {limit} values the module may define")]
    SymbolOutOfRange { index: u64, limit: u32 },
    #[error("value {0} is defined twice")]
    Redefinition(u32),
    #[error("value {0} is referenced but never defined")]
    UnresolvedForwardReference(u32),
    #[error("symbol {0:?} still refers to a placeholder after the parse")]
    DanglingPlaceholder(SymbolId),
    #[error("type index {0} is not in the type table")]
    UnknownType(u64),
    #[error("type {ty:?} is not {expected}")]
    UnexpectedType { ty: TypeId, expected: &'static str },
    #[error("metadata index {0} is not defined")]
    UnknownMetadata(u64),
    #[error("attribute group {0} is not defined")]
    UnknownAttributeGroup(u64),
    #[error("malformed {0} record")]
    InvalidRecord(&'static str),
    #[error("constant defined before any SETTYPE record")]
    MissingConstantType,
    #[error("names refer to a string table but the stream has none")]
    MissingStringTable,
    #[error("string table reference {offset}+{size} is out of bounds")]
    StringTableOverrun { offset: u64, size: u64 },
    #[error("unsupported module version {0}")]
    UnsupportedVersion(u64),
    #[error("the stream contains no MODULE block")]
    MissingModuleBlock,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
