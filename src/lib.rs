//! Decodes LLVM bitcode into an in-memory module graph.
//!
//! The crate is layered. [`bits`] and [`read`] handle the generic bitstream
//! container, [`schema`] names the LLVM IR codes, and [`ir`] builds the
//! module: types, a symbol table with forward reference patching, constants,
//! declarations, attributes and debug metadata. [`data_layout`] answers size
//! and alignment queries for a target layout string.

pub mod bitcode;
pub mod bits;
pub mod bitstream;
pub mod data_layout;
pub mod ir;
pub mod read;
pub mod schema;
pub mod visitor;

pub use self::bitcode::Bitcode;
pub use self::data_layout::DataLayout;
pub use self::ir::{Module, ParseOptions};
pub use self::read::BitStreamReader;
pub use self::visitor::BitStreamVisitor;
