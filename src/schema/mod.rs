//! Numeric codes of the LLVM IR schema layered on top of the bitstream
//! container: block ids, record codes and the small enums found in record
//! operands.

pub mod blocks;
pub mod enums;
