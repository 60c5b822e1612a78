use std::collections::HashMap;

use thiserror::Error;

use crate::bits::Cursor;
use crate::read::{BitStreamReader, Error};
use crate::visitor::{BitStreamVisitor, CollectingVisitor};

/// Magic of the optional wrapper header placed in front of the stream.
pub const BITCODE_WRAPPER_MAGIC: u32 = 0x0B17_C0DE;

/// `'B' 'C' 0xC0DE`, the magic of a raw LLVM IR bitcode stream.
pub const LLVM_IR_MAGIC: u32 = 0xDEC0_4342;

/// Represents the contents of a file encoded using the
/// [LLVM bitstream container format](https://llvm.org/docs/BitCodeFormat.html#bitstream-container-format)
#[derive(Debug, Clone)]
pub struct Bitcode {
    pub signature: Signature,
    pub elements: Vec<BitcodeElement>,
    pub block_info: HashMap<u64, BlockInfo>,
}

/// Blocks in a bitstream denote nested regions of the stream,
/// and are identified by a content-specific id number
///
/// Block IDs 0-7 are reserved for [standard blocks](https://llvm.org/docs/BitCodeFormat.html#standard-blocks)
/// whose meaning is defined by Bitcode;
/// block IDs 8 and greater are application specific.
#[derive(Debug, Clone)]
pub struct Block {
    /// Block ID
    pub id: u64,
    /// Block elements
    pub elements: Vec<BitcodeElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Array(Vec<u64>),
    Char6String(String),
    Blob(Vec<u8>),
}

/// A record operand was missing or out of range for the requested width.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("record {record} has no operand {index}")]
    Missing { record: u64, index: usize },
    #[error("operand {index} of record {record} does not fit: {value}")]
    OutOfRange { record: u64, index: usize, value: u64 },
}

/// Data records consist of a record code and a number of (up to) 64-bit integer values
///
/// The interpretation of the code and values is application specific and may vary between different block types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record code
    pub id: u64,
    /// Scalar operands, in stream order
    pub(crate) fields: Vec<u64>,
    /// Array and Blob encoding has payload
    pub(crate) payload: Option<Payload>,
}

impl Record {
    pub fn new(id: u64, fields: Vec<u64>) -> Self {
        Self {
            id,
            fields,
            payload: None,
        }
    }

    pub fn with_payload(id: u64, fields: Vec<u64>, payload: Payload) -> Self {
        Self {
            id,
            fields,
            payload: Some(payload),
        }
    }

    pub fn fields(&self) -> &[u64] {
        &self.fields
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    pub fn blob(&self) -> Option<&[u8]> {
        match &self.payload {
            Some(Payload::Blob(blob)) => Some(blob),
            _ => None,
        }
    }

    /// Characters of the scalar operands starting at `start_at`.
    pub fn string(&self, start_at: usize) -> String {
        self.fields
            .iter()
            .skip(start_at)
            .map(|&x| {
                u32::try_from(x)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{fffd}')
            })
            .collect()
    }

    /// All operands, with an array payload flattened onto the scalar ones.
    /// This is how the IR layer sees a record regardless of whether it was
    /// abbreviated.
    pub fn operands(&self) -> Fields {
        let mut values = self.fields.clone();
        match &self.payload {
            Some(Payload::Array(elements)) => values.extend_from_slice(elements),
            Some(Payload::Char6String(s)) => values.extend(s.bytes().map(u64::from)),
            Some(Payload::Blob(_)) | None => {}
        }
        Fields {
            record: self.id,
            values,
            position: 0,
        }
    }
}

/// Sequential, typed access to a record's operands.
#[derive(Debug, Clone)]
pub struct Fields {
    record: u64,
    values: Vec<u64>,
    position: usize,
}

impl Fields {
    /// Number of operands not consumed yet.
    pub fn len(&self) -> usize {
        self.values.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next(&mut self) -> Option<u64> {
        let value = self.values.get(self.position).copied()?;
        self.position += 1;
        Some(value)
    }

    pub fn u64(&mut self) -> Result<u64, FieldError> {
        self.next().ok_or(FieldError::Missing {
            record: self.record,
            index: self.position,
        })
    }

    pub fn u32(&mut self) -> Result<u32, FieldError> {
        self.narrow()
    }

    pub fn bool(&mut self) -> Result<bool, FieldError> {
        Ok(self.u64()? != 0)
    }

    /// The operand if present, zero otherwise. Trailing operands that older
    /// writers did not emit read as zero.
    pub fn u64_or_default(&mut self) -> u64 {
        self.next().unwrap_or_default()
    }

    /// An operand written as `index + 1`, where zero means "none".
    pub fn index_plus_one(&mut self) -> Result<Option<u64>, FieldError> {
        Ok(self.u64()?.checked_sub(1))
    }

    /// A signed VBR operand: the magnitude is shifted left by one and the
    /// sign is stored in the low bit.
    pub fn i64(&mut self) -> Result<i64, FieldError> {
        Ok(decode_signed(self.u64()?))
    }

    /// Remaining operands as characters.
    pub fn string(&mut self) -> String {
        let s = self.values[self.position..]
            .iter()
            .map(|&x| {
                u32::try_from(x)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{fffd}')
            })
            .collect();
        self.position = self.values.len();
        s
    }

    /// A run of characters terminated by a zero operand (or the end).
    pub fn zstring(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.next() {
            if c == 0 {
                break;
            }
            s.push(
                u32::try_from(c)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{fffd}'),
            );
        }
        s
    }

    pub fn rest(&mut self) -> Vec<u64> {
        let rest = self.values[self.position..].to_vec();
        self.position = self.values.len();
        rest
    }

    fn narrow<T: TryFrom<u64>>(&mut self) -> Result<T, FieldError> {
        let index = self.position;
        let value = self.u64()?;
        T::try_from(value).map_err(|_| FieldError::OutOfRange {
            record: self.record,
            index,
            value,
        })
    }
}

/// Undoes the sign-in-low-bit encoding used for signed record operands.
pub fn decode_signed(value: u64) -> i64 {
    if value & 1 == 0 {
        (value >> 1) as i64
    } else if value != 1 {
        -((value >> 1) as i64)
    } else {
        // "-0" stands for the most negative value
        i64::MIN
    }
}

/// Bitcode element
#[derive(Debug, Clone)]
pub enum BitcodeElement {
    /// Block
    Block(Block),
    /// Data record
    Record(Record),
}

impl BitcodeElement {
    /// Returns true if it is a `Block`
    #[must_use]
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }

    /// If it is a `Block`, returns the associated block. Returns `None` otherwise.
    #[must_use]
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Self::Block(block) => Some(block),
            Self::Record(_) => None,
        }
    }

    /// Returns true if it is a `Record`
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    /// If it is a `Record`, returns the associated record. Returns `None` otherwise.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Block(_) => None,
            Self::Record(record) => Some(record),
        }
    }
}

/// Block information
#[derive(Debug, Clone, Default)]
pub struct BlockInfo {
    /// Block name
    pub name: String,
    /// Data record names
    pub record_names: HashMap<u64, String>,
}

/// Fields of the optional wrapper header. All are little-endian 32-bit
/// words; `offset` and `size` count bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperHeader {
    pub version: u32,
    pub offset: u32,
    pub size: u32,
    pub cpu_type: u32,
}

/// Where the bitstream lives inside the input, and the magic found there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub wrapper: Option<WrapperHeader>,
    /// Magic word at the start of the stream proper
    pub magic: u32,
    /// Bit offset of the magic word
    pub start_bit: usize,
    /// Bit offset one past the end of the stream
    pub end_bit: usize,
}

impl Signature {
    /// Detects the wrapper header and reads the stream magic.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let cursor = Cursor::new(data);
        let first = cursor.peek(32)? as u32;
        let (wrapper, start_bit, end_bit) = if first == BITCODE_WRAPPER_MAGIC {
            let (_, cursor) = cursor.read(32)?;
            let (version, cursor) = cursor.read(32)?;
            let (offset, cursor) = cursor.read(32)?;
            let (size, cursor) = cursor.read(32)?;
            let (cpu_type, _) = cursor.read(32)?;
            let header = WrapperHeader {
                version: version as u32,
                offset: offset as u32,
                size: size as u32,
                cpu_type: cpu_type as u32,
            };
            let start = offset as usize * 8;
            let end = start + size as usize * 8;
            if end > cursor.size() {
                return Err(Error::TruncatedWrapper {
                    declared_end: end / 8,
                    actual: data.len(),
                });
            }
            (Some(header), start, end)
        } else {
            (None, 0, cursor.size())
        };
        let (magic, _) = Cursor::with_range(data, start_bit, end_bit).read(32)?;
        Ok(Self {
            wrapper,
            magic: magic as u32,
            start_bit,
            end_bit,
        })
    }

    /// Whether the stream is LLVM IR rather than some other bitstream
    /// format (for example serialized clang diagnostics).
    #[must_use]
    pub fn is_llvm_ir(&self) -> bool {
        self.magic == LLVM_IR_MAGIC
    }

    /// Cursor positioned right after the magic word.
    pub fn stream<'a>(&self, data: &'a [u8]) -> Cursor<'a> {
        Cursor::with_range(data, self.start_bit + 32, self.end_bit)
    }
}

impl Bitcode {
    /// Parse bitcode from bytes
    ///
    /// Accepts both LLVM bitcode and bitcode wrapper formats, and any stream
    /// magic.
    pub fn new(data: &[u8]) -> Result<Self, Error> {
        let signature = Signature::parse(data)?;
        let mut reader = BitStreamReader::new(signature.stream(data));
        let mut visitor = CollectingVisitor::new();
        reader.read_stream(&mut visitor)?;
        Ok(Self {
            signature,
            elements: visitor.finalize_top_level_elements(),
            block_info: reader.block_info,
        })
    }

    /// Read bitcode from bytes with a visitor
    ///
    /// Accepts both LLVM bitcode and bitcode wrapper formats
    pub fn read<V>(data: &[u8], visitor: &mut V) -> Result<Signature, V::Error>
    where
        V: BitStreamVisitor,
    {
        let signature = Signature::parse(data)?;
        if !visitor.validate(&signature) {
            return Err(Error::InvalidSignature(signature.magic).into());
        }
        let mut reader = BitStreamReader::new(signature.stream(data));
        reader.read_stream(visitor)?;
        Ok(signature)
    }
}
