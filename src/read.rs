use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::bitcode::{BlockInfo, Payload, Record};
use crate::bits::{self, Cursor};
use crate::bitstream::{
    Abbreviation, BlockInfoCode, BuiltinAbbreviationId, FIRST_APPLICATION_ABBREV_ID, Operand,
    TOP_LEVEL_ABBREV_WIDTH,
};
use crate::visitor::BitStreamVisitor;

/// Bitstream reader errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid signature (magic number): 0x{0:08x}")]
    InvalidSignature(u32),
    #[error("wrapper header declares {declared_end} bytes but the input has {actual}")]
    TruncatedWrapper { declared_end: usize, actual: usize },
    #[error("invalid abbreviation")]
    InvalidAbbrev,
    #[error("abbreviation defined outside of any block")]
    AbbrevOutsideBlock,
    #[error("nested block in block info")]
    NestedBlockInBlockInfo,
    #[error("missing SETBID")]
    MissingSetBid,
    #[error("invalid block info record `{0}`")]
    InvalidBlockInfoRecord(u64),
    #[error("abbreviation width `{0}` is invalid")]
    AbbrevWidthTooSmall(usize),
    #[error("no such abbreviation `{abbrev_id}` in block `{block_id}`")]
    NoSuchAbbrev { block_id: u64, abbrev_id: u64 },
    #[error("missing end block for `{0}`")]
    MissingEndBlock(u64),
    #[error("END_BLOCK outside of any block")]
    UnexpectedEndBlock,
    #[error("block `{block_id}` ends at bit {actual}, its length field says {expected}")]
    BlockLengthMismatch {
        block_id: u64,
        expected: usize,
        actual: usize,
    },
    #[error("block `{block_id}` extends past its enclosing block")]
    BlockOverrun { block_id: u64 },
    #[error(transparent)]
    ReadBits(#[from] bits::Error),
}

/// One open block: its id, abbreviation width, abbreviation table, and the
/// bit offset its length field promises it ends at.
#[derive(Debug)]
struct Scope {
    block_id: u64,
    abbrev_width: usize,
    abbrevs: Vec<Rc<Abbreviation>>,
    end_bit: usize,
}

/// Bitstream reader
///
/// Drives a [`Cursor`] through the stream and turns it into block enter/exit
/// events and records for a [`BitStreamVisitor`]. The open blocks form an
/// explicit stack; an empty stack is the top level.
#[derive(Debug, Clone)]
pub struct BitStreamReader<'a> {
    cursor: Cursor<'a>,
    /// Block information
    pub(crate) block_info: HashMap<u64, BlockInfo>,
    blockinfo_abbrevs: HashMap<u64, Vec<Rc<Abbreviation>>>,
}

impl<'a> BitStreamReader<'a> {
    /// Top level fake block ID
    pub const TOP_LEVEL_BLOCK_ID: u64 = u64::MAX;

    /// Create a reader that starts at the cursor's position.
    pub fn new(cursor: Cursor<'a>) -> Self {
        Self {
            cursor,
            block_info: HashMap::new(),
            blockinfo_abbrevs: HashMap::new(),
        }
    }

    pub fn block_info(&self) -> &HashMap<u64, BlockInfo> {
        &self.block_info
    }

    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    fn fixed(&mut self, width: usize) -> Result<u64, Error> {
        let (value, next) = self.cursor.read(width)?;
        self.cursor = next;
        Ok(value)
    }

    fn vbr(&mut self, width: usize) -> Result<u64, Error> {
        let (value, next) = self.cursor.read_vbr(width)?;
        self.cursor = next;
        Ok(value)
    }

    fn align32(&mut self) -> Result<(), Error> {
        self.cursor = self.cursor.align(32)?;
        Ok(())
    }

    /// Read abbreviated operand
    fn read_abbrev_op(&mut self) -> Result<Operand, Error> {
        let is_literal = self.fixed(1)?;
        if is_literal == 1 {
            return Ok(Operand::Literal(self.vbr(8)?));
        }
        let op = match self.fixed(3)? {
            1 => match self.vbr(5)? {
                0 => Operand::Literal(0),
                width @ 1..=64 => Operand::Fixed(width as u8),
                _ => return Err(Error::InvalidAbbrev),
            },
            2 => match self.vbr(5)? {
                0 => Operand::Literal(0),
                width @ 2..=32 => Operand::Vbr(width as u8),
                _ => return Err(Error::InvalidAbbrev),
            },
            3 => {
                let element = self.read_abbrev_op()?;
                if element.is_payload() {
                    return Err(Error::InvalidAbbrev);
                }
                Operand::Array(Box::new(element))
            }
            4 => Operand::Char6,
            5 => Operand::Blob,
            _ => return Err(Error::InvalidAbbrev),
        };
        Ok(op)
    }

    /// Read the body of a DEFINE_ABBREV record.
    fn read_abbrev(&mut self) -> Result<Abbreviation, Error> {
        let num_ops = self.vbr(5)? as usize;
        if num_ops == 0 {
            return Err(Error::InvalidAbbrev);
        }
        let mut operands = Vec::with_capacity(num_ops.min(self.cursor.remaining()));
        let mut i = 0;
        while i < num_ops {
            let op = self.read_abbrev_op()?;
            if op.is_array() {
                // The element encoding counts as an operand of its own.
                if i + 2 != num_ops {
                    return Err(Error::InvalidAbbrev);
                }
                i += 1;
            } else if op.is_blob() && i + 1 != num_ops {
                return Err(Error::InvalidAbbrev);
            }
            operands.push(op);
            i += 1;
        }
        if operands[0].is_payload() {
            return Err(Error::InvalidAbbrev);
        }
        Ok(Abbreviation { operands })
    }

    fn read_scalar_operand(&mut self, operand: &Operand) -> Result<u64, Error> {
        match operand {
            Operand::Literal(value) => Ok(*value),
            Operand::Fixed(width) => self.fixed(usize::from(*width)),
            Operand::Vbr(width) => self.vbr(usize::from(*width)),
            Operand::Char6 => {
                let value = self.fixed(6)?;
                Operand::decode_char6(value)
                    .map(u64::from)
                    .ok_or(Error::InvalidAbbrev)
            }
            Operand::Array(_) | Operand::Blob => Err(Error::InvalidAbbrev),
        }
    }

    /// Read abbreviated data record
    fn read_abbreviated_record(&mut self, abbrev: &Abbreviation) -> Result<Record, Error> {
        let (first, rest) = abbrev.operands.split_first().ok_or(Error::InvalidAbbrev)?;
        let code = self.read_scalar_operand(first)?;
        let mut fields = Vec::with_capacity(rest.len());
        let mut payload = None;
        for op in rest {
            match op {
                Operand::Array(element) => {
                    let length = self.vbr(6)? as usize;
                    if matches!(**element, Operand::Char6) {
                        let mut s = String::with_capacity(length.min(self.cursor.remaining()));
                        for _ in 0..length {
                            let c = self.read_scalar_operand(element)?;
                            s.push(char::from(c as u8));
                        }
                        payload = Some(Payload::Char6String(s));
                    } else {
                        let mut elements = Vec::with_capacity(length.min(self.cursor.remaining()));
                        for _ in 0..length {
                            elements.push(self.read_scalar_operand(element)?);
                        }
                        payload = Some(Payload::Array(elements));
                    }
                }
                Operand::Blob => {
                    let length = self.vbr(6)? as usize;
                    self.align32()?;
                    let (data, next) = self.cursor.read_bytes(length)?;
                    self.cursor = next;
                    self.align32()?;
                    payload = Some(Payload::Blob(data.to_vec()));
                }
                scalar => fields.push(self.read_scalar_operand(scalar)?),
            }
        }
        Ok(Record {
            id: code,
            fields,
            payload,
        })
    }

    fn read_unabbreviated_record(&mut self) -> Result<Record, Error> {
        let code = self.vbr(6)?;
        let num_ops = self.vbr(6)? as usize;
        let mut operands = Vec::with_capacity(num_ops.min(self.cursor.remaining()));
        for _ in 0..num_ops {
            operands.push(self.vbr(6)?);
        }
        Ok(Record::new(code, operands))
    }

    /// Read block info block
    fn read_block_info_block(&mut self, abbrev_width: usize) -> Result<(), Error> {
        use BuiltinAbbreviationId::*;

        let mut current_block_id = None;
        loop {
            let abbrev_id = self.fixed(abbrev_width)?;
            let builtin =
                BuiltinAbbreviationId::try_from(abbrev_id).map_err(|_| Error::NoSuchAbbrev {
                    block_id: 0,
                    abbrev_id,
                })?;
            match builtin {
                EndBlock => {
                    self.align32()?;
                    return Ok(());
                }
                EnterSubBlock => return Err(Error::NestedBlockInBlockInfo),
                DefineAbbreviation => {
                    let block_id = current_block_id.ok_or(Error::MissingSetBid)?;
                    let abbrev = self.read_abbrev()?;
                    self.blockinfo_abbrevs
                        .entry(block_id)
                        .or_default()
                        .push(Rc::new(abbrev));
                }
                UnabbreviatedRecord => {
                    let record = self.read_unabbreviated_record()?;
                    let code = u8::try_from(record.id)
                        .ok()
                        .and_then(|c| BlockInfoCode::try_from(c).ok());
                    match code {
                        Some(BlockInfoCode::SetBid) => {
                            if record.fields.len() != 1 {
                                return Err(Error::InvalidBlockInfoRecord(record.id));
                            }
                            current_block_id = record.fields.first().copied();
                        }
                        Some(BlockInfoCode::BlockName) => {
                            let block_id = current_block_id.ok_or(Error::MissingSetBid)?;
                            self.block_info.entry(block_id).or_default().name = record.string(0);
                        }
                        Some(BlockInfoCode::SetRecordName) => {
                            let block_id = current_block_id.ok_or(Error::MissingSetBid)?;
                            let record_id = *record
                                .fields
                                .first()
                                .ok_or(Error::InvalidBlockInfoRecord(record.id))?;
                            self.block_info
                                .entry(block_id)
                                .or_default()
                                .record_names
                                .insert(record_id, record.string(1));
                        }
                        None => debug!("ignoring blockinfo record {}", record.id),
                    }
                }
            }
        }
    }

    /// Reads the stream to its end, reporting every block and record to the
    /// visitor.
    pub fn read_stream<V: BitStreamVisitor>(&mut self, visitor: &mut V) -> Result<(), V::Error> {
        use BuiltinAbbreviationId::*;

        let stream_end = self.cursor.size();
        let mut stack: Vec<Scope> = Vec::new();
        loop {
            let Some(scope) = stack.last() else {
                // Anything shorter than a word after the last block is padding.
                if self.cursor.remaining() < 32 {
                    return Ok(());
                }
                self.read_top_level_entry(&mut stack, visitor)?;
                continue;
            };
            if self.cursor.offset() >= scope.end_bit {
                return Err(Error::MissingEndBlock(scope.block_id).into());
            }
            let block_id = scope.block_id;
            let abbrev_id = self.fixed(scope.abbrev_width)?;
            match BuiltinAbbreviationId::try_from(abbrev_id) {
                Ok(EndBlock) => {
                    self.align32()?;
                    let scope = stack.pop().ok_or(Error::UnexpectedEndBlock)?;
                    if self.cursor.offset() != scope.end_bit {
                        return Err(Error::BlockLengthMismatch {
                            block_id,
                            expected: scope.end_bit,
                            actual: self.cursor.offset(),
                        }
                        .into());
                    }
                    trace!("exit block {block_id}");
                    visitor.did_exit_block(block_id)?;
                }
                Ok(EnterSubBlock) => {
                    let parent_end = stack.last().map_or(stream_end, |s| s.end_bit);
                    self.enter_subblock(&mut stack, parent_end, visitor)?;
                }
                Ok(DefineAbbreviation) => {
                    let abbrev = self.read_abbrev()?;
                    if let Some(scope) = stack.last_mut() {
                        scope.abbrevs.push(Rc::new(abbrev));
                    }
                }
                Ok(UnabbreviatedRecord) => {
                    let record = self.read_unabbreviated_record()?;
                    visitor.visit(block_id, record)?;
                }
                Err(_) => {
                    let abbrev = stack
                        .last()
                        .and_then(|s| {
                            s.abbrevs
                                .get((abbrev_id - FIRST_APPLICATION_ABBREV_ID) as usize)
                        })
                        .cloned()
                        .ok_or(Error::NoSuchAbbrev {
                            block_id,
                            abbrev_id,
                        })?;
                    let record = self.read_abbreviated_record(&abbrev)?;
                    visitor.visit(block_id, record)?;
                }
            }
        }
    }

    fn read_top_level_entry<V: BitStreamVisitor>(
        &mut self,
        stack: &mut Vec<Scope>,
        visitor: &mut V,
    ) -> Result<(), V::Error> {
        use BuiltinAbbreviationId::*;

        let abbrev_id = self.fixed(TOP_LEVEL_ABBREV_WIDTH)?;
        match BuiltinAbbreviationId::try_from(abbrev_id) {
            Ok(EnterSubBlock) => {
                let stream_end = self.cursor.size();
                self.enter_subblock(stack, stream_end, visitor)
            }
            Ok(UnabbreviatedRecord) => {
                let record = self.read_unabbreviated_record()?;
                visitor.visit(Self::TOP_LEVEL_BLOCK_ID, record)
            }
            Ok(EndBlock) => Err(Error::UnexpectedEndBlock.into()),
            Ok(DefineAbbreviation) => Err(Error::AbbrevOutsideBlock.into()),
            Err(_) => Err(Error::NoSuchAbbrev {
                block_id: Self::TOP_LEVEL_BLOCK_ID,
                abbrev_id,
            }
            .into()),
        }
    }

    fn enter_subblock<V: BitStreamVisitor>(
        &mut self,
        stack: &mut Vec<Scope>,
        parent_end: usize,
        visitor: &mut V,
    ) -> Result<(), V::Error> {
        let block_id = self.vbr(8)?;
        let abbrev_width = self.vbr(4)? as usize;
        self.align32()?;
        let num_words = self.fixed(32)? as usize;
        let end_bit = self.cursor.offset() + num_words * 32;
        if end_bit > parent_end {
            return Err(Error::BlockOverrun { block_id }.into());
        }
        if abbrev_width == 0 || abbrev_width > 32 {
            return Err(Error::AbbrevWidthTooSmall(abbrev_width).into());
        }

        if block_id == 0 {
            self.read_block_info_block(abbrev_width)?;
            if self.cursor.offset() != end_bit {
                return Err(Error::BlockLengthMismatch {
                    block_id,
                    expected: end_bit,
                    actual: self.cursor.offset(),
                }
                .into());
            }
            return Ok(());
        }

        if !visitor.should_enter_block(block_id) {
            debug!("skipping block {block_id} ({num_words} words)");
            self.cursor = self.cursor.at(end_bit).map_err(Error::from)?;
            return Ok(());
        }
        trace!("enter block {block_id} (abbrev width {abbrev_width})");
        stack.push(Scope {
            block_id,
            abbrev_width,
            abbrevs: self
                .blockinfo_abbrevs
                .get(&block_id)
                .cloned()
                .unwrap_or_default(),
            end_bit,
        });
        Ok(())
    }
}
