#![allow(dead_code)]

//! A minimal bitstream writer for building test inputs.

pub const LLVM_IR_MAGIC: [u8; 4] = [b'B', b'C', 0xC0, 0xDE];

/// Operand encodings for `DEFINE_ABBREV`.
#[derive(Debug, Clone, Copy)]
pub enum AbbrevOp {
    Literal(u64),
    Fixed(u64),
    Vbr(u64),
    Array,
    Char6,
    Blob,
}

pub struct BitWriter {
    bytes: Vec<u8>,
    bit: usize,
    abbrev_width: usize,
    /// Byte offset of each open block's length word, and the width to
    /// restore when it closes.
    blocks: Vec<(usize, usize)>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit: 0,
            abbrev_width: 2,
            blocks: Vec::new(),
        }
    }

    /// A writer that has already written the LLVM IR magic.
    pub fn module() -> Self {
        let mut writer = Self::new();
        for byte in LLVM_IR_MAGIC {
            writer.emit(u64::from(byte), 8);
        }
        writer
    }

    pub fn bit_len(&self) -> usize {
        self.bit
    }

    pub fn emit(&mut self, value: u64, width: usize) {
        for i in 0..width {
            if self.bit % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (self.bit % 8);
            }
            self.bit += 1;
        }
    }

    pub fn emit_vbr(&mut self, mut value: u64, width: usize) {
        let threshold = 1u64 << (width - 1);
        while value >= threshold {
            self.emit((value & (threshold - 1)) | threshold, width);
            value >>= width - 1;
        }
        self.emit(value, width);
    }

    pub fn align32(&mut self) {
        while self.bit % 32 != 0 {
            self.emit(0, 1);
        }
    }

    pub fn abbrev_id(&mut self, id: u64) {
        self.emit(id, self.abbrev_width);
    }

    pub fn enter_block(&mut self, id: u64, abbrev_width: usize) {
        self.abbrev_id(1);
        self.emit_vbr(id, 8);
        self.emit_vbr(abbrev_width as u64, 4);
        self.align32();
        self.blocks.push((self.bytes.len(), self.abbrev_width));
        self.emit(0, 32);
        self.abbrev_width = abbrev_width;
    }

    pub fn end_block(&mut self) {
        self.abbrev_id(0);
        self.align32();
        let (length_at, width) = self.blocks.pop().expect("no open block");
        let words = ((self.bytes.len() - length_at - 4) / 4) as u32;
        self.bytes[length_at..length_at + 4].copy_from_slice(&words.to_le_bytes());
        self.abbrev_width = width;
    }

    /// An `UNABBREV_RECORD`.
    pub fn record(&mut self, code: u64, operands: &[u64]) {
        self.abbrev_id(3);
        self.emit_vbr(code, 6);
        self.emit_vbr(operands.len() as u64, 6);
        for &op in operands {
            self.emit_vbr(op, 6);
        }
    }

    /// A record whose operands are the characters of `s`.
    pub fn string_record(&mut self, code: u64, s: &str) {
        let operands: Vec<u64> = s.bytes().map(u64::from).collect();
        self.record(code, &operands);
    }

    pub fn define_abbrev(&mut self, ops: &[AbbrevOp]) {
        self.abbrev_id(2);
        self.emit_vbr(ops.len() as u64, 5);
        for op in ops {
            match *op {
                AbbrevOp::Literal(value) => {
                    self.emit(1, 1);
                    self.emit_vbr(value, 8);
                }
                AbbrevOp::Fixed(width) => {
                    self.emit(0, 1);
                    self.emit(1, 3);
                    self.emit_vbr(width, 5);
                }
                AbbrevOp::Vbr(width) => {
                    self.emit(0, 1);
                    self.emit(2, 3);
                    self.emit_vbr(width, 5);
                }
                AbbrevOp::Array => {
                    self.emit(0, 1);
                    self.emit(3, 3);
                }
                AbbrevOp::Char6 => {
                    self.emit(0, 1);
                    self.emit(4, 3);
                }
                AbbrevOp::Blob => {
                    self.emit(0, 1);
                    self.emit(5, 3);
                }
            }
        }
    }

    /// Blob operand body: vbr6 length, aligned bytes.
    pub fn blob(&mut self, data: &[u8]) {
        self.emit_vbr(data.len() as u64, 6);
        self.align32();
        for &byte in data {
            self.emit(u64::from(byte), 8);
        }
        self.align32();
    }

    pub fn finish(mut self) -> Vec<u8> {
        assert!(self.blocks.is_empty(), "unclosed block");
        self.align32();
        self.bytes
    }

    /// Bytes written so far, without closing anything.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn char6(c: char) -> u64 {
    match c {
        'a'..='z' => c as u64 - 'a' as u64,
        'A'..='Z' => c as u64 - 'A' as u64 + 26,
        '0'..='9' => c as u64 - '0' as u64 + 52,
        '.' => 62,
        '_' => 63,
        _ => panic!("{c:?} is not a char6 character"),
    }
}

/// Prefixes `stream` with a wrapper header whose offset is the header size.
pub fn wrap(stream: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for word in [0x0B17_C0DEu32, 0, 20, stream.len() as u32, 7] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(stream);
    out
}
