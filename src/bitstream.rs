use num_enum::TryFromPrimitive;

/// Abbreviation ids below this value are reserved by the container format.
pub const FIRST_APPLICATION_ABBREV_ID: u64 = 4;

/// Width of abbreviation ids outside of any block.
pub const TOP_LEVEL_ABBREV_WIDTH: usize = 2;

/// An `Abbreviation` is a block-local template that says how the operands of a
/// compact record are laid out, so the record does not have to spell out its
/// operand count and encodings.
#[derive(Debug, Clone)]
pub struct Abbreviation {
    /// The first operand is the record code. An array or blob, if present,
    /// is always last.
    pub operands: Vec<Operand>,
}

/// Abbreviation operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A constant that is not stored in the record at all
    Literal(u64),
    /// A fixed-width field
    Fixed(u8),
    /// A VBR-encoded value with the provided chunk width
    Vbr(u8),
    /// A vbr6 element count followed by that many elements of the inner
    /// encoding
    Array(Box<Operand>),
    /// A 6-bit character from `[a-zA-Z0-9._]`
    Char6,
    /// A vbr6 byte count, padding to 32 bits, the bytes, padding to 32 bits
    Blob,
}

impl Operand {
    /// Whether this operand carries a variable-length payload
    #[must_use]
    pub fn is_payload(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Blob)
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    #[must_use]
    pub fn is_blob(&self) -> bool {
        matches!(self, Self::Blob)
    }

    /// Maps a 6-bit value onto the char6 alphabet.
    #[must_use]
    pub fn decode_char6(value: u64) -> Option<u8> {
        const ALPHABET: &[u8; 64] =
            b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._";
        ALPHABET.get(value as usize).copied()
    }
}

/// Records understood inside the BLOCKINFO block.
#[derive(Debug, Clone, Copy, TryFromPrimitive)]
#[repr(u8)]
pub enum BlockInfoCode {
    /// Selects the block id that following records describe.
    SetBid = 1,
    /// Human readable block name.
    BlockName = 2,
    /// Human readable name for one record code of the selected block.
    SetRecordName = 3,
}

/// The four abbreviation ids every block understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u64)]
pub enum BuiltinAbbreviationId {
    /// Leaves the current block.
    EndBlock = 0,
    /// Opens a nested block.
    EnterSubBlock = 1,
    /// Appends an abbreviation to the current block's table.
    DefineAbbreviation = 2,
    /// A record with an explicit code and operand count, all vbr6.
    UnabbreviatedRecord = 3,
}
