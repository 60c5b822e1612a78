//! Bit-granular reads over an immutable byte buffer.
//!
//! A [`Cursor`] is a small `Copy` value. Every read hands back the value
//! together with the advanced cursor, so callers can re-read from an older
//! position whenever they need to look ahead.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("reading {requested} bits at bit offset {offset} runs past the end of the stream")]
    BufferOverflow { offset: usize, requested: usize },
    #[error("vbr value does not fit in 64 bits")]
    VbrOverflow,
    #[error("unaligned byte access at bit offset {0}")]
    Unaligned(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Bits<'a> {
    buffer: &'a [u8],
    end_index: usize,
}

impl<'a> Bits<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            end_index: buffer.len() * 8,
        }
    }

    /// Reads `count` (at most 64) bits starting at bit `offset`, least
    /// significant bit first. The range must lie inside the buffer.
    pub fn read_bits(&self, offset: usize, count: usize) -> u64 {
        debug_assert!(count <= 64);
        debug_assert!(offset + count <= self.end_index);
        if count == 0 {
            return 0;
        }
        let first = offset >> 3;
        let last = (offset + count + 7) >> 3;
        let mut acc: u128 = 0;
        for (i, &byte) in self.buffer[first..last].iter().enumerate() {
            acc |= u128::from(byte) << (i * 8);
        }
        acc >>= offset & 7;
        let mask = if count == 64 {
            u64::MAX
        } else {
            (1u64 << count) - 1
        };
        (acc as u64) & mask
    }

    pub fn len(&self) -> usize {
        self.end_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index == 0
    }
}

/// A position inside a [`Bits`] buffer, bounded by `end`.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    bits: Bits<'a>,
    offset: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        let bits = Bits::new(buffer);
        Self {
            bits,
            offset: 0,
            end: bits.len(),
        }
    }

    /// A cursor over the bit range `start..end` of `buffer`.
    ///
    /// Both bounds are clamped to the buffer.
    pub fn with_range(buffer: &'a [u8], start: usize, end: usize) -> Self {
        let bits = Bits::new(buffer);
        let end = end.min(bits.len());
        Self {
            bits,
            offset: start.min(end),
            end,
        }
    }

    /// Bit offset one past the last readable bit.
    pub fn size(&self) -> usize {
        self.end
    }

    /// Current bit offset, counted from the start of the underlying buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.end - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.offset >= self.end
    }

    /// The same buffer positioned at `offset`.
    pub fn at(self, offset: usize) -> Result<Self, Error> {
        if offset > self.end {
            return Err(Error::BufferOverflow {
                offset: self.offset,
                requested: offset.saturating_sub(self.offset),
            });
        }
        Ok(Self { offset, ..self })
    }

    pub fn peek(&self, count: usize) -> Result<u64, Error> {
        if count > 64 || self.remaining() < count {
            return Err(Error::BufferOverflow {
                offset: self.offset,
                requested: count,
            });
        }
        Ok(self.bits.read_bits(self.offset, count))
    }

    pub fn read(self, count: usize) -> Result<(u64, Self), Error> {
        let value = self.peek(count)?;
        Ok((
            value,
            Self {
                offset: self.offset + count,
                ..self
            },
        ))
    }

    /// Reads a variable bit-rate integer made of `width`-bit chunks. The top
    /// bit of each chunk flags that another chunk follows; payloads are
    /// accumulated low chunk first.
    pub fn read_vbr(self, width: usize) -> Result<(u64, Self), Error> {
        debug_assert!((2..=32).contains(&width));
        let continuation = 1u64 << (width - 1);
        let payload_mask = continuation - 1;
        let mut cursor = self;
        let mut value = 0u64;
        let mut shift = 0usize;
        loop {
            let (chunk, next) = cursor.read(width)?;
            cursor = next;
            let payload = chunk & payload_mask;
            if shift >= 64 {
                if payload != 0 {
                    return Err(Error::VbrOverflow);
                }
            } else {
                if shift > 0 && payload >> (64 - shift) != 0 {
                    return Err(Error::VbrOverflow);
                }
                value |= payload << shift;
            }
            if chunk & continuation == 0 {
                return Ok((value, cursor));
            }
            shift += width - 1;
            if shift > 64 + width {
                return Err(Error::VbrOverflow);
            }
        }
    }

    /// Moves forward to the next multiple of `align` bits.
    pub fn align(self, align: usize) -> Result<Self, Error> {
        debug_assert!(align.is_power_of_two());
        let aligned = (self.offset + align - 1) & !(align - 1);
        if aligned > self.end {
            return Err(Error::BufferOverflow {
                offset: self.offset,
                requested: aligned - self.offset,
            });
        }
        Ok(Self {
            offset: aligned,
            ..self
        })
    }

    pub fn read_bytes(self, count: usize) -> Result<(&'a [u8], Self), Error> {
        if self.offset & 0b111 != 0 {
            return Err(Error::Unaligned(self.offset));
        }
        let bits = count.checked_mul(8).ok_or(Error::BufferOverflow {
            offset: self.offset,
            requested: usize::MAX,
        })?;
        if bits > self.remaining() {
            return Err(Error::BufferOverflow {
                offset: self.offset,
                requested: bits,
            });
        }
        let start = self.offset >> 3;
        let bytes = &self.bits.buffer[start..start + count];
        Ok((
            bytes,
            Self {
                offset: self.offset + bits,
                ..self
            },
        ))
    }
}
