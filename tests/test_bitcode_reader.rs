mod common;

use bitcode_module::bitcode::{BitcodeElement, Block, Payload, Record, Signature};
use bitcode_module::bits::Cursor;
use bitcode_module::read::Error;
use bitcode_module::{BitStreamVisitor, Bitcode};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use common::{AbbrevOp, BitWriter, char6, wrap};

fn single_record_module() -> Vec<u8> {
    let mut w = BitWriter::module();
    w.enter_block(8, 3);
    w.string_record(2, "x86_64-unknown-linux-gnu");
    w.end_block();
    w.finish()
}

fn block(element: &BitcodeElement) -> &Block {
    element.as_block().expect("expected a block")
}

fn records(block: &Block) -> Vec<&Record> {
    block.elements.iter().filter_map(BitcodeElement::as_record).collect()
}

#[test]
fn stream_without_wrapper_starts_at_zero() {
    let data = single_record_module();
    let signature = Signature::parse(&data).unwrap();
    assert_eq!(signature.wrapper, None);
    assert_eq!(signature.start_bit, 0);
    assert_eq!(signature.end_bit, data.len() * 8);
    assert!(signature.is_llvm_ir());
}

#[test]
fn wrapper_offset_is_in_bytes() {
    let stream = single_record_module();
    let data = wrap(&stream);
    let signature = Signature::parse(&data).unwrap();
    let wrapper = signature.wrapper.unwrap();
    assert_eq!(wrapper.offset, 20);
    assert_eq!(wrapper.size as usize, stream.len());
    assert_eq!(wrapper.cpu_type, 7);
    assert_eq!(signature.start_bit, 20 * 8);
    assert_eq!(signature.end_bit, data.len() * 8);

    let bitcode = Bitcode::new(&data).unwrap();
    let module = block(&bitcode.elements[0]);
    assert_eq!(module.id, 8);
    assert_eq!(records(module)[0].string(0), "x86_64-unknown-linux-gnu");
}

#[test]
fn truncated_wrapper_is_rejected() {
    let mut data = wrap(&single_record_module());
    data.truncate(data.len() - 4);
    let err = Bitcode::new(&data).unwrap_err();
    assert!(matches!(err, Error::TruncatedWrapper { .. }));
}

#[test]
fn abbreviations_decode_arrays_char6_and_blobs() {
    let mut w = BitWriter::module();
    w.enter_block(8, 4);

    w.define_abbrev(&[AbbrevOp::Literal(2), AbbrevOp::Array, AbbrevOp::Char6]);
    w.abbrev_id(4);
    w.emit_vbr(3, 6);
    for c in "x86".chars() {
        w.emit(char6(c), 6);
    }

    w.define_abbrev(&[AbbrevOp::Literal(5), AbbrevOp::Fixed(4), AbbrevOp::Blob]);
    w.abbrev_id(5);
    w.emit(9, 4);
    w.blob(b"hello");

    w.define_abbrev(&[
        AbbrevOp::Literal(7),
        AbbrevOp::Vbr(6),
        AbbrevOp::Array,
        AbbrevOp::Fixed(8),
    ]);
    w.abbrev_id(6);
    w.emit_vbr(100, 6);
    w.emit_vbr(2, 6);
    w.emit(1, 8);
    w.emit(255, 8);

    w.end_block();
    let bitcode = Bitcode::new(&w.finish()).unwrap();
    let module = block(&bitcode.elements[0]);
    let records = records(module);

    assert_eq!(records[0].id, 2);
    assert_eq!(
        records[0].payload(),
        Some(&Payload::Char6String("x86".into()))
    );
    assert_eq!(records[0].operands().string(), "x86");

    assert_eq!(records[1].id, 5);
    assert_eq!(records[1].fields(), &[9]);
    assert_eq!(records[1].blob(), Some(&b"hello"[..]));

    assert_eq!(records[2].id, 7);
    assert_eq!(records[2].fields(), &[100]);
    assert_eq!(records[2].operands().rest(), vec![100, 1, 255]);
}

#[test]
fn blockinfo_abbreviations_are_inherited() {
    let mut w = BitWriter::module();
    w.enter_block(0, 2);
    w.record(1, &[9]);
    w.string_record(2, "attrs");
    w.define_abbrev(&[AbbrevOp::Literal(3), AbbrevOp::Fixed(8)]);
    w.end_block();
    w.enter_block(9, 3);
    w.abbrev_id(4);
    w.emit(42, 8);
    w.end_block();

    let bitcode = Bitcode::new(&w.finish()).unwrap();
    assert_eq!(bitcode.block_info[&9].name, "attrs");
    // BLOCKINFO itself is consumed by the reader.
    assert_eq!(bitcode.elements.len(), 1);
    assert!(bitcode.elements[0].is_block());
    assert!(!bitcode.elements[0].is_record());
    let attrs = block(&bitcode.elements[0]);
    assert_eq!(attrs.id, 9);
    assert_eq!(records(attrs)[0], &Record::new(3, vec![42]));
}

struct Log {
    skip: u64,
    events: Vec<String>,
}

impl BitStreamVisitor for Log {
    type Error = Error;

    fn should_enter_block(&mut self, id: u64) -> bool {
        if id == self.skip {
            return false;
        }
        self.events.push(format!("enter {id}"));
        true
    }

    fn did_exit_block(&mut self, id: u64) -> Result<(), Error> {
        self.events.push(format!("exit {id}"));
        Ok(())
    }

    fn visit(&mut self, block_id: u64, record: Record) -> Result<(), Error> {
        self.events
            .push(format!("{block_id}: {} {:?}", record.id, record.fields()));
        Ok(())
    }
}

#[test]
fn declined_blocks_are_skipped_by_length() {
    let mut w = BitWriter::module();
    w.enter_block(8, 3);
    w.record(1, &[2]);
    w.enter_block(9, 5);
    w.define_abbrev(&[AbbrevOp::Literal(1), AbbrevOp::Fixed(30)]);
    w.record(4, &[1, 2, 3]);
    w.end_block();
    w.record(3, &[]);
    w.end_block();

    let mut log = Log {
        skip: 9,
        events: Vec::new(),
    };
    Bitcode::read(&w.finish(), &mut log).unwrap();
    assert_eq!(
        log.events,
        vec!["enter 8", "8: 1 [2]", "8: 3 []", "exit 8"]
    );
}

#[test]
fn visitor_rejects_foreign_magic() {
    let mut w = BitWriter::new();
    for byte in *b"DIAG" {
        w.emit(u64::from(byte), 8);
    }
    let data = w.finish();
    // The collecting reader accepts any magic.
    assert!(Bitcode::new(&data).unwrap().elements.is_empty());

    let mut log = Log {
        skip: 0,
        events: Vec::new(),
    };
    let err = Bitcode::read(&data, &mut log).unwrap_err();
    assert_eq!(err, Error::InvalidSignature(u32::from_le_bytes(*b"DIAG")));
}

#[test]
fn undefined_abbreviation_is_fatal() {
    let mut w = BitWriter::module();
    w.enter_block(8, 3);
    w.abbrev_id(5);
    w.end_block();
    let err = Bitcode::new(&w.finish()).unwrap_err();
    assert_eq!(
        err,
        Error::NoSuchAbbrev {
            block_id: 8,
            abbrev_id: 5,
        }
    );
}

#[test]
fn unterminated_block_is_fatal() {
    let mut w = BitWriter::module();
    w.enter_block(8, 3);
    w.record(1, &[2]);
    let err = Bitcode::new(&w.into_bytes()).unwrap_err();
    assert_eq!(err, Error::MissingEndBlock(8));
}

/// Byte offset of the length word of the first top-level block.
const FIRST_BLOCK_LENGTH: usize = 8;

fn patch_length(data: &mut [u8], delta: u32) {
    let word = &mut data[FIRST_BLOCK_LENGTH..FIRST_BLOCK_LENGTH + 4];
    let length = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) + delta;
    word.copy_from_slice(&length.to_le_bytes());
}

#[test]
fn block_length_must_match_end_block() {
    let mut data = single_record_module();
    patch_length(&mut data, 1);
    data.extend_from_slice(&[0; 4]);
    let err = Bitcode::new(&data).unwrap_err();
    assert!(matches!(
        err,
        Error::BlockLengthMismatch { block_id: 8, .. }
    ));
}

#[test]
fn block_cannot_outgrow_the_stream() {
    let mut data = single_record_module();
    patch_length(&mut data, 1);
    let err = Bitcode::new(&data).unwrap_err();
    assert_eq!(err, Error::BlockOverrun { block_id: 8 });
}

proptest! {
    #[test]
    fn vbr_round_trips(value in any::<u64>(), width in prop::sample::select(vec![4usize, 6, 8])) {
        let mut w = BitWriter::new();
        w.emit_vbr(value, width);
        let written = w.bit_len();
        let data = w.into_bytes();

        let (decoded, cursor) = Cursor::new(&data).read_vbr(width).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(cursor.offset(), written);
    }
}
