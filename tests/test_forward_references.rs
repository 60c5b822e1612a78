mod common;

use bitcode_module::bitcode::Record;
use bitcode_module::ir::{
    AggregateConstant, Constant, Error, ScalarKind, Symbol, SymbolKind, SymbolTable, Type,
    TypeTable,
};
use bitcode_module::schema::enums::BinOpcode;
use bitcode_module::{BitStreamVisitor, Bitcode, Module, ParseOptions};
use pretty_assertions::assert_eq;

use common::BitWriter;

const MODULE_BLOCK: u64 = 8;
const CONSTANTS_BLOCK: u64 = 11;
const TYPE_BLOCK: u64 = 17;

const SETTYPE: u64 = 1;
const INTEGER: u64 = 4;
const AGGREGATE: u64 = 7;
const BINOP: u64 = 10;

fn signed(value: i64) -> u64 {
    if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    }
}

/// A version 1 module with types `[i32, [2 x i32]]` and the given
/// constants block records.
fn module_with_constants(constants: &[(u64, Vec<u64>)]) -> Vec<u8> {
    let mut w = BitWriter::module();
    w.enter_block(MODULE_BLOCK, 3);
    w.record(1, &[1]);
    w.enter_block(TYPE_BLOCK, 4);
    w.record(1, &[2]);
    w.record(7, &[32]);
    w.record(11, &[2, 0]);
    w.end_block();
    w.enter_block(CONSTANTS_BLOCK, 4);
    for (code, operands) in constants {
        w.record(*code, operands);
    }
    w.end_block();
    w.end_block();
    w.finish()
}

#[test]
fn aggregate_element_is_patched_to_later_definition() {
    let data = module_with_constants(&[
        (SETTYPE, vec![0]),
        (INTEGER, vec![signed(7)]),
        (SETTYPE, vec![1]),
        (AGGREGATE, vec![0, 3]),
        (SETTYPE, vec![0]),
        (INTEGER, vec![signed(1)]),
        (INTEGER, vec![signed(42)]),
    ]);
    let module = Module::parse(&data).unwrap();
    let symbols = &module.symbols;

    let array = symbols.get(1).unwrap();
    let Some(Constant::Aggregate(aggregate)) = symbols.symbol(array).as_constant() else {
        panic!("value 1 is not an aggregate");
    };
    assert_eq!(aggregate.element_count(), 2);

    let forty_two = symbols.get(3).unwrap();
    assert_eq!(aggregate.elements()[0], symbols.get(0).unwrap());
    assert_eq!(aggregate.elements()[1], forty_two);
    assert_eq!(
        symbols.symbol(aggregate.elements()[1]).as_constant(),
        Some(&Constant::Integer(42))
    );
    assert!(!symbols.has_pending_forward_references());
}

#[test]
fn binop_operands_are_patched_to_later_definitions() {
    let data = module_with_constants(&[
        (SETTYPE, vec![0]),
        (BINOP, vec![0, 1, 2]),
        (INTEGER, vec![signed(17)]),
        (INTEGER, vec![signed(20)]),
    ]);
    let module = Module::parse(&data).unwrap();
    let symbols = &module.symbols;

    let sum = symbols.get(0).unwrap();
    let Some(Constant::BinaryOperation(op)) = symbols.symbol(sum).as_constant() else {
        panic!("value 0 is not a binary operation");
    };
    assert_eq!(op.opcode, BinOpcode::Add);
    assert_eq!(op.lhs, symbols.get(1).unwrap());
    assert_eq!(op.rhs, symbols.get(2).unwrap());
    assert_eq!(
        symbols.symbol(op.lhs).as_constant(),
        Some(&Constant::Integer(17))
    );
    assert_eq!(op.evaluate(symbols, &module.types), Some(37));
    assert!(!symbols.has_pending_forward_references());
}

#[test]
fn undefined_value_fails_the_parse() {
    let data = module_with_constants(&[
        (SETTYPE, vec![0]),
        (INTEGER, vec![signed(7)]),
        (SETTYPE, vec![1]),
        (AGGREGATE, vec![0, 5]),
    ]);
    let err = Module::parse(&data).unwrap_err();
    assert!(matches!(err, Error::UnresolvedForwardReference(5)));
}

#[test]
fn reference_past_the_value_limit_is_rejected() {
    let data = module_with_constants(&[
        (SETTYPE, vec![1]),
        (AGGREGATE, vec![0, 3]),
    ]);
    let err = Module::parse_with(&data, &ParseOptions::new().max_values(3)).unwrap_err();
    assert!(matches!(
        err,
        Error::SymbolOutOfRange { index: 3, limit: 3 }
    ));
}

#[test]
fn constant_before_settype_is_rejected() {
    let data = module_with_constants(&[(INTEGER, vec![signed(1)])]);
    let err = Module::parse(&data).unwrap_err();
    assert!(matches!(err, Error::MissingConstantType));
}

/// Drives the symbol table directly from a bare block: code 1 defines an
/// `i32`, code 2 an array of earlier or later values.
struct ArrayBuilder {
    types: TypeTable,
    symbols: SymbolTable,
}

impl BitStreamVisitor for ArrayBuilder {
    type Error = Error;

    fn should_enter_block(&mut self, _id: u64) -> bool {
        true
    }

    fn did_exit_block(&mut self, _id: u64) -> Result<(), Error> {
        Ok(())
    }

    fn visit(&mut self, _block_id: u64, record: Record) -> Result<(), Error> {
        let (i32, array) = (self.types.resolve(0)?, self.types.resolve(1)?);
        let id = match record.id {
            1 => self.symbols.alloc(Symbol::constant(
                i32,
                Constant::Integer(record.fields()[0] as i64),
            )),
            2 => {
                let types = &self.types;
                self.symbols.build(array, |symbols, owner| {
                    let aggregate =
                        AggregateConstant::from_symbols(symbols, types, array, owner, record.fields())?;
                    Ok(SymbolKind::Constant(Constant::Aggregate(aggregate)))
                })?
            }
            _ => return Err(Error::InvalidRecord("test record")),
        };
        self.symbols.push(id)?;
        Ok(())
    }
}

#[test]
fn placeholder_is_replaced_by_identity() {
    let mut w = BitWriter::module();
    w.enter_block(12, 4);
    w.record(1, &[7]);
    w.record(2, &[0, 3]);
    w.record(1, &[1]);
    w.record(1, &[42]);
    w.end_block();
    let data = w.finish();

    let mut types = TypeTable::new();
    let i32 = types.push(Type::Scalar(ScalarKind::Integer(32)));
    types.push(Type::Array {
        element: i32,
        len: 2,
    });
    let mut builder = ArrayBuilder {
        types,
        symbols: SymbolTable::new(),
    };
    Bitcode::read(&data, &mut builder).unwrap();
    builder.symbols.finish().unwrap();

    let symbols = &builder.symbols;
    let Some(Constant::Aggregate(array)) = symbols.symbol(symbols.get(1).unwrap()).as_constant()
    else {
        panic!("value 1 is not an aggregate");
    };
    assert_eq!(array.element_count(), 2);
    assert_eq!(array.elements()[0], symbols.get(0).unwrap());
    assert_eq!(array.elements()[1], symbols.get(3).unwrap());
    assert_eq!(
        symbols.symbol(array.elements()[1]).as_constant(),
        Some(&Constant::Integer(42))
    );
}
