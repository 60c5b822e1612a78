//! Upgrades `DIExpression` operand lists written by older producers.

/// Version stored in the first operand of an `EXPRESSION` record
/// (`distinct | version << 1`) by current writers.
pub const CURRENT_EXPRESSION_VERSION: u64 = 3;

pub const DW_OP_DEREF: u64 = 0x06;
pub const DW_OP_CONSTU: u64 = 0x10;
pub const DW_OP_MINUS: u64 = 0x1c;
pub const DW_OP_PLUS: u64 = 0x22;
pub const DW_OP_PLUS_UCONST: u64 = 0x23;
pub const DW_OP_BIT_PIECE: u64 = 0x9d;
pub const DW_OP_LLVM_FRAGMENT: u64 = 0x1000;

/// Rewrites `elements`, stored at `version`, into the current encoding.
///
/// Each step applies to every version up to the one that introduced it:
///
/// 0. a `DW_OP_bit_piece` third from the end becomes `DW_OP_LLVM_fragment`;
/// 1. a leading `DW_OP_deref` moves to the end, ahead of a trailing
///    fragment if there is one;
/// 2. `DW_OP_plus` becomes `DW_OP_plus_uconst` and `DW_OP_minus` becomes
///    `DW_OP_constu, n, DW_OP_minus`, walking operators with the operand
///    counts they had at the time.
///
/// Expressions at or above [`CURRENT_EXPRESSION_VERSION`] come back
/// unchanged.
#[must_use]
pub fn upgrade(version: u64, elements: &[u64]) -> Vec<u64> {
    if version >= CURRENT_EXPRESSION_VERSION {
        return elements.to_vec();
    }
    let mut expr = elements.to_vec();
    if version == 0 {
        rename_bit_piece(&mut expr);
    }
    if version <= 1 {
        move_deref_to_end(&mut expr);
    }
    expand_arithmetic(&expr)
}

fn rename_bit_piece(expr: &mut [u64]) {
    if let Some(i) = expr.len().checked_sub(3) {
        if expr[i] == DW_OP_BIT_PIECE {
            expr[i] = DW_OP_LLVM_FRAGMENT;
        }
    }
}

fn move_deref_to_end(expr: &mut [u64]) {
    if expr.first() != Some(&DW_OP_DEREF) {
        return;
    }
    let end = match expr.len().checked_sub(3) {
        Some(i) if expr[i] == DW_OP_LLVM_FRAGMENT => i,
        _ => expr.len(),
    };
    expr[..end].rotate_left(1);
}

/// Operator plus operands, as counted before version 3.
fn historic_size(op: u64) -> usize {
    match op {
        DW_OP_CONSTU | DW_OP_MINUS | DW_OP_PLUS => 2,
        DW_OP_LLVM_FRAGMENT => 3,
        _ => 1,
    }
}

fn expand_arithmetic(expr: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(expr.len() + expr.len() / 2);
    let mut rest = expr;
    while let Some(&op) = rest.first() {
        let size = historic_size(op).min(rest.len());
        let args = &rest[1..size];
        let arg = args.first().copied().unwrap_or(0);
        match op {
            DW_OP_PLUS => out.extend([DW_OP_PLUS_UCONST, arg]),
            DW_OP_MINUS => out.extend([DW_OP_CONSTU, arg, DW_OP_MINUS]),
            _ => {
                out.push(op);
                out.extend_from_slice(args);
            }
        }
        rest = &rest[size..];
    }
    out
}
