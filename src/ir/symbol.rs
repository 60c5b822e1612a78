use super::constants::Constant;
use super::declarations::{Function, GlobalValue};
use super::types::TypeId;

/// Handle of a symbol in a [`SymbolTable`](super::SymbolTable) arena.
///
/// Handles compare by identity: two handles are equal only if they name the
/// same arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// For global values this is the value type, not the pointer type.
    pub ty: TypeId,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Constant(Constant),
    GlobalValue(GlobalValue),
    FunctionDeclaration(Function),
    FunctionDefinition(Function),
    /// Stand-in for value `n` until its defining record is read.
    Placeholder(u32),
    /// Slot handed out while the symbol's own contents are being built.
    Reserved,
}

impl Symbol {
    pub fn new(ty: TypeId, kind: SymbolKind) -> Self {
        Self { ty, kind }
    }

    pub fn constant(ty: TypeId, constant: Constant) -> Self {
        Self::new(ty, SymbolKind::Constant(constant))
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            SymbolKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            SymbolKind::FunctionDeclaration(f) | SymbolKind::FunctionDefinition(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<&GlobalValue> {
        match &self.kind {
            SymbolKind::GlobalValue(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, SymbolKind::Placeholder(_) | SymbolKind::Reserved)
    }

    /// Name of a function or global value.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            SymbolKind::GlobalValue(g) => Some(&g.name),
            SymbolKind::FunctionDeclaration(f) | SymbolKind::FunctionDefinition(f) => {
                Some(&f.name)
            }
            _ => None,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match &mut self.kind {
            SymbolKind::GlobalValue(g) => g.name = name,
            SymbolKind::FunctionDeclaration(f) | SymbolKind::FunctionDefinition(f) => {
                f.name = name;
            }
            _ => {}
        }
    }

    /// Swaps every reference to `old` for `new`. Returns how many operand
    /// slots changed.
    pub fn replace(&mut self, old: SymbolId, new: SymbolId) -> usize {
        let mut replaced = 0;
        self.for_each_operand_mut(|operand| {
            if *operand == old {
                *operand = new;
                replaced += 1;
            }
        });
        replaced
    }

    /// Symbols this one refers to, in operand order.
    pub fn operands(&self) -> Vec<SymbolId> {
        match &self.kind {
            SymbolKind::Constant(c) => c.operands(),
            SymbolKind::GlobalValue(g) => g.operands(),
            SymbolKind::FunctionDeclaration(f) | SymbolKind::FunctionDefinition(f) => f.operands(),
            SymbolKind::Placeholder(_) | SymbolKind::Reserved => Vec::new(),
        }
    }

    fn for_each_operand_mut(&mut self, f: impl FnMut(&mut SymbolId)) {
        match &mut self.kind {
            SymbolKind::Constant(c) => c.for_each_operand_mut(f),
            SymbolKind::GlobalValue(g) => g.for_each_operand_mut(f),
            SymbolKind::FunctionDeclaration(func) | SymbolKind::FunctionDefinition(func) => {
                func.for_each_operand_mut(f);
            }
            SymbolKind::Placeholder(_) | SymbolKind::Reserved => {}
        }
    }
}
