//! Value numbering for one module, with placeholders for values that are
//! used before they are defined.
//!
//! Symbols live in an arena and refer to each other through [`SymbolId`]
//! handles. A forward reference hands out the handle of a placeholder and
//! remembers who asked; defining the value later patches every recorded
//! owner through [`Symbol::replace`].

use std::collections::{HashMap, HashSet};

use super::symbol::{Symbol, SymbolId, SymbolKind};
use super::types::TypeId;
use super::{Error, Result};

#[derive(Debug, Clone)]
struct ForwardReference {
    placeholder: SymbolId,
    owners: Vec<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    arena: Vec<Symbol>,
    /// Value index to defined symbol.
    values: Vec<Option<SymbolId>>,
    forward: HashMap<u32, ForwardReference>,
    limit: u32,
    next_index: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::with_limit(u32::MAX)
    }

    /// A table that rejects value indices at or above `limit`.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            arena: Vec::new(),
            values: Vec::new(),
            forward: HashMap::new(),
            limit,
            next_index: 0,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Index the next [`push`](Self::push) will define.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Stores a symbol that has no value index of its own.
    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.arena.len() as u32);
        self.arena.push(symbol);
        id
    }

    /// Allocates a slot and fills it with whatever `f` builds. `f` gets the
    /// slot's handle so it can register itself as the owner of forward
    /// references.
    pub fn build<F>(&mut self, ty: TypeId, f: F) -> Result<SymbolId>
    where
        F: FnOnce(&mut Self, SymbolId) -> Result<SymbolKind>,
    {
        let id = self.alloc(Symbol::new(ty, SymbolKind::Reserved));
        let kind = f(self, id)?;
        self.arena[id.index()].kind = kind;
        Ok(id)
    }

    /// Binds `id` to the value index `index`, patching every owner of an
    /// outstanding placeholder for that index.
    pub fn define(&mut self, index: u32, id: SymbolId) -> Result<()> {
        self.check_range(u64::from(index))?;
        let slot = index as usize;
        if self.values.len() <= slot {
            self.values.resize(slot + 1, None);
        }
        if self.values[slot].is_some() {
            return Err(Error::Redefinition(index));
        }
        self.values[slot] = Some(id);
        if let Some(forward) = self.forward.remove(&index) {
            for owner in forward.owners {
                self.arena[owner.index()].replace(forward.placeholder, id);
            }
        }
        Ok(())
    }

    /// Defines the next value index.
    pub fn push(&mut self, id: SymbolId) -> Result<u32> {
        let index = self.next_index;
        self.define(index, id)?;
        self.next_index += 1;
        Ok(index)
    }

    /// The symbol for `index` if it is defined, otherwise a placeholder
    /// that `owner` is registered against. `ty` is only used for a newly
    /// created placeholder.
    pub fn get_forward_referenced(
        &mut self,
        index: u64,
        ty: TypeId,
        owner: SymbolId,
    ) -> Result<SymbolId> {
        let index = self.check_range(index)?;
        if let Some(id) = self.get(index) {
            return Ok(id);
        }
        let arena = &mut self.arena;
        let forward = self.forward.entry(index).or_insert_with(|| {
            let placeholder = SymbolId(arena.len() as u32);
            arena.push(Symbol::new(ty, SymbolKind::Placeholder(index)));
            ForwardReference {
                placeholder,
                owners: Vec::new(),
            }
        });
        if !forward.owners.contains(&owner) {
            forward.owners.push(owner);
        }
        Ok(forward.placeholder)
    }

    /// Defined symbol for a value index.
    pub fn get(&self, index: u32) -> Option<SymbolId> {
        self.values.get(index as usize).copied().flatten()
    }

    /// # Panics
    ///
    /// If `id` was not handed out by this table.
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.arena[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.arena[id.index()]
    }

    /// Defined values in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, SymbolId)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, id)| id.map(|id| (i as u32, id)))
    }

    pub fn has_pending_forward_references(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Fails if any value was referenced but never defined, or if any
    /// defined value still reaches a placeholder.
    pub fn finish(&self) -> Result<()> {
        if let Some(index) = self.forward.keys().min() {
            return Err(Error::UnresolvedForwardReference(*index));
        }
        let mut seen = HashSet::new();
        let mut stack: Vec<SymbolId> = self.iter().map(|(_, id)| id).collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let symbol = self.symbol(id);
            if symbol.is_placeholder() {
                return Err(Error::DanglingPlaceholder(id));
            }
            stack.extend(symbol.operands());
        }
        Ok(())
    }

    fn check_range(&self, index: u64) -> Result<u32> {
        match u32::try_from(index) {
            Ok(index) if index < self.limit => Ok(index),
            _ => Err(Error::SymbolOutOfRange {
                index,
                limit: self.limit,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::constants::{AggregateConstant, AggregateShape, Constant};

    const I32: TypeId = TypeId(0);

    fn aggregate(table: &mut SymbolTable, indices: &[u64]) -> SymbolId {
        table
            .build(I32, |table, owner| {
                let elements = indices
                    .iter()
                    .map(|&i| table.get_forward_referenced(i, I32, owner))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SymbolKind::Constant(Constant::Aggregate(AggregateConstant::new(
                    AggregateShape::Array,
                    elements,
                ))))
            })
            .unwrap()
    }

    #[test]
    fn define_patches_every_owner() {
        let mut table = SymbolTable::new();
        let first = aggregate(&mut table, &[2]);
        let second = aggregate(&mut table, &[2, 2]);
        table.push(first).unwrap();
        table.push(second).unwrap();
        assert!(table.has_pending_forward_references());

        let value = table.alloc(Symbol::constant(I32, Constant::Integer(5)));
        table.define(2, value).unwrap();

        assert_eq!(table.symbol(first).operands(), vec![value]);
        assert_eq!(table.symbol(second).operands(), vec![value, value]);
        table.finish().unwrap();
    }

    #[test]
    fn defined_index_is_returned_directly() {
        let mut table = SymbolTable::new();
        let value = table.alloc(Symbol::constant(I32, Constant::Null));
        table.push(value).unwrap();
        let owner = aggregate(&mut table, &[0]);
        assert_eq!(table.symbol(owner).operands(), vec![value]);
        assert!(!table.has_pending_forward_references());
    }

    #[test]
    fn out_of_range_reference_is_fatal() {
        let mut table = SymbolTable::with_limit(4);
        let owner = table.alloc(Symbol::constant(I32, Constant::Undef));
        let err = table.get_forward_referenced(4, I32, owner).unwrap_err();
        assert!(matches!(err, Error::SymbolOutOfRange { index: 4, limit: 4 }));
    }

    #[test]
    fn unresolved_reference_fails_finish() {
        let mut table = SymbolTable::new();
        let owner = aggregate(&mut table, &[7]);
        table.push(owner).unwrap();
        assert!(matches!(
            table.finish(),
            Err(Error::UnresolvedForwardReference(7))
        ));
    }

    #[test]
    fn redefinition_is_rejected() {
        let mut table = SymbolTable::new();
        let a = table.alloc(Symbol::constant(I32, Constant::Null));
        let b = table.alloc(Symbol::constant(I32, Constant::Null));
        table.define(3, a).unwrap();
        assert!(matches!(table.define(3, b), Err(Error::Redefinition(3))));
    }
}
