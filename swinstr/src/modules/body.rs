//! Method bodies
//!
//! A [`MethodBody`] stores its instructions in an arena and keeps the
//! execution order in a separate index list. Every instruction receives a
//! stable [`InstrId`] when it enters the body; inserting new instructions
//! shifts positions but never invalidates handles. Branch instructions name
//! their target by handle, so rewriting passes can splice code anywhere
//! without recomputing offsets.
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::{modules::instructions::Instr, types::TypeRef, utils::Error};

new_key_type! {
    /// Stable handle to an instruction inside a [`MethodBody`].
    pub struct InstrId;
}

/// Handles of a freshly inserted instruction run, in order.
pub type InsertedRun = SmallVec<InstrId, 4>;

#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    arena: SlotMap<InstrId, Instr>,
    order: Vec<InstrId>,
    /// Types of the local variable slots (`ldloc`/`stloc` indices).
    pub locals: Vec<TypeRef>,
}

impl MethodBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a body from a straight sequence of instructions.
    pub fn from_instrs(instrs: impl IntoIterator<Item = Instr>) -> Self {
        let mut body = Self::new();
        for instr in instrs {
            body.push(instr);
        }
        body
    }

    pub fn with_locals(mut self, locals: impl IntoIterator<Item = TypeRef>) -> Self {
        self.locals = locals.into_iter().collect();
        self
    }

    /// Append an instruction at the end of the body.
    pub fn push(&mut self, instr: Instr) -> InstrId {
        let id = self.arena.insert(instr);
        self.order.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: InstrId) -> bool {
        self.arena.contains_key(id)
    }

    /// Instruction handles in execution order.
    pub fn ids(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.order.iter().copied()
    }

    /// Instructions with their handles, in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (InstrId, &Instr)> + '_ {
        self.order.iter().map(|&id| (id, &self.arena[id]))
    }

    pub fn instrs(&self) -> impl Iterator<Item = &Instr> + '_ {
        self.order.iter().map(|&id| &self.arena[id])
    }

    pub fn get(&self, id: InstrId) -> Option<&Instr> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: InstrId) -> Option<&mut Instr> {
        self.arena.get_mut(id)
    }

    /// Current position of `id` in execution order.
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.order.iter().position(|&candidate| candidate == id)
    }

    pub fn at(&self, position: usize) -> Option<InstrId> {
        self.order.get(position).copied()
    }

    pub fn first(&self) -> Option<InstrId> {
        self.order.first().copied()
    }

    pub fn last(&self) -> Option<InstrId> {
        self.order.last().copied()
    }

    pub fn next(&self, id: InstrId) -> Option<InstrId> {
        self.position(id).and_then(|position| self.at(position + 1))
    }

    /// The `ret` that closes the body, i.e. the last instruction when it is a
    /// return. Bodies ending in anything else have no final exit.
    pub fn final_exit(&self) -> Option<InstrId> {
        self.last().filter(|&id| self.arena[id].is_ret())
    }

    /// Point the branch instruction `branch` at `target`.
    pub fn set_branch_target(&mut self, branch: InstrId, target: InstrId) -> Result<(), Error> {
        if !self.contains(target) {
            return Err(Error::UnknownInstruction(target));
        }
        match self.arena.get_mut(branch).and_then(Instr::branch_target_mut) {
            Some(slot) => {
                *slot = target;
                Ok(())
            }
            None => Err(Error::UnknownInstruction(branch)),
        }
    }

    /// Redirect every branch targeting `from` to `to`. Returns the number of
    /// branches rewritten.
    pub fn retarget_branches(&mut self, from: InstrId, to: InstrId) -> usize {
        let mut count = 0;
        for &id in &self.order {
            if id == to {
                continue;
            }
            if let Some(slot) = self.arena[id].branch_target_mut() {
                if *slot == from {
                    *slot = to;
                    count += 1;
                }
            }
        }
        count
    }

    /// Insert `instrs` right before `anchor`. Branches targeting `anchor`
    /// keep targeting it, so they skip the inserted run.
    pub fn insert_before(
        &mut self,
        anchor: InstrId,
        instrs: impl IntoIterator<Item = Instr>,
    ) -> Result<InsertedRun, Error> {
        let position = self
            .position(anchor)
            .ok_or(Error::UnknownInstruction(anchor))?;
        Ok(self.insert_at(position, instrs))
    }

    /// Insert `instrs` right after `anchor`.
    pub fn insert_after(
        &mut self,
        anchor: InstrId,
        instrs: impl IntoIterator<Item = Instr>,
    ) -> Result<InsertedRun, Error> {
        let position = self
            .position(anchor)
            .ok_or(Error::UnknownInstruction(anchor))?;
        Ok(self.insert_at(position + 1, instrs))
    }

    /// Insert `instrs` right before `anchor` and redirect branches that
    /// targeted `anchor` to the first inserted instruction, so every path
    /// reaching `anchor` now runs the inserted code first.
    pub fn insert_before_retargeting(
        &mut self,
        anchor: InstrId,
        instrs: impl IntoIterator<Item = Instr>,
    ) -> Result<InsertedRun, Error> {
        let inserted = self.insert_before(anchor, instrs)?;
        if let Some(&head) = inserted.first() {
            let count = self.retarget_branches(anchor, head);
            if count > 0 {
                log::trace!("retargeted {count} branch(es) onto inserted run");
            }
        }
        Ok(inserted)
    }

    fn insert_at(&mut self, position: usize, instrs: impl IntoIterator<Item = Instr>) -> InsertedRun {
        let inserted: InsertedRun = instrs
            .into_iter()
            .map(|instr| self.arena.insert(instr))
            .collect();
        self.order
            .splice(position..position, inserted.iter().copied());
        inserted
    }
}
