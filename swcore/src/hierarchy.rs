//! Type-hierarchy queries
//!
//! Base types are parent pointers resolved through the module's type index.
//! Every walk is iterative and bounded by the number of types in the module,
//! so a malformed (cyclic) chain still terminates.
use std::collections::BTreeSet;

use swinstr::{
    modules::{MethodKey, Module, TypeKey},
    types::TypeRef,
};

use crate::utils::error::{WeaveError, WeaveResult};

/// Iterator over a type and its ancestors, nearest first.
pub struct Ancestors<'m> {
    module: &'m Module,
    next: Option<TypeKey>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = TypeKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next?;
        self.next = self.module.base_of(current);
        Some(current)
    }
}

/// Hierarchy queries against the disposal contract and the teardown method.
#[derive(Clone, Copy)]
pub struct Hierarchy<'m> {
    module: &'m Module,
    contract: &'m TypeRef,
    release_method: &'m str,
}

impl<'m> Hierarchy<'m> {
    pub fn new(module: &'m Module, contract: &'m TypeRef, release_method: &'m str) -> Self {
        Self {
            module,
            contract,
            release_method,
        }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn contract(&self) -> &'m TypeRef {
        self.contract
    }

    pub fn release_method(&self) -> &'m str {
        self.release_method
    }

    /// `ty` itself followed by its resolvable ancestors.
    pub fn ancestors(&self, ty: TypeKey) -> Ancestors<'m> {
        Ancestors {
            module: self.module,
            next: Some(ty),
            remaining: self.module.type_count(),
        }
    }

    /// `true` when `ty` or one of its ancestors declares the disposal
    /// contract among its interfaces.
    pub fn is_disposable(&self, ty: TypeKey) -> bool {
        self.ancestors(ty).any(|key| {
            self.module[key]
                .interfaces
                .iter()
                .any(|interface| interface == self.contract)
        })
    }

    /// Parameterless instance teardown declared directly on `ty`.
    pub fn own_teardown(&self, ty: TypeKey) -> Option<MethodKey> {
        self.module
            .methods_of(ty)
            .find(|(_, method)| {
                method.name == self.release_method
                    && !method.has_params()
                    && !method.is_constructor()
                    && !method.is_static()
            })
            .map(|(key, _)| key)
    }

    pub fn has_own_teardown(&self, ty: TypeKey) -> bool {
        self.own_teardown(ty).is_some()
    }

    /// Nearest teardown in self-then-ancestor order.
    pub fn resolve_teardown(&self, ty: TypeKey) -> WeaveResult<MethodKey> {
        self.ancestors(ty)
            .find_map(|key| self.own_teardown(key))
            .ok_or_else(|| WeaveError::NotDisposable(self.module[ty].definition_name()))
    }

    /// Nearest teardown strictly above `ty`.
    pub fn nearest_ancestor_teardown(&self, ty: TypeKey) -> WeaveResult<MethodKey> {
        self.ancestors(ty)
            .skip(1)
            .find_map(|key| self.own_teardown(key))
            .ok_or_else(|| WeaveError::NotDisposable(self.module[ty].definition_name()))
    }

    /// The reference through which `ty` sees its ancestor `ancestor`: the
    /// base-type reference of the link that reaches it, carrying the generic
    /// arguments of that link.
    pub fn ancestor_ref(&self, ty: TypeKey, ancestor: TypeKey) -> TypeRef {
        let mut chain = self.ancestors(ty).peekable();
        while let Some(current) = chain.next() {
            if chain.peek() == Some(&ancestor) {
                if let Some(base) = &self.module[current].base_type {
                    return base.clone();
                }
            }
        }
        self.module[ancestor].self_instance()
    }

    /// Whether a value of type `ty` can be used where `target` is expected:
    /// same type, or `target` is reached through base types or (transitively)
    /// implemented interfaces.
    pub fn is_assignable_to(&self, ty: &TypeRef, target: &TypeRef) -> bool {
        let mut visited = BTreeSet::new();
        let mut worklist = vec![ty.clone()];

        while let Some(current) = worklist.pop() {
            if current == *target {
                return true;
            }
            if !visited.insert(current.definition_name()) {
                continue;
            }
            if let Some(key) = self.module.resolve(&current) {
                let def = &self.module[key];
                worklist.extend(def.base_type.iter().cloned());
                worklist.extend(def.interfaces.iter().cloned());
            }
        }

        false
    }
}
