//! Module IR
//!
//! A [`Module`] is the unit handed to rewriting passes: it owns every type,
//! method, field and property definition it knows about, addressed through
//! stable arena keys. Submodules:
//!
//! - `definitions`: type/method/field/property definitions and their flags
//! - `instructions`: the stack instruction set ([`instructions::Instr`])
//! - `body`: arena-backed method bodies with stable instruction handles
//! - `control_flow`: CFG construction and evaluation-stack verification
//!
//! Besides its own (*local*) types, a module may hold *imported* metadata
//! for types of referenced assemblies. Imported definitions take part in
//! hierarchy walks and symbol lookup but are never rewritten.
use std::{
    collections::BTreeMap,
    ops::{Index, IndexMut},
};

use slotmap::{SlotMap, new_key_type};
use uuid::Uuid;

use crate::{
    modules::definitions::{
        FieldDefinition, MethodDefinition, PropertyDefinition, TypeDefinition,
    },
    types::{AssemblyRef, FieldRef, MethodRef, TypeRef},
    utils::Error,
};

pub mod body;
pub mod control_flow;
pub mod definitions;
pub mod fmt;
pub mod instructions;

new_key_type! {
    pub struct TypeKey;
    pub struct MethodKey;
    pub struct FieldKey;
    pub struct PropertyKey;
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// Module version id, unique per build of the module.
    pub mvid: Uuid,
    pub assembly_refs: Vec<AssemblyRef>,
    types: SlotMap<TypeKey, TypeDefinition>,
    type_order: Vec<TypeKey>,
    type_index: BTreeMap<String, TypeKey>,
    methods: SlotMap<MethodKey, MethodDefinition>,
    fields: SlotMap<FieldKey, FieldDefinition>,
    properties: SlotMap<PropertyKey, PropertyDefinition>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mvid: Uuid::new_v4(),
            assembly_refs: Vec::new(),
            types: SlotMap::with_key(),
            type_order: Vec::new(),
            type_index: BTreeMap::new(),
            methods: SlotMap::with_key(),
            fields: SlotMap::with_key(),
            properties: SlotMap::with_key(),
        }
    }

    pub fn add_assembly_ref(&mut self, assembly: AssemblyRef) {
        self.assembly_refs.push(assembly);
    }

    /// Find a referenced assembly by name. When several versions are
    /// referenced the highest one wins.
    pub fn find_assembly(&self, name: &str) -> Option<&AssemblyRef> {
        self.assembly_refs
            .iter()
            .filter(|assembly| assembly.name == name)
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Add a type definition. Member key lists of `def` are ignored; members
    /// are attached through [`Module::add_method`] and friends.
    pub fn add_type(&mut self, mut def: TypeDefinition) -> Result<TypeKey, Error> {
        let name = def.definition_name();
        if self.type_index.contains_key(&name) {
            return Err(Error::DuplicateType(name));
        }

        def.fields.clear();
        def.methods.clear();
        def.properties.clear();

        let key = self.types.insert(def);
        self.type_order.push(key);
        self.type_index.insert(name, key);
        Ok(key)
    }

    /// Attach a method to `ty`. Overloads share a name, so no uniqueness
    /// check is made.
    pub fn add_method(&mut self, ty: TypeKey, mut def: MethodDefinition) -> MethodKey {
        def.declaring_type = ty;
        let key = self.methods.insert(def);
        self.types[ty].methods.push(key);
        key
    }

    pub fn add_field(&mut self, ty: TypeKey, mut def: FieldDefinition) -> Result<FieldKey, Error> {
        if self.fields_of(ty).any(|(_, field)| field.name == def.name) {
            return Err(Error::DuplicateMember {
                type_name: self.types[ty].definition_name(),
                member: def.name,
            });
        }

        def.declaring_type = ty;
        let key = self.fields.insert(def);
        self.types[ty].fields.push(key);
        Ok(key)
    }

    pub fn add_property(
        &mut self,
        ty: TypeKey,
        mut def: PropertyDefinition,
    ) -> Result<PropertyKey, Error> {
        if self.properties_of(ty).any(|(_, prop)| prop.name == def.name) {
            return Err(Error::DuplicateMember {
                type_name: self.types[ty].definition_name(),
                member: def.name,
            });
        }

        def.declaring_type = ty;
        let key = self.properties.insert(def);
        self.types[ty].properties.push(key);
        Ok(key)
    }

    pub fn type_count(&self) -> usize {
        self.type_order.len()
    }

    /// All types, local and imported, in insertion order.
    pub fn types(&self) -> impl Iterator<Item = (TypeKey, &TypeDefinition)> + '_ {
        self.type_order.iter().map(|&key| (key, &self.types[key]))
    }

    /// Types defined by this module, in declaration order.
    pub fn local_types(&self) -> impl Iterator<Item = (TypeKey, &TypeDefinition)> + '_ {
        self.types().filter(|(_, def)| def.origin.is_local())
    }

    pub fn find_type(&self, definition_name: &str) -> Option<TypeKey> {
        self.type_index.get(definition_name).copied()
    }

    /// Resolve a reference to the definition it instantiates. Generic
    /// parameters never resolve.
    pub fn resolve(&self, ty: &TypeRef) -> Option<TypeKey> {
        if ty.is_generic_parameter {
            return None;
        }
        self.find_type(&ty.definition_name())
    }

    /// Parent of `ty`, when its base type resolves inside the module.
    pub fn base_of(&self, ty: TypeKey) -> Option<TypeKey> {
        self.types[ty]
            .base_type
            .as_ref()
            .and_then(|base| self.resolve(base))
    }

    pub fn methods_of(&self, ty: TypeKey) -> impl Iterator<Item = (MethodKey, &MethodDefinition)> + '_ {
        self.types[ty]
            .methods
            .iter()
            .map(|&key| (key, &self.methods[key]))
    }

    /// Instance and static constructors declared directly on `ty`.
    pub fn constructors_of(
        &self,
        ty: TypeKey,
    ) -> impl Iterator<Item = (MethodKey, &MethodDefinition)> + '_ {
        self.methods_of(ty).filter(|(_, method)| method.is_constructor())
    }

    pub fn fields_of(&self, ty: TypeKey) -> impl Iterator<Item = (FieldKey, &FieldDefinition)> + '_ {
        self.types[ty]
            .fields
            .iter()
            .map(|&key| (key, &self.fields[key]))
    }

    pub fn properties_of(
        &self,
        ty: TypeKey,
    ) -> impl Iterator<Item = (PropertyKey, &PropertyDefinition)> + '_ {
        self.types[ty]
            .properties
            .iter()
            .map(|&key| (key, &self.properties[key]))
    }

    /// Reference to a method through its declaring type (instantiated over
    /// its own generic parameters when the type is generic).
    pub fn method_ref(&self, method: MethodKey) -> MethodRef {
        let def = &self.methods[method];
        MethodRef {
            declaring_type: self.types[def.declaring_type].self_instance(),
            name: def.name.clone(),
            return_type: def.return_type.clone(),
            params: def.params.iter().map(|param| param.ty.clone()).collect(),
            has_this: !def.is_static(),
        }
    }

    pub fn field_ref(&self, field: FieldKey) -> FieldRef {
        let def = &self.fields[field];
        FieldRef::new(
            self.types[def.declaring_type].self_instance(),
            def.name.clone(),
            def.field_type.clone(),
        )
    }

    /// Verify the evaluation stack of every local method body.
    pub fn verify(&self) -> Result<(), Error> {
        for (ty, _) in self.local_types() {
            for (_, method) in self.methods_of(ty) {
                if let Some(body) = &method.body {
                    body.verify_stack(method.return_type.is_some())?;
                }
            }
        }
        Ok(())
    }
}

impl Index<TypeKey> for Module {
    type Output = TypeDefinition;

    fn index(&self, key: TypeKey) -> &Self::Output {
        &self.types[key]
    }
}

impl IndexMut<TypeKey> for Module {
    fn index_mut(&mut self, key: TypeKey) -> &mut Self::Output {
        &mut self.types[key]
    }
}

impl Index<MethodKey> for Module {
    type Output = MethodDefinition;

    fn index(&self, key: MethodKey) -> &Self::Output {
        &self.methods[key]
    }
}

impl IndexMut<MethodKey> for Module {
    fn index_mut(&mut self, key: MethodKey) -> &mut Self::Output {
        &mut self.methods[key]
    }
}

impl Index<FieldKey> for Module {
    type Output = FieldDefinition;

    fn index(&self, key: FieldKey) -> &Self::Output {
        &self.fields[key]
    }
}

impl Index<PropertyKey> for Module {
    type Output = PropertyDefinition;

    fn index(&self, key: PropertyKey) -> &Self::Output {
        &self.properties[key]
    }
}
