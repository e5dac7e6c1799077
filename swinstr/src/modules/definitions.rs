//! Type, method, field and property definitions.
//!
//! Definitions are owned by a [`Module`](crate::modules::Module) and refer
//! to each other through arena keys. Builders (`with_*`, `extends`, `param`,
//! ...) consume and return `self` so fixtures and loaders can describe a
//! definition in one expression before handing it to the module.
use bitflags::bitflags;
use strum::EnumIs;

use crate::{
    modules::{FieldKey, MethodKey, PropertyKey, TypeKey, body::MethodBody},
    types::{CONSTRUCTOR_NAME, TypeRef},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        const INTERFACE = 1 << 0;
        const ABSTRACT = 1 << 1;
        const SEALED = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u16 {
        const STATIC = 1 << 0;
        const VIRTUAL = 1 << 1;
        const ABSTRACT = 1 << 2;
        /// Overrides the slot of the base method instead of opening a new one.
        const REUSE_SLOT = 1 << 3;
        const NEW_SLOT = 1 << 4;
        const HIDE_BY_SIG = 1 << 5;
        const SPECIAL_NAME = 1 << 6;
        const CONSTRUCTOR = 1 << 7;
        /// Virtual method that derived types may not override.
        const FINAL = 1 << 8;

        /// The combination carried by an overridable method.
        const OVERRIDABLE = Self::VIRTUAL.bits() | Self::REUSE_SLOT.bits() | Self::HIDE_BY_SIG.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u8 {
        const STATIC = 1 << 0;
        const INIT_ONLY = 1 << 1;
    }
}

/// Member accessibility.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, EnumIs)]
pub enum Visibility {
    #[default]
    Private,
    /// Visible to derived types.
    Family,
    /// Visible inside the defining assembly.
    Assembly,
    Public,
}

/// Where a type definition comes from.
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, EnumIs)]
pub enum TypeOrigin {
    /// Defined by the module itself. Only local types are ever rewritten.
    #[default]
    Local,
    /// Metadata of a type defined in a referenced assembly.
    Imported { assembly: String },
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub namespace: String,
    pub name: String,
    pub origin: TypeOrigin,
    /// Parent pointer, resolved through the module index.
    pub base_type: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub generic_params: Vec<String>,
    pub flags: TypeFlags,
    /// Custom attributes attached to the type.
    pub attributes: Vec<TypeRef>,
    pub(crate) fields: Vec<FieldKey>,
    pub(crate) methods: Vec<MethodKey>,
    pub(crate) properties: Vec<PropertyKey>,
}

impl TypeDefinition {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            origin: TypeOrigin::Local,
            base_type: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            flags: TypeFlags::empty(),
            attributes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Metadata for a type living in `assembly`.
    pub fn imported(
        namespace: impl Into<String>,
        name: impl Into<String>,
        assembly: impl Into<String>,
    ) -> Self {
        Self {
            origin: TypeOrigin::Imported {
                assembly: assembly.into(),
            },
            ..Self::new(namespace, name)
        }
    }

    pub fn extends(mut self, base: TypeRef) -> Self {
        self.base_type = Some(base);
        self
    }

    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn generic(mut self, param: impl Into<String>) -> Self {
        self.generic_params.push(param.into());
        self
    }

    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_attribute(mut self, attribute: TypeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn definition_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn has_generic_params(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::INTERFACE)
    }

    /// Open reference to this definition (no generic arguments).
    pub fn type_ref(&self) -> TypeRef {
        let reference = TypeRef::new(self.namespace.clone(), self.name.clone());
        match &self.origin {
            TypeOrigin::Local => reference,
            TypeOrigin::Imported { assembly } => reference.in_scope(assembly.clone()),
        }
    }

    /// Reference to this definition instantiated over its own generic
    /// parameters (`Box<T>` seen from inside `Box<T>`). Members of generic
    /// types must be referenced through this form.
    pub fn self_instance(&self) -> TypeRef {
        self.type_ref().with_generic_args(
            self.generic_params
                .iter()
                .map(|param| TypeRef::generic_parameter(param.clone())),
        )
    }

    pub fn fields(&self) -> &[FieldKey] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodKey] {
        &self.methods
    }

    pub fn properties(&self) -> &[PropertyKey] {
        &self.properties
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamDefinition {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Owning type. Assigned when the method is added to a module.
    pub declaring_type: TypeKey,
    pub name: String,
    pub return_type: Option<TypeRef>,
    pub params: Vec<ParamDefinition>,
    /// Absent for abstract and extern methods, and for imported metadata.
    pub body: Option<MethodBody>,
    pub flags: MethodFlags,
    pub visibility: Visibility,
    pub attributes: Vec<TypeRef>,
}

impl MethodDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            declaring_type: TypeKey::default(),
            name: name.into(),
            return_type: None,
            params: Vec::new(),
            body: None,
            flags: MethodFlags::HIDE_BY_SIG,
            visibility: Visibility::Public,
            attributes: Vec::new(),
        }
    }

    /// An instance constructor.
    pub fn constructor() -> Self {
        Self::new(CONSTRUCTOR_NAME)
            .with_flags(MethodFlags::SPECIAL_NAME | MethodFlags::CONSTRUCTOR)
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.push(ParamDefinition {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_attribute(mut self, attribute: TypeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR)
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    pub fn is_final(&self) -> bool {
        self.flags.contains(MethodFlags::FINAL)
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub declaring_type: TypeKey,
    pub name: String,
    pub field_type: TypeRef,
    pub visibility: Visibility,
    pub flags: FieldFlags,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: TypeRef) -> Self {
        Self {
            declaring_type: TypeKey::default(),
            name: name.into(),
            field_type,
            visibility: Visibility::Private,
            flags: FieldFlags::empty(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags |= flags;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub declaring_type: TypeKey,
    pub name: String,
    pub property_type: TypeRef,
    pub getter: Option<MethodKey>,
    pub setter: Option<MethodKey>,
    pub attributes: Vec<TypeRef>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, property_type: TypeRef) -> Self {
        Self {
            declaring_type: TypeKey::default(),
            name: name.into(),
            property_type,
            getter: None,
            setter: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_getter(mut self, getter: MethodKey) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn with_setter(mut self, setter: MethodKey) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_attribute(mut self, attribute: TypeRef) -> Self {
        self.attributes.push(attribute);
        self
    }
}
