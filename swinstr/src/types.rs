//! Symbol references
//!
//! References are the way instructions and signatures point at types,
//! methods and fields. They are plain data: a reference does not have to
//! resolve to a definition inside the [`Module`](crate::modules::Module) (it
//! may name something from another assembly the module was never given
//! metadata for).
//!
//! Identity of a [`TypeRef`] is its *full name*: namespace, name and generic
//! arguments. The resolution scope (the assembly the reference points into)
//! is carried along for diagnostics but does not take part in equality, so
//! two references to `System.IDisposable` issued from different scopes are
//! the same type.
use std::{
    fmt,
    hash::{Hash, Hasher},
};

use semver::Version;
use smallvec::SmallVec;

/// Name used by every instance and static constructor.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Full name printed for a missing return type.
pub const VOID_TYPE_NAME: &str = "System.Void";

/// A reference to an external assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyRef {
    pub name: String,
    pub version: Version,
}

impl AssemblyRef {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for AssemblyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// A reference to a type, possibly instantiated with generic arguments.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub namespace: String,
    pub name: String,
    /// Name of the assembly this reference resolves into, if known.
    pub scope: Option<String>,
    pub generic_args: Vec<TypeRef>,
    /// `true` for a reference to a generic parameter (`T`) rather than a type.
    pub is_generic_parameter: bool,
}

impl TypeRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            scope: None,
            generic_args: Vec::new(),
            is_generic_parameter: false,
        }
    }

    /// Build a reference from a dotted full name such as
    /// `System.Reactive.Disposables.CompositeDisposable`. Everything up to the
    /// last dot is the namespace.
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.rsplit_once('.') {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::new("", full_name),
        }
    }

    /// A reference to the generic parameter `name` of the enclosing definition.
    pub fn generic_parameter(name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
            scope: None,
            generic_args: Vec::new(),
            is_generic_parameter: true,
        }
    }

    pub fn in_scope(mut self, assembly: impl Into<String>) -> Self {
        self.scope = Some(assembly.into());
        self
    }

    pub fn with_generic_args(mut self, args: impl IntoIterator<Item = TypeRef>) -> Self {
        self.generic_args = args.into_iter().collect();
        self
    }

    pub fn is_generic_instance(&self) -> bool {
        !self.generic_args.is_empty()
    }

    /// Name of the definition this reference instantiates, without generic
    /// arguments. This is the key used to resolve references in a module.
    pub fn definition_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Full name including generic arguments, e.g. `Ns.Box<System.Object>`.
    pub fn full_name(&self) -> String {
        self.to_string()
    }

    /// The same reference with generic arguments dropped.
    pub fn definition(&self) -> TypeRef {
        Self {
            generic_args: Vec::new(),
            ..self.clone()
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.is_generic_parameter == other.is_generic_parameter
            && self.namespace == other.namespace
            && self.name == other.name
            && self.generic_args == other.generic_args
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_generic_parameter.hash(state);
        self.namespace.hash(state);
        self.name.hash(state);
        self.generic_args.hash(state);
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        write!(f, "{}", self.name)?;

        if let Some((first, rest)) = self.generic_args.split_first() {
            write!(f, "<{}", first)?;
            for arg in rest {
                write!(f, ",{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// A reference to a method through its declaring type and signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    pub name: String,
    /// `None` for methods returning nothing.
    pub return_type: Option<TypeRef>,
    pub params: SmallVec<TypeRef, 4>,
    /// Instance methods receive `this` as an implicit first argument.
    pub has_this: bool,
}

impl MethodRef {
    pub fn new(declaring_type: TypeRef, name: impl Into<String>) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            return_type: None,
            params: SmallVec::new(),
            has_this: true,
        }
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn static_(mut self) -> Self {
        self.has_this = false;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Number of evaluation-stack slots consumed by a call to this method
    /// (arguments plus the receiver).
    pub fn arity(&self) -> usize {
        self.params.len() + usize::from(self.has_this)
    }

    /// Full signature name: `Ret Declaring::Name(P1,P2)`.
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.return_type {
            Some(ty) => write!(f, "{} ", ty)?,
            None => write!(f, "{} ", VOID_TYPE_NAME)?,
        }
        write!(f, "{}::{}(", self.declaring_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

/// A reference to an instance field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub field_type: TypeRef,
}

impl FieldRef {
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, field_type: TypeRef) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            field_type,
        }
    }

    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.field_type, self.declaring_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_scope() {
        let a = TypeRef::new("System", "IDisposable").in_scope("mscorlib");
        let b = TypeRef::from_full_name("System.IDisposable");
        assert_eq!(a, b);
        assert_eq!(a.full_name(), "System.IDisposable");
    }

    #[test]
    fn generic_instances_print_their_arguments() {
        let object = TypeRef::from_full_name("System.Object");
        let decorated = TypeRef::new("App", "Decorator`1").with_generic_args([object]);
        assert_eq!(decorated.full_name(), "App.Decorator`1<System.Object>");
        assert_eq!(decorated.definition_name(), "App.Decorator`1");
        assert_ne!(decorated, decorated.definition());
    }

    #[test]
    fn method_signature_shape() {
        let disposable = TypeRef::from_full_name("System.IDisposable");
        let subscribe = MethodRef::new(TypeRef::from_full_name("System.ObservableExtensions"), "Subscribe")
            .static_()
            .returns(disposable)
            .param(TypeRef::from_full_name("System.IObservable`1"));

        assert_eq!(
            subscribe.full_name(),
            "System.IDisposable System.ObservableExtensions::Subscribe(System.IObservable`1)"
        );
        assert_eq!(subscribe.arity(), 1);
    }
}
