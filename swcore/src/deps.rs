//! Binding of the external collaborators the instrumentation calls into.
//!
//! Every collaborator lives in a referenced assembly. The host is expected
//! to have imported the metadata of their types into the module; resolution
//! fails with a configuration error otherwise.
use swinstr::{
    modules::{
        Module, MethodKey, TypeKey,
        definitions::{MethodDefinition, TypeOrigin},
    },
    types::{AssemblyRef, MethodRef, TypeRef},
};

use crate::{
    config::{SymbolConfig, WeaveConfig},
    utils::error::{WeaveError, WeaveResult},
};

/// Collaborators of the handle-tracking family. The disposal contract and
/// its release method are shared with the command-release family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
    pub disposal_contract: TypeRef,
    pub disposal_release: MethodRef,
    pub container: TypeRef,
    pub container_ctor: MethodRef,
    pub container_release: MethodRef,
    pub helper: MethodRef,
}

/// Collaborators needed by the command-release family only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDependencies {
    pub capability: TypeRef,
}

impl Dependencies {
    pub fn resolve(module: &Module, config: &WeaveConfig) -> WeaveResult<Self> {
        let release = config.release_method.as_str();

        let contract = resolve_type(module, &config.disposal_contract)?;
        let disposal_release = find_method(module, contract, |name, method| {
            name == release && !method.has_params() && !method.is_constructor()
        })
        .ok_or_else(|| missing_member(module, contract, release))?;

        let container = resolve_type(module, &config.tracking_container)?;
        let container_ctor = find_method(module, container, |_, method| {
            method.is_constructor() && !method.is_static() && !method.has_params()
        })
        .ok_or_else(|| missing_member(module, container, ".ctor()"))?;
        let container_release = find_method(module, container, |name, method| {
            name == release && !method.has_params() && !method.is_constructor()
        })
        .ok_or_else(|| missing_member(module, container, release))?;

        let helper_config = &config.registration_helper;
        let helper_type = resolve_type(
            module,
            &SymbolConfig::new(&helper_config.type_name, &helper_config.assembly),
        )?;

        // The helper is `static Contract Helper(Contract handle, Container container)`.
        let contract_ref = module[contract].type_ref();
        let container_ref = module[container].type_ref();
        let candidates: Vec<MethodKey> = module
            .methods_of(helper_type)
            .filter(|(_, method)| method.name == helper_config.member)
            .map(|(key, _)| key)
            .collect();
        let helper = match candidates.as_slice() {
            [single] => {
                let method = &module[*single];
                let params_match = method.is_static()
                    && method.params.len() == 2
                    && method.params[0].ty == contract_ref
                    && method.params[1].ty == container_ref
                    && method.return_type.as_ref() == Some(&contract_ref);
                params_match.then_some(*single)
            }
            _ => None,
        }
        .ok_or_else(|| missing_member(module, helper_type, &helper_config.member))?;

        let deps = Self {
            disposal_contract: contract_ref,
            disposal_release: module.method_ref(disposal_release),
            container: container_ref,
            container_ctor: module.method_ref(container_ctor),
            container_release: module.method_ref(container_release),
            helper: module.method_ref(helper),
        };

        log::debug!("tracking container: {}", deps.container_ctor);
        log::debug!("container release: {}", deps.container_release);
        log::debug!("registration helper: {}", deps.helper);
        Ok(deps)
    }
}

impl CommandDependencies {
    pub fn resolve(module: &Module, config: &WeaveConfig) -> WeaveResult<Self> {
        let capability = resolve_type(module, &config.command_capability)?;
        let deps = Self {
            capability: module[capability].type_ref(),
        };

        log::debug!("command capability: {}", deps.capability);
        Ok(deps)
    }
}

/// Find the referenced assembly named `name`, latest version first.
pub fn find_assembly<'m>(module: &'m Module, name: &str) -> WeaveResult<&'m AssemblyRef> {
    module
        .find_assembly(name)
        .ok_or_else(|| WeaveError::MissingAssembly {
            name: name.to_string(),
            available: module
                .assembly_refs
                .iter()
                .map(|assembly| assembly.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Resolve a collaborator type from the imported metadata of its assembly.
pub fn resolve_type(module: &Module, symbol: &SymbolConfig) -> WeaveResult<TypeKey> {
    let assembly = find_assembly(module, &symbol.assembly)?;
    log::trace!("resolving `{}` against {}", symbol.name, assembly);

    let missing = || WeaveError::MissingType {
        name: symbol.name.clone(),
        assembly: symbol.assembly.clone(),
    };

    let key = module.find_type(&symbol.name).ok_or_else(missing)?;
    match &module[key].origin {
        TypeOrigin::Imported { assembly } if *assembly == symbol.assembly => Ok(key),
        _ => Err(missing()),
    }
}

fn find_method(
    module: &Module,
    ty: TypeKey,
    predicate: impl Fn(&str, &MethodDefinition) -> bool,
) -> Option<MethodKey> {
    module
        .methods_of(ty)
        .find(|(_, method)| predicate(&method.name, method))
        .map(|(key, _)| key)
}

fn missing_member(module: &Module, ty: TypeKey, member: &str) -> WeaveError {
    WeaveError::MissingMember {
        type_name: module[ty].definition_name(),
        member: member.to_string(),
    }
}
