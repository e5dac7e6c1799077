use strum::EnumIs;
use thiserror::Error;

#[derive(Debug, Error, EnumIs)]
pub enum WeaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not find assembly: {name} ({available})")]
    MissingAssembly { name: String, available: String },

    #[error("Could not resolve type '{name}' from assembly '{assembly}'")]
    MissingType { name: String, assembly: String },

    #[error("Type '{type_name}' has no member '{member}' with the expected signature")]
    MissingMember { type_name: String, member: String },

    #[error("Target class {0} is not disposable and therefore cannot be woven")]
    NotDisposable(String),

    #[error(
        "Automatically generating a {method} method for {type_name} is not supported due to generics in its inheritance hierarchy. You need to create an empty parameterless {method}() and re-build"
    )]
    UnsupportedGenericSynthesis { type_name: String, method: String },

    #[error("Teardown method '{0}' has no body ending in a return instruction")]
    MissingFinalExit(String),

    #[error("Teardown method '{0}' is final and cannot be overridden")]
    FinalTeardown(String),

    #[error("Type '{0}' already declares its tracking field")]
    TrackingFieldExists(String),

    #[error(transparent)]
    Ir(#[from] swinstr::utils::Error),
}

impl WeaveError {
    /// Errors that only disqualify the offending target. The run reports
    /// them and moves on to the next target.
    pub fn is_per_target(&self) -> bool {
        matches!(
            self,
            WeaveError::NotDisposable(_)
                | WeaveError::UnsupportedGenericSynthesis { .. }
                | WeaveError::MissingFinalExit(_)
                | WeaveError::FinalTeardown(_)
        )
    }

    /// Errors raised while binding the run to its collaborators. Nothing is
    /// woven when one of them occurs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WeaveError::Io(_)
                | WeaveError::ConfigParse { .. }
                | WeaveError::ConfigSerialize(_)
                | WeaveError::MissingAssembly { .. }
                | WeaveError::MissingType { .. }
                | WeaveError::MissingMember { .. }
        )
    }
}

pub type WeaveResult<T> = Result<T, WeaveError>;
