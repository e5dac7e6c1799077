/// Prefix of the synthesized tracking field. The owning type's name is
/// appended to it.
pub const DEFAULT_FIELD_PREFIX: &str = "$SweepTracker";

/// Name fragment identifying handle-producing calls.
pub const DEFAULT_HANDLE_CALL_FRAGMENT: &str = "Subscribe";

/// Name of the parameterless teardown method.
pub const DEFAULT_RELEASE_METHOD: &str = "Dispose";

pub const DISPOSAL_CONTRACT_NAME: &str = "System.IDisposable";
pub const DISPOSAL_CONTRACT_ASSEMBLY: &str = "mscorlib";

pub const TRACKING_CONTAINER_NAME: &str = "System.Reactive.Disposables.CompositeDisposable";
pub const TRACKING_CONTAINER_ASSEMBLY: &str = "System.Reactive.Core";

/// Static pass-through helper: `(handle, container) -> handle`.
pub const REGISTRATION_HELPER_TYPE: &str = "Sweep.Core.TrackingExtensions";
pub const REGISTRATION_HELPER_METHOD: &str = "TrackWith";
pub const REGISTRATION_HELPER_ASSEMBLY: &str = "Sweep.Core";

pub const COMMAND_CAPABILITY_NAME: &str = "ReactiveUI.IReactiveCommand";
pub const COMMAND_CAPABILITY_ASSEMBLY: &str = "ReactiveUI";

pub const TRACK_HANDLES_MARKER: &str = "Sweep.Core.TrackHandlesAttribute";
pub const RELEASE_COMMANDS_MARKER: &str = "Sweep.Core.ReleaseCommandAttribute";

/// Name of the environment variable containing the path to the weave
/// configuration file. If not set, defaults to `Sweep.toml` in the current
/// directory.
pub const ENV_CONFIG_PATH: &str = "SWEEP_CONFIG_PATH";

pub const DEFAULT_CONFIG_FILE: &str = "Sweep.toml";
