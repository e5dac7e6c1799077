use std::fmt;

/// Callback receiving one formatted message.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Sinks injected by the host: an informational one and an error one.
///
/// Messages sent through [`swinfo!`](crate::swinfo) and
/// [`swerror!`](crate::swerror) are also mirrored to the `log` facade, so a
/// host without sinks can still observe the run through its logger.
pub struct LogSinks {
    pub info: LogCallback,
    pub error: LogCallback,
}

impl LogSinks {
    pub fn new(
        info: impl Fn(&str) + Send + Sync + 'static,
        error: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            info: Box::new(info),
            error: Box::new(error),
        }
    }

    /// Sinks discarding every message.
    pub fn silent() -> Self {
        Self::new(|_| {}, |_| {})
    }

    pub fn emit_info(&self, message: &str) {
        (self.info)(message)
    }

    pub fn emit_error(&self, message: &str) {
        (self.error)(message)
    }
}

impl Default for LogSinks {
    fn default() -> Self {
        Self::silent()
    }
}

impl fmt::Debug for LogSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSinks").finish_non_exhaustive()
    }
}

#[macro_export]
macro_rules! swinfo {
    (
        $sinks:expr,
        $( $arg:tt )*
    ) => {
        {
            let msg = format!($($arg)*);
            $crate::log::info!("{}", msg);
            ($sinks).emit_info(&msg);
        }
    };
}

#[macro_export]
macro_rules! swerror {
    (
        $sinks:expr,
        $( $arg:tt )*
    ) => {
        {
            let msg = format!($($arg)*);
            $crate::log::error!("{}", msg);
            ($sinks).emit_error(&msg);
        }
    };
}
