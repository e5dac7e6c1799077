use std::sync::Arc;

use parking_lot::Mutex;

use crate::ext::swlog::LogSinks;

/// Messages captured by [`collecting_sinks`].
#[derive(Debug, Clone, Default)]
pub struct CollectedLog {
    info: Arc<Mutex<Vec<String>>>,
    error: Arc<Mutex<Vec<String>>>,
}

impl CollectedLog {
    pub fn info(&self) -> Vec<String> {
        self.info.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.error.lock().clone()
    }

    pub fn has_error_containing(&self, fragment: &str) -> bool {
        self.error.lock().iter().any(|message| message.contains(fragment))
    }
}

/// Sinks recording every message, with a handle to read them back.
pub fn collecting_sinks() -> (LogSinks, CollectedLog) {
    let log = CollectedLog::default();
    let info = Arc::clone(&log.info);
    let error = Arc::clone(&log.error);

    let sinks = LogSinks::new(
        move |message| info.lock().push(message.to_string()),
        move |message| error.lock().push(message.to_string()),
    );
    (sinks, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{swerror, swinfo};

    #[test]
    fn macros_reach_the_sinks() {
        let (sinks, log) = collecting_sinks();
        swinfo!(sinks, "weaving {}", "App.Model");
        swerror!(&sinks, "cannot weave {}", 42);

        assert_eq!(log.info(), vec!["weaving App.Model".to_string()]);
        assert!(log.has_error_containing("cannot weave 42"));
    }
}
