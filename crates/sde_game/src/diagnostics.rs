//! The text diagnostic channel: boot messages, script errors and the debug
//! line all go through a `DiagnosticSink`.

use std::collections::HashSet;

use sde_core::config::RuntimeConfig;

/// Log target used for script-facing diagnostics.
pub const DIAGNOSTIC_TARGET: &str = "dbgio";

pub trait DiagnosticSink {
    fn emit(&mut self, level: log::Level, line: &str);

    fn info(&mut self, line: &str) {
        self.emit(log::Level::Info, line);
    }

    fn warn(&mut self, line: &str) {
        self.emit(log::Level::Warn, line);
    }

    fn error(&mut self, line: &str) {
        self.emit(log::Level::Error, line);
    }
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&mut self, level: log::Level, line: &str) {
        log::log!(target: DIAGNOSTIC_TARGET, level, "{line}");
    }
}

/// Remembers which keys have already been reported.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    /// True the first time `key` is seen.
    pub fn first(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Report each required asset as found or missing. Returns the missing count.
pub fn check_required_assets(config: &RuntimeConfig, sink: &mut dyn DiagnosticSink) -> usize {
    let mut missing = 0;
    for asset in &config.required_assets {
        let path = config.resolve_asset(asset);
        if path.is_file() {
            sink.info(&format!("FOUND:   {asset}"));
        } else {
            sink.warn(&format!("MISSING: {asset}"));
            missing += 1;
        }
    }
    missing
}

#[cfg(test)]
pub use memory::MemorySink;

#[cfg(test)]
mod memory {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::DiagnosticSink;

    /// Collects lines in memory; clones share the same buffer.
    #[derive(Debug, Default, Clone)]
    pub struct MemorySink {
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl MemorySink {
        pub fn lines(&self) -> Vec<String> {
            self.lines.borrow().clone()
        }

        pub fn count_containing(&self, needle: &str) -> usize {
            self.lines
                .borrow()
                .iter()
                .filter(|l| l.contains(needle))
                .count()
        }
    }

    impl DiagnosticSink for MemorySink {
        fn emit(&mut self, _level: log::Level, line: &str) {
            self.lines.borrow_mut().push(line.to_string());
        }
    }
}
