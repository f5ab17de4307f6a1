// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Injected diagnostics for the controller crates.
//!
//! Components never log through global state. They receive a [`Diagnostics`]
//! sink and emit through the macros of this crate, which take the sink as
//! their first argument:
//!
//! ```rust
//! use rftc_log::MemoryDiagnostics;
//!
//! let sink = MemoryDiagnostics::new();
//! rftc_log::warn!(sink, "capture unit {} skipped step {}", 2, 7);
//! assert!(sink.contains("skipped step 7"));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[doc(hidden)]
pub use log as _log;
pub use log::Level;

/// A sink for diagnostic messages.
pub trait Diagnostics: Send + Sync {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>);

    /// Whether verbose diagnostics (see [`diagnostic!`]) should be produced.
    fn is_verbose(&self) -> bool {
        false
    }
}

impl<T: Diagnostics + ?Sized> Diagnostics for Arc<T> {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        (**self).emit(level, args)
    }

    fn is_verbose(&self) -> bool {
        (**self).is_verbose()
    }
}

impl<T: Diagnostics + ?Sized> Diagnostics for Box<T> {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        (**self).emit(level, args)
    }

    fn is_verbose(&self) -> bool {
        (**self).is_verbose()
    }
}

#[macro_export]
macro_rules! debug {
    ($sink:expr, $($arg:tt)+) => {
        $crate::Diagnostics::emit(&$sink, $crate::Level::Debug, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! info {
    ($sink:expr, $($arg:tt)+) => {
        $crate::Diagnostics::emit(&$sink, $crate::Level::Info, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! warn {
    ($sink:expr, $($arg:tt)+) => {
        $crate::Diagnostics::emit(&$sink, $crate::Level::Warn, format_args!($($arg)+))
    };
}

/// Emit a message at info level if the sink is verbose.
#[macro_export]
macro_rules! diagnostic {
    ($sink:expr, $($arg:tt)+) => {
        if $crate::Diagnostics::is_verbose(&$sink) {
            $crate::Diagnostics::emit(&$sink, $crate::Level::Info, format_args!($($arg)+))
        }
    };
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn emit(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Forwards messages to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogDiagnostics {
    target: &'static str,
    verbose: bool,
}

impl LogDiagnostics {
    pub fn new(target: &'static str) -> Self {
        LogDiagnostics {
            target,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn target(&self) -> &'static str {
        self.target
    }
}

impl Default for LogDiagnostics {
    fn default() -> Self {
        LogDiagnostics::new("rftc")
    }
}

impl Diagnostics for LogDiagnostics {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        _log::log!(target: self.target, level, "{args}");
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// A recorded diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub message: String,
}

/// Keeps every message in memory.
///
/// Clones share the same buffer, so a test can hand one clone to the code
/// under test and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct MemoryDiagnostics {
    records: Arc<Mutex<Vec<Record>>>,
    verbose: bool,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose() -> Self {
        MemoryDiagnostics {
            verbose: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(needle))
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Record {
                level,
                message: args.to_string(),
            });
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}
