// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Process-wide console logger with a verbosity filter.

use crate::parking_lot::Mutex;
use fxhash::FxHashMap;
use std::io::{self, Write};

/// Severity of a message. Messages below the current verbosity are dropped.
#[derive(Debug, Default, Copy, Clone, PartialOrd, PartialEq, Eq, Ord, Hash)]
pub enum MessageKind {
    /// Progress and state changes.
    #[default]
    Information,
    /// Recoverable misuse, such as a duplicated scene singleton.
    Warning,
    /// A failure of some kind.
    Error,
}

impl MessageKind {
    fn prefix(self) -> &'static str {
        match self {
            MessageKind::Information => "[INFO]: ",
            MessageKind::Warning => "[WARNING]: ",
            MessageKind::Error => "[ERROR]: ",
        }
    }
}

struct LogState {
    verbosity: MessageKind,
    silent: bool,
    // Last message written for every one-shot id.
    reported: FxHashMap<u64, String>,
}

static LOG: Mutex<Option<LogState>> = Mutex::new(None);

/// See module docs.
pub struct Log;

impl Log {
    fn with<R>(func: impl FnOnce(&mut LogState) -> R) -> R {
        let mut guard = LOG.lock();
        let state = guard.get_or_insert_with(|| LogState {
            verbosity: MessageKind::Information,
            silent: false,
            reported: Default::default(),
        });
        func(state)
    }

    /// Drops every message less severe than `kind`.
    pub fn set_verbosity(kind: MessageKind) {
        Self::with(|state| state.verbosity = kind);
    }

    /// Filtering and one-shot bookkeeping still happen while silent.
    pub fn set_silent(silent: bool) {
        Self::with(|state| state.silent = silent);
    }

    /// Returns `true` if the message passed the verbosity filter.
    pub fn write(kind: MessageKind, message: &str) -> bool {
        Self::with(|state| state.emit(kind, message))
    }

    /// Writes the message only if it differs from the last one written with the same id.
    /// Used for conditions that persist across frames.
    pub fn write_once(id: u64, kind: MessageKind, message: &str) -> bool {
        Self::with(|state| {
            if state.reported.get(&id).is_some_and(|last| last == message) {
                return false;
            }
            state.reported.insert(id, message.to_owned());
            state.emit(kind, message)
        })
    }

    /// Writes an information message.
    pub fn info(message: &str) -> bool {
        Self::write(MessageKind::Information, message)
    }

    /// Writes a warning.
    pub fn warn(message: &str) -> bool {
        Self::write(MessageKind::Warning, message)
    }
}

impl LogState {
    fn emit(&mut self, kind: MessageKind, message: &str) -> bool {
        if kind < self.verbosity {
            return false;
        }
        if !self.silent {
            let _ = writeln!(io::stdout().lock(), "{}{message}", kind.prefix());
        }
        true
    }
}

/// Writes an information message, accepts the same arguments as [`format!`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::Log::info(&format!($($arg)*))
    };
}

/// Writes a warning message, accepts the same arguments as [`format!`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::Log::warn(&format!($($arg)*))
    };
}

/// Writes a warning once per id, see [`Log::write_once`].
#[macro_export]
macro_rules! warn_once {
    ($id:expr, $($arg:tt)*) => {
        $crate::log::Log::write_once($id, $crate::log::MessageKind::Warning, &format!($($arg)*))
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_repeated_message_is_written_once() {
        Log::set_silent(true);
        // Ids are process-wide.
        let id = 0xDEAD_0001;
        assert!(Log::write_once(id, MessageKind::Warning, "first"));
        assert!(!Log::write_once(id, MessageKind::Warning, "first"));
        assert!(Log::write_once(id, MessageKind::Warning, "second"));
    }

    #[test]
    fn test_verbosity_filter() {
        let mut state = LogState {
            verbosity: MessageKind::Warning,
            silent: true,
            reported: Default::default(),
        };
        assert!(!state.emit(MessageKind::Information, "dropped"));
        assert!(state.emit(MessageKind::Warning, "kept"));
        assert!(state.emit(MessageKind::Error, "kept"));
    }
}
