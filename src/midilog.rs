// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A short history of the MIDI messages sent, for display.

use std::collections::VecDeque;
use std::fmt;

use crate::sampler::SamplerId;

/// The number of entries kept in the log.
pub const LOG_CAPACITY: usize = 20;

/// What produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Sampler(SamplerId),
    System,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Sampler(id) => write!(f, "S{}", id),
            LogSource::System => write!(f, "System"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Clock time the message was sent, in milliseconds.
    pub at: u64,
    pub source: LogSource,
    pub message: String,
    pub value: u8,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.at, self.source, self.message)
    }
}

/// Ring buffer of the most recent messages, newest first.
#[derive(Default)]
pub struct MidiLog {
    entries: VecDeque<LogEntry>,
}

impl MidiLog {
    pub fn new() -> MidiLog {
        MidiLog {
            entries: VecDeque::with_capacity(LOG_CAPACITY + 1),
        }
    }

    /// Records a message, dropping the oldest entry once the log is full.
    pub fn record(&mut self, at: u64, source: LogSource, message: String, value: u8) {
        self.entries.push_front(LogEntry {
            at,
            source,
            message,
            value,
        });
        self.entries.truncate(LOG_CAPACITY);
    }

    /// Entries from newest to oldest.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
