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

//! Session-wide state shared by the scheduler and the dispatcher.

use std::sync::Arc;

use midly::live::LiveEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::midi::{self, message};
use crate::midilog::{LogSource, MidiLog};
use crate::registry::RegistryError;
use crate::sampler::{MAX_POLLING_INTERVAL, MIN_POLLING_INTERVAL};

/// Defaults applied to new samplers, plus the global change threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Globals {
    /// Polling interval, in milliseconds, of samplers without their own.
    pub polling_interval: u32,
    /// The change required before a change-gated sampler sends again.
    pub delta_threshold: u8,
    /// Whether new samplers only send on change.
    pub send_on_change_only: bool,
    /// The channel given to new samplers.
    pub midi_channel: u8,
}

impl Default for Globals {
    fn default() -> Self {
        Globals {
            polling_interval: 50,
            delta_threshold: 1,
            send_on_change_only: false,
            midi_channel: 1,
        }
    }
}

impl Globals {
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !(MIN_POLLING_INTERVAL..=MAX_POLLING_INTERVAL).contains(&self.polling_interval) {
            return Err(RegistryError::InvalidConfig(format!(
                "global polling interval {}ms is not between {}ms and {}ms",
                self.polling_interval, MIN_POLLING_INTERVAL, MAX_POLLING_INTERVAL
            )));
        }
        if self.delta_threshold > 127 {
            return Err(RegistryError::InvalidConfig(format!(
                "delta threshold {} is above 127",
                self.delta_threshold
            )));
        }
        if !(1..=16).contains(&self.midi_channel) {
            return Err(RegistryError::InvalidConfig(format!(
                "global channel {} is not between 1 and 16",
                self.midi_channel
            )));
        }
        Ok(())
    }
}

/// The selected output, running state, global defaults, MIDI log and status line
/// of one session.
pub struct Session {
    output: Option<Arc<dyn midi::Device>>,
    active: bool,
    globals: Globals,
    log: MidiLog,
    status: String,
}

impl Session {
    pub fn new(globals: Globals) -> Session {
        Session {
            output: None,
            active: false,
            globals,
            log: MidiLog::new(),
            status: String::new(),
        }
    }

    /// Selects the output messages are sent to. None disables transmission.
    pub fn set_output(&mut self, output: Option<Arc<dyn midi::Device>>) {
        match output.as_ref() {
            Some(output) => self.set_status(format!("MIDI output: {}", output.name())),
            None => self.set_status("No MIDI output selected"),
        }
        self.output = output;
    }

    pub fn output(&self) -> Option<&Arc<dyn midi::Device>> {
        self.output.as_ref()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub(crate) fn globals_mut(&mut self) -> &mut Globals {
        &mut self.globals
    }

    pub fn log(&self) -> &MidiLog {
        &self.log
    }

    /// The most recent status message.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        let status = status.into();
        if status == self.status {
            return;
        }
        self.status = status;
        info!(status = self.status, "Status updated.");
    }

    /// Sends the event to the output. Returns false when there is no output or
    /// the send failed; failures are reported, never propagated.
    pub fn send(&mut self, event: LiveEvent<'static>) -> bool {
        let Some(output) = self.output.clone() else {
            return false;
        };

        let description = message::describe(&event);
        match output.emit(event) {
            Ok(()) => {
                debug!(device = output.name(), event = description, "Sent MIDI.");
                true
            }
            Err(e) => {
                error!(
                    err = e.as_ref(),
                    event = description,
                    "Error sending MIDI message."
                );
                self.set_status(format!("MIDI send error: {}", e));
                false
            }
        }
    }

    /// Records a message in the MIDI log.
    pub fn record(&mut self, at: u64, source: LogSource, message: String, value: u8) {
        self.log.record(at, source, message, value);
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(Globals::default())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_send_without_output() {
        let mut session = Session::default();
        assert!(!session.send(message::note_on(1, 60, 100)));
    }

    #[test]
    fn test_send_failure_is_reported() {
        let device = midi::test::Device::get("mock-out");
        let mut session = Session::default();
        session.set_output(Some(Arc::new(device.clone())));
        assert_eq!("MIDI output: mock-out", session.status());

        assert!(session.send(message::note_on(1, 60, 100)));
        device.set_failing(true);
        assert!(!session.send(message::note_on(1, 62, 100)));
        assert!(session.status().starts_with("MIDI send error"));
        assert_eq!(vec![vec![0x90, 60, 100]], device.emitted());
    }

    #[test]
    fn test_globals_validation() {
        assert!(Globals::default().validate().is_ok());
        for globals in [
            Globals {
                polling_interval: 1,
                ..Default::default()
            },
            Globals {
                midi_channel: 0,
                ..Default::default()
            },
            Globals {
                delta_threshold: 200,
                ..Default::default()
            },
        ] {
            assert!(globals.validate().is_err());
        }
    }
}
