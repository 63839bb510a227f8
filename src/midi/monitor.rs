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
use std::{error::Error, sync::Arc};

use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle},
};
use tracing::{info, span, Instrument, Level};

use super::{message, Device};

/// Traces every event received on a MIDI input.
pub struct Monitor {
    device: Arc<dyn Device>,
    handle: JoinHandle<usize>,
}

impl Monitor {
    /// Starts watching the device's input. Must be called from within a tokio runtime.
    pub fn start(device: Arc<dyn Device>) -> Result<Monitor, Box<dyn Error>> {
        let (sender, mut receiver) = mpsc::channel::<Vec<u8>>(64);
        device.watch_events(sender)?;

        let name = device.name();
        info!(device = name, "Monitoring MIDI input.");
        let span = span!(Level::INFO, "midi monitor", device = name);
        let handle = tokio::spawn(
            async move {
                let mut received = 0;
                while let Some(raw) = receiver.recv().await {
                    received += 1;
                    info!(event = message::describe_incoming(&raw), "Received MIDI event.");
                }
                received
            }
            .instrument(span),
        );

        Ok(Monitor { device, handle })
    }

    /// Stops watching and returns the number of events received.
    pub async fn stop(self) -> Result<usize, JoinError> {
        self.device.stop_watch_events();
        let received = self.handle.await?;
        info!(
            device = self.device.name(),
            received, "Stopped monitoring MIDI input."
        );
        Ok(received)
    }
}
