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

//! Runs the engine on a fixed tick until told to stop.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    select,
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tracing::{info, span, Instrument, Level};

use crate::color::ColorSource;
use crate::engine::Engine;

/// A running engine. Sampling and display refresh run as two intervals on the
/// engine's tick; late ticks are skipped rather than bunched up.
pub struct Runner {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl Runner {
    /// Starts the engine and its tick loop. Must be called from within a tokio runtime.
    pub fn start(engine: Arc<Mutex<Engine>>, source: Arc<dyn ColorSource>) -> Runner {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(
            run(engine, source, stop_rx).instrument(span!(Level::INFO, "runner")),
        );
        Runner { handle, stop }
    }

    /// Stops the engine and waits for every pending deferred note-off to be sent.
    pub async fn stop(self) -> Result<(), JoinError> {
        // An error means the loop has already exited.
        let _ = self.stop.send(true);
        self.handle.await
    }
}

async fn run(
    engine: Arc<Mutex<Engine>>,
    source: Arc<dyn ColorSource>,
    mut stop: watch::Receiver<bool>,
) {
    let period = {
        let mut engine = engine.lock();
        engine.start();
        engine.scheduler().period()
    };

    let mut sampling = time::interval(period);
    sampling.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut display = time::interval(period);
    display.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            _ = sampling.tick() => {
                let mut engine = engine.lock();
                engine.fire_deferred();
                engine.tick(source.as_ref());
            }
            _ = display.tick() => {
                engine.lock().refresh_display();
            }
            _ = stop.changed() => break,
        }
    }

    engine.lock().stop();

    loop {
        let wait = {
            let engine = engine.lock();
            match engine.next_deferred_at() {
                Some(due_at) => due_at.saturating_sub(engine.now()),
                None => break,
            }
        };
        time::sleep(Duration::from_millis(wait)).await;
        engine.lock().fire_deferred();
    }
    info!("Runner stopped.");
}
