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

//! The sampling engine: the sampler registry, the session, and the machinery
//! that samples and dispatches on every tick.

use tracing::info;

use crate::color::ColorSource;
use crate::dispatch::Dispatcher;
use crate::preset::Preset;
use crate::registry::{Registry, RegistryError};
use crate::sampler::{Region, Sampler, SamplerConfig, SamplerId, SamplerUpdate};
use crate::scheduler::Scheduler;
use crate::session::{Globals, Session};

pub struct Engine {
    registry: Registry,
    session: Session,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
}

impl Engine {
    pub fn new(session: Session, scheduler: Scheduler) -> Engine {
        Engine {
            registry: Registry::new(),
            session,
            dispatcher: Dispatcher::new(),
            scheduler,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The engine clock, in milliseconds.
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    /// Adds a sampler using the session's defaults with the given settings applied.
    pub fn add_sampler(
        &mut self,
        region: Region,
        settings: &SamplerUpdate,
    ) -> Result<SamplerId, RegistryError> {
        let config = SamplerConfig::from_globals(self.session.globals()).apply(settings)?;
        self.registry.create(region, config)
    }

    pub fn update_sampler(
        &mut self,
        id: SamplerId,
        update: &SamplerUpdate,
    ) -> Result<(), RegistryError> {
        self.registry.update(id, update)
    }

    pub fn move_sampler(&mut self, id: SamplerId, region: Region) -> Result<(), RegistryError> {
        self.registry.set_region(id, region)
    }

    /// Removes a sampler. Note-offs it already scheduled still fire.
    pub fn remove_sampler(&mut self, id: SamplerId) -> Result<Sampler, RegistryError> {
        self.registry.delete(id)
    }

    /// Sets the global polling interval and applies it to every sampler without
    /// its own interval.
    pub fn set_global_polling_interval(&mut self, polling_interval: u32) -> Result<(), RegistryError> {
        let globals = Globals {
            polling_interval,
            ..*self.session.globals()
        };
        globals.validate()?;

        *self.session.globals_mut() = globals;
        let updated = self.registry.propagate_polling_interval(polling_interval);
        self.session.set_status(format!(
            "Global polling interval set to {}ms ({} samplers updated)",
            polling_interval, updated
        ));
        Ok(())
    }

    pub fn set_global_delta_threshold(&mut self, delta_threshold: u8) -> Result<(), RegistryError> {
        let globals = Globals {
            delta_threshold,
            ..*self.session.globals()
        };
        globals.validate()?;
        *self.session.globals_mut() = globals;
        self.session
            .set_status(format!("Global delta threshold set to {}", delta_threshold));
        Ok(())
    }

    /// Only affects samplers created afterwards.
    pub fn set_global_send_on_change_only(&mut self, send_on_change_only: bool) {
        self.session.globals_mut().send_on_change_only = send_on_change_only;
        self.session.set_status(format!(
            "Global send on change only {}",
            if send_on_change_only {
                "enabled"
            } else {
                "disabled"
            }
        ));
    }

    /// Only affects samplers created afterwards.
    pub fn set_global_midi_channel(&mut self, midi_channel: u8) -> Result<(), RegistryError> {
        let globals = Globals {
            midi_channel,
            ..*self.session.globals()
        };
        globals.validate()?;
        *self.session.globals_mut() = globals;
        self.session
            .set_status(format!("Global MIDI channel set to {}", midi_channel));
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn start(&mut self) {
        if self.session.is_active() {
            return;
        }

        self.session.set_active(true);
        info!(samplers = self.registry.len(), "Sampling started.");
        self.session.set_status("Sampling started");
    }

    /// Stops sampling and sends all notes off on every channel. Deferred
    /// note-offs stay scheduled.
    pub fn stop(&mut self) {
        self.session.set_active(false);
        let now = self.now();
        Dispatcher::all_notes_off(&mut self.session, now);
        info!(
            pending_note_offs = self.dispatcher.pending(),
            "Sampling stopped."
        );
    }

    /// Samples every due sampler. Does nothing while stopped.
    pub fn tick(&mut self, source: &dyn ColorSource) -> usize {
        if !self.session.is_active() {
            return 0;
        }

        self.scheduler.tick(
            &mut self.registry,
            source,
            &mut self.dispatcher,
            &mut self.session,
        )
    }

    /// Refreshes each sampler's time until its next sample. Does nothing while stopped.
    pub fn refresh_display(&mut self) -> bool {
        if !self.session.is_active() {
            return false;
        }
        self.scheduler.refresh_display(&mut self.registry)
    }

    /// Sends deferred note-offs that have come due. Runs whether or not
    /// sampling is active.
    pub fn fire_deferred(&mut self) -> usize {
        let now = self.now();
        self.dispatcher.fire_due(&mut self.session, now)
    }

    pub fn next_deferred_at(&self) -> Option<u64> {
        self.dispatcher.next_due_at()
    }

    pub fn pending_note_offs(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Captures the current samplers and globals.
    pub fn snapshot(&self) -> Preset {
        Preset::capture(self.registry.list(), self.session.globals())
    }

    /// Replaces the samplers and globals with the preset's. Nothing changes if
    /// the preset is invalid.
    pub fn load_preset(&mut self, preset: &Preset) -> Result<(), RegistryError> {
        let globals = preset.globals();
        globals.validate()?;
        self.registry.replace_all(preset.samplers.clone())?;
        *self.session.globals_mut() = globals;
        info!(samplers = self.registry.len(), "Loaded preset.");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::color::{Frame, Rgb};
    use crate::midi;
    use crate::sampler::{NoteTarget, SamplerKind};
    use crate::scheduler::test::ManualClock;
    use crate::scheduler::DEFAULT_TICK;

    fn engine() -> (Engine, ManualClock, midi::test::Device) {
        let clock = ManualClock::new(1000);
        let device = midi::test::Device::get("mock-engine");
        let mut session = Session::default();
        session.set_output(Some(Arc::new(device.clone())));
        let engine = Engine::new(
            session,
            Scheduler::new(Arc::new(clock.clone()), DEFAULT_TICK),
        );
        (engine, clock, device)
    }

    fn settings(channel: u8, polling_interval: u32) -> SamplerUpdate {
        SamplerUpdate {
            channel: Some(channel),
            polling_interval: Some(polling_interval),
            ..Default::default()
        }
    }

    fn count_on_channel(emitted: &[Vec<u8>], status: u8) -> usize {
        emitted.iter().filter(|bytes| bytes[0] == status).count()
    }

    #[test]
    fn test_independent_cadences() {
        let (mut engine, clock, device) = engine();
        let frame = Frame::black(100, 100);
        let fast = engine
            .add_sampler(Region::new(0, 0, 10, 10), &settings(1, 20))
            .unwrap();
        engine
            .add_sampler(Region::new(10, 10, 10, 10), &settings(2, 50))
            .unwrap();
        engine.start();

        for _ in 0..=10 {
            engine.tick(&frame);
            clock.advance(10);
        }

        let emitted = device.emitted();
        assert_eq!(6, count_on_channel(&emitted, 0x90));
        assert_eq!(3, count_on_channel(&emitted, 0x91));
        assert_eq!(1100, engine.registry().get(fast).unwrap().state.last_sample_time);
    }

    #[test]
    fn test_no_catch_up() {
        let (mut engine, clock, device) = engine();
        let frame = Frame::black(10, 10);
        let id = engine
            .add_sampler(Region::new(0, 0, 10, 10), &settings(1, 50))
            .unwrap();
        engine.start();

        assert_eq!(1, engine.tick(&frame));
        clock.set(1500);
        assert_eq!(1, engine.tick(&frame));
        clock.advance(10);
        assert_eq!(0, engine.tick(&frame));
        assert_eq!(1500, engine.registry().get(id).unwrap().state.last_sample_time);
        assert_eq!(2, device.emitted().len());
    }

    #[test]
    fn test_inactive_engine_does_not_sample() {
        let (mut engine, _, device) = engine();
        let frame = Frame::black(10, 10);
        engine
            .add_sampler(Region::new(0, 0, 10, 10), &SamplerUpdate::default())
            .unwrap();

        assert_eq!(0, engine.tick(&frame));
        assert!(!engine.refresh_display());
        assert!(device.emitted().is_empty());
    }

    #[test]
    fn test_sampling_failure_skips_sampler() {
        let (mut engine, _, device) = engine();
        let frame = Frame::black(100, 100);
        let outside = engine
            .add_sampler(Region::new(500, 500, 10, 10), &settings(1, 10))
            .unwrap();
        let inside = engine
            .add_sampler(Region::new(0, 0, 10, 10), &settings(2, 10))
            .unwrap();
        engine.start();

        assert_eq!(1, engine.tick(&frame));
        assert_eq!(0, engine.registry().get(outside).unwrap().state.last_sample_time);
        assert_eq!(1000, engine.registry().get(inside).unwrap().state.last_sample_time);
        assert_eq!(vec![vec![0x91, 60, 0]], device.emitted());
        assert!(engine.session().status().starts_with("Sampler 1:"));
    }

    #[test]
    fn test_sampled_values_without_output() {
        let (mut engine, _, _) = engine();
        engine.session_mut().set_output(None);
        let mut frame = Frame::black(10, 10);
        frame.fill(&Region::new(0, 0, 10, 10), Rgb::new(255, 255, 255));
        let id = engine
            .add_sampler(Region::new(0, 0, 10, 10), &SamplerUpdate::default())
            .unwrap();
        engine.start();

        engine.tick(&frame);
        let state = &engine.registry().get(id).unwrap().state;
        assert_eq!(Rgb::new(255, 255, 255), state.color);
        assert_eq!(127, state.midi_value);
        assert_eq!(None, state.last_sent_value);
    }

    #[test]
    fn test_link_uses_last_completed_sample() {
        let (mut engine, clock, device) = engine();
        let mut frame = Frame::black(100, 100);
        let b_region = Region::new(50, 50, 10, 10);
        frame.fill(&b_region, Rgb::new(255, 255, 255));

        let b = engine
            .add_sampler(
                b_region,
                &SamplerUpdate {
                    polling_interval: Some(50),
                    send_note_off: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let a = engine
            .add_sampler(
                Region::new(0, 0, 10, 10),
                &SamplerUpdate {
                    kind: Some(SamplerKind::Note(NoteTarget::Note)),
                    polling_interval: Some(10),
                    send_note_off: Some(false),
                    linked_sampler_id: Some(Some(b)),
                    ..Default::default()
                },
            )
            .unwrap();
        engine.start();

        engine.tick(&frame);
        device.reset_emitted();

        // B's region changes but B is not due again until 1050.
        frame.fill(&b_region, Rgb::new(0, 0, 0));
        clock.advance(10);
        engine.tick(&frame);
        assert_eq!(vec![vec![0x90, 0, 127]], device.emitted());
        assert_eq!(127, engine.registry().get(b).unwrap().state.midi_value);
        device.reset_emitted();

        clock.set(1050);
        engine.tick(&frame);
        let emitted = device.emitted();
        assert_eq!(vec![0x90, 60, 0], emitted[0]);
        assert_eq!(vec![0x90, 0, 0], emitted[1]);
        assert_eq!(1050, engine.registry().get(a).unwrap().state.last_sample_time);
    }

    #[test]
    fn test_stop_sends_panic_and_keeps_deferred_note_offs() {
        let (mut engine, clock, device) = engine();
        let mut frame = Frame::black(10, 10);
        let region = Region::new(0, 0, 10, 10);
        engine
            .add_sampler(
                region,
                &SamplerUpdate {
                    kind: Some(SamplerKind::Note(NoteTarget::Note)),
                    polling_interval: Some(10),
                    note_off_delay: Some(200),
                    ..Default::default()
                },
            )
            .unwrap();
        engine.start();

        engine.tick(&frame);
        frame.fill(&region, Rgb::new(255, 255, 255));
        clock.advance(10);
        engine.tick(&frame);
        assert_eq!(1, engine.pending_note_offs());
        assert_eq!(Some(1210), engine.next_deferred_at());
        device.reset_emitted();

        engine.stop();
        assert!(!engine.is_active());
        let emitted = device.emitted();
        assert_eq!(16, emitted.len());
        assert!(emitted.iter().all(|bytes| bytes[1] == 123 && bytes[2] == 0));
        assert_eq!(1, engine.pending_note_offs());
        device.reset_emitted();

        clock.set(1210);
        assert_eq!(1, engine.fire_deferred());
        assert_eq!(vec![vec![0x80, 0, 0]], device.emitted());
    }

    #[test]
    fn test_global_polling_interval_propagation() {
        let (mut engine, _, _) = engine();
        let region = Region::new(0, 0, 1, 1);
        let custom = engine.add_sampler(region, &settings(1, 300)).unwrap();
        let inherited = engine
            .add_sampler(region, &SamplerUpdate::default())
            .unwrap();

        engine.set_global_polling_interval(120).unwrap();
        assert_eq!(300, engine.registry().get(custom).unwrap().config.polling_interval);
        assert_eq!(
            120,
            engine.registry().get(inherited).unwrap().config.polling_interval
        );
        assert_eq!(120, engine.session().globals().polling_interval);

        assert!(engine.set_global_polling_interval(5).is_err());
        assert_eq!(120, engine.session().globals().polling_interval);
    }

    #[test]
    fn test_new_samplers_use_globals() {
        let (mut engine, _, _) = engine();
        engine.set_global_midi_channel(9).unwrap();
        engine.set_global_send_on_change_only(true);
        assert!(engine.set_global_midi_channel(17).is_err());
        assert!(engine.set_global_delta_threshold(200).is_err());

        let id = engine
            .add_sampler(Region::new(0, 0, 1, 1), &SamplerUpdate::default())
            .unwrap();
        let config = &engine.registry().get(id).unwrap().config;
        assert_eq!(9, config.channel);
        assert!(config.send_on_change_only);
        assert!(!config.has_custom_polling_interval);

        assert!(engine
            .add_sampler(Region::new(0, 0, 0, 1), &SamplerUpdate::default())
            .is_err());
    }

    #[test]
    fn test_global_changes_update_status() {
        let (mut engine, _, _) = engine();

        engine.set_global_delta_threshold(7).unwrap();
        assert_eq!("Global delta threshold set to 7", engine.session().status());

        engine.set_global_midi_channel(4).unwrap();
        assert_eq!("Global MIDI channel set to 4", engine.session().status());

        engine.set_global_send_on_change_only(true);
        assert_eq!(
            "Global send on change only enabled",
            engine.session().status()
        );
        engine.set_global_send_on_change_only(false);
        assert_eq!(
            "Global send on change only disabled",
            engine.session().status()
        );

        // A rejected change leaves the status alone.
        assert!(engine.set_global_midi_channel(0).is_err());
        assert_eq!(
            "Global send on change only disabled",
            engine.session().status()
        );
    }

    #[test]
    fn test_interval_change_applies_at_next_due_check() {
        let (mut engine, clock, _) = engine();
        let frame = Frame::black(10, 10);
        let id = engine
            .add_sampler(Region::new(0, 0, 10, 10), &settings(1, 50))
            .unwrap();
        engine.start();

        assert_eq!(1, engine.tick(&frame));
        clock.advance(20);
        assert_eq!(0, engine.tick(&frame));

        engine
            .update_sampler(
                id,
                &SamplerUpdate {
                    polling_interval: Some(20),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(1, engine.tick(&frame));
        assert_eq!(1020, engine.registry().get(id).unwrap().state.last_sample_time);

        clock.advance(10);
        assert_eq!(0, engine.tick(&frame));
        clock.advance(10);
        assert_eq!(1, engine.tick(&frame));
        assert!(engine.registry().get(id).unwrap().config.has_custom_polling_interval);
    }

    #[test]
    fn test_rejected_update_leaves_sampler_unchanged() {
        let (mut engine, _, _) = engine();
        let id = engine
            .add_sampler(Region::new(0, 0, 10, 10), &settings(2, 80))
            .unwrap();
        let before = engine.registry().get(id).unwrap().config.clone();

        let result = engine.update_sampler(
            id,
            &SamplerUpdate {
                note_number: Some(40),
                polling_interval: Some(9000),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(RegistryError::InvalidConfig(_))));
        assert_eq!(before, engine.registry().get(id).unwrap().config);

        assert!(matches!(
            engine.update_sampler(99, &SamplerUpdate::default()),
            Err(RegistryError::NotFound(99))
        ));
        assert!(matches!(
            engine.move_sampler(id, Region::new(0, 0, -1, 5)),
            Err(RegistryError::InvalidRegion(_))
        ));
        engine.move_sampler(id, Region::new(3, 4, 5, 6)).unwrap();
        assert_eq!(
            Region::new(3, 4, 5, 6),
            engine.registry().get(id).unwrap().region
        );
    }

    #[test]
    fn test_removed_sampler_still_releases_note() {
        let (mut engine, clock, device) = engine();
        let mut frame = Frame::black(10, 10);
        let region = Region::new(0, 0, 10, 10);
        let id = engine
            .add_sampler(
                region,
                &SamplerUpdate {
                    kind: Some(SamplerKind::Note(NoteTarget::Note)),
                    polling_interval: Some(10),
                    note_off_delay: Some(100),
                    ..Default::default()
                },
            )
            .unwrap();
        engine.start();

        engine.tick(&frame);
        frame.fill(&region, Rgb::new(255, 255, 255));
        clock.advance(10);
        engine.tick(&frame);
        assert_eq!(1, engine.pending_note_offs());
        device.reset_emitted();

        let removed = engine.remove_sampler(id).unwrap();
        assert_eq!(id, removed.id);
        assert!(engine.registry().is_empty());
        assert!(matches!(
            engine.remove_sampler(id),
            Err(RegistryError::NotFound(_))
        ));

        clock.set(1109);
        assert_eq!(0, engine.fire_deferred());
        clock.set(1110);
        assert_eq!(1, engine.fire_deferred());
        assert_eq!(vec![vec![0x80, 0, 0]], device.emitted());
        assert_eq!(0, engine.pending_note_offs());
    }

    #[test]
    fn test_preset_round_trip() {
        let (mut engine, clock, _) = engine();
        let frame = Frame::black(10, 10);
        engine
            .add_sampler(Region::new(0, 0, 5, 5), &settings(3, 40))
            .unwrap();
        engine
            .add_sampler(Region::new(5, 5, 5, 5), &SamplerUpdate::default())
            .unwrap();
        engine.set_global_delta_threshold(4).unwrap();
        engine.start();
        engine.tick(&frame);
        clock.advance(100);

        let preset = engine.snapshot();
        let (mut other, _, _) = self::engine();
        other
            .add_sampler(Region::new(0, 0, 1, 1), &SamplerUpdate::default())
            .unwrap();
        other.load_preset(&preset).unwrap();

        assert_eq!(preset, other.snapshot());
        assert_eq!(4, other.session().globals().delta_threshold);
        assert_eq!(3, other.registry().next_id());
        let loaded = other.registry().get(1).unwrap();
        assert_eq!(0, loaded.state.last_sample_time);
        assert_eq!(None, loaded.state.last_sent_value);
        assert_eq!(engine.registry().get(1).unwrap().config, loaded.config);
    }

    #[test]
    fn test_invalid_preset_changes_nothing() {
        let (mut engine, _, _) = engine();
        engine
            .add_sampler(Region::new(0, 0, 1, 1), &SamplerUpdate::default())
            .unwrap();
        let mut preset = engine.snapshot();
        preset.global_midi_channel = 0;

        let (mut other, _, _) = self::engine();
        assert!(other.load_preset(&preset).is_err());
        assert!(other.registry().is_empty());
        assert_eq!(Globals::default(), *other.session().globals());
    }
}
