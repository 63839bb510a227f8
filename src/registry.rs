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

//! The canonical store of samplers, keyed by id and kept in creation order.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::sampler::{Region, Sampler, SamplerConfig, SamplerId, SamplerUpdate};

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid region {0:?}: width and height must be positive")]
    InvalidRegion(Region),

    #[error("no sampler with id {0}")]
    NotFound(SamplerId),

    #[error("invalid sampler setting: {0}")]
    InvalidConfig(String),

    #[error("sampler id {0} appears more than once")]
    DuplicateId(SamplerId),
}

/// The sampler registry. Samplers refer to one another by id only, so links
/// (including mutual ones) never own each other.
pub struct Registry {
    samplers: Vec<Sampler>,
    next_id: SamplerId,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            samplers: Vec::new(),
            next_id: 1,
        }
    }

    /// Adds a sampler and returns its newly assigned id.
    pub fn create(
        &mut self,
        region: Region,
        config: SamplerConfig,
    ) -> Result<SamplerId, RegistryError> {
        if !region.is_valid() {
            return Err(RegistryError::InvalidRegion(region));
        }
        config.validate()?;

        let id = self.next_id;
        self.next_id += 1;
        info!(
            id,
            kind = config.kind.type_name(),
            channel = config.channel,
            "Created sampler."
        );
        self.samplers.push(Sampler::new(id, region, config));
        Ok(id)
    }

    /// Applies a partial update to a sampler's settings.
    pub fn update(&mut self, id: SamplerId, update: &SamplerUpdate) -> Result<(), RegistryError> {
        let sampler = self.get_mut(id).ok_or(RegistryError::NotFound(id))?;
        sampler.config = sampler.config.apply(update)?;
        debug!(id, "Updated sampler.");
        Ok(())
    }

    /// Moves or resizes a sampler's region.
    pub fn set_region(&mut self, id: SamplerId, region: Region) -> Result<(), RegistryError> {
        if !region.is_valid() {
            return Err(RegistryError::InvalidRegion(region));
        }
        let sampler = self.get_mut(id).ok_or(RegistryError::NotFound(id))?;
        sampler.region = region;
        Ok(())
    }

    /// Removes a sampler. Links pointing at it are left to dangle.
    pub fn delete(&mut self, id: SamplerId) -> Result<Sampler, RegistryError> {
        let index = self
            .samplers
            .iter()
            .position(|sampler| sampler.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        info!(id, "Deleted sampler.");
        Ok(self.samplers.remove(index))
    }

    /// All samplers in creation order.
    pub fn list(&self) -> &[Sampler] {
        &self.samplers
    }

    pub fn get(&self, id: SamplerId) -> Option<&Sampler> {
        self.samplers.iter().find(|sampler| sampler.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: SamplerId) -> Option<&mut Sampler> {
        self.samplers.iter_mut().find(|sampler| sampler.id == id)
    }

    /// Returns the topmost sampler containing the point. Later samplers are drawn
    /// over earlier ones.
    pub fn find_at(&self, x: i32, y: i32) -> Option<&Sampler> {
        self.samplers
            .iter()
            .rev()
            .find(|sampler| sampler.region.contains(x, y))
    }

    /// The ids of the samplers linked to the given one.
    pub fn linked_from(&self, id: SamplerId) -> Vec<SamplerId> {
        self.samplers
            .iter()
            .filter(|sampler| sampler.config.linked_sampler_id == Some(id))
            .map(|sampler| sampler.id)
            .collect()
    }

    pub(crate) fn samplers_mut(&mut self) -> impl Iterator<Item = &mut Sampler> {
        self.samplers.iter_mut()
    }

    /// Sets the polling interval of every sampler that has not been given its own.
    pub(crate) fn propagate_polling_interval(&mut self, polling_interval: u32) -> usize {
        let mut updated = 0;
        for sampler in self
            .samplers
            .iter_mut()
            .filter(|sampler| !sampler.config.has_custom_polling_interval)
        {
            sampler.config.polling_interval = polling_interval;
            updated += 1;
        }
        updated
    }

    /// Replaces the contents of the registry, e.g. when loading a preset. Runtime
    /// state is reset and ids continue after the highest loaded id.
    pub fn replace_all(&mut self, samplers: Vec<Sampler>) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for sampler in samplers.iter() {
            if !sampler.region.is_valid() {
                return Err(RegistryError::InvalidRegion(sampler.region));
            }
            sampler.config.validate()?;
            if !seen.insert(sampler.id) {
                return Err(RegistryError::DuplicateId(sampler.id));
            }
        }

        self.samplers = samplers;
        for sampler in self.samplers.iter_mut() {
            sampler.state.reset_transient();
        }
        self.next_id = self
            .samplers
            .iter()
            .map(|sampler| sampler.id)
            .max()
            .unwrap_or(0)
            + 1;
        Ok(())
    }

    /// The id the next created sampler will receive.
    pub fn next_id(&self) -> SamplerId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
