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

use tracing::debug;

use crate::registry::Registry;
use crate::sampler::{Sampler, SamplerId};

/// A resolved link to the sampler supplying the other data byte of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub companion_id: SamplerId,
    /// The companion's value as of its last completed sample.
    pub companion_value: u8,
}

/// Resolves the sampler's link. Links that dangle, point at the sampler itself,
/// or point at a sampler of another type or channel resolve to None and the
/// sampler behaves as unlinked.
pub fn resolve(registry: &Registry, sampler: &Sampler) -> Option<Link> {
    let companion_id = sampler.config.linked_sampler_id?;
    if companion_id == sampler.id {
        return None;
    }

    let Some(companion) = registry.get(companion_id) else {
        debug!(id = sampler.id, companion_id, "Linked sampler no longer exists.");
        return None;
    };
    if !companion.config.kind.same_type(&sampler.config.kind)
        || companion.config.channel != sampler.config.channel
    {
        debug!(
            id = sampler.id,
            companion_id, "Linked sampler has a different type or channel."
        );
        return None;
    }

    Some(Link {
        companion_id,
        companion_value: companion.state.midi_value,
    })
}
