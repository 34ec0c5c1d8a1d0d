//! Effect registry with at-most-one-active semantics.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use super::presets::DEFAULT_EFFECT_SOURCE;

new_key_type! {
    /// Generation-checked handle to an effect. A deleted handle never
    /// resolves again, even if its slot is reused.
    pub struct EffectId;
}

/// A named, user-authored effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub name: String,
    pub source: String,
}

/// Persistable form of a single effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub active: bool,
}

/// Persistable form of the whole registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsSnapshot {
    pub next_effect_number: u32,
    pub effects: Vec<EffectRecord>,
    /// Index into `effects` of the most recently activated effect.
    pub most_recent_active: Option<usize>,
}

impl Default for EffectsSnapshot {
    fn default() -> Self {
        Self {
            next_effect_number: 1,
            effects: Vec::new(),
            most_recent_active: None,
        }
    }
}

/// Ordered set of effects, at most one of which is active.
///
/// The active flag is a single slot rather than a per-effect boolean, so two
/// effects can never be observed active at once.
#[derive(Debug, Clone)]
pub struct Effects {
    slots: SlotMap<EffectId, Effect>,
    order: Vec<EffectId>,
    active: Option<EffectId>,
    most_recent_active: Option<EffectId>,
    next_effect_number: u32,
}

impl Default for Effects {
    fn default() -> Self {
        Self::new()
    }
}

impl Effects {
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            active: None,
            most_recent_active: None,
            next_effect_number: 1,
        }
    }

    /// Append a new inactive effect named "Effect N" with the default source.
    pub fn create(&mut self) -> EffectId {
        let name = format!("Effect {}", self.next_effect_number);
        self.next_effect_number += 1;
        self.insert(name, DEFAULT_EFFECT_SOURCE.to_string())
    }

    /// Append an effect with an explicit name and source.
    ///
    /// Does not consume an "Effect N" number.
    pub fn insert(&mut self, name: String, source: String) -> EffectId {
        let id = self.slots.insert(Effect { name, source });
        self.order.push(id);
        id
    }

    /// Remove an effect. Unknown ids are ignored.
    pub fn delete(&mut self, id: EffectId) {
        if self.slots.remove(id).is_none() {
            return;
        }
        self.order.retain(|&other| other != id);
        if self.active == Some(id) {
            self.active = None;
        }
        if self.most_recent_active == Some(id) {
            self.most_recent_active = None;
        }
    }

    /// Rename an effect. The name is stored trimmed; blank names are rejected.
    pub fn rename(&mut self, id: EffectId, new_name: &str) {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return;
        }
        if let Some(effect) = self.slots.get_mut(id) {
            effect.name = new_name.to_string();
        }
    }

    /// Replace the WGSL source of an effect.
    pub fn set_source(&mut self, id: EffectId, source: &str) {
        if let Some(effect) = self.slots.get_mut(id) {
            effect.source = source.to_string();
        }
    }

    /// Activate (deactivating every other effect) or deactivate an effect.
    ///
    /// Deactivation leaves the most-recent-active record untouched.
    pub fn set_active(&mut self, id: EffectId, active: bool) {
        if !self.slots.contains_key(id) {
            return;
        }
        if active {
            self.active = Some(id);
            self.most_recent_active = Some(id);
        } else if self.active == Some(id) {
            self.active = None;
        }
    }

    pub fn toggle(&mut self, id: EffectId) {
        let active = self.is_active(id);
        self.set_active(id, !active);
    }

    pub fn deactivate_all(&mut self) {
        self.active = None;
    }

    /// Activate the most recently active effect if it still exists, otherwise
    /// the first effect. Does nothing on an empty registry.
    pub fn activate_default(&mut self) {
        let target = self
            .most_recent_active
            .filter(|id| self.slots.contains_key(*id))
            .or_else(|| self.order.first().copied());
        if let Some(id) = target {
            self.set_active(id, true);
        }
    }

    pub fn active_id(&self) -> Option<EffectId> {
        self.active
    }

    pub fn active_effect(&self) -> Option<&Effect> {
        self.active.and_then(|id| self.slots.get(id))
    }

    pub fn any_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_active(&self, id: EffectId) -> bool {
        self.active == Some(id)
    }

    pub fn most_recent_active(&self) -> Option<EffectId> {
        self.most_recent_active
    }

    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.slots.get(id)
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.slots.contains_key(id)
    }

    /// Effect ids in insertion order.
    pub fn ids(&self) -> &[EffectId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectId, &Effect)> + '_ {
        self.order.iter().filter_map(|&id| Some((id, self.slots.get(id)?)))
    }

    /// Capture the registry in persistable form.
    pub fn snapshot(&self) -> EffectsSnapshot {
        let effects = self
            .iter()
            .map(|(id, effect)| EffectRecord {
                name: effect.name.clone(),
                source: effect.source.clone(),
                active: self.is_active(id),
            })
            .collect();
        let most_recent_active = self
            .most_recent_active
            .and_then(|recent| self.order.iter().position(|&id| id == recent));

        EffectsSnapshot {
            next_effect_number: self.next_effect_number,
            effects,
            most_recent_active,
        }
    }

    /// Rebuild a registry from a snapshot.
    ///
    /// If the snapshot marks several effects active only the last one wins.
    pub fn from_snapshot(snapshot: &EffectsSnapshot) -> Self {
        let mut effects = Self::new();
        effects.next_effect_number = snapshot.next_effect_number.max(1);

        let mut active = None;
        for record in &snapshot.effects {
            let id = effects.insert(record.name.clone(), record.source.clone());
            if record.active {
                active = Some(id);
            }
        }
        effects.most_recent_active = snapshot
            .most_recent_active
            .and_then(|index| effects.order.get(index).copied());
        effects.active = active;
        effects
    }
}
