// Tweak registry and profiles for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later
//
// A profile sets several tunables at once: each registered tunable takes the
// fields the profile names and keeps every other field of its edit buffer.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::Backend;
use crate::state::TweakState;
use crate::tweak::{Result, TweakError, TweakHandle};

/// Partial states keyed by tunable id.
///
/// Text form: one `tunable.field=value` per line, `#` comments allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    tweaks: BTreeMap<String, TweakState>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut profile = Self::new();
        for (key, value) in TweakState::parse_key_value(text).iter() {
            match key.split_once('.') {
                Some((tunable, field)) if !tunable.is_empty() && !field.is_empty() => {
                    profile.set(tunable, field, value);
                }
                _ => warn!("Profile: ignoring key without tunable prefix: {}", key),
            }
        }
        profile
    }

    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for (tunable, state) in &self.tweaks {
            for (field, value) in state.iter() {
                text.push_str(&format!("{}.{}={}\n", tunable, field, value));
            }
        }
        text
    }

    pub fn set(&mut self, tunable: &str, field: &str, value: &str) {
        self.tweaks
            .entry(tunable.to_string())
            .or_default()
            .set(field, value);
    }

    pub fn insert(&mut self, tunable: &str, state: TweakState) {
        self.tweaks.insert(tunable.to_string(), state);
    }

    pub fn get(&self, tunable: &str) -> Option<&TweakState> {
        self.tweaks.get(tunable)
    }

    pub fn tunables(&self) -> impl Iterator<Item = &str> {
        self.tweaks.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tweaks.is_empty()
    }
}

/// What to do after a profile has been merged into the edit buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    None,
    Save,
    Apply,
    SaveAndApply,
}

impl Commit {
    pub fn from_flags(save: bool, apply: bool) -> Self {
        match (save, apply) {
            (false, false) => Commit::None,
            (true, false) => Commit::Save,
            (false, true) => Commit::Apply,
            (true, true) => Commit::SaveAndApply,
        }
    }

    pub fn saves(self) -> bool {
        matches!(self, Commit::Save | Commit::SaveAndApply)
    }

    pub fn applies(self) -> bool {
        matches!(self, Commit::Apply | Commit::SaveAndApply)
    }
}

/// Result of applying a profile to one tunable.
#[derive(Debug)]
pub struct ProfileOutcome {
    pub tunable: String,
    pub result: Result<bool>,
}

/// Registered tunables, by id.
pub struct TweakRegistry<B> {
    tweaks: BTreeMap<&'static str, Arc<TweakHandle<B>>>,
}

impl<B> Default for TweakRegistry<B> {
    fn default() -> Self {
        Self {
            tweaks: BTreeMap::new(),
        }
    }
}

impl<B: Backend> TweakRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: Arc<TweakHandle<B>>) {
        if self.tweaks.insert(handle.id(), handle.clone()).is_some() {
            warn!("Registry: replacing tweak {}", handle.id());
        }
    }

    pub fn get(&self, id: &str) -> Result<&Arc<TweakHandle<B>>> {
        self.tweaks
            .get(id)
            .ok_or_else(|| TweakError::UnknownTweak(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tweaks.keys().copied()
    }

    /// Load every registered tunable. Each load degrades on its own.
    pub async fn load_all(&self) {
        for (id, handle) in &self.tweaks {
            if let Err(e) = handle.load().await {
                warn!("Registry: load of {} failed: {}", id, e);
            }
        }
    }

    /// Edit buffers of every loaded tunable.
    pub fn snapshot(&self) -> Profile {
        let mut profile = Profile::new();
        for (id, handle) in &self.tweaks {
            if let Ok(state) = handle.get_state() {
                profile.insert(id, state);
            }
        }
        profile
    }

    /// Merge `profile` into the matching tunables, then save and/or apply them.
    /// Every tunable is attempted; the outcome carries the pending-changes
    /// flag after the commit.
    pub async fn apply_profile(&self, profile: &Profile, commit: Commit) -> Vec<ProfileOutcome> {
        let mut outcomes = Vec::new();
        for tunable in profile.tunables() {
            let result = match (self.get(tunable), profile.get(tunable)) {
                (Ok(handle), Some(partial)) => Self::commit_one(handle, partial, commit).await,
                (Err(e), _) => Err(e),
                (Ok(_), None) => continue,
            };
            match &result {
                Ok(_) => info!("Registry: profile applied to {}", tunable),
                Err(e) => warn!("Registry: profile for {} failed: {}", tunable, e),
            }
            outcomes.push(ProfileOutcome {
                tunable: tunable.to_string(),
                result,
            });
        }
        outcomes
    }

    async fn commit_one(
        handle: &TweakHandle<B>,
        partial: &TweakState,
        commit: Commit,
    ) -> Result<bool> {
        handle.set_state(partial)?;
        if commit.saves() {
            handle.save().await?;
        }
        if commit.applies() {
            handle.apply().await?;
        }
        handle.has_pending_changes()
    }
}
