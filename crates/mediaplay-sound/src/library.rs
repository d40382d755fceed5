//! Named registry of sound players.
//!
//! Clips each get their own line. Sequenced sounds share one
//! [`DeviceArbiter`], created from the device factory the first time a
//! sequenced sound is registered.

use crate::clip::{ClipBackend, ClipMedia, ClipOutput};
use crate::player::SoundPlayer;
use crate::sequenced::{DeviceArbiter, SequenceData, SequencedBackend, SequencerDevice};
use mediaplay_common::{PlaybackError, Result, SoundConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

type DeviceFactory = Box<dyn Fn() -> Result<Box<dyn SequencerDevice>> + Send + Sync>;

/// Name to sound-player registry.
pub struct SoundLibrary {
    players: HashMap<String, Arc<dyn SoundPlayer>>,
    clip_output: Arc<dyn ClipOutput>,
    device_factory: DeviceFactory,
    arbiter: Option<DeviceArbiter>,
    config: SoundConfig,
}

impl SoundLibrary {
    /// Create an empty library.
    ///
    /// `device_factory` is called at most once, when the first sequenced
    /// sound is registered.
    pub fn new<F>(clip_output: Arc<dyn ClipOutput>, device_factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SequencerDevice>> + Send + Sync + 'static,
    {
        Self {
            players: HashMap::new(),
            clip_output,
            device_factory: Box::new(device_factory),
            arbiter: None,
            config: SoundConfig::default(),
        }
    }

    /// Apply defaults to every player registered afterwards.
    pub fn with_config(mut self, config: SoundConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults applied to new players.
    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    /// Register a clip under `name`.
    pub fn clip(&mut self, name: impl Into<String>, media: ClipMedia) -> Result<ClipBackend> {
        let name = self.vacant(name.into())?;
        let player = ClipBackend::new(Arc::clone(&self.clip_output));
        player.load(media)?;
        player.set_looping(self.config.looping);
        self.register(name, Arc::new(player.clone()));
        Ok(player)
    }

    /// Register a sequenced sound under `name`.
    ///
    /// Fails with `DeviceUnavailable` if the shared sequencer cannot be
    /// opened.
    pub fn sequenced(
        &mut self,
        name: impl Into<String>,
        sequence: SequenceData,
    ) -> Result<SequencedBackend> {
        let name = self.vacant(name.into())?;
        let player = SequencedBackend::new(self.arbiter()?);
        player.load(sequence)?;
        player.set_looping(self.config.looping);
        self.register(name, Arc::new(player.clone()));
        Ok(player)
    }

    fn vacant(&self, name: String) -> Result<String> {
        if self.players.contains_key(&name) {
            Err(PlaybackError::DuplicateName(name))
        } else {
            Ok(name)
        }
    }

    fn register(&mut self, name: String, player: Arc<dyn SoundPlayer>) {
        log::debug!("registered sound '{name}' as {}", player.id());
        self.players.insert(name, player);
    }

    fn arbiter(&mut self) -> Result<DeviceArbiter> {
        if let Some(arbiter) = &self.arbiter {
            return Ok(arbiter.clone());
        }
        let arbiter = DeviceArbiter::new((self.device_factory)()?)?;
        self.arbiter = Some(arbiter.clone());
        Ok(arbiter)
    }

    /// Player registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SoundPlayer>> {
        self.players
            .get(name)
            .cloned()
            .ok_or_else(|| PlaybackError::NotFound {
                name: name.to_string(),
                scope: "sound library".into(),
            })
    }

    /// Whether a player is registered under `name`.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.players.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The shared sequencer arbiter, once a sequenced sound exists.
    pub fn shared_arbiter(&self) -> Option<&DeviceArbiter> {
        self.arbiter.as_ref()
    }

    /// Stop every player and close the shared sequencer.
    pub fn close(&mut self) {
        for (name, player) in &self.players {
            if let Err(err) = player.stop() {
                log::warn!("stopping '{name}' failed: {err}");
            }
        }
        if let Some(arbiter) = &self.arbiter {
            arbiter.close();
        }
    }
}

impl std::fmt::Debug for SoundLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundLibrary")
            .field("names", &self.names())
            .field("arbiter", &self.arbiter)
            .field("config", &self.config)
            .finish()
    }
}

/// Registry name for a media file: the file name without its extension.
///
/// Returns an empty string when the name has no extension, starts with the
/// only dot, or ends right after it.
pub fn stem_name(path: impl AsRef<Path>) -> String {
    let Some(file_name) = path.as_ref().file_name().and_then(|n| n.to_str()) else {
        return String::new();
    };
    match file_name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file_name.len() => file_name[..dot].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_name() {
        assert_eq!(stem_name("sounds/theme.mid"), "theme");
        assert_eq!(stem_name("a.b.wav"), "a.b");
        assert_eq!(stem_name("noext"), "");
        assert_eq!(stem_name(".hidden"), "");
        assert_eq!(stem_name("trailing."), "");
        assert_eq!(stem_name("x.y"), "x");
    }
}
