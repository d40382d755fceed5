//! Named registry of frame sources.
//!
//! A frame provider decodes sprite sheets (or any other frame format) and
//! registers the result here under a name; game code then asks the library
//! for sequencers configured with the library-wide [`AnimationConfig`].

use crate::group::GroupSequencer;
use crate::sequencer::AnimationSequencer;
use crate::source::{FrameSource, NamedFrameSource};
use mediaplay_common::{AnimationConfig, PlaybackError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// An entry in a [`FrameLibrary`].
#[derive(Debug)]
pub enum FrameEntry<F> {
    /// Plain ordered sequence.
    Sequence(Arc<FrameSource<F>>),
    /// Named frame group.
    Group(Arc<NamedFrameSource<F>>),
}

impl<F> FrameEntry<F> {
    /// Number of frames in the entry.
    pub fn frame_count(&self) -> usize {
        match self {
            FrameEntry::Sequence(source) => source.len(),
            FrameEntry::Group(group) => group.len(),
        }
    }

    /// First frame, if the entry is not empty.
    pub fn first_frame(&self) -> Option<&F> {
        match self {
            FrameEntry::Sequence(source) => source.get(0),
            FrameEntry::Group(group) => group.get(0),
        }
    }
}

impl<F> Clone for FrameEntry<F> {
    fn clone(&self) -> Self {
        match self {
            FrameEntry::Sequence(source) => FrameEntry::Sequence(Arc::clone(source)),
            FrameEntry::Group(group) => FrameEntry::Group(Arc::clone(group)),
        }
    }
}

/// Name to frame-source registry.
#[derive(Debug)]
pub struct FrameLibrary<F> {
    entries: HashMap<String, FrameEntry<F>>,
    config: AnimationConfig,
}

impl<F: Send + Sync + 'static> FrameLibrary<F> {
    /// Create an empty library with default animation settings.
    pub fn new() -> Self {
        Self::with_config(AnimationConfig::default())
    }

    /// Create an empty library whose sequencers use `config`.
    pub fn with_config(config: AnimationConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Animation defaults applied by [`animator`](Self::animator).
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Register an ordered sequence.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        source: FrameSource<F>,
    ) -> Result<Arc<FrameSource<F>>> {
        let source = Arc::new(source);
        self.insert_entry(name.into(), FrameEntry::Sequence(Arc::clone(&source)))?;
        Ok(source)
    }

    /// Register a named frame group.
    pub fn insert_group(
        &mut self,
        name: impl Into<String>,
        group: NamedFrameSource<F>,
    ) -> Result<Arc<NamedFrameSource<F>>> {
        let group = Arc::new(group);
        self.insert_entry(name.into(), FrameEntry::Group(Arc::clone(&group)))?;
        Ok(group)
    }

    fn insert_entry(&mut self, name: String, entry: FrameEntry<F>) -> Result<()> {
        if self.entries.contains_key(&name) {
            return Err(PlaybackError::DuplicateName(name));
        }
        log::debug!("registered '{}' ({} frames)", name, entry.frame_count());
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Entry registered under `name`.
    pub fn get(&self, name: &str) -> Result<&FrameEntry<F>> {
        self.entries.get(name).ok_or_else(|| PlaybackError::NotFound {
            name: name.to_string(),
            scope: "frame library".into(),
        })
    }

    /// Named group registered under `name`, or `None` if that entry is a
    /// plain sequence.
    pub fn group(&self, name: &str) -> Result<Option<Arc<NamedFrameSource<F>>>> {
        Ok(match self.get(name)? {
            FrameEntry::Group(group) => Some(Arc::clone(group)),
            FrameEntry::Sequence(_) => None,
        })
    }

    /// First frame of the entry, used as a still image.
    pub fn first_frame(&self, name: &str) -> Result<Option<&F>> {
        Ok(self.get(name)?.first_frame())
    }

    /// Frame count of the entry; 0 when nothing is registered under `name`.
    pub fn frame_count(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, FrameEntry::frame_count)
    }

    /// Whether an entry is registered under `name`.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Wall-clock sequencer over a plain sequence, configured from the
    /// library defaults.
    pub fn animator(&self, name: &str) -> Result<AnimationSequencer<FrameSource<F>>> {
        match self.get(name)? {
            FrameEntry::Sequence(source) => {
                let seq = source.animator(self.period());
                seq.set_repeating(self.config.repeating);
                Ok(seq)
            }
            FrameEntry::Group(_) => Err(PlaybackError::InvalidRequest(format!(
                "'{name}' is a named group; use group_animator"
            ))),
        }
    }

    /// Wall-clock sequencer over a named group, configured from the library
    /// defaults.
    pub fn group_animator(&self, name: &str) -> Result<GroupSequencer<F>> {
        match self.get(name)? {
            FrameEntry::Group(group) => {
                let seq = group.animator(self.period());
                seq.set_repeating(self.config.repeating);
                Ok(seq)
            }
            FrameEntry::Sequence(_) => Err(PlaybackError::InvalidRequest(format!(
                "'{name}' is not a named group"
            ))),
        }
    }

    fn period(&self) -> i64 {
        i64::try_from(self.config.tick_period_ms).unwrap_or(i64::MAX)
    }
}

impl<F: Send + Sync + 'static> Default for FrameLibrary<F> {
    fn default() -> Self {
        Self::new()
    }
}
