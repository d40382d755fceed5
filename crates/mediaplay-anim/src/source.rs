//! Frame storage for animation sequencers.
//!
//! Frames are opaque to this crate: a frame provider decodes them and hands
//! over an ordered collection. Insertion order is playback order.

use mediaplay_common::{PlaybackError, Result};
use std::collections::HashMap;
use std::fmt;

/// Read-only indexed frame storage that a sequencer can run over.
pub trait FrameStore: Send + Sync + 'static {
    /// Frame handle type.
    type Frame;

    /// Number of frames.
    fn frame_count(&self) -> usize;

    /// Frame at `index`, if in range.
    fn frame(&self, index: usize) -> Option<&Self::Frame>;
}

/// Ordered collection of decoded frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSource<F> {
    frames: Vec<F>,
}

impl<F> FrameSource<F> {
    /// Create an empty source.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Create a source from already-ordered frames.
    pub fn from_frames(frames: Vec<F>) -> Self {
        Self { frames }
    }

    /// Append a frame at the end of the playback order.
    pub fn push(&mut self, frame: F) {
        self.frames.push(frame);
    }

    /// Number of frames stored.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether any frames are available.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`.
    pub fn get(&self, index: usize) -> Option<&F> {
        self.frames.get(index)
    }

    /// All frames in playback order.
    pub fn frames(&self) -> &[F] {
        &self.frames
    }
}

impl<F> Default for FrameSource<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> FromIterator<F> for FrameSource<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self::from_frames(iter.into_iter().collect())
    }
}

impl<F: Send + Sync + 'static> FrameStore for FrameSource<F> {
    type Frame = F;

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Option<&F> {
        self.frames.get(index)
    }
}

/// Frame collection where every frame carries a unique name.
///
/// Names keep insertion order; `index_of` and `name_at` are inverse lookups.
#[derive(Debug, Clone)]
pub struct NamedFrameSource<F> {
    frames: Vec<F>,
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl<F> NamedFrameSource<F> {
    /// Create an empty named source.
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            names: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Build a source from `(name, frame)` pairs in playback order.
    pub fn from_named<N, I>(entries: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, F)>,
    {
        let mut source = Self::new();
        for (name, frame) in entries {
            source.push(name, frame)?;
        }
        Ok(source)
    }

    /// Append a named frame and return its index.
    ///
    /// Empty names cannot be looked up and are rejected, as are duplicates.
    pub fn push(&mut self, name: impl Into<String>, frame: F) -> Result<usize> {
        let name = name.into();
        if name.is_empty() {
            return Err(PlaybackError::InvalidRequest(
                "frames in a named group must have a name".into(),
            ));
        }
        if self.lookup.contains_key(&name) {
            return Err(PlaybackError::DuplicateName(name));
        }
        let index = self.frames.len();
        self.frames.push(frame);
        self.lookup.insert(name.clone(), index);
        self.names.push(name);
        Ok(index)
    }

    /// Index of the frame called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Name of the frame at `index`.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Frame called `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&F> {
        self.index_of(name).and_then(|index| self.frames.get(index))
    }

    /// Frame at `index`.
    pub fn get(&self, index: usize) -> Option<&F> {
        self.frames.get(index)
    }

    /// Names in playback order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of frames stored.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether any frames are available.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<F> Default for NamedFrameSource<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Send + Sync + 'static> FrameStore for NamedFrameSource<F> {
    type Frame = F;

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Option<&F> {
        self.frames.get(index)
    }
}

impl<F> fmt::Display for NamedFrameSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}
