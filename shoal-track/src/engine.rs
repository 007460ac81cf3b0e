// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::collections::BTreeSet;

use shoal_core::error::ShoalError;
use shoal_core::mask::BinaryMask;

/// A single point prompt for one object in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPrompt {
    pub object: u32,
    pub frame: usize,
    pub point: [f32; 2],
    pub positive: bool,
}

/// Masks produced by the model for one frame of a propagation
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedFrame {
    pub frame: usize,
    pub masks: Vec<(u32, BinaryMask)>,
}

/// Stream of frames produced by [`SegmentationEngine::propagate`]
pub type FrameStream<'a> = Box<dyn Iterator<Item = Result<PropagatedFrame, ShoalError>> + 'a>;

/// A stateful point-prompted video segmentation model
///
/// Implementors hold the model and its per-video inference state. Callers
/// should drive an engine through [`Session`], which enforces that prompts
/// are always added to a freshly reset state.
pub trait SegmentationEngine {
    /// Number of frames in the loaded video
    fn frame_count(&self) -> usize;

    /// Clear every prompt and all tracking memory
    fn reset(&mut self) -> Result<(), ShoalError>;

    /// Add a point prompt to the current state
    fn add_point(&mut self, prompt: &PointPrompt) -> Result<(), ShoalError>;

    /// Propagate the current prompts from `first` to `last` (inclusive)
    fn propagate(&mut self, first: usize, last: usize) -> Result<FrameStream<'_>, ShoalError>;
}

/// Exclusive owner of a segmentation engine
///
/// # Examples
///
/// ```ignore
/// let mut session = Session::open(engine);
///
/// let mut prompting = session.reset()?;
/// prompting.seed(PointPrompt { object: 1, frame: 2, point: [10.0, 20.0], positive: true })?;
///
/// for frame in prompting.propagate(2, 8)? {
///     let frame = frame?;
/// }
/// ```
pub struct Session<E: SegmentationEngine> {
    engine: E,
}

impl<E: SegmentationEngine> Session<E> {
    pub fn open(engine: E) -> Session<E> {
        Session { engine }
    }

    pub fn frame_count(&self) -> usize {
        self.engine.frame_count()
    }

    /// Reset the engine and start a new prompting epoch
    pub fn reset(&mut self) -> Result<Prompting<'_, E>, ShoalError> {
        self.engine.reset()?;

        Ok(Prompting {
            engine: &mut self.engine,
            objects: BTreeSet::new(),
        })
    }

    /// Release the session and return the engine
    pub fn into_inner(self) -> E {
        self.engine
    }
}

/// Prompts added since the last reset
pub struct Prompting<'s, E: SegmentationEngine> {
    engine: &'s mut E,
    objects: BTreeSet<u32>,
}

impl<'s, E: SegmentationEngine> Prompting<'s, E> {
    /// Add a point prompt
    pub fn seed(&mut self, prompt: PointPrompt) -> Result<(), ShoalError> {
        let n_frames = self.engine.frame_count();

        if prompt.frame >= n_frames {
            return Err(ShoalError::PromptError(format!(
                "Frame {} is outside of the {} frame video",
                prompt.frame, n_frames
            )));
        }

        if !prompt.point.iter().all(|v| v.is_finite()) {
            return Err(ShoalError::PromptError(format!(
                "Point {:?} has non-finite coordinates",
                prompt.point
            )));
        }

        self.engine.add_point(&prompt)?;
        self.objects.insert(prompt.object);

        Ok(())
    }

    /// Objects seeded in this epoch
    pub fn objects(&self) -> &BTreeSet<u32> {
        &self.objects
    }

    /// Propagate the seeded prompts over frames `first..=last`
    ///
    /// Consumes the epoch, so further prompts require a new reset.
    pub fn propagate(self, first: usize, last: usize) -> Result<Propagation<'s>, ShoalError> {
        let Prompting { engine, objects } = self;
        let n_frames = engine.frame_count();

        if objects.is_empty() {
            return Err(ShoalError::PromptError(
                "Propagation requires at least one prompt".to_string(),
            ));
        }

        if first > last || last >= n_frames {
            return Err(ShoalError::PromptError(format!(
                "Frames {}..={} are not a valid range of the {} frame video",
                first, last, n_frames
            )));
        }

        let frames = engine.propagate(first, last)?;

        Ok(Propagation {
            frames,
            objects,
            first,
            last,
            previous: None,
            finished: false,
        })
    }
}

/// A forward-only stream of propagated frames
///
/// Frames are checked to arrive in strictly increasing order within the
/// requested range, with exactly one mask per seeded object. The stream ends
/// after the first error.
pub struct Propagation<'s> {
    frames: FrameStream<'s>,
    objects: BTreeSet<u32>,
    first: usize,
    last: usize,
    previous: Option<usize>,
    finished: bool,
}

impl Propagation<'_> {
    fn check(&self, frame: &PropagatedFrame) -> Result<(), ShoalError> {
        if frame.frame < self.first || frame.frame > self.last {
            return Err(ShoalError::ProtocolError(format!(
                "Frame {} is outside of the propagated range {}..={}",
                frame.frame, self.first, self.last
            )));
        }

        if self.previous.is_some_and(|previous| frame.frame <= previous) {
            return Err(ShoalError::ProtocolError(format!(
                "Frame {} arrived out of order",
                frame.frame
            )));
        }

        let objects: BTreeSet<u32> = frame.masks.iter().map(|(id, _)| *id).collect();
        if objects != self.objects || objects.len() != frame.masks.len() {
            return Err(ShoalError::ProtocolError(format!(
                "Frame {} has masks for objects {:?}, expected {:?}",
                frame.frame,
                frame.masks.iter().map(|(id, _)| id).collect::<Vec<_>>(),
                self.objects
            )));
        }

        Ok(())
    }
}

impl Iterator for Propagation<'_> {
    type Item = Result<PropagatedFrame, ShoalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let item = match self.frames.next() {
            Some(item) => item,
            None => {
                self.finished = true;
                return None;
            }
        };

        let result = item.and_then(|frame| {
            self.check(&frame)?;
            self.previous = Some(frame.frame);
            Ok(frame)
        });

        if result.is_err() {
            self.finished = true;
        }

        Some(result)
    }
}
