// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::fmt;

use crate::annotation::{Annotation, ClickType};
use crate::constant;
use crate::error::ShoalError;

/// Identity of a tracked object, taken from its annotation label
///
/// Integer labels compare numerically and sort before free-text labels,
/// which compare lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Number(u32),
    Name(String),
}

impl ObjectId {
    /// Parse an annotation label such as `"7"` or `"A"` into an object id
    ///
    /// # Examples
    ///
    /// ```
    /// use shoal_core::align::ObjectId;
    ///
    /// assert_eq!(ObjectId::parse(" 7 ").unwrap(), ObjectId::Number(7));
    /// assert_eq!(ObjectId::parse("A").unwrap(), ObjectId::Name("A".to_string()));
    /// assert!(ObjectId::parse("  ").is_err());
    /// assert!(ObjectId::parse("10").unwrap() > ObjectId::parse("9").unwrap());
    /// ```
    pub fn parse(label: &str) -> Result<ObjectId, ShoalError> {
        let label = label.trim();

        if label.is_empty() {
            return Err(ShoalError::AlignmentError(
                "Annotation has an empty object label".to_string(),
            ));
        }

        Ok(match label.parse::<u32>() {
            Ok(number) => ObjectId::Number(number),
            Err(_) => ObjectId::Name(label.to_string()),
        })
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectId::Number(number) => write!(f, "{}", number),
            ObjectId::Name(name) => write!(f, "{}", name),
        }
    }
}

/// An annotation with its frame remapped into model frame space
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedAnnotation {
    pub frame: i64,
    pub click_type: ClickType,
    pub object: ObjectId,
    pub location: [f64; 2],
}

/// Mapping from original video frame numbers to sampled model frame indices
///
/// `aligned = round((frame - sam_start - 1) / (fps / sample_rate))`
///
/// Rounding is half to even. The mapping is lossy: every frame within half a
/// sampling interval of a sampled frame aliases onto it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAlignment {
    pub sam_start: i64,
    pub fps: f64,
    pub sample_rate: f64,
}

impl FrameAlignment {
    /// Create a new alignment
    ///
    /// # Arguments
    ///
    /// * `sam_start` - First original frame ingested by the model
    /// * `fps` - Frame rate of the original video
    /// * `sample_rate` - Frames per second of original video sampled by the model
    pub fn new(sam_start: i64, fps: f64, sample_rate: f64) -> Result<FrameAlignment, ShoalError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(ShoalError::ConfigError(format!(
                "fps must be a positive number, found {}",
                fps
            )));
        }

        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ShoalError::ConfigError(format!(
                "sample_rate must be a positive number, found {}",
                sample_rate
            )));
        }

        Ok(FrameAlignment {
            sam_start,
            fps,
            sample_rate,
        })
    }

    /// Alignment with the model's default sampling of 3 frames per second
    pub fn with_default_rate(sam_start: i64, fps: f64) -> Result<FrameAlignment, ShoalError> {
        FrameAlignment::new(sam_start, fps, constant::DEFAULT_SAMPLE_RATE)
    }

    /// Number of original frames per sampled frame
    pub fn interval(&self) -> f64 {
        self.fps / self.sample_rate
    }

    /// Map an original frame number onto the sampled frame index space
    ///
    /// # Examples
    ///
    /// ```
    /// use shoal_core::align::FrameAlignment;
    ///
    /// let alignment = FrameAlignment::with_default_rate(0, 30.0).unwrap();
    /// assert_eq!(alignment.align(10), 1);
    /// assert_eq!(alignment.align(40), 4);
    /// ```
    pub fn align(&self, frame: i64) -> i64 {
        ((frame - self.sam_start - 1) as f64 / self.interval()).round_ties_even() as i64
    }

    /// Align every annotation and resolve its object label
    pub fn align_all(&self, annotations: &[Annotation]) -> Result<Vec<AlignedAnnotation>, ShoalError> {
        annotations
            .iter()
            .map(|annotation| {
                Ok(AlignedAnnotation {
                    frame: self.align(annotation.frame),
                    click_type: annotation.click_type,
                    object: ObjectId::parse(&annotation.label)?,
                    location: annotation.location,
                })
            })
            .collect()
    }
}
