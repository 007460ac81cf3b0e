// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::collections::BTreeMap;

use crate::align::{AlignedAnnotation, ObjectId};
use crate::annotation::ClickType;
use crate::error::ShoalError;

/// Aligned frame interval during which an object is tracked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectWindow {
    pub object: ObjectId,
    pub enter_frame: i64,
    pub exit_frame: i64,
}

impl ObjectWindow {
    pub fn contains(&self, frame: i64) -> bool {
        frame >= self.enter_frame && frame <= self.exit_frame
    }

    /// Number of aligned frames spanned by the window, bounds included
    pub fn len(&self) -> usize {
        (self.exit_frame - self.enter_frame + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Positive, negative and bite annotations grouped by object
///
/// Enter and exit markers never appear here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPrompts {
    prompts: BTreeMap<ObjectId, Vec<AlignedAnnotation>>,
}

impl ObjectPrompts {
    pub fn get(&self, object: &ObjectId) -> &[AlignedAnnotation] {
        self.prompts.get(object).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Prompts of the window's object that fall inside the window
    pub fn within(&self, window: &ObjectWindow) -> Vec<&AlignedAnnotation> {
        self.get(&window.object)
            .iter()
            .filter(|a| window.contains(a.frame))
            .collect()
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectId> {
        self.prompts.keys()
    }

    pub fn len(&self) -> usize {
        self.prompts.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pair enter and exit markers into per-object windows
///
/// Enter markers and exit markers are each sorted by object then frame and
/// zipped index-wise. Both lists must have the same length and the same object
/// order, otherwise a `PairingError` is returned. An object may enter and exit
/// more than once as long as every window closes before the next one opens.
///
/// # Arguments
///
/// * `annotations` - Aligned annotations of a single video
///
/// # Examples
///
/// ```
/// use shoal_core::align::{AlignedAnnotation, ObjectId};
/// use shoal_core::annotation::ClickType;
/// use shoal_core::windows::extract_windows;
///
/// let marker = |frame, click_type| AlignedAnnotation {
///     frame,
///     click_type,
///     object: ObjectId::parse("A").unwrap(),
///     location: [0.0, 0.0],
/// };
///
/// let (windows, prompts) = extract_windows(&[
///     marker(1, ClickType::Enter),
///     marker(4, ClickType::Exit),
/// ]).unwrap();
///
/// assert_eq!(windows[0].enter_frame, 1);
/// assert_eq!(windows[0].exit_frame, 4);
/// assert!(prompts.is_empty());
/// ```
pub fn extract_windows(
    annotations: &[AlignedAnnotation],
) -> Result<(Vec<ObjectWindow>, ObjectPrompts), ShoalError> {
    let mut enters: Vec<(&ObjectId, i64)> = Vec::new();
    let mut exits: Vec<(&ObjectId, i64)> = Vec::new();
    let mut prompts: BTreeMap<ObjectId, Vec<AlignedAnnotation>> = BTreeMap::new();

    for annotation in annotations {
        match annotation.click_type {
            ClickType::Enter => enters.push((&annotation.object, annotation.frame)),
            ClickType::Exit => exits.push((&annotation.object, annotation.frame)),
            _ => prompts
                .entry(annotation.object.clone())
                .or_default()
                .push(annotation.clone()),
        }
    }

    enters.sort();
    exits.sort();

    if enters.len() != exits.len() {
        return Err(ShoalError::PairingError(format!(
            "Found {} enter markers and {} exit markers",
            enters.len(),
            exits.len()
        )));
    }

    let mut windows: Vec<ObjectWindow> = Vec::with_capacity(enters.len());

    for (&(enter_object, enter_frame), &(exit_object, exit_frame)) in enters.iter().zip(exits.iter()) {
        if enter_object != exit_object {
            return Err(ShoalError::PairingError(format!(
                "Enter marker for object {} was paired with exit marker for object {}",
                enter_object, exit_object
            )));
        }

        if exit_frame < enter_frame {
            return Err(ShoalError::PairingError(format!(
                "Object {} exits at frame {} before entering at frame {}",
                enter_object, exit_frame, enter_frame
            )));
        }

        if let Some(previous) = windows.last() {
            if previous.object == *enter_object && enter_frame <= previous.exit_frame {
                return Err(ShoalError::PairingError(format!(
                    "Object {} re-enters at frame {} before exiting at frame {}",
                    enter_object, enter_frame, previous.exit_frame
                )));
            }
        }

        windows.push(ObjectWindow {
            object: enter_object.clone(),
            enter_frame,
            exit_frame,
        });
    }

    for list in prompts.values_mut() {
        list.sort_by_key(|a| a.frame);
    }

    Ok((windows, ObjectPrompts { prompts }))
}

/// Integer identifiers handed to the segmentation engine for each object
///
/// Numeric objects keep their number. Named objects are numbered after the
/// largest numeric id, in sorted order. Running out of `u32` ids is an error.
pub fn engine_ids<'a, I>(objects: I) -> Result<BTreeMap<ObjectId, u32>, ShoalError>
where
    I: IntoIterator<Item = &'a ObjectId>,
{
    let mut objects: Vec<&ObjectId> = objects.into_iter().collect();
    objects.sort();
    objects.dedup();

    let largest = objects
        .iter()
        .filter_map(|o| match o {
            ObjectId::Number(n) => Some(*n),
            ObjectId::Name(_) => None,
        })
        .max();

    let mut next = match largest {
        Some(n) => n.checked_add(1),
        None => Some(0),
    };

    let mut ids = BTreeMap::new();

    for object in objects {
        let id = match object {
            ObjectId::Number(n) => *n,
            ObjectId::Name(_) => {
                let id = next.ok_or_else(|| {
                    ShoalError::AlignmentError(format!(
                        "No engine id left for object {} after numeric id {}",
                        object,
                        largest.unwrap_or(0)
                    ))
                })?;
                next = id.checked_add(1);
                id
            }
        };

        ids.insert(object.clone(), id);
    }

    Ok(ids)
}
