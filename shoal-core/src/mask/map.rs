// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::collections::BTreeMap;
use std::path::Path;

use crate::align::ObjectId;
use crate::constant;
use crate::error::ShoalError;
use crate::io;
use crate::mask::SparseMask;

/// Masks accumulated over a video, keyed by frame then object
///
/// Every frame of the video has an entry from construction, so frames where
/// no object was tracked are present with an empty object map. A mask is
/// never overwritten once inserted.
///
/// # Examples
///
/// ```
/// use shoal_core::align::ObjectId;
/// use shoal_core::mask::{BinaryMask, FrameMaskMap};
///
/// let mut masks = FrameMaskMap::new(3);
/// let mask = BinaryMask::empty(4, 4).to_sparse();
///
/// masks.insert(1, ObjectId::Number(5), mask.clone()).unwrap();
/// assert!(masks.insert(1, ObjectId::Number(5), mask).is_err());
/// assert_eq!(masks.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameMaskMap {
    frames: BTreeMap<usize, BTreeMap<ObjectId, SparseMask>>,
}

impl FrameMaskMap {
    pub fn new(n_frames: usize) -> FrameMaskMap {
        FrameMaskMap {
            frames: (0..n_frames).map(|frame| (frame, BTreeMap::new())).collect(),
        }
    }

    /// Number of frames covered by the map
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total number of stored object masks
    pub fn n_masks(&self) -> usize {
        self.frames.values().map(|objects| objects.len()).sum()
    }

    /// Insert the mask of an object at a frame
    ///
    /// # Arguments
    ///
    /// * `frame` - Frame index, must be within the video
    /// * `object` - Object the mask belongs to
    /// * `mask` - The object mask
    pub fn insert(
        &mut self,
        frame: usize,
        object: ObjectId,
        mask: SparseMask,
    ) -> Result<(), ShoalError> {
        let n_frames = self.frames.len();
        let objects = self.frames.get_mut(&frame).ok_or_else(|| {
            ShoalError::OtherError(format!(
                "Frame {} is outside of the {} frame video",
                frame, n_frames
            ))
        })?;

        if objects.contains_key(&object) {
            return Err(ShoalError::MaskOverwriteError {
                frame,
                object: object.to_string(),
            });
        }

        objects.insert(object, mask);
        Ok(())
    }

    pub fn get(&self, frame: usize) -> Option<&BTreeMap<ObjectId, SparseMask>> {
        self.frames.get(&frame)
    }

    pub fn get_object(&self, frame: usize, object: &ObjectId) -> Option<&SparseMask> {
        self.frames.get(&frame).and_then(|objects| objects.get(object))
    }

    /// Iterate over frames in increasing order
    pub fn frames(&self) -> impl Iterator<Item = (&usize, &BTreeMap<ObjectId, SparseMask>)> {
        self.frames.iter()
    }

    /// Persist the map to a .npz archive
    ///
    /// Masks are flattened in (frame, object) order into `frame`, `object`,
    /// `shape` (K x 2 as height, width) and `offset` (K + 1) arrays with the set
    /// pixel indices of every mask concatenated in `index`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ShoalError> {
        let mut frames: Vec<u64> = Vec::new();
        let mut objects: Vec<String> = Vec::new();
        let mut shapes: Vec<u64> = Vec::new();
        let mut offsets: Vec<u64> = vec![0];
        let mut indices: Vec<u32> = Vec::new();

        for (frame, masks) in self.frames.iter() {
            for (object, mask) in masks.iter() {
                frames.push(*frame as u64);
                objects.push(object.to_string());
                shapes.extend([mask.height() as u64, mask.width() as u64]);
                indices.extend_from_slice(mask.indices());
                offsets.push(indices.len() as u64);
            }
        }

        let k = frames.len() as u64;
        let mut zip = io::create_npz(&path)?;

        io::write_npz_array(&mut zip, constant::MASKS_N_FRAMES, &[1], [self.frames.len() as u64])?;
        io::write_npz_array(&mut zip, constant::MASKS_FRAME, &[k], frames)?;
        io::write_npz_strings(&mut zip, constant::MASKS_OBJECT, &objects)?;
        io::write_npz_array(&mut zip, constant::MASKS_SHAPE, &[k, 2], shapes)?;
        io::write_npz_array(&mut zip, constant::MASKS_OFFSET, &[k + 1], offsets)?;
        io::write_npz_array(&mut zip, constant::MASKS_INDEX, &[indices.len() as u64], indices)?;

        io::finish_npz(zip)
    }

    /// Load a map written by [`FrameMaskMap::save`]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FrameMaskMap, ShoalError> {
        let mut archive = io::open_npz(&path)?;

        let (_, n_frames) = io::read_npz_array::<u64>(&mut archive, constant::MASKS_N_FRAMES)?;
        let (_, frames) = io::read_npz_array::<u64>(&mut archive, constant::MASKS_FRAME)?;
        let (_, objects) = io::read_npz_array::<String>(&mut archive, constant::MASKS_OBJECT)?;
        let (_, shapes) = io::read_npz_array::<u64>(&mut archive, constant::MASKS_SHAPE)?;
        let (_, offsets) = io::read_npz_array::<u64>(&mut archive, constant::MASKS_OFFSET)?;
        let (_, indices) = io::read_npz_array::<u32>(&mut archive, constant::MASKS_INDEX)?;

        let n_frames = *n_frames
            .first()
            .ok_or(ShoalError::MaskError("Mask file has no frame count"))?;

        let k = frames.len();
        if objects.len() != k || shapes.len() != 2 * k || offsets.len() != k + 1 {
            return Err(ShoalError::MaskError("Mask file arrays have inconsistent lengths"));
        }

        let mut map = FrameMaskMap::new(n_frames as usize);

        for i in 0..k {
            let (start, end) = (offsets[i] as usize, offsets[i + 1] as usize);
            if start > end || end > indices.len() {
                return Err(ShoalError::MaskError("Mask file offsets are out of bounds"));
            }

            let mask = SparseMask::new(
                shapes[2 * i + 1] as u32,
                shapes[2 * i] as u32,
                indices[start..end].to_vec(),
            )?;

            map.insert(frames[i] as usize, ObjectId::parse(&objects[i])?, mask)?;
        }

        Ok(map)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mask::BinaryMask;

    fn mask(width: u32, height: u32, set: &[usize]) -> SparseMask {
        let mut data = vec![false; (width * height) as usize];
        for &i in set {
            data[i] = true;
        }
        BinaryMask::new(width, height, data).unwrap().to_sparse()
    }

    #[test]
    fn test_frame_mask_map_coverage() {
        let masks = FrameMaskMap::new(5);
        assert_eq!(masks.len(), 5);
        assert_eq!(masks.n_masks(), 0);

        for frame in 0..5 {
            assert!(masks.get(frame).unwrap().is_empty());
        }

        assert!(masks.get(5).is_none());
    }

    #[test]
    fn test_frame_mask_map_insert() {
        let mut masks = FrameMaskMap::new(2);

        masks.insert(0, ObjectId::Number(1), mask(3, 2, &[0])).unwrap();
        masks.insert(0, ObjectId::Number(2), mask(3, 2, &[1])).unwrap();

        let overwrite = masks.insert(0, ObjectId::Number(1), mask(3, 2, &[5]));
        assert!(matches!(overwrite, Err(ShoalError::MaskOverwriteError { frame: 0, .. })));
        assert_eq!(masks.get_object(0, &ObjectId::Number(1)).unwrap().indices(), &[0]);

        assert!(masks.insert(2, ObjectId::Number(1), mask(3, 2, &[0])).is_err());
        assert_eq!(masks.n_masks(), 2);
    }

    #[test]
    fn test_frame_mask_map_save_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masks.npz");

        let mut masks = FrameMaskMap::new(4);
        masks.insert(0, ObjectId::Number(3), mask(5, 4, &[0, 6, 19])).unwrap();
        masks.insert(2, ObjectId::Number(3), mask(5, 4, &[])).unwrap();
        masks.insert(2, ObjectId::Name("A".to_string()), mask(5, 4, &[7, 8])).unwrap();

        masks.save(&path).unwrap();
        let loaded = FrameMaskMap::open(&path).unwrap();

        assert_eq!(loaded, masks);
        assert_eq!(loaded.len(), 4);
        assert!(loaded.get(3).unwrap().is_empty());
    }

    #[test]
    fn test_frame_mask_map_save_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty_masks.npz");

        let masks = FrameMaskMap::new(3);
        masks.save(&path).unwrap();

        assert_eq!(FrameMaskMap::open(&path).unwrap(), masks);
    }
}
