// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use crate::error::ShoalError;

/// A row-major boolean mask for one object in one frame
///
/// The length of the container must be equal to the product of `width` * `height`.
///
/// # Examples
///
/// ```
/// use shoal_core::mask::BinaryMask;
///
/// let mask = BinaryMask::new(4, 3, vec![false; 12]);
/// assert!(mask.is_ok());
///
/// let mask = BinaryMask::new(4, 3, vec![false; 10]);
/// assert!(mask.is_err()); // Buffer size does not match dimensions
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(width: u32, height: u32, data: Vec<bool>) -> Result<BinaryMask, ShoalError> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(ShoalError::BufferSizeError);
        }

        Ok(BinaryMask {
            width,
            height,
            data,
        })
    }

    /// Create a mask with no pixels set
    pub fn empty(width: u32, height: u32) -> BinaryMask {
        BinaryMask {
            width,
            height,
            data: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Pixel value at column `x` and row `y`
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data[(y * self.width + x) as usize]
    }

    /// True if at least one pixel is set
    pub fn any(&self) -> bool {
        self.data.iter().any(|&p| p)
    }

    /// Number of set pixels
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&p| p).count()
    }

    /// Mean column and row of set pixels, or `None` for an empty mask
    ///
    /// # Examples
    ///
    /// ```
    /// use shoal_core::mask::BinaryMask;
    ///
    /// let mut data = vec![false; 9];
    /// data[1] = true; // (1, 0)
    /// data[7] = true; // (1, 2)
    ///
    /// let mask = BinaryMask::new(3, 3, data).unwrap();
    /// assert_eq!(mask.centroid(), Some([1.0, 1.0]));
    /// assert_eq!(BinaryMask::empty(3, 3).centroid(), None);
    /// ```
    pub fn centroid(&self) -> Option<[f64; 2]> {
        let mut n = 0usize;
        let mut sum_x = 0f64;
        let mut sum_y = 0f64;

        for (i, _) in self.data.iter().enumerate().filter(|(_, p)| **p) {
            sum_x += (i % self.width as usize) as f64;
            sum_y += (i / self.width as usize) as f64;
            n += 1;
        }

        if n == 0 {
            return None;
        }

        Some([sum_x / n as f64, sum_y / n as f64])
    }

    /// Convert to a sparse list of set pixel indices
    pub fn to_sparse(&self) -> SparseMask {
        SparseMask {
            width: self.width,
            height: self.height,
            indices: self
                .data
                .iter()
                .enumerate()
                .filter(|(_, p)| **p)
                .map(|(i, _)| i as u32)
                .collect(),
        }
    }
}

/// Row-major flat indices of the set pixels of a mask
///
/// Masks from a video are mostly background, so accumulated masks are stored
/// in this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMask {
    width: u32,
    height: u32,
    indices: Vec<u32>,
}

impl SparseMask {
    /// Create a sparse mask, checking that indices are in bounds
    pub fn new(width: u32, height: u32, mut indices: Vec<u32>) -> Result<SparseMask, ShoalError> {
        let size = (width as u64) * (height as u64);

        if indices.iter().any(|&i| i as u64 >= size) {
            return Err(ShoalError::MaskError("Mask index is out of bounds"));
        }

        indices.sort_unstable();
        indices.dedup();

        Ok(SparseMask {
            width,
            height,
            indices,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn any(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn count(&self) -> usize {
        self.indices.len()
    }

    pub fn to_dense(&self) -> BinaryMask {
        let mut mask = BinaryMask::empty(self.width, self.height);
        for &i in self.indices.iter() {
            mask.data[i as usize] = true;
        }
        mask
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn square() -> BinaryMask {
        let (w, h) = (6u32, 5u32);
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                (1..=3).contains(&x) && (2..=3).contains(&y)
            })
            .collect();

        BinaryMask::new(w, h, data).unwrap()
    }

    #[test]
    fn test_binary_mask_stats() {
        let mask = square();
        assert!(mask.any());
        assert_eq!(mask.count(), 6);
        assert_eq!(mask.centroid(), Some([2.0, 2.5]));
        assert!(mask.get(1, 2));
        assert!(!mask.get(0, 0));
        assert!(!mask.get(100, 100));
    }

    #[test]
    fn test_binary_mask_empty() {
        let mask = BinaryMask::empty(8, 8);
        assert!(!mask.any());
        assert_eq!(mask.count(), 0);
        assert_eq!(mask.centroid(), None);
        assert!(!mask.to_sparse().any());
    }

    #[test]
    fn test_sparse_dense() {
        let mask = square();
        let sparse = mask.to_sparse();

        assert_eq!(sparse.count(), 6);
        assert_eq!(sparse.indices()[0], 2 * 6 + 1);
        assert_eq!(sparse.to_dense(), mask);
    }

    #[test]
    fn test_sparse_mask_bounds() {
        assert!(SparseMask::new(2, 2, vec![0, 3]).is_ok());
        assert!(SparseMask::new(2, 2, vec![4]).is_err());

        let sparse = SparseMask::new(2, 2, vec![3, 0, 3]).unwrap();
        assert_eq!(sparse.indices(), &[0, 3]);
    }
}
