// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::Path;

use candle_core::Tensor;

use shoal_core::error::ShoalError;
use shoal_core::mask::BinaryMask;

fn tensor_error(err: candle_core::Error) -> ShoalError {
    ShoalError::ProtocolError(format!("Invalid mask logits: {}", err))
}

/// Threshold mask logits at zero into one binary mask per object
///
/// # Arguments
///
/// * `logits` - A (N, 1, H, W) or (N, H, W) float tensor of mask logits
pub fn threshold_logits(logits: &Tensor) -> Result<Vec<BinaryMask>, ShoalError> {
    let masks = match logits.dims() {
        [_, 1, _, _] => logits.gt(0.0).and_then(|t| t.squeeze(1)),
        [_, _, _] => logits.gt(0.0),
        dims => {
            return Err(ShoalError::ProtocolError(format!(
                "Mask logits must have shape (N, 1, H, W), found {:?}",
                dims
            )));
        }
    }
    .map_err(tensor_error)?;

    masks
        .to_vec3::<u8>()
        .map_err(tensor_error)?
        .into_iter()
        .map(|rows| {
            let height = rows.len() as u32;
            let width = rows.first().map(|r| r.len()).unwrap_or(0) as u32;
            let data = rows.into_iter().flatten().map(|v| v != 0).collect();
            BinaryMask::new(width, height, data)
        })
        .collect()
}

/// Read a .npy file of mask logits and threshold it
pub fn read_logits<P: AsRef<Path>>(path: P) -> Result<Vec<BinaryMask>, ShoalError> {
    let path = path.as_ref();

    let logits = Tensor::read_npy(path).map_err(|err| {
        ShoalError::ProtocolError(format!("Failed to read {}: {}", path.display(), err))
    })?;

    threshold_logits(&logits)
}
