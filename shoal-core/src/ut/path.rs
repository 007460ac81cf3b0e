// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::constant::FRAME_IMAGE_FORMATS;
use crate::error::ShoalError;

/// Collect file paths from a directory whose extension matches one of `valid_ext`
///
/// Extensions are compared case-insensitively and the returned paths are sorted
/// lexicographically, which is the frame order used by the segmentation model.
///
/// # Arguments
///
/// * `directory` - Path to directory containing files
/// * `valid_ext` - Lowercase extensions to keep
///
/// # Examples
///
/// ```no_run
/// use shoal_core::ut::path::collect_file_paths;
/// use shoal_core::constant::FRAME_IMAGE_FORMATS;
/// let files = collect_file_paths("frames/", FRAME_IMAGE_FORMATS.as_slice());
/// ```
pub fn collect_file_paths<P: AsRef<Path>>(
    directory: P,
    valid_ext: &[&str],
) -> Result<Vec<PathBuf>, ShoalError> {
    let directory = directory.as_ref();

    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)
        .map_err(|err| ShoalError::DirError(format!("{}: {}", directory.display(), err)))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| valid_ext.contains(&ext.to_lowercase().as_str()))
        })
        .collect();

    files.sort();

    Ok(files)
}

/// Collect the sorted JPEG frames of an extracted video
///
/// # Arguments
///
/// * `directory` - Directory holding one JPEG per sampled frame
pub fn collect_frame_paths<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>, ShoalError> {
    let directory = directory.as_ref();
    let frames = collect_file_paths(directory, FRAME_IMAGE_FORMATS.as_slice())?;

    if frames.is_empty() {
        return Err(ShoalError::DirError(format!(
            "No .jpg or .jpeg frames found in {}",
            directory.display()
        )));
    }

    Ok(frames)
}

/// Extract a gzip-compressed tar bundle of frames into a directory
///
/// # Arguments
///
/// * `bundle` - Path to a `.tar.gz` file
/// * `directory` - Output directory, created if missing
pub fn extract_frame_bundle<P: AsRef<Path>, Q: AsRef<Path>>(
    bundle: P,
    directory: Q,
) -> Result<(), ShoalError> {
    let bundle = bundle.as_ref();
    let directory = directory.as_ref();

    let file = File::open(bundle)
        .map_err(|err| ShoalError::NoFileError(format!("{}: {}", bundle.display(), err)))?;

    std::fs::create_dir_all(directory)
        .map_err(|err| ShoalError::DirError(format!("{}: {}", directory.display(), err)))?;

    Archive::new(GzDecoder::new(file))
        .unpack(directory)
        .map_err(|err| {
            ShoalError::OtherError(format!(
                "Failed to extract {} into {}: {}",
                bundle.display(),
                directory.display(),
                err
            ))
        })
}
