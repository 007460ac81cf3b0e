// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

// Frame image formats accepted in an extracted frame directory
pub const FRAME_IMAGE_FORMATS: [&str; 2] = ["jpg", "jpeg"];

// Annotation file formats that can be imported
pub const ANNOTATION_FORMATS: [&str; 2] = ["npz", "csv"];

// Column (and npz array) names written by the annotation tool
pub const FRAME_COLUMN: &str = "Frame";
pub const CLICK_TYPE_COLUMN: &str = "clickType";
pub const LABEL_COLUMN: &str = "fishLabel";
pub const FAMILY_COLUMN: &str = "Fish_Fam";
pub const LOCATION_COLUMN: &str = "Location";

// Suffixes appended to the base name when an annotation store is saved
pub const GENERAL_ANNOTATIONS_SUFFIX: &str = "_annotations.npz";
pub const BITE_ANNOTATIONS_SUFFIX: &str = "_bites.csv";

// The segmentation model ingests 3 frames per second of original video
pub const DEFAULT_SAMPLE_RATE: f64 = 3.0;

// Number of evenly spaced colours used for object overlays
pub const PALETTE_SIZE: usize = 100;

// Fixed-width unicode dtype for string arrays in .npz annotation files
pub const NPZ_STRING_DTYPE: &str = "<U64";

// Array names in a persisted frame mask map
pub const MASKS_N_FRAMES: &str = "n_frames";
pub const MASKS_FRAME: &str = "frame";
pub const MASKS_OBJECT: &str = "object";
pub const MASKS_SHAPE: &str = "shape";
pub const MASKS_OFFSET: &str = "offset";
pub const MASKS_INDEX: &str = "index";

// Annotation GUI defaults
pub const DEFAULT_FPS: f64 = 30.0;
pub const MIN_PLAYBACK_SPEED: f64 = 0.1;
pub const DEFAULT_SAVE_NAME: &str = "annotations";
