// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;

#[derive(Debug, Clone)]
pub enum ShoalError {
    ConfigError(String),
    AlignmentError(String),
    PairingError(String),
    PromptError(String),
    EngineError(String),
    DeviceError(String),
    ProtocolError(String),
    MaskError(&'static str),
    MaskOverwriteError { frame: usize, object: String },
    BufferSizeError,
    ImageReadError(String),
    ImageWriteError(String),
    AnnotationReadError(String),
    AnnotationWriteError(String),
    NoFileError(String),
    DirError(String),
    OtherError(String),
}

impl fmt::Display for ShoalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShoalError::ConfigError(message) => {
                write!(f, "[shoal::ConfigError] Invalid configuration. {}", message)
            }
            ShoalError::AlignmentError(message) => {
                write!(
                    f,
                    "[shoal::AlignmentError] Annotations could not be aligned to model frames. {}",
                    message
                )
            }
            ShoalError::PairingError(message) => {
                write!(
                    f,
                    "[shoal::PairingError] Missing or mismatched enter/exit marker. {}",
                    message
                )
            }
            ShoalError::PromptError(message) => {
                write!(f, "[shoal::PromptError] Invalid point prompt. {}", message)
            }
            ShoalError::EngineError(message) => {
                write!(f, "[shoal::EngineError] Segmentation engine failed. {}", message)
            }
            ShoalError::DeviceError(message) => {
                write!(f, "[shoal::DeviceError] Unsupported device. {}", message)
            }
            ShoalError::ProtocolError(message) => {
                write!(
                    f,
                    "[shoal::ProtocolError] Unexpected response from segmentation engine. {}",
                    message
                )
            }
            ShoalError::MaskError(message) => {
                write!(f, "[shoal::MaskError] Failed to create mask. {}", message)
            }
            ShoalError::MaskOverwriteError { frame, object } => {
                write!(
                    f,
                    "[shoal::MaskOverwriteError] A mask for object {} already exists at frame {}.",
                    object, frame
                )
            }
            ShoalError::BufferSizeError => {
                write!(
                    f,
                    "[shoal::BufferSizeError] The buffer does not match provided size."
                )
            }
            ShoalError::ImageReadError(message) => {
                write!(f, "[shoal::ImageReadError] Failed to read image. {}", message)
            }
            ShoalError::ImageWriteError(message) => {
                write!(f, "[shoal::ImageWriteError] Failed to write image. {}", message)
            }
            ShoalError::AnnotationReadError(message) => {
                write!(
                    f,
                    "[shoal::AnnotationReadError] Annotations could not be read. {}",
                    message
                )
            }
            ShoalError::AnnotationWriteError(message) => {
                write!(
                    f,
                    "[shoal::AnnotationWriteError] Annotations could not be written. {}",
                    message
                )
            }
            ShoalError::NoFileError(message) => {
                write!(
                    f,
                    "[shoal::NoFileError] File could not be found. {}.",
                    message
                )
            }
            ShoalError::DirError(message) => {
                write!(
                    f,
                    "[shoal::DirError] Directory could not be read. {}.",
                    message
                )
            }
            ShoalError::OtherError(message) => {
                write!(f, "[shoal::OtherError] Error: {}.", message)
            }
        }
    }
}

impl std::error::Error for ShoalError {}
