// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::align::ObjectId;
use crate::constant;
use crate::error::ShoalError;
use crate::mask::BinaryMask;

/// Evenly spaced colours over the 24-bit RGB range
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    /// Generate `n` colours spaced by `255^3 / n` over the packed RGB range
    ///
    /// # Examples
    ///
    /// ```
    /// use shoal_core::render::Palette;
    ///
    /// let palette = Palette::spaced(100);
    /// assert_eq!(palette.len(), 100);
    /// assert_eq!(palette.get(0).0, [0, 0, 0]);
    /// assert_eq!(palette.get(1).0, [2, 135, 181]);
    /// ```
    pub fn spaced(n: usize) -> Palette {
        let n = n.max(1) as u32;
        let interval = (255u32.pow(3) / n).max(1);

        let colors = (0..n)
            .map(|i| {
                let packed = i * interval;
                Rgb([
                    ((packed >> 16) & 0xff) as u8,
                    ((packed >> 8) & 0xff) as u8,
                    (packed & 0xff) as u8,
                ])
            })
            .collect();

        Palette { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Rgb<u8> {
        self.colors[index % self.colors.len()]
    }

    /// Colour of an object, identical across runs for the same object
    pub fn color(&self, object: &ObjectId) -> Rgb<u8> {
        match object {
            ObjectId::Number(n) => self.get(*n as usize),
            ObjectId::Name(name) => self.get(fnv1a(name.as_bytes()) as usize),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::spaced(constant::PALETTE_SIZE)
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c9dc5u32, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(0x01000193)
    })
}

/// Parse a colour name or `#rrggbb` hex string
///
/// # Examples
///
/// ```
/// use shoal_core::render::parse_color;
///
/// assert_eq!(parse_color("red").unwrap().0, [255, 0, 0]);
/// assert_eq!(parse_color("#10a0FF").unwrap().0, [16, 160, 255]);
/// assert!(parse_color("sparkly").is_err());
/// ```
pub fn parse_color(color: &str) -> Result<Rgb<u8>, ShoalError> {
    let color = color.trim().to_lowercase();

    let named = match color.as_str() {
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 128, 0]),
        "lime" => Some([0, 255, 0]),
        "blue" => Some([0, 0, 255]),
        "yellow" => Some([255, 255, 0]),
        "cyan" => Some([0, 255, 255]),
        "magenta" => Some([255, 0, 255]),
        "orange" => Some([255, 165, 0]),
        "purple" => Some([128, 0, 128]),
        "white" => Some([255, 255, 255]),
        "black" => Some([0, 0, 0]),
        "gray" | "grey" => Some([128, 128, 128]),
        _ => None,
    };

    if let Some(rgb) = named {
        return Ok(Rgb(rgb));
    }

    let invalid = || ShoalError::ConfigError(format!("Unknown font color '{}'", color));

    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// DejaVu Sans, the label font used when no font file is configured
pub static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// How masks and object labels are drawn onto frames
pub struct OverlayStyle {
    pub alpha: f32,
    pub font_size: f32,
    pub font_color: Rgb<u8>,
    pub font: FontArc,
}

impl OverlayStyle {
    /// Create a new overlay style
    ///
    /// # Arguments
    ///
    /// * `alpha` - Mask opacity in [0, 1]
    /// * `font_size` - Label height in pixels
    /// * `font_color` - Colour name or `#rrggbb` string
    /// * `font_file` - Optional TrueType font, DejaVu Sans is used otherwise
    pub fn new(
        alpha: f32,
        font_size: f32,
        font_color: &str,
        font_file: Option<&Path>,
    ) -> Result<OverlayStyle, ShoalError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ShoalError::ConfigError(format!(
                "alpha must be in [0, 1], found {}",
                alpha
            )));
        }

        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(ShoalError::ConfigError(format!(
                "font_size must be positive, found {}",
                font_size
            )));
        }

        let font = match font_file {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|err| ShoalError::NoFileError(format!("{}: {}", path.display(), err)))?;

                FontArc::try_from_vec(bytes).map_err(|_| {
                    ShoalError::ConfigError(format!("{} is not a valid font", path.display()))
                })?
            }
            None => FontArc::try_from_slice(DEFAULT_FONT)
                .map_err(|_| ShoalError::OtherError("Bundled label font is invalid".to_string()))?,
        };

        Ok(OverlayStyle {
            alpha,
            font_size,
            font_color: parse_color(font_color)?,
            font,
        })
    }
}

/// Draw object masks and labels onto an image
///
/// Each non-empty mask is alpha blended in its object's colour. Labels are then
/// drawn with their top-left corner at the mask centroid. Empty masks are skipped.
pub fn draw_overlay(
    image: &mut RgbImage,
    masks: &[(ObjectId, BinaryMask)],
    palette: &Palette,
    style: &OverlayStyle,
) -> Result<(), ShoalError> {
    let (width, height) = image.dimensions();

    if masks
        .iter()
        .any(|(_, mask)| mask.width() != width || mask.height() != height)
    {
        return Err(ShoalError::MaskError("Mask size does not match frame size"));
    }

    for (object, mask) in masks.iter().filter(|(_, mask)| mask.any()) {
        let color = palette.color(object);

        for (pixel, _) in image
            .pixels_mut()
            .zip(mask.as_slice())
            .filter(|(_, set)| **set)
        {
            for c in 0..3 {
                let blended =
                    pixel.0[c] as f32 * (1.0 - style.alpha) + color.0[c] as f32 * style.alpha;
                pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    for (object, mask) in masks.iter() {
        if let Some([x, y]) = mask.centroid() {
            draw_label(image, &object.to_string(), x as i32, y as i32, style);
        }
    }

    Ok(())
}

/// Draw overlays onto a frame and overwrite it in place
///
/// # Arguments
///
/// * `path` - Path to a JPEG frame
/// * `masks` - Masks for every object tracked in the frame
/// * `palette` - Object colours
/// * `style` - Overlay style
pub fn render_frame<P: AsRef<Path>>(
    path: P,
    masks: &[(ObjectId, BinaryMask)],
    palette: &Palette,
    style: &OverlayStyle,
) -> Result<(), ShoalError> {
    let path = path.as_ref();

    let mut image = image::open(path)
        .map_err(|err| ShoalError::ImageReadError(format!("{}: {}", path.display(), err)))?
        .to_rgb8();

    draw_overlay(&mut image, masks, palette, style)?;

    image
        .save(path)
        .map_err(|err| ShoalError::ImageWriteError(format!("{}: {}", path.display(), err)))
}

fn draw_label(image: &mut RgbImage, text: &str, x: i32, y: i32, style: &OverlayStyle) {
    draw_text_mut(
        image,
        style.font_color,
        x,
        y,
        PxScale::from(style.font_size),
        &style.font,
        text,
    );
}
