// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::fmt;

use crate::error::ShoalError;

/// Intent of a single annotation click
///
/// Negative and positive clicks are point prompts, bites are feeding events
/// and enter/exit are structural markers bounding an object's presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClickType {
    Negative = 0,
    Positive = 1,
    Bite = 2,
    Enter = 3,
    Exit = 4,
}

impl ClickType {
    /// Integer code stored in annotation files
    pub fn code(&self) -> i64 {
        *self as i64
    }

    /// Parse an integer code from an annotation file
    ///
    /// # Examples
    ///
    /// ```
    /// use shoal_core::annotation::ClickType;
    ///
    /// assert_eq!(ClickType::from_code(3).unwrap(), ClickType::Enter);
    /// assert!(ClickType::from_code(7).is_err());
    /// ```
    pub fn from_code(code: i64) -> Result<ClickType, ShoalError> {
        match code {
            0 => Ok(ClickType::Negative),
            1 => Ok(ClickType::Positive),
            2 => Ok(ClickType::Bite),
            3 => Ok(ClickType::Enter),
            4 => Ok(ClickType::Exit),
            _ => Err(ShoalError::AnnotationReadError(format!(
                "Unknown click type {}. Must be one of 0, 1, 2, 3, 4",
                code
            ))),
        }
    }

    /// Enter and exit clicks bound an object window and are never prompts
    pub fn is_marker(&self) -> bool {
        matches!(self, ClickType::Enter | ClickType::Exit)
    }

    /// Next click type when toggling in the annotation tool
    ///
    /// Cycles positive, negative, bite and back to positive. Markers are not
    /// part of the cycle and toggle back to positive.
    pub fn toggle(&self) -> ClickType {
        match self {
            ClickType::Positive => ClickType::Negative,
            ClickType::Negative => ClickType::Bite,
            _ => ClickType::Positive,
        }
    }

    /// Button text shown for the click type
    pub fn label(&self) -> &'static str {
        match self {
            ClickType::Negative => "Negative Click",
            ClickType::Positive => "Positive Click",
            ClickType::Bite => "Bite",
            ClickType::Enter => "Enter",
            ClickType::Exit => "Exit",
        }
    }
}

/// Fish family of an annotated individual
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FishFamily {
    #[default]
    Parrotfish,
    Surgeonfish,
    Damselfish,
    Other,
    Custom(String),
}

impl FishFamily {
    /// Next family when toggling in the annotation tool
    pub fn toggle(&self) -> FishFamily {
        match self {
            FishFamily::Parrotfish => FishFamily::Surgeonfish,
            FishFamily::Surgeonfish => FishFamily::Damselfish,
            FishFamily::Damselfish => FishFamily::Other,
            _ => FishFamily::Parrotfish,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FishFamily::Parrotfish => "Parrotfish",
            FishFamily::Surgeonfish => "Surgeonfish",
            FishFamily::Damselfish => "Damselfish",
            FishFamily::Other => "Other",
            FishFamily::Custom(name) => name.as_str(),
        }
    }

    /// Parse a family name, keeping unknown names verbatim
    pub fn parse(name: &str) -> FishFamily {
        match name {
            "Parrotfish" => FishFamily::Parrotfish,
            "Surgeonfish" => FishFamily::Surgeonfish,
            "Damselfish" => FishFamily::Damselfish,
            "Other" => FishFamily::Other,
            custom => FishFamily::Custom(custom.to_string()),
        }
    }
}

impl fmt::Display for FishFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single human-entered annotation
///
/// `frame` is in original video frame numbering and `location` is in original
/// video pixel coordinates as `[x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub frame: i64,
    pub click_type: ClickType,
    pub label: String,
    pub family: FishFamily,
    pub location: [f64; 2],
}

impl Annotation {
    pub fn new(
        frame: i64,
        click_type: ClickType,
        label: &str,
        family: FishFamily,
        location: [f64; 2],
    ) -> Annotation {
        Annotation {
            frame,
            click_type,
            label: label.to_string(),
            family,
            location,
        }
    }

    /// Bites are stored separately from position annotations
    pub fn is_bite(&self) -> bool {
        self.click_type == ClickType::Bite
    }
}

/// Format a location the way it is serialized in CSV files, e.g. `[12.5, 3.0]`
pub fn format_location(location: &[f64; 2]) -> String {
    format!("[{:?}, {:?}]", location[0], location[1])
}

/// Parse a serialized two element location such as `[12.5, 3.0]`
///
/// # Examples
///
/// ```
/// use shoal_core::annotation::parse_location;
///
/// assert_eq!(parse_location("[12.5, 3.0]").unwrap(), [12.5, 3.0]);
/// assert_eq!(parse_location("[ 1.  2.]").unwrap(), [1.0, 2.0]);
/// ```
pub fn parse_location(text: &str) -> Result<[f64; 2], ShoalError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| {
            ShoalError::AnnotationReadError(format!(
                "Location '{}' must be a bracketed pair such as [x, y]",
                text
            ))
        })?;

    let values = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|err| {
            ShoalError::AnnotationReadError(format!("Location '{}' is not numeric: {}", text, err))
        })?;

    match values.as_slice() {
        [x, y] => Ok([*x, *y]),
        _ => Err(ShoalError::AnnotationReadError(format!(
            "Location '{}' must contain exactly two values",
            text
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_click_type_toggle_cycle() {
        let mut click = ClickType::Positive;
        let expected = [
            ClickType::Negative,
            ClickType::Bite,
            ClickType::Positive,
            ClickType::Negative,
            ClickType::Bite,
            ClickType::Positive,
            ClickType::Negative,
        ];

        for e in expected {
            click = click.toggle();
            assert_eq!(click, e);
        }
    }

    #[test]
    fn test_click_type_codes() {
        for code in 0..5 {
            assert_eq!(ClickType::from_code(code).unwrap().code(), code);
        }

        assert!(ClickType::from_code(-1).is_err());
        assert!(ClickType::Enter.is_marker());
        assert!(ClickType::Exit.is_marker());
        assert!(!ClickType::Bite.is_marker());
    }

    #[test]
    fn test_family_toggle_cycle() {
        let family = FishFamily::Parrotfish;
        let family = family.toggle();
        assert_eq!(family, FishFamily::Surgeonfish);
        let family = family.toggle();
        assert_eq!(family, FishFamily::Damselfish);
        let family = family.toggle();
        assert_eq!(family, FishFamily::Other);
        let family = family.toggle();
        assert_eq!(family, FishFamily::Parrotfish);

        assert_eq!(FishFamily::parse("Wrasse").toggle(), FishFamily::Parrotfish);
        assert_eq!(FishFamily::parse("Wrasse").as_str(), "Wrasse");
    }

    #[test]
    fn test_location_format_parse() {
        let location = [120.125, 44.0];
        let text = format_location(&location);

        assert_eq!(text, "[120.125, 44.0]");
        assert_eq!(parse_location(&text).unwrap(), location);

        assert!(parse_location("120.1, 44.0").is_err());
        assert!(parse_location("[1.0]").is_err());
        assert!(parse_location("[a, b]").is_err());
    }
}
