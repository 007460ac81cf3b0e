// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::annotation::{
    Annotation, AnnotationColumns, ClickType, FishFamily, format_location, parse_location,
};
use crate::constant;
use crate::error::ShoalError;

/// Convert annotations to a table with the annotation tool's CSV layout
///
/// # Examples
///
/// ```
/// use shoal_core::annotation::{Annotation, ClickType, FishFamily};
/// use shoal_core::io::annotations_to_table;
///
/// let annotations = vec![Annotation::new(3, ClickType::Bite, "1", FishFamily::Parrotfish, [1.0, 2.0])];
/// let df = annotations_to_table(&annotations).unwrap();
/// assert_eq!(df.shape(), (1, 5));
/// ```
pub fn annotations_to_table(annotations: &[Annotation]) -> Result<DataFrame, ShoalError> {
    let columns = vec![
        Column::new(
            constant::FRAME_COLUMN.into(),
            annotations.iter().map(|a| a.frame).collect::<Vec<i64>>(),
        ),
        Column::new(
            constant::CLICK_TYPE_COLUMN.into(),
            annotations
                .iter()
                .map(|a| a.click_type.code())
                .collect::<Vec<i64>>(),
        ),
        Column::new(
            constant::LABEL_COLUMN.into(),
            annotations
                .iter()
                .map(|a| a.label.clone())
                .collect::<Vec<String>>(),
        ),
        Column::new(
            constant::FAMILY_COLUMN.into(),
            annotations
                .iter()
                .map(|a| a.family.to_string())
                .collect::<Vec<String>>(),
        ),
        Column::new(
            constant::LOCATION_COLUMN.into(),
            annotations
                .iter()
                .map(|a| format_location(&a.location))
                .collect::<Vec<String>>(),
        ),
    ];

    DataFrame::new(columns).map_err(|err| ShoalError::AnnotationWriteError(err.to_string()))
}

/// Write annotations to a CSV file with header `Frame,clickType,fishLabel,Fish_Fam,Location`
///
/// # Arguments
///
/// * `annotations` - Annotations to write
/// * `path` - Output CSV path
pub fn write_annotations_csv<P: AsRef<Path>>(
    annotations: &[Annotation],
    path: P,
) -> Result<(), ShoalError> {
    let mut df = annotations_to_table(annotations)?;

    let mut output: File = File::create(&path).map_err(|err| {
        ShoalError::AnnotationWriteError(format!(
            "Failed to create CSV file {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;

    CsvWriter::new(&mut output)
        .include_header(true)
        .finish(&mut df)
        .map_err(|err| ShoalError::AnnotationWriteError(format!("Failed to write CSV file: {}", err)))
}

/// Read annotations from a CSV file using the given column names
///
/// Numeric columns are coerced to integers and the object label is coerced to
/// a string, so `fishLabel` values of `3` and `"3"` read identically.
pub fn read_annotations_csv<P: AsRef<Path>>(
    path: P,
    columns: &AnnotationColumns,
) -> Result<Vec<Annotation>, ShoalError> {
    let path = path.as_ref();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|err| {
            ShoalError::AnnotationReadError(format!("{}: {}", path.display(), err))
        })?;

    let required = [
        &columns.frame,
        &columns.click_type,
        &columns.label,
        &columns.family,
        &columns.location,
    ];

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    if let Some(missing) = required.iter().find(|c| !names.contains(c)) {
        return Err(ShoalError::AnnotationReadError(format!(
            "The CSV file must contain the following columns: {}. Missing: {}",
            required
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<&str>>()
                .join(", "),
            missing
        )));
    }

    let frames = integer_column(&df, &columns.frame)?;
    let click_types = integer_column(&df, &columns.click_type)?;
    let labels = string_column(&df, &columns.label)?;
    let families = string_column(&df, &columns.family)?;
    let locations = string_column(&df, &columns.location)?;

    (0..df.height())
        .map(|i| {
            Ok(Annotation {
                frame: frames[i],
                click_type: ClickType::from_code(click_types[i])?,
                label: labels[i].clone(),
                family: FishFamily::parse(&families[i]),
                location: parse_location(&locations[i])?,
            })
        })
        .collect()
}

fn integer_column(df: &DataFrame, name: &str) -> Result<Vec<i64>, ShoalError> {
    let error = |err: PolarsError| {
        ShoalError::AnnotationReadError(format!("Column '{}' is not an integer: {}", name, err))
    };

    let series = df
        .column(name)
        .map_err(error)?
        .as_materialized_series()
        .strict_cast(&DataType::Int64)
        .map_err(error)?;

    series
        .i64()
        .map_err(error)?
        .into_iter()
        .map(|value| {
            value.ok_or_else(|| {
                ShoalError::AnnotationReadError(format!("Column '{}' has missing values", name))
            })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>, ShoalError> {
    let error = |err: PolarsError| {
        ShoalError::AnnotationReadError(format!("Column '{}' is not text: {}", name, err))
    };

    let series = df
        .column(name)
        .map_err(error)?
        .as_materialized_series()
        .cast(&DataType::String)
        .map_err(error)?;

    series
        .str()
        .map_err(error)?
        .into_iter()
        .map(|value| {
            value.map(|v| v.to_string()).ok_or_else(|| {
                ShoalError::AnnotationReadError(format!("Column '{}' has missing values", name))
            })
        })
        .collect()
}
