// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use npyz::npz::{self, NpzArchive};
use npyz::{TypeStr, WriterBuilder};
use zip::ZipWriter;
use zip::write::ExtendedFileOptions;

use crate::annotation::{Annotation, AnnotationColumns, ClickType, FishFamily};
use crate::constant;
use crate::error::ShoalError;

/// An open .npz archive
pub type NpzReader = NpzArchive<BufReader<File>>;

/// A .npz archive being written
pub type NpzWriter = ZipWriter<io::BufWriter<File>>;

/// Create a new .npz archive
pub fn create_npz<P: AsRef<Path>>(path: P) -> Result<NpzWriter, ShoalError> {
    let file = File::create(path.as_ref()).map_err(|err| {
        ShoalError::OtherError(format!(
            "Failed to create .npz file {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;

    Ok(ZipWriter::new(io::BufWriter::new(file)))
}

/// Open an existing .npz archive
pub fn open_npz<P: AsRef<Path>>(path: P) -> Result<NpzReader, ShoalError> {
    NpzArchive::open(path.as_ref()).map_err(|err| {
        ShoalError::NoFileError(format!("{}: {}", path.as_ref().display(), err))
    })
}

/// Finish writing a .npz archive
pub fn finish_npz(zip: NpzWriter) -> Result<(), ShoalError> {
    zip.finish()
        .map(|_| ())
        .map_err(|err| ShoalError::OtherError(format!("Failed to zip .npz file: {}", err)))
}

/// Write a numeric array with a given shape into a .npz archive
///
/// # Arguments
///
/// * `zip` - Open .npz archive
/// * `name` - Array name (without the .npy suffix)
/// * `shape` - Array shape (shape product must equal number of values)
/// * `data` - Values in row-major order
pub fn write_npz_array<T, I>(
    zip: &mut NpzWriter,
    name: &str,
    shape: &[u64],
    data: I,
) -> Result<(), ShoalError>
where
    T: npyz::Serialize + npyz::AutoSerialize,
    I: IntoIterator<Item = T>,
{
    zip.start_file::<_, ExtendedFileOptions>(
        npz::file_name_from_array_name(name),
        Default::default(),
    )
    .map_err(|_| {
        ShoalError::OtherError(format!("Failed to initialize zip file for {} in .npz", name))
    })?;

    let mut writer = npyz::WriteOptions::<T>::new()
        .default_dtype()
        .shape(shape)
        .writer(&mut *zip)
        .begin_nd()
        .map_err(|_| {
            ShoalError::OtherError(format!("Failed to initialize writer for {} in .npz", name))
        })?;

    writer
        .extend(data)
        .map_err(|_| ShoalError::OtherError(format!("Failed to add {} to .npz file", name)))?;

    writer
        .finish()
        .map_err(|_| ShoalError::OtherError(format!("Failed to write {} to .npz file", name)))
}

/// Write a one dimensional unicode string array into a .npz archive
pub fn write_npz_strings(
    zip: &mut NpzWriter,
    name: &str,
    data: &[String],
) -> Result<(), ShoalError> {
    zip.start_file::<_, ExtendedFileOptions>(
        npz::file_name_from_array_name(name),
        Default::default(),
    )
    .map_err(|_| {
        ShoalError::OtherError(format!("Failed to initialize zip file for {} in .npz", name))
    })?;

    let dtype = constant::NPZ_STRING_DTYPE
        .parse::<TypeStr>()
        .map_err(|_| ShoalError::OtherError("Invalid string dtype".to_string()))?;

    let mut writer = npyz::WriteOptions::new()
        .dtype(npyz::DType::Plain(dtype))
        .shape(&[data.len() as u64])
        .writer(&mut *zip)
        .begin_nd()
        .map_err(|_| {
            ShoalError::OtherError(format!("Failed to initialize writer for {} in .npz", name))
        })?;

    writer
        .extend(data.iter().map(|value| value.as_str()))
        .map_err(|_| ShoalError::OtherError(format!("Failed to add {} to .npz file", name)))?;

    writer
        .finish()
        .map_err(|_| ShoalError::OtherError(format!("Failed to write {} to .npz file", name)))
}

/// Read a named array and its shape from a .npz archive
pub fn read_npz_array<T: npyz::Deserialize>(
    archive: &mut NpzReader,
    name: &str,
) -> Result<(Vec<u64>, Vec<T>), ShoalError> {
    let npy = archive
        .by_name(name)
        .map_err(|err| ShoalError::AnnotationReadError(format!("{}: {}", name, err)))?
        .ok_or_else(|| {
            ShoalError::AnnotationReadError(format!("Array '{}' missing from .npz file", name))
        })?;

    let shape = npy.shape().to_vec();
    let data = npy.into_vec::<T>().map_err(|err| {
        ShoalError::AnnotationReadError(format!("Array '{}' has an invalid dtype: {}", name, err))
    })?;

    Ok((shape, data))
}

/// Check if an archive holds a named array
pub fn has_npz_array(archive: &NpzReader, name: &str) -> bool {
    archive.array_names().any(|n| n == name)
}

/// Write annotations to a .npz file with one array per annotation field
///
/// The archive holds `Frame` (i64), `clickType` (i64), `fishLabel` (unicode),
/// `Fish_Fam` (unicode) and `Location` (N x 2 f64).
///
/// # Arguments
///
/// * `annotations` - Annotations to write
/// * `path` - Output .npz path
pub fn write_annotations_npz<P: AsRef<Path>>(
    annotations: &[Annotation],
    path: P,
) -> Result<(), ShoalError> {
    let n = annotations.len() as u64;
    let mut zip = create_npz(&path)
        .map_err(|err| ShoalError::AnnotationWriteError(err.to_string()))?;

    write_npz_array(
        &mut zip,
        constant::FRAME_COLUMN,
        &[n],
        annotations.iter().map(|a| a.frame),
    )?;

    write_npz_array(
        &mut zip,
        constant::CLICK_TYPE_COLUMN,
        &[n],
        annotations.iter().map(|a| a.click_type.code()),
    )?;

    let labels: Vec<String> = annotations.iter().map(|a| a.label.clone()).collect();
    write_npz_strings(&mut zip, constant::LABEL_COLUMN, &labels)?;

    let families: Vec<String> = annotations.iter().map(|a| a.family.to_string()).collect();
    write_npz_strings(&mut zip, constant::FAMILY_COLUMN, &families)?;

    write_npz_array(
        &mut zip,
        constant::LOCATION_COLUMN,
        &[n, 2],
        annotations.iter().flat_map(|a| a.location),
    )?;

    finish_npz(zip)
}

/// Read annotations from a .npz file using the given array names
///
/// The family array is optional and defaults to `Other` when missing, so
/// annotation files produced by other tools can be tracked directly.
pub fn read_annotations_npz<P: AsRef<Path>>(
    path: P,
    columns: &AnnotationColumns,
) -> Result<Vec<Annotation>, ShoalError> {
    let mut archive = open_npz(&path)?;

    let (_, frames) = read_npz_array::<i64>(&mut archive, &columns.frame)?;
    let (_, click_types) = read_npz_array::<i64>(&mut archive, &columns.click_type)?;
    let (_, labels) = read_npz_array::<String>(&mut archive, &columns.label)?;
    let (shape, locations) = read_npz_array::<f64>(&mut archive, &columns.location)?;

    let families = if has_npz_array(&archive, &columns.family) {
        read_npz_array::<String>(&mut archive, &columns.family)?.1
    } else {
        vec![FishFamily::Other.to_string(); frames.len()]
    };

    let n = frames.len();

    if shape.len() != 2 || shape[1] != 2 {
        return Err(ShoalError::AnnotationReadError(format!(
            "Array '{}' must have shape (N, 2), found {:?}",
            columns.location, shape
        )));
    }

    if [click_types.len(), labels.len(), families.len(), locations.len() / 2]
        .iter()
        .any(|&len| len != n)
    {
        return Err(ShoalError::AnnotationReadError(
            "Annotation arrays in .npz file have different lengths".to_string(),
        ));
    }

    (0..n)
        .map(|i| {
            Ok(Annotation {
                frame: frames[i],
                click_type: ClickType::from_code(click_types[i])?,
                label: labels[i].clone(),
                family: FishFamily::parse(&families[i]),
                location: [locations[2 * i], locations[2 * i + 1]],
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn annotations() -> Vec<Annotation> {
        vec![
            Annotation::new(10, ClickType::Enter, "1", FishFamily::Parrotfish, [1.5, 2.25]),
            Annotation::new(12, ClickType::Positive, "1", FishFamily::Parrotfish, [3.0, 4.0]),
            Annotation::new(40, ClickType::Exit, "1", FishFamily::Parrotfish, [5.0, 6.0]),
            Annotation::new(
                15,
                ClickType::Negative,
                "22",
                FishFamily::Custom("Wrasse".to_string()),
                [7.125, 8.5],
            ),
        ]
    }

    #[test]
    fn test_annotations_npz_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_annotations.npz");

        let annotations = annotations();
        write_annotations_npz(&annotations, &path).unwrap();

        let read = read_annotations_npz(&path, &AnnotationColumns::default()).unwrap();
        assert_eq!(read, annotations);
    }

    #[test]
    fn test_annotations_npz_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.npz");

        write_annotations_npz(&[], &path).unwrap();
        let read = read_annotations_npz(&path, &AnnotationColumns::default()).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_annotations_npz_missing_family() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_family.npz");

        let mut zip = create_npz(&path).unwrap();
        write_npz_array(&mut zip, "Frame", &[1], [5i64]).unwrap();
        write_npz_array(&mut zip, "clickType", &[1], [1i64]).unwrap();
        write_npz_strings(&mut zip, "fishLabel", &["3".to_string()]).unwrap();
        write_npz_array(&mut zip, "Location", &[1, 2], [1.0f64, 2.0]).unwrap();
        finish_npz(zip).unwrap();

        let read = read_annotations_npz(&path, &AnnotationColumns::default()).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].family, FishFamily::Other);
        assert_eq!(read[0].label, "3");
    }

    #[test]
    fn test_annotations_npz_custom_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.npz");

        let mut zip = create_npz(&path).unwrap();
        write_npz_array(&mut zip, "frame_idx", &[1], [7i64]).unwrap();
        write_npz_array(&mut zip, "labels", &[1], [0i64]).unwrap();
        write_npz_strings(&mut zip, "obj_id", &["9".to_string()]).unwrap();
        write_npz_array(&mut zip, "points", &[1, 2], [10.0f64, 20.0]).unwrap();
        finish_npz(zip).unwrap();

        let columns = AnnotationColumns {
            frame: "frame_idx".to_string(),
            click_type: "labels".to_string(),
            label: "obj_id".to_string(),
            location: "points".to_string(),
            ..AnnotationColumns::default()
        };

        let read = read_annotations_npz(&path, &columns).unwrap();
        assert_eq!(read[0].frame, 7);
        assert_eq!(read[0].click_type, ClickType::Negative);
        assert_eq!(read[0].location, [10.0, 20.0]);

        assert!(read_annotations_npz(&path, &AnnotationColumns::default()).is_err());
    }
}
