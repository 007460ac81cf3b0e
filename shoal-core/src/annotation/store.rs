// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::annotation::Annotation;
use crate::constant;
use crate::error::ShoalError;
use crate::io;

/// Names of the annotation fields inside an annotation file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnnotationColumns {
    pub frame: String,
    pub click_type: String,
    pub label: String,
    pub family: String,
    pub location: String,
}

impl Default for AnnotationColumns {
    fn default() -> Self {
        AnnotationColumns {
            frame: constant::FRAME_COLUMN.to_string(),
            click_type: constant::CLICK_TYPE_COLUMN.to_string(),
            label: constant::LABEL_COLUMN.to_string(),
            family: constant::FAMILY_COLUMN.to_string(),
            location: constant::LOCATION_COLUMN.to_string(),
        }
    }
}

/// Read annotations from a .npz or .csv file
///
/// # Arguments
///
/// * `path` - Path to an annotation file
/// * `columns` - Field names used inside the file
///
/// # Examples
///
/// ```no_run
/// use shoal_core::annotation::{read_annotations, AnnotationColumns};
/// let annotations = read_annotations("reef_annotations.npz", &AnnotationColumns::default());
/// ```
pub fn read_annotations<P: AsRef<Path>>(
    path: P,
    columns: &AnnotationColumns,
) -> Result<Vec<Annotation>, ShoalError> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(ShoalError::NoFileError(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("npz") => io::read_annotations_npz(path, columns),
        Some("csv") => io::read_annotations_csv(path, columns),
        _ => Err(ShoalError::AnnotationReadError(format!(
            "{} is neither a .npz nor a .csv file. Must be one of: {:?}",
            path.display(),
            constant::ANNOTATION_FORMATS
        ))),
    }
}

/// The canonical, owned list of annotations entered for one video
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    pub fn new() -> AnnotationStore {
        AnnotationStore::default()
    }

    pub fn from_annotations(annotations: Vec<Annotation>) -> AnnotationStore {
        AnnotationStore { annotations }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, index: usize) -> Option<&Annotation> {
        self.annotations.get(index)
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Remove annotations at the given row indices
    ///
    /// Indices may be unordered or repeated; out of range indices are ignored.
    /// Returns the number of removed annotations.
    pub fn remove(&mut self, indices: &[usize]) -> usize {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        let mut removed = 0;
        for &index in indices.iter().rev() {
            if index < self.annotations.len() {
                self.annotations.remove(index);
                removed += 1;
            }
        }

        removed
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Position, prompt and marker annotations (everything except bites)
    pub fn general(&self) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|a| !a.is_bite())
            .cloned()
            .collect()
    }

    /// Bite annotations only
    pub fn bites(&self) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.is_bite())
            .cloned()
            .collect()
    }

    /// Append all annotations from a .npz or .csv file
    ///
    /// Import is all or nothing: if the file cannot be fully parsed the store
    /// is left unchanged. Returns the number of imported annotations.
    pub fn import<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, ShoalError> {
        let imported = read_annotations(path, &AnnotationColumns::default())?;
        let n = imported.len();
        self.annotations.extend(imported);
        Ok(n)
    }

    /// Save general annotations to `<base>_annotations.npz` and bites to `<base>_bites.csv`
    ///
    /// Returns the paths of the general and bite files.
    pub fn save<P: AsRef<Path>>(&self, base: P) -> Result<(PathBuf, PathBuf), ShoalError> {
        let base = base.as_ref().to_string_lossy().to_string();
        let base = if base.trim().is_empty() {
            constant::DEFAULT_SAVE_NAME.to_string()
        } else {
            base.trim().to_string()
        };

        let general_path = PathBuf::from(format!("{}{}", base, constant::GENERAL_ANNOTATIONS_SUFFIX));
        let bites_path = PathBuf::from(format!("{}{}", base, constant::BITE_ANNOTATIONS_SUFFIX));

        io::write_annotations_npz(&self.general(), &general_path)?;
        io::write_annotations_csv(&self.bites(), &bites_path)?;

        Ok((general_path, bites_path))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::annotation::{ClickType, FishFamily};

    fn store() -> AnnotationStore {
        AnnotationStore::from_annotations(vec![
            Annotation::new(10, ClickType::Enter, "1", FishFamily::Parrotfish, [5.0, 5.0]),
            Annotation::new(12, ClickType::Positive, "1", FishFamily::Parrotfish, [6.5, 7.25]),
            Annotation::new(13, ClickType::Bite, "1", FishFamily::Parrotfish, [6.0, 7.0]),
            Annotation::new(19, ClickType::Negative, "2", FishFamily::Damselfish, [1.0, 1.0]),
            Annotation::new(25, ClickType::Bite, "2", FishFamily::Damselfish, [2.0, 3.0]),
            Annotation::new(40, ClickType::Exit, "1", FishFamily::Parrotfish, [8.0, 8.0]),
        ])
    }

    #[test]
    fn test_store_split() {
        let store = store();
        assert_eq!(store.general().len(), 4);
        assert_eq!(store.bites().len(), 2);
        assert!(store.bites().iter().all(|a| a.is_bite()));
    }

    #[test]
    fn test_store_remove() {
        let mut store = store();
        assert_eq!(store.remove(&[5, 0, 0, 99]), 2);
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(0).unwrap().frame, 12);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_save_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("reef_07");

        let store = store();
        let (general, bites) = store.save(&base).unwrap();

        assert!(general.ends_with("reef_07_annotations.npz"));
        assert!(bites.ends_with("reef_07_bites.csv"));

        let mut imported = AnnotationStore::new();
        assert_eq!(imported.import(&general).unwrap(), 4);
        assert_eq!(imported.import(&bites).unwrap(), 2);

        let mut expected = store.general();
        expected.extend(store.bites());

        assert_eq!(imported.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_store_import_failure_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(
            &path,
            "Frame,clickType,fishLabel,Fish_Fam,Location\n1,1,3,Other,\"[1.0, 2.0]\"\n2,1,3,Other,\"oops\"\n",
        )
        .unwrap();

        let mut store = store();
        let before = store.clone();

        assert!(store.import(&path).is_err());
        assert!(store.import(dir.path().join("missing.npz")).is_err());
        assert!(store.import(dir.path().join("notes.txt")).is_err());
        assert_eq!(store, before);
    }
}
