mod record;
mod session;
mod store;

pub use record::{Annotation, ClickType, FishFamily, format_location, parse_location};

pub use session::{AnnotationSession, SessionEffect, SessionEvent, VideoInfo};

pub use store::{AnnotationColumns, AnnotationStore, read_annotations};
