mod binary;
mod map;

pub use binary::{BinaryMask, SparseMask};
pub use map::FrameMaskMap;
