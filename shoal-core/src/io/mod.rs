mod npz;
mod table;

pub use npz::{
    NpzReader, NpzWriter, create_npz, finish_npz, has_npz_array, open_npz, read_annotations_npz,
    read_npz_array, write_annotations_npz, write_npz_array, write_npz_strings,
};

pub use table::{annotations_to_table, read_annotations_csv, write_annotations_csv};
