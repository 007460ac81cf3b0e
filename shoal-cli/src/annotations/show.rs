// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::Args;

use shoal_core::annotation::{AnnotationColumns, format_location, read_annotations};
use shoal_core::constant;

#[derive(Debug, Args)]
#[command(about = "Print the annotations of a .npz or .csv file.")]
pub struct AnnotationsShowArgs {
    #[arg(short = 'i', long, help = "Annotation file (.npz or .csv).", required = true)]
    pub input: Option<String>,
}

pub fn annotations_show(args: &AnnotationsShowArgs) {
    let Some(input) = args.input.as_deref() else {
        eprintln!("[shoal::annotations::show] ERROR: An annotation file must be provided.");
        std::process::exit(1);
    };

    let annotations = read_annotations(input, &AnnotationColumns::default()).unwrap_or_else(|err| {
        eprintln!("[shoal::annotations::show] ERROR: {}", err);
        std::process::exit(1);
    });

    println!(
        "{:>8}  {:>9}  {:>9}  {:<12}  {}",
        constant::FRAME_COLUMN,
        constant::CLICK_TYPE_COLUMN,
        constant::LABEL_COLUMN,
        constant::FAMILY_COLUMN,
        constant::LOCATION_COLUMN
    );

    for annotation in annotations.iter() {
        println!(
            "{:>8}  {:>9}  {:>9}  {:<12}  {}",
            annotation.frame,
            format!("{} ({})", annotation.click_type.code(), annotation.click_type.label()),
            annotation.label,
            annotation.family.to_string(),
            format_location(&annotation.location)
        );
    }

    println!("{} annotations", annotations.len());
}
