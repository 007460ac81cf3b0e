// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::Args;

use shoal_core::annotation::AnnotationStore;

#[derive(Debug, Args)]
#[command(about = "Merge annotation files and save them as general (.npz) and bite (.csv) files.")]
pub struct AnnotationsSplitArgs {
    #[arg(
        short = 'i',
        long,
        help = "Annotation files (.npz or .csv).",
        required = true,
        num_args = 1..
    )]
    pub input: Vec<String>,

    #[arg(
        short = 'o',
        long,
        help = "Output base name; writes <base>_annotations.npz and <base>_bites.csv.",
        required = true
    )]
    pub output: Option<String>,
}

pub fn annotations_split(args: &AnnotationsSplitArgs) {
    let mut store = AnnotationStore::new();

    for input in args.input.iter() {
        if let Err(err) = store.import(input) {
            eprintln!("[shoal::annotations::split] ERROR: {}", err);
            std::process::exit(1);
        }
    }

    let base = args.output.clone().unwrap_or_default();

    let (general, bites) = store.save(&base).unwrap_or_else(|err| {
        eprintln!("[shoal::annotations::split] ERROR: {}", err);
        std::process::exit(1);
    });

    println!(
        "Saved {} annotations to {} and {} bites to {}",
        store.general().len(),
        general.display(),
        store.bites().len(),
        bites.display()
    );
}
