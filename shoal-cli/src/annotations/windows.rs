// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::Args;

use shoal_core::align::FrameAlignment;
use shoal_core::annotation::{AnnotationColumns, read_annotations};
use shoal_core::constant;
use shoal_core::windows::extract_windows;

#[derive(Debug, Args)]
#[command(about = "Print the aligned enter/exit window of every annotated object.")]
pub struct AnnotationsWindowsArgs {
    #[arg(short = 'i', long, help = "Annotation file (.npz or .csv).", required = true)]
    pub input: Option<String>,

    #[arg(long, help = "Frame rate of the original video.", required = true)]
    pub fps: Option<f64>,

    #[arg(long, help = "First original frame ingested by the model.", default_value_t = 0)]
    pub sam_start: i64,

    #[arg(
        long,
        help = "Frames per second sampled by the model.",
        default_value_t = constant::DEFAULT_SAMPLE_RATE
    )]
    pub sample_rate: f64,
}

pub fn annotations_windows(args: &AnnotationsWindowsArgs) {
    let (Some(input), Some(fps)) = (args.input.as_deref(), args.fps) else {
        eprintln!("[shoal::annotations::windows] ERROR: An annotation file and fps must be provided.");
        std::process::exit(1);
    };

    let result = FrameAlignment::new(args.sam_start, fps, args.sample_rate).and_then(|alignment| {
        let annotations = read_annotations(input, &AnnotationColumns::default())?;
        let aligned = alignment.align_all(&annotations)?;
        extract_windows(&aligned)
    });

    let (windows, prompts) = result.unwrap_or_else(|err| {
        eprintln!("[shoal::annotations::windows] ERROR: {}", err);
        std::process::exit(1);
    });

    println!("{:>8}  {:>6}  {:>6}  {:>7}", "object", "enter", "exit", "prompts");

    for window in windows.iter() {
        println!(
            "{:>8}  {:>6}  {:>6}  {:>7}",
            window.object.to_string(),
            window.enter_frame,
            window.exit_frame,
            prompts.within(window).len()
        );
    }

    println!("{} windows", windows.len());
}
