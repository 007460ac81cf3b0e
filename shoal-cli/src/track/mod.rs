// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::Args;

use shoal_core::config::TrackConfig;
use shoal_core::ut::track::progress_log;
use shoal_track::pipeline;

#[derive(Debug, Args)]
#[command(about = "Track annotated fish through a video and draw their masks onto the frames.")]
pub struct TrackArgs {
    #[arg(short = 'c', long, help = "YAML configuration file.", required = true)]
    pub config: Option<String>,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

pub fn track(args: &TrackArgs) {
    let Some(path) = args.config.as_deref() else {
        eprintln!("[shoal::track] ERROR: A configuration file must be provided.");
        std::process::exit(1);
    };

    let config = TrackConfig::open(path).unwrap_or_else(|err| {
        eprintln!("[shoal::track] ERROR: {}", err);
        std::process::exit(1);
    });

    progress_log(&format!("Tracking with configuration {}", path), args.verbose);

    let report = pipeline::run(&config, args.verbose).unwrap_or_else(|err| {
        eprintln!("[shoal::track] ERROR: {}", err);
        std::process::exit(1);
    });

    progress_log(
        &format!(
            "Tracked {} windows, rendered {} frames ({} failed).",
            report.windows.len(),
            report.frames_rendered,
            report.render_failures
        ),
        args.verbose,
    );

    if let Some(masks_file) = report.masks_file {
        progress_log(
            &format!("Masks saved to {}.", masks_file.display()),
            args.verbose,
        );
    }
}
