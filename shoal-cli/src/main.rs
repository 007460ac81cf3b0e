// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::{Parser, Subcommand};
use shoal_cli::{annotations, render, track};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Annotations(annotations::AnnotationsArgs),
    Render(render::RenderArgs),
    Track(track::TrackArgs),
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Annotations(annotations_args)) => annotations::annotations(annotations_args),
        Some(Commands::Render(render_args)) => render::render(render_args),
        Some(Commands::Track(track_args)) => track::track(track_args),
        None => {}
    }
}
