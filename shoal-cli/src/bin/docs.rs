#![allow(clippy::all)]
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
    clap_markdown::print_help_markdown::<Cli>();
}
