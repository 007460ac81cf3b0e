// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::{Args, Subcommand};

mod show;
mod split;
mod windows;

use show::{AnnotationsShowArgs, annotations_show};
use split::{AnnotationsSplitArgs, annotations_split};
use windows::{AnnotationsWindowsArgs, annotations_windows};

#[derive(Debug, Args)]
#[command(about = "Inspect, merge and check annotation files.")]
#[command(args_conflicts_with_subcommands = true)]
#[command(arg_required_else_help = true)]
#[command(flatten_help = true)]
pub struct AnnotationsArgs {
    #[command(subcommand)]
    command: Option<AnnotationsCommands>,
}

#[derive(Debug, Subcommand)]
enum AnnotationsCommands {
    Show(AnnotationsShowArgs),
    Split(AnnotationsSplitArgs),
    Windows(AnnotationsWindowsArgs),
}

pub fn annotations(args: &AnnotationsArgs) {
    match args.command.as_ref() {
        Some(AnnotationsCommands::Show(show_args)) => annotations_show(show_args),
        Some(AnnotationsCommands::Split(split_args)) => annotations_split(split_args),
        Some(AnnotationsCommands::Windows(windows_args)) => annotations_windows(windows_args),
        None => {}
    }
}
