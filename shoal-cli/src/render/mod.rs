// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clap::Args;
use kdam::TqdmParallelIterator;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use shoal_core::error::ShoalError;
use shoal_core::render::DEFAULT_FONT;
use shoal_core::ut::path::collect_frame_paths;
use shoal_core::ut::track::{progress_bar, progress_log, progress_warn};

#[derive(Debug, Args)]
#[command(about = "Compile rendered frames into an .mp4 video with ffmpeg.")]
pub struct RenderArgs {
    #[arg(short = 'i', long, help = "Directory of rendered JPEG frames.", required = true)]
    pub input: Option<String>,

    #[arg(short = 'o', long, help = "Output video file (.mp4).", required = true)]
    pub output: Option<String>,

    #[arg(long, help = "Frame rate of the output video.", required = true)]
    pub fps: Option<f64>,

    #[arg(long, help = "Output frame size as WIDTHxHEIGHT (e.g. 1280x720).")]
    pub size: Option<String>,

    #[arg(long, help = "Do not stamp 'Frame i/N' onto each video frame.")]
    pub no_title: bool,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

/// Parse a `WIDTHxHEIGHT` frame size
pub fn parse_size(size: &str) -> Result<(u32, u32), ShoalError> {
    let invalid = || ShoalError::OtherError(format!("Invalid frame size '{}', expected WIDTHxHEIGHT", size));

    let (width, height) = size.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }

    Ok((width, height))
}

/// Split frames into those that decode and those that do not
pub fn check_frames(frames: &[PathBuf], verbose: bool) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let checked: Vec<(PathBuf, bool)> = frames
        .par_iter()
        .tqdm_with_bar(progress_bar(frames.len(), "Checking frames", verbose))
        .map(|path| (path.clone(), image::open(path).is_ok()))
        .collect();

    let mut readable = Vec::new();
    let mut unreadable = Vec::new();

    for (path, ok) in checked {
        if ok {
            readable.push(path);
        } else {
            unreadable.push(path);
        }
    }

    readable.sort();
    unreadable.sort();

    (readable, unreadable)
}

/// Write an ffmpeg concat list showing each frame for `1 / fps` seconds
pub fn write_concat_list<P: AsRef<Path>>(
    frames: &[PathBuf],
    fps: f64,
    path: P,
) -> Result<(), ShoalError> {
    let write_error =
        |err: std::io::Error| ShoalError::OtherError(format!("Failed to write frame list: {}", err));

    let mut file = std::fs::File::create(path.as_ref()).map_err(write_error)?;

    for frame in frames.iter() {
        let absolute = std::path::absolute(frame).map_err(write_error)?;
        let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
        writeln!(file, "file '{}'", escaped).map_err(write_error)?;
        writeln!(file, "duration {:.6}", 1.0 / fps).map_err(write_error)?;
    }

    // The last entry is repeated so its duration is honoured
    if let Some(last) = frames.last() {
        let absolute = std::path::absolute(last).map_err(write_error)?;
        writeln!(file, "file '{}'", absolute.to_string_lossy().replace('\'', "'\\''"))
            .map_err(write_error)?;
    }

    Ok(())
}

fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "")
        .replace(':', "\\:")
}

/// Build the ffmpeg filter chain for the output video
///
/// # Arguments
///
/// * `size` - Optional output size as (width, height)
/// * `title` - Font file and frame count used to stamp `Frame i/N` on every frame
pub fn video_filter(size: Option<(u32, u32)>, title: Option<(&Path, usize)>) -> Option<String> {
    let mut filters = Vec::new();

    if let Some((width, height)) = size {
        filters.push(format!("scale={}:{}", width, height));
    }

    if let Some((font, n_frames)) = title {
        filters.push(format!(
            "drawtext=fontfile='{}':text='Frame %{{eif\\:n+1\\:d}}/{}':x=10:y=10:fontsize=24:fontcolor=white:box=1:boxcolor=black@0.5:boxborderw=4",
            escape_filter_path(font),
            n_frames
        ));
    }

    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

fn encode(list: &Path, output: &Path, fps: f64, filter: Option<&str>) -> Result<(), ShoalError> {
    let mut command = Command::new("ffmpeg");
    command
        .args(["-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
        .arg(list)
        .args(["-r", &fps.to_string()]);

    if let Some(filter) = filter {
        command.args(["-vf", filter]);
    }

    let status = command
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-y"])
        .arg(output)
        .stdin(Stdio::null())
        .status()
        .map_err(|err| ShoalError::OtherError(format!("Failed to execute ffmpeg: {}", err)))?;

    if !status.success() {
        return Err(ShoalError::OtherError(format!(
            "ffmpeg exited with status {}",
            status
        )));
    }

    Ok(())
}

pub fn render(args: &RenderArgs) {
    let (Some(input), Some(output), Some(fps)) =
        (args.input.as_deref(), args.output.as_deref(), args.fps)
    else {
        eprintln!("[shoal::render] ERROR: Input, output and fps must be provided.");
        std::process::exit(1);
    };

    if !(fps.is_finite() && fps > 0.0) {
        eprintln!("[shoal::render] ERROR: fps must be a positive number.");
        std::process::exit(1);
    }

    let size = args.size.as_deref().map(parse_size).transpose().unwrap_or_else(|err| {
        eprintln!("[shoal::render] ERROR: {}", err);
        std::process::exit(1);
    });

    let output = PathBuf::from(output);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            eprintln!(
                "[shoal::render] ERROR: Invalid file path. Parent directory of output file path does not exist."
            );
            std::process::exit(1);
        }
    }

    let frames = match collect_frame_paths(input) {
        Ok(frames) => frames,
        Err(_) => {
            println!("[shoal::render] No frames found in {}.", input);
            return;
        }
    };

    let (readable, unreadable) = check_frames(&frames, args.verbose);

    for path in unreadable.iter() {
        progress_warn(&format!("Could not read {}, skipping.", path.display()));
    }

    if readable.is_empty() {
        println!("[shoal::render] No readable frames found in {}.", input);
        return;
    }

    let list = output.with_extension("frames.txt");
    let font = output.with_extension("font.ttf");

    let result = write_concat_list(&readable, fps, &list)
        .and_then(|_| {
            if args.no_title {
                return Ok(None);
            }

            std::fs::write(&font, DEFAULT_FONT)
                .map(|_| Some((font.as_path(), readable.len())))
                .map_err(|err| ShoalError::OtherError(format!("Failed to write title font: {}", err)))
        })
        .and_then(|title| {
            progress_log(
                &format!("Encoding {} frames to {}", readable.len(), output.display()),
                args.verbose,
            );
            encode(&list, &output, fps, video_filter(size, title).as_deref())
        });

    let _ = std::fs::remove_file(&list);
    let _ = std::fs::remove_file(&font);

    if let Err(err) = result {
        eprintln!("[shoal::render] ERROR: {}", err);
        std::process::exit(1);
    }

    progress_log(&format!("Video saved to {}.", output.display()), args.verbose);
}
