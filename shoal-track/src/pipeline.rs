// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use kdam::BarExt;

use shoal_core::align::{FrameAlignment, ObjectId};
use shoal_core::annotation::{Annotation, ClickType, read_annotations};
use shoal_core::config::TrackConfig;
use shoal_core::error::ShoalError;
use shoal_core::mask::FrameMaskMap;
use shoal_core::render::{OverlayStyle, Palette, render_frame};
use shoal_core::ut::path::{collect_frame_paths, extract_frame_bundle};
use shoal_core::ut::track::{progress_bar, progress_log, progress_warn, thousands_format};
use shoal_core::windows::{ObjectPrompts, ObjectWindow, engine_ids, extract_windows};

use crate::engine::{PointPrompt, SegmentationEngine, Session};
use crate::sidecar::{SidecarEngine, SidecarOptions};

/// Stages of a tracking run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    SessionOpen,
    Reset,
    Seed,
    Propagate,
    Accumulate,
    Persist,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::SessionOpen => "session-open",
            PipelineStage::Reset => "reset",
            PipelineStage::Seed => "seed",
            PipelineStage::Propagate => "propagate",
            PipelineStage::Accumulate => "accumulate",
            PipelineStage::Persist => "persist",
            PipelineStage::Done => "done",
        };

        write!(f, "{}", name)
    }
}

fn log_stage(stage: PipelineStage, message: &str, verbose: bool) {
    progress_log(&format!("[{}] {}", stage, message), verbose);
}

/// Summary of a completed tracking run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub windows: Vec<ObjectWindow>,
    pub frames_rendered: usize,
    pub render_failures: usize,
    pub masks_file: Option<PathBuf>,
}

/// Object windows and their prompts, validated against the video length
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingPlan {
    pub windows: Vec<ObjectWindow>,
    pub prompts: ObjectPrompts,
    pub engine_ids: BTreeMap<ObjectId, u32>,
    pub n_frames: usize,
}

impl TrackingPlan {
    /// Align annotations and derive a validated window for every tracked object
    ///
    /// Every check happens here so that no model call is made for an invalid
    /// annotation set.
    ///
    /// # Arguments
    ///
    /// * `annotations` - Annotations of a single video
    /// * `alignment` - Mapping into the model's sampled frames
    /// * `n_frames` - Number of sampled frames in the video
    pub fn new(
        annotations: &[Annotation],
        alignment: &FrameAlignment,
        n_frames: usize,
    ) -> Result<TrackingPlan, ShoalError> {
        let aligned = alignment.align_all(annotations)?;
        let (windows, prompts) = extract_windows(&aligned)?;

        for window in windows.iter() {
            if window.enter_frame < 0 || window.exit_frame >= n_frames as i64 {
                return Err(ShoalError::AlignmentError(format!(
                    "Window {}..={} of object {} is outside of the {} frame video",
                    window.enter_frame, window.exit_frame, window.object, n_frames
                )));
            }

            if prompts.within(window).is_empty() {
                return Err(ShoalError::PromptError(format!(
                    "Object {} has no point prompts between frames {} and {}",
                    window.object, window.enter_frame, window.exit_frame
                )));
            }
        }

        let engine_ids = engine_ids(windows.iter().map(|w| &w.object))?;

        Ok(TrackingPlan {
            windows,
            prompts,
            engine_ids,
            n_frames,
        })
    }

    /// Number of prompts that fall outside every window of their object
    pub fn unused_prompts(&self) -> usize {
        let used: usize = self
            .windows
            .iter()
            .map(|window| self.prompts.within(window).len())
            .sum();

        self.prompts.len() - used
    }
}

/// Frame overlay settings
pub struct Overlay {
    pub palette: Palette,
    pub style: OverlayStyle,
}

/// Track every window of a plan and draw the masks onto the frames
///
/// Windows are processed in order and the engine is reset before each one, so
/// prompts from one object never leak into another object's propagation. A
/// failed frame render is logged and skipped. Any engine error stops the run
/// before masks are persisted.
///
/// # Arguments
///
/// * `engine` - An opened segmentation engine, released when this returns
/// * `plan` - Validated windows and prompts
/// * `frames` - Sorted frame paths, one per sampled frame
/// * `overlay` - Colours and label style
/// * `masks_file` - Where to persist the mask map, or `None` to skip
/// * `verbose` - Print progress
pub fn execute<E: SegmentationEngine>(
    engine: E,
    plan: &TrackingPlan,
    frames: &[PathBuf],
    overlay: &Overlay,
    masks_file: Option<&Path>,
    verbose: bool,
) -> Result<PipelineReport, ShoalError> {
    let mut session = Session::open(engine);

    if session.frame_count() != frames.len() || plan.n_frames != frames.len() {
        return Err(ShoalError::ProtocolError(format!(
            "Engine has {} frames, plan has {} and {} frame files were found",
            session.frame_count(),
            plan.n_frames,
            frames.len()
        )));
    }

    let objects: BTreeMap<u32, &ObjectId> = plan
        .engine_ids
        .iter()
        .map(|(object, id)| (*id, object))
        .collect();

    let mut masks = masks_file.map(|_| FrameMaskMap::new(frames.len()));
    let mut frames_rendered = 0;
    let mut render_failures = 0;

    for (i, window) in plan.windows.iter().enumerate() {
        let id = plan.engine_ids[&window.object];
        let description = format!(
            "object {} ({}/{}) frames {}..={}",
            window.object,
            i + 1,
            plan.windows.len(),
            window.enter_frame,
            window.exit_frame
        );

        log_stage(PipelineStage::Reset, &description, verbose);
        let mut prompting = session.reset()?;

        let prompts = plan.prompts.within(window);
        log_stage(
            PipelineStage::Seed,
            &format!("{} point prompts", prompts.len()),
            verbose,
        );

        for annotation in prompts {
            prompting.seed(PointPrompt {
                object: id,
                frame: annotation.frame as usize,
                point: [annotation.location[0] as f32, annotation.location[1] as f32],
                positive: annotation.click_type != ClickType::Negative,
            })?;
        }

        log_stage(PipelineStage::Propagate, &description, verbose);
        let propagation = prompting.propagate(window.enter_frame as usize, window.exit_frame as usize)?;

        let mut bar = progress_bar(window.len(), "Propagating masks", verbose);

        for frame in propagation {
            let frame = frame?;

            let frame_masks: Vec<(ObjectId, _)> = frame
                .masks
                .into_iter()
                .map(|(id, mask)| {
                    objects
                        .get(&id)
                        .map(|object| ((*object).clone(), mask))
                        .ok_or_else(|| {
                            ShoalError::ProtocolError(format!("Unknown object id {}", id))
                        })
                })
                .collect::<Result<_, _>>()?;

            if let Some(masks) = masks.as_mut() {
                for (object, mask) in frame_masks.iter() {
                    masks.insert(frame.frame, object.clone(), mask.to_sparse())?;
                }
            }

            match render_frame(&frames[frame.frame], &frame_masks, &overlay.palette, &overlay.style) {
                Ok(()) => frames_rendered += 1,
                Err(err) => {
                    progress_warn(&format!("Skipping frame {}. {}", frame.frame, err));
                    render_failures += 1;
                }
            }

            if verbose {
                let _ = bar.update(1);
            }
        }

        if verbose {
            let _ = bar.refresh();
            eprintln!();
        }

        log_stage(PipelineStage::Accumulate, &description, verbose);
    }

    drop(session);

    let masks_file = match (masks, masks_file) {
        (Some(masks), Some(path)) => {
            log_stage(
                PipelineStage::Persist,
                &format!(
                    "Writing {} masks to {}",
                    thousands_format(masks.n_masks()),
                    path.display()
                ),
                verbose,
            );
            masks.save(path)?;
            Some(path.to_path_buf())
        }
        _ => None,
    };

    log_stage(
        PipelineStage::Done,
        &format!(
            "Rendered {} frames across {} windows",
            thousands_format(frames_rendered),
            plan.windows.len()
        ),
        verbose,
    );

    Ok(PipelineReport {
        windows: plan.windows.clone(),
        frames_rendered,
        render_failures,
        masks_file,
    })
}

/// Run the full tracking pipeline described by a configuration
///
/// # Examples
///
/// ```no_run
/// use shoal_core::config::TrackConfig;
/// use shoal_track::pipeline::run;
///
/// let config = TrackConfig::open("reef_07.yaml").unwrap();
/// let report = run(&config, true).unwrap();
/// ```
pub fn run(config: &TrackConfig, verbose: bool) -> Result<PipelineReport, ShoalError> {
    log_stage(
        PipelineStage::Init,
        &format!("Reading annotations from {}", config.annotations_file.display()),
        verbose,
    );

    let annotations = read_annotations(&config.annotations_file, &config.annotation_columns())?;
    let alignment = FrameAlignment::new(config.sam2_start, config.fps, config.sample_rate)?;

    if let Some(bundle) = &config.frame_tar_file {
        log_stage(
            PipelineStage::Init,
            &format!(
                "Extracting {} to {}",
                bundle.display(),
                config.extracted_tar_dir.display()
            ),
            verbose,
        );
        extract_frame_bundle(bundle, &config.extracted_tar_dir)?;
    }

    let frames = collect_frame_paths(&config.extracted_tar_dir)?;
    let plan = TrackingPlan::new(&annotations, &alignment, frames.len())?;

    log_stage(
        PipelineStage::Init,
        &format!(
            "{} annotations, {} windows, {} frames",
            thousands_format(annotations.len()),
            plan.windows.len(),
            thousands_format(frames.len())
        ),
        verbose,
    );

    let unused = plan.unused_prompts();
    if unused > 0 {
        progress_warn(&format!(
            "{} point prompts fall outside of their object's windows and are ignored",
            unused
        ));
    }

    let overlay = Overlay {
        palette: Palette::default(),
        style: OverlayStyle::new(
            config.alpha,
            config.font_size,
            &config.font_color,
            config.font_file.as_deref(),
        )?,
    };

    let scratch_dir = std::env::temp_dir().join(format!("shoal-logits-{}", std::process::id()));
    let options = SidecarOptions {
        command: config.sidecar_command.clone(),
        video_dir: config.extracted_tar_dir.clone(),
        model_cfg: config.model_cfg.clone(),
        checkpoint: config.sam2_checkpoint.clone(),
        install_dir: config.sam2_install_dir.clone(),
        non_overlap_masks: config.non_overlap_masks,
        offload_video_to_cpu: config.offload_video_to_cpu,
        offload_state_to_cpu: config.offload_state_to_cpu,
        allow_cpu: config.allow_cpu,
        scratch_dir: scratch_dir.clone(),
    };

    log_stage(
        PipelineStage::SessionOpen,
        &format!("Starting segmentation engine: {}", config.sidecar_command.join(" ")),
        verbose,
    );

    let report = SidecarEngine::open(&options).and_then(|engine| {
        log_stage(
            PipelineStage::SessionOpen,
            &format!("Engine running on {}", engine.device()),
            verbose,
        );

        let masks_file = config.save_masks.then_some(config.masks_dict_file.as_path());
        execute(engine, &plan, &frames, &overlay, masks_file, verbose)
    });

    let _ = std::fs::remove_dir_all(&scratch_dir);

    report
}

#[cfg(test)]
mod test {
    use super::*;

    use image::{Rgb, RgbImage};
    use shoal_core::annotation::FishFamily;

    use crate::engine::test::{Call, FakeEngine};

    const SIZE: u32 = 16;

    fn annotation(frame: i64, click_type: ClickType, label: &str) -> Annotation {
        Annotation::new(frame, click_type, label, FishFamily::Parrotfish, [4.0, 5.0])
    }

    fn frames(dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("{:05}.jpg", i));
                RgbImage::from_pixel(SIZE, SIZE, Rgb([10, 10, 10]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect()
    }

    fn overlay() -> Overlay {
        Overlay {
            palette: Palette::default(),
            style: OverlayStyle::new(0.6, 5.0, "red", None).unwrap(),
        }
    }

    fn alignment() -> FrameAlignment {
        FrameAlignment::with_default_rate(0, 30.0).unwrap()
    }

    #[test]
    fn test_plan_single_object() {
        let annotations = vec![
            annotation(10, ClickType::Enter, "A"),
            annotation(21, ClickType::Positive, "A"),
            annotation(40, ClickType::Exit, "A"),
        ];

        let plan = TrackingPlan::new(&annotations, &alignment(), 10).unwrap();
        assert_eq!(plan.windows.len(), 1);
        assert_eq!((plan.windows[0].enter_frame, plan.windows[0].exit_frame), (1, 4));
        assert_eq!(plan.unused_prompts(), 0);
    }

    #[test]
    fn test_plan_rejects_invalid_windows() {
        let missing_exit = vec![
            annotation(10, ClickType::Enter, "A"),
            annotation(21, ClickType::Positive, "A"),
        ];
        assert!(matches!(
            TrackingPlan::new(&missing_exit, &alignment(), 10),
            Err(ShoalError::PairingError(_))
        ));

        let no_prompts = vec![
            annotation(10, ClickType::Enter, "A"),
            annotation(40, ClickType::Exit, "A"),
            annotation(90, ClickType::Positive, "A"),
        ];
        let result = TrackingPlan::new(&no_prompts, &alignment(), 10);
        assert!(matches!(result, Err(ShoalError::PromptError(_))));

        let too_long = vec![
            annotation(10, ClickType::Enter, "A"),
            annotation(21, ClickType::Positive, "A"),
            annotation(400, ClickType::Exit, "A"),
        ];
        assert!(matches!(
            TrackingPlan::new(&too_long, &alignment(), 10),
            Err(ShoalError::AlignmentError(_))
        ));

        let no_engine_id = vec![
            annotation(10, ClickType::Enter, "4294967295"),
            annotation(21, ClickType::Positive, "4294967295"),
            annotation(40, ClickType::Exit, "4294967295"),
            annotation(10, ClickType::Enter, "A"),
            annotation(21, ClickType::Positive, "A"),
            annotation(40, ClickType::Exit, "A"),
        ];
        assert!(matches!(
            TrackingPlan::new(&no_engine_id, &alignment(), 10),
            Err(ShoalError::AlignmentError(_))
        ));
    }

    #[test]
    fn test_execute_resets_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let frames = frames(dir.path(), 8);
        let masks_file = dir.path().join("masks.npz");

        let annotations = vec![
            annotation(10, ClickType::Enter, "1"),
            annotation(11, ClickType::Positive, "1"),
            annotation(31, ClickType::Bite, "1"),
            annotation(40, ClickType::Exit, "1"),
            annotation(31, ClickType::Enter, "2"),
            annotation(41, ClickType::Negative, "2"),
            annotation(51, ClickType::Positive, "2"),
            annotation(61, ClickType::Exit, "2"),
        ];

        let plan = TrackingPlan::new(&annotations, &alignment(), frames.len()).unwrap();
        let engine = FakeEngine::new(frames.len(), SIZE);
        let calls = engine.calls.clone();

        let report = execute(engine, &plan, &frames, &overlay(), Some(&masks_file), false).unwrap();

        assert_eq!(report.windows.len(), 2);
        assert_eq!(report.frames_rendered, 4 + 4);
        assert_eq!(report.render_failures, 0);
        assert_eq!(report.masks_file, Some(masks_file.clone()));

        let calls = calls.borrow();
        let resets: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Call::Reset)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(resets, vec![0, 4]);

        // Object 1 is seeded with its positive click and its bite as a positive point
        assert!(matches!(calls[1], Call::AddPoint(PointPrompt { object: 1, frame: 1, positive: true, .. })));
        assert!(matches!(calls[2], Call::AddPoint(PointPrompt { object: 1, frame: 3, positive: true, .. })));
        assert_eq!(calls[3], Call::Propagate(1, 4));

        // Object 2 only sees its own prompts
        assert!(matches!(calls[5], Call::AddPoint(PointPrompt { object: 2, frame: 4, positive: false, .. })));
        assert!(matches!(calls[6], Call::AddPoint(PointPrompt { object: 2, frame: 5, positive: true, .. })));
        assert_eq!(calls[7], Call::Propagate(3, 6));

        let masks = FrameMaskMap::open(&masks_file).unwrap();
        assert_eq!(masks.len(), 8);
        assert_eq!(masks.n_masks(), 8);
        assert_eq!(masks.get(3).unwrap().len(), 2);
        assert!(masks.get(0).unwrap().is_empty());
        assert!(masks.get(7).unwrap().is_empty());

        let rendered = image::open(&frames[1]).unwrap().to_rgb8();
        assert_ne!(rendered.get_pixel(0, 0).0, [10, 10, 10]);
    }

    #[test]
    fn test_execute_failure_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let frames = frames(dir.path(), 8);
        let masks_file = dir.path().join("masks.npz");

        let annotations = vec![
            annotation(10, ClickType::Enter, "1"),
            annotation(11, ClickType::Positive, "1"),
            annotation(40, ClickType::Exit, "1"),
        ];

        let plan = TrackingPlan::new(&annotations, &alignment(), frames.len()).unwrap();
        let mut engine = FakeEngine::new(frames.len(), SIZE);
        engine.fail_at = Some(3);

        let result = execute(engine, &plan, &frames, &overlay(), Some(&masks_file), false);

        assert!(matches!(result, Err(ShoalError::EngineError(_))));
        assert!(!masks_file.exists());
    }

    #[test]
    fn test_execute_skips_unreadable_frames() {
        let dir = tempfile::tempdir().unwrap();
        let frames = frames(dir.path(), 6);
        std::fs::write(&frames[2], b"not a jpeg").unwrap();

        let annotations = vec![
            annotation(10, ClickType::Enter, "4"),
            annotation(11, ClickType::Positive, "4"),
            annotation(40, ClickType::Exit, "4"),
        ];

        let plan = TrackingPlan::new(&annotations, &alignment(), frames.len()).unwrap();
        let engine = FakeEngine::new(frames.len(), SIZE);

        let report = execute(engine, &plan, &frames, &overlay(), None, false).unwrap();

        assert_eq!(report.frames_rendered, 3);
        assert_eq!(report.render_failures, 1);
        assert_eq!(report.masks_file, None);
    }

    #[test]
    fn test_execute_frame_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let frames = frames(dir.path(), 6);

        let annotations = vec![
            annotation(10, ClickType::Enter, "4"),
            annotation(11, ClickType::Positive, "4"),
            annotation(40, ClickType::Exit, "4"),
        ];

        let plan = TrackingPlan::new(&annotations, &alignment(), frames.len()).unwrap();
        let engine = FakeEngine::new(9, SIZE);
        let calls = engine.calls.clone();

        assert!(execute(engine, &plan, &frames, &overlay(), None, false).is_err());
        assert!(calls.borrow().is_empty());
    }
}
