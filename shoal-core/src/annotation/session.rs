// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use crate::annotation::{Annotation, AnnotationStore, ClickType, FishFamily};
use crate::constant;

/// Properties of the loaded video
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub n_frames: usize,
    pub fps: f64,
    pub width: f64,
    pub height: f64,
}

/// Input events produced by the annotation front end
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoadVideo(VideoInfo),
    CanvasClick { x: f64, y: f64 },
    ToggleClickType,
    ToggleFamily,
    SetLabel(String),
    AddAnnotation,
    MarkEnter,
    MarkExit,
    DeleteSelected(Vec<usize>),
    DeleteAll,
    Seek(usize),
    Advance(i64),
    NextSampledFrame,
    PrevSampledFrame,
    SetSamStart(i64),
    AdjustSpeed(f64),
    ResetSpeed,
    TogglePause,
    Tick,
}

/// Side effects the front end must carry out after an event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    ShowFrame(usize),
    RefreshTable,
    Status(String),
    ClickTypeText(&'static str),
    FamilyText(String),
    PauseText(&'static str),
    ScheduleTick { delay_ms: u64 },
    CancelPlayback,
    Notify(String),
}

/// Annotation tool state
///
/// Every interaction is an explicit `(state, event) -> (state, effects)`
/// transition; the session owns the annotation store.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    pub store: AnnotationStore,
    pub video: Option<VideoInfo>,
    pub display: [f64; 2],
    pub frame: usize,
    pub location: [f64; 2],
    pub click_type: ClickType,
    pub family: FishFamily,
    pub label: String,
    pub sam_start: i64,
    pub sample_rate: f64,
    pub speed: f64,
    pub paused: bool,
}

impl Default for AnnotationSession {
    fn default() -> Self {
        AnnotationSession {
            store: AnnotationStore::new(),
            video: None,
            display: [600.0, 400.0],
            frame: 0,
            location: [0.0, 0.0],
            click_type: ClickType::Positive,
            family: FishFamily::Parrotfish,
            label: String::new(),
            sam_start: 0,
            sample_rate: constant::DEFAULT_SAMPLE_RATE,
            speed: 1.0,
            paused: false,
        }
    }
}

impl AnnotationSession {
    pub fn new(store: AnnotationStore) -> AnnotationSession {
        AnnotationSession {
            store,
            ..AnnotationSession::default()
        }
    }

    fn fps(&self) -> f64 {
        self.video.map(|v| v.fps).unwrap_or(constant::DEFAULT_FPS)
    }

    fn n_frames(&self) -> usize {
        self.video.map(|v| v.n_frames).unwrap_or(0)
    }

    /// Spacing in original frames between frames sampled by the segmentation model
    pub fn sampled_interval(&self) -> f64 {
        (self.fps().round() / self.sample_rate).max(1.0)
    }

    /// Check if a frame is one the segmentation model will ingest
    pub fn is_sampled_frame(&self, frame: usize) -> bool {
        let offset = frame as i64 - self.sam_start;
        offset >= 0 && (offset as f64 % self.sampled_interval()) == 0.0
    }

    /// Status line shown below the video
    pub fn status(&self) -> String {
        let seconds = self.frame as f64 / self.fps();
        let sampled = if self.is_sampled_frame(self.frame) {
            "SAM2 Frame: Annotate Fish Position"
        } else {
            "----"
        };

        format!(
            "Time: {:.2}s | Frame: {} | Speed: {:.1}x | {}",
            seconds, self.frame, self.speed, sampled
        )
    }

    /// Delay between frames during playback
    pub fn playback_delay_ms(&self) -> u64 {
        (1000.0 / (self.fps() * self.speed)) as u64
    }

    fn show(&self) -> Vec<SessionEffect> {
        vec![
            SessionEffect::CancelPlayback,
            SessionEffect::ShowFrame(self.frame),
            SessionEffect::Status(self.status()),
        ]
    }

    fn add(&mut self, click_type: ClickType) -> Vec<SessionEffect> {
        let location = [
            (self.location[0] * 1000.0).round() / 1000.0,
            (self.location[1] * 1000.0).round() / 1000.0,
        ];

        self.store.push(Annotation::new(
            self.frame as i64,
            click_type,
            &self.label,
            self.family.clone(),
            location,
        ));

        vec![
            SessionEffect::RefreshTable,
            SessionEffect::Notify(format!("Annotation added for {}.", self.frame)),
        ]
    }

    /// Apply one event and return the new state with the effects to perform
    pub fn update(mut self, event: SessionEvent) -> (AnnotationSession, Vec<SessionEffect>) {
        let last = self.n_frames().saturating_sub(1);

        let effects = match event {
            SessionEvent::LoadVideo(video) => {
                self.video = Some(video);
                self.frame = 0;
                self.paused = false;
                vec![
                    SessionEffect::ShowFrame(0),
                    SessionEffect::Status(self.status()),
                    SessionEffect::ScheduleTick {
                        delay_ms: self.playback_delay_ms(),
                    },
                ]
            }
            SessionEvent::CanvasClick { x, y } => {
                if let Some(video) = self.video {
                    self.location = [
                        (video.width / self.display[0]) * x,
                        (video.height / self.display[1]) * y,
                    ];
                }
                vec![]
            }
            SessionEvent::ToggleClickType => {
                self.click_type = self.click_type.toggle();
                vec![SessionEffect::ClickTypeText(self.click_type.label())]
            }
            SessionEvent::ToggleFamily => {
                self.family = self.family.toggle();
                vec![SessionEffect::FamilyText(self.family.to_string())]
            }
            SessionEvent::SetLabel(label) => {
                self.label = label;
                vec![]
            }
            SessionEvent::AddAnnotation => self.add(self.click_type),
            SessionEvent::MarkEnter => self.add(ClickType::Enter),
            SessionEvent::MarkExit => self.add(ClickType::Exit),
            SessionEvent::DeleteSelected(indices) => {
                self.store.remove(&indices);
                vec![SessionEffect::RefreshTable]
            }
            SessionEvent::DeleteAll => {
                self.store.clear();
                vec![SessionEffect::RefreshTable]
            }
            SessionEvent::Seek(frame) => {
                self.frame = frame.min(last);
                self.show()
            }
            SessionEvent::Advance(delta) => {
                self.frame = (self.frame as i64 + delta).clamp(0, last as i64) as usize;
                self.show()
            }
            SessionEvent::NextSampledFrame => {
                while self.frame < last {
                    self.frame += 1;
                    if self.is_sampled_frame(self.frame) {
                        break;
                    }
                }
                self.show()
            }
            SessionEvent::PrevSampledFrame => {
                while self.frame > 0 {
                    self.frame -= 1;
                    if self.is_sampled_frame(self.frame) {
                        break;
                    }
                }
                self.show()
            }
            SessionEvent::SetSamStart(start) => {
                self.sam_start = start;
                vec![SessionEffect::Status(self.status())]
            }
            SessionEvent::AdjustSpeed(delta) => {
                self.speed = (self.speed + delta).max(constant::MIN_PLAYBACK_SPEED);
                vec![SessionEffect::Status(self.status())]
            }
            SessionEvent::ResetSpeed => {
                self.speed = 1.0;
                vec![SessionEffect::Status(self.status())]
            }
            SessionEvent::TogglePause => {
                self.paused = !self.paused;
                if self.paused {
                    vec![
                        SessionEffect::CancelPlayback,
                        SessionEffect::PauseText("Play ▶"),
                    ]
                } else {
                    vec![
                        SessionEffect::PauseText("Pause ||"),
                        SessionEffect::ScheduleTick { delay_ms: 0 },
                    ]
                }
            }
            SessionEvent::Tick => {
                if self.paused || self.frame >= self.n_frames() {
                    vec![]
                } else {
                    let mut effects = vec![
                        SessionEffect::ShowFrame(self.frame),
                        SessionEffect::Status(self.status()),
                    ];

                    if self.frame < last {
                        self.frame += 1;
                        effects.push(SessionEffect::ScheduleTick {
                            delay_ms: self.playback_delay_ms(),
                        });
                    }

                    effects
                }
            }
        };

        (self, effects)
    }
}
