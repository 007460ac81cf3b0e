// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{Value, json};

use shoal_core::error::ShoalError;
use shoal_core::ut::path::collect_frame_paths;

use crate::engine::{FrameStream, PointPrompt, PropagatedFrame, SegmentationEngine};
use crate::logits::read_logits;

const SUPPORTED_DEVICE: &str = "cuda";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings used to start a segmentation sidecar
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarOptions {
    /// Program and arguments of the sidecar process
    pub command: Vec<String>,
    /// Directory of extracted JPEG frames
    pub video_dir: PathBuf,
    pub model_cfg: String,
    pub checkpoint: PathBuf,
    pub install_dir: PathBuf,
    pub non_overlap_masks: bool,
    pub offload_video_to_cpu: bool,
    pub offload_state_to_cpu: bool,
    /// Allow devices other than CUDA
    pub allow_cpu: bool,
    /// Directory where the sidecar writes mask logits
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Response {
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitResult {
    frame_count: usize,
    device: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PropagateResult {
    Done { done: bool },
    Frame {
        frame_idx: usize,
        obj_ids: Vec<u32>,
        mask_logits: PathBuf,
    },
}

/// Parse one response line into its result value
fn parse_response(line: &str) -> Result<Value, ShoalError> {
    let response: Response = serde_json::from_str(line.trim()).map_err(|err| {
        ShoalError::ProtocolError(format!("Malformed response '{}': {}", line.trim(), err))
    })?;

    if !response.success {
        return Err(ShoalError::EngineError(
            response
                .error
                .unwrap_or_else(|| "Sidecar reported an unknown error".to_string()),
        ));
    }

    Ok(response.result)
}

/// Segmentation engine running in a child process
///
/// Requests are written to the child's stdin as one JSON object per line,
/// `{"command": ..., "args": {...}}`, and every request is answered with one
/// line `{"success": ..., "result": ..., "error": ...}`. Propagation answers
/// with one line per frame followed by `{"done": true}`. Mask logits are passed
/// as paths to .npy files in the scratch directory.
///
/// The child is asked to close and then killed when the engine is dropped.
pub struct SidecarEngine {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    frame_count: usize,
    device: String,
}

impl SidecarEngine {
    /// Start the sidecar and load the video into a new inference state
    pub fn open(options: &SidecarOptions) -> Result<SidecarEngine, ShoalError> {
        let frames = collect_frame_paths(&options.video_dir)?;

        let (program, args) = options
            .command
            .split_first()
            .ok_or_else(|| ShoalError::ConfigError("Empty sidecar command".to_string()))?;

        std::fs::create_dir_all(&options.scratch_dir).map_err(|err| {
            ShoalError::DirError(format!("{}: {}", options.scratch_dir.display(), err))
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                ShoalError::EngineError(format!("Failed to start '{}': {}", program, err))
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShoalError::EngineError("Sidecar has no stdout".to_string()))?;

        let mut engine = SidecarEngine {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            frame_count: 0,
            device: String::new(),
        };

        let result = engine.request(
            "init_state",
            json!({
                "video_path": options.video_dir,
                "model_cfg": options.model_cfg,
                "sam2_checkpoint": options.checkpoint,
                "sam2_install_dir": options.install_dir,
                "non_overlap_masks": options.non_overlap_masks,
                "offload_video_to_cpu": options.offload_video_to_cpu,
                "offload_state_to_cpu": options.offload_state_to_cpu,
                "scratch_dir": options.scratch_dir,
            }),
        )?;

        let init: InitResult = serde_json::from_value(result).map_err(|err| {
            ShoalError::ProtocolError(format!("Invalid init_state result: {}", err))
        })?;

        if init.device != SUPPORTED_DEVICE && !options.allow_cpu {
            return Err(ShoalError::DeviceError(format!(
                "Device of type {} not supported",
                init.device
            )));
        }

        if init.frame_count != frames.len() {
            return Err(ShoalError::ProtocolError(format!(
                "Sidecar loaded {} frames but {} contains {}",
                init.frame_count,
                options.video_dir.display(),
                frames.len()
            )));
        }

        engine.frame_count = init.frame_count;
        engine.device = init.device;

        Ok(engine)
    }

    /// Device reported by the sidecar
    pub fn device(&self) -> &str {
        &self.device
    }

    fn send(&mut self, command: &str, args: Value) -> Result<(), ShoalError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ShoalError::EngineError("Sidecar stdin is closed".to_string()))?;

        let request = json!({ "command": command, "args": args });

        writeln!(stdin, "{}", request)
            .and_then(|_| stdin.flush())
            .map_err(|err| ShoalError::EngineError(format!("Failed to send {}: {}", command, err)))
    }

    fn receive(&mut self) -> Result<Value, ShoalError> {
        let mut line = String::new();

        let n = self
            .stdout
            .read_line(&mut line)
            .map_err(|err| ShoalError::EngineError(format!("Failed to read response: {}", err)))?;

        if n == 0 {
            return Err(ShoalError::EngineError(
                "Sidecar exited before responding".to_string(),
            ));
        }

        parse_response(&line)
    }

    fn request(&mut self, command: &str, args: Value) -> Result<Value, ShoalError> {
        self.send(command, args)?;
        self.receive()
    }
}

impl SegmentationEngine for SidecarEngine {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn reset(&mut self) -> Result<(), ShoalError> {
        self.request("reset_state", json!({})).map(|_| ())
    }

    fn add_point(&mut self, prompt: &PointPrompt) -> Result<(), ShoalError> {
        self.request(
            "add_new_points",
            json!({
                "frame_idx": prompt.frame,
                "obj_id": prompt.object,
                "points": [prompt.point],
                "labels": [if prompt.positive { 1 } else { 0 }],
            }),
        )
        .map(|_| ())
    }

    fn propagate(&mut self, first: usize, last: usize) -> Result<FrameStream<'_>, ShoalError> {
        self.send(
            "propagate_in_video",
            json!({
                "start_frame_idx": first,
                "max_frame_num_to_track": last - first,
            }),
        )?;

        Ok(Box::new(SidecarFrames {
            engine: self,
            done: false,
        }))
    }
}

impl Drop for SidecarEngine {
    fn drop(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "{}", json!({ "command": "close", "args": {} }));
            let _ = stdin.flush();
        }

        let start = Instant::now();
        while start.elapsed() < CLOSE_TIMEOUT {
            match self.child.try_wait() {
                Ok(Some(_)) | Err(_) => return,
                Ok(None) => std::thread::sleep(Duration::from_millis(20)),
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Frames streamed back by a running propagation
struct SidecarFrames<'a> {
    engine: &'a mut SidecarEngine,
    done: bool,
}

impl SidecarFrames<'_> {
    fn next_frame(&mut self) -> Result<Option<PropagatedFrame>, ShoalError> {
        let result = self.engine.receive()?;

        let result: PropagateResult = serde_json::from_value(result).map_err(|err| {
            ShoalError::ProtocolError(format!("Invalid propagate_in_video result: {}", err))
        })?;

        match result {
            PropagateResult::Done { .. } => Ok(None),
            PropagateResult::Frame {
                frame_idx,
                obj_ids,
                mask_logits,
            } => {
                let masks = read_logits(&mask_logits)?;
                let _ = std::fs::remove_file(&mask_logits);

                if masks.len() != obj_ids.len() {
                    return Err(ShoalError::ProtocolError(format!(
                        "Frame {} has {} masks for {} objects",
                        frame_idx,
                        masks.len(),
                        obj_ids.len()
                    )));
                }

                Ok(Some(PropagatedFrame {
                    frame: frame_idx,
                    masks: obj_ids.into_iter().zip(masks).collect(),
                }))
            }
        }
    }
}

impl Iterator for SidecarFrames<'_> {
    type Item = Result<PropagatedFrame, ShoalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl Drop for SidecarFrames<'_> {
    fn drop(&mut self) {
        // Drain unread frames so the next request reads its own response
        while !self.done {
            match self.next_frame() {
                Ok(Some(_)) => continue,
                _ => self.done = true,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_response() {
        let value = parse_response(r#"{"success": true, "result": {"frame_count": 3}}"#).unwrap();
        assert_eq!(value["frame_count"], 3);

        let value = parse_response("{\"success\": true}\n").unwrap();
        assert!(value.is_null());

        let err = parse_response(r#"{"success": false, "error": "CUDA out of memory"}"#);
        assert!(matches!(err, Err(ShoalError::EngineError(message)) if message.contains("CUDA")));

        assert!(matches!(
            parse_response("Traceback (most recent call last):"),
            Err(ShoalError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_propagate_result() {
        let done: PropagateResult = serde_json::from_value(json!({"done": true})).unwrap();
        assert!(matches!(done, PropagateResult::Done { done: true }));

        let frame: PropagateResult = serde_json::from_value(json!({
            "frame_idx": 4,
            "obj_ids": [2],
            "mask_logits": "/tmp/00004.npy"
        }))
        .unwrap();
        assert!(matches!(frame, PropagateResult::Frame { frame_idx: 4, .. }));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        const SCRIPT: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *init_state*) echo '{"success": true, "result": {"frame_count": 2, "device": "cpu"}}' ;;
    *propagate_in_video*) echo '{"success": true, "result": {"done": true}}' ;;
    *close*) exit 0 ;;
    *) echo '{"success": true, "result": null}' ;;
  esac
done
"#;

        fn options(dir: &std::path::Path, allow_cpu: bool) -> SidecarOptions {
            SidecarOptions {
                command: vec!["sh".to_string(), "-c".to_string(), SCRIPT.to_string()],
                video_dir: dir.join("frames"),
                model_cfg: "sam2.1_hiera_l.yaml".to_string(),
                checkpoint: dir.join("sam2.1_hiera_large.pt"),
                install_dir: dir.to_path_buf(),
                non_overlap_masks: false,
                offload_video_to_cpu: true,
                offload_state_to_cpu: true,
                allow_cpu,
                scratch_dir: dir.join("scratch"),
            }
        }

        fn frames(dir: &std::path::Path, n: usize) {
            std::fs::create_dir_all(dir.join("frames")).unwrap();
            for i in 0..n {
                std::fs::write(dir.join("frames").join(format!("{:05}.jpg", i)), b"").unwrap();
            }
        }

        #[test]
        fn test_sidecar_rejects_cpu_device() {
            let dir = tempfile::tempdir().unwrap();
            frames(dir.path(), 2);

            let result = SidecarEngine::open(&options(dir.path(), false));
            assert!(matches!(result, Err(ShoalError::DeviceError(_))));
        }

        #[test]
        fn test_sidecar_session() {
            let dir = tempfile::tempdir().unwrap();
            frames(dir.path(), 2);

            let mut engine = SidecarEngine::open(&options(dir.path(), true)).unwrap();
            assert_eq!(engine.frame_count(), 2);
            assert_eq!(engine.device(), "cpu");

            engine.reset().unwrap();
            engine
                .add_point(&PointPrompt {
                    object: 1,
                    frame: 0,
                    point: [3.0, 4.0],
                    positive: true,
                })
                .unwrap();

            let frames: Vec<_> = engine.propagate(0, 1).unwrap().collect();
            assert!(frames.is_empty());

            engine.reset().unwrap();
        }

        #[test]
        fn test_sidecar_frame_count_mismatch() {
            let dir = tempfile::tempdir().unwrap();
            frames(dir.path(), 3);

            let result = SidecarEngine::open(&options(dir.path(), true));
            assert!(matches!(result, Err(ShoalError::ProtocolError(_))));
        }

        #[test]
        fn test_sidecar_missing_frames() {
            let dir = tempfile::tempdir().unwrap();
            assert!(SidecarEngine::open(&options(dir.path(), true)).is_err());
        }
    }
}
