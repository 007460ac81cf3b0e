// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const HEADER: &str = "Frame,clickType,fishLabel,Fish_Fam,Location";

fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    std::fs::write(&path, text).unwrap();
    path
}

fn shoal() -> Command {
    Command::cargo_bin("shoal").unwrap()
}

#[test]
fn test_annotations_split_and_show() {
    let dir = tempfile::tempdir().unwrap();

    let first = write_csv(
        dir.path(),
        "first.csv",
        &[
            "0,3,1,Parrotfish,\"[10.0, 10.0]\"",
            "30,1,1,Parrotfish,\"[12.0, 11.0]\"",
            "45,2,1,Parrotfish,\"[12.5, 11.5]\"",
        ],
    );

    let second = write_csv(
        dir.path(),
        "second.csv",
        &["90,4,1,Parrotfish,\"[20.0, 18.0]\""],
    );

    let base = dir.path().join("merged");

    shoal()
        .args(["annotations", "split", "-i"])
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 3 annotations"))
        .stdout(predicate::str::contains("1 bites"));

    let general = dir.path().join("merged_annotations.npz");
    let bites = dir.path().join("merged_bites.csv");
    assert!(general.is_file());
    assert!(bites.is_file());

    shoal()
        .args(["annotations", "show", "-i"])
        .arg(&general)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 annotations"))
        .stdout(predicate::str::contains("Parrotfish"));

    shoal()
        .args(["annotations", "show", "-i"])
        .arg(&bites)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 annotations"));
}

#[test]
fn test_annotations_split_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "Frame,clickType\n1,2\n").unwrap();

    shoal()
        .args(["annotations", "split", "-i"])
        .arg(&bad)
        .arg("-o")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR"));

    assert!(!dir.path().join("out_annotations.npz").exists());
}

#[test]
fn test_annotations_windows() {
    let dir = tempfile::tempdir().unwrap();

    let input = write_csv(
        dir.path(),
        "annotations.csv",
        &[
            "0,3,1,Parrotfish,\"[10.0, 10.0]\"",
            "30,1,1,Parrotfish,\"[12.0, 11.0]\"",
            "60,0,1,Parrotfish,\"[14.0, 11.0]\"",
            "90,4,1,Parrotfish,\"[20.0, 18.0]\"",
        ],
    );

    shoal()
        .args(["annotations", "windows", "--fps", "30", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"1\s+0\s+9\s+2").unwrap())
        .stdout(predicate::str::contains("1 windows"));
}

#[test]
fn test_annotations_windows_missing_exit() {
    let dir = tempfile::tempdir().unwrap();

    let input = write_csv(
        dir.path(),
        "annotations.csv",
        &[
            "0,3,1,Parrotfish,\"[10.0, 10.0]\"",
            "30,1,1,Parrotfish,\"[12.0, 11.0]\"",
        ],
    );

    shoal()
        .args(["annotations", "windows", "--fps", "30", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR"));
}

#[test]
fn test_track_missing_config() {
    let dir = tempfile::tempdir().unwrap();

    shoal()
        .args(["track", "-c"])
        .arg(dir.path().join("missing.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("[shoal::track] ERROR"));
}

#[test]
fn test_track_unknown_config_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "not_a_field: 1\n").unwrap();

    shoal()
        .args(["track", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("[shoal::track] ERROR"));
}

#[test]
fn test_render_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    shoal()
        .args(["render", "--fps", "3", "-i"])
        .arg(dir.path())
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("No frames found"));

    assert!(!output.exists());
}

#[cfg(unix)]
const SIDECAR: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *init_state*) echo '{"success": true, "result": {"frame_count": 10, "device": "cuda"}}' ;;
    *propagate_in_video*) echo '{"success": true, "result": {"done": true}}' ;;
    *close*) exit 0 ;;
    *) echo '{"success": true, "result": null}' ;;
  esac
done
"#;

#[cfg(unix)]
fn track_config(dir: &Path) -> PathBuf {
    let frames = dir.join("frames");
    std::fs::create_dir_all(&frames).unwrap();
    for i in 0..10 {
        std::fs::write(frames.join(format!("{:05}.jpg", i)), b"").unwrap();
    }

    let sidecar = dir.join("sidecar.sh");
    std::fs::write(&sidecar, SIDECAR).unwrap();

    let annotations = write_csv(
        dir,
        "annotations.csv",
        &[
            "10,3,1,Parrotfish,\"[4.0, 4.0]\"",
            "21,1,1,Parrotfish,\"[5.0, 5.0]\"",
            "40,4,1,Parrotfish,\"[6.0, 6.0]\"",
        ],
    );

    let config = dir.join("config.yaml");
    let yaml = format!(
        "extracted_tar_dir: '{frames}'
sam2_install_dir: '{dir}'
model_cfg: sam2.1_hiera_l.yaml
sam2_checkpoint: '{dir}/sam2.1_hiera_large.pt'
non_overlap_masks: true
offload_video_to_cpu: true
offload_state_to_cpu: false
annotations_file: '{annotations}'
fps: 30
SAM2_start: 0
frame_idx_name: Frame
labels_name: clickType
obj_id_name: fishLabel
points_name: Location
save_masks: true
masks_dict_file: '{dir}/masks.npz'
font_size: 12
font_color: white
alpha: 0.5
sidecar_command: [sh, '{sidecar}']
",
        frames = frames.display(),
        dir = dir.display(),
        annotations = annotations.display(),
        sidecar = sidecar.display(),
    );
    std::fs::write(&config, yaml).unwrap();

    config
}

#[cfg(unix)]
#[test]
fn test_track_quiet_without_verbose() {
    let dir = tempfile::tempdir().unwrap();
    let config = track_config(dir.path());

    shoal()
        .args(["track", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());

    assert!(dir.path().join("masks.npz").is_file());
}

#[cfg(unix)]
#[test]
fn test_track_verbose_logs_stages() {
    let dir = tempfile::tempdir().unwrap();
    let config = track_config(dir.path());

    shoal()
        .args(["track", "-v", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[propagate]"))
        .stdout(predicate::str::contains("Tracked 1 windows"));
}
