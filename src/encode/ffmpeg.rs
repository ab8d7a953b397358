use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::foundation::error::{InkstepError, InkstepResult};
use crate::replay::export::{ExportArtifact, FrameSink};

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> InkstepResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

struct Encoding {
    child: Child,
    stdin: Option<ChildStdin>,
    tmp_path: PathBuf,
    frame_len: usize,
}

/// [`FrameSink`] that streams raw RGB frames to the system `ffmpeg` binary and
/// produces an H.264 MP4.
///
/// Encoding goes to a temp file that is renamed into place only after `ffmpeg`
/// exits cleanly, so a failed export never leaves a partial artifact at the
/// output path. We intentionally shell out to `ffmpeg` rather than link an
/// FFmpeg crate to avoid native dev header/lib requirements.
pub struct FfmpegSink {
    out_path: PathBuf,
    label: String,
    overwrite: bool,
    encoding: Option<Encoding>,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>, label: impl Into<String>, overwrite: bool) -> Self {
        Self {
            out_path: out_path.into(),
            label: label.into(),
            overwrite,
            encoding: None,
        }
    }

    fn cleanup(&mut self) {
        if let Some(mut enc) = self.encoding.take() {
            drop(enc.stdin.take());
            let _ = enc.child.kill();
            let _ = enc.child.wait();
            let _ = std::fs::remove_file(&enc.tmp_path);
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl FrameSink for FfmpegSink {
    fn start(&mut self, width: u32, height: u32, fps: u32) -> InkstepResult<()> {
        if self.encoding.is_some() {
            return Err(InkstepError::capture("encoder already started"));
        }
        if width == 0 || height == 0 || fps == 0 {
            return Err(InkstepError::validation(
                "encode width/height/fps must be non-zero",
            ));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            // Default settings target yuv420p output for maximum compatibility.
            return Err(InkstepError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.out_path)?;
        if !self.overwrite && self.out_path.exists() {
            return Err(InkstepError::validation(format!(
                "output file '{}' already exists",
                self.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(InkstepError::capture(
                "ffmpeg is required for MP4 export, but was not found on PATH",
            ));
        }

        let tmp_path = self.out_path.with_extension(format!(
            "part-{}.mp4",
            std::process::id()
        ));

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&tmp_path);

        let mut child = cmd.spawn().map_err(|e| {
            InkstepError::capture(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InkstepError::capture("failed to open ffmpeg stdin (unexpected)"))?;

        self.encoding = Some(Encoding {
            child,
            stdin: Some(stdin),
            tmp_path,
            frame_len: (width as usize) * (height as usize) * 3,
        });
        Ok(())
    }

    fn push_frame(&mut self, data: &[u8]) -> InkstepResult<()> {
        let Some(enc) = self.encoding.as_mut() else {
            return Err(InkstepError::capture("encoder not started"));
        };
        if data.len() != enc.frame_len {
            let got = data.len();
            let want = enc.frame_len;
            self.cleanup();
            return Err(InkstepError::capture(format!(
                "frame size mismatch: got {got} bytes, expected {want}"
            )));
        }
        let Some(stdin) = enc.stdin.as_mut() else {
            return Err(InkstepError::capture("encoder is already finalized"));
        };

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(data) {
            self.cleanup();
            return Err(InkstepError::capture(format!(
                "failed to write frame to ffmpeg stdin: {e}"
            )));
        }
        Ok(())
    }

    fn finish(&mut self) -> InkstepResult<ExportArtifact> {
        let Some(mut enc) = self.encoding.take() else {
            return Err(InkstepError::capture("encoder not started"));
        };
        drop(enc.stdin.take());

        let output = enc.child.wait_with_output().map_err(|e| {
            let _ = std::fs::remove_file(&enc.tmp_path);
            InkstepError::capture(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = std::fs::remove_file(&enc.tmp_path);
            return Err(InkstepError::capture(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        std::fs::rename(&enc.tmp_path, &self.out_path).map_err(|e| {
            let _ = std::fs::remove_file(&enc.tmp_path);
            InkstepError::capture(format!(
                "failed to move finished export into '{}': {e}",
                self.out_path.display()
            ))
        })?;

        Ok(ExportArtifact {
            path: self.out_path.clone(),
            label: self.label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_validates_dimensions() {
        let mut sink = FfmpegSink::new("out/test.mp4", "test", true);
        assert!(sink.start(0, 10, 30).is_err());
        assert!(sink.start(11, 10, 30).is_err());
        assert!(sink.start(10, 10, 0).is_err());
    }

    #[test]
    fn push_and_finish_require_start() {
        let mut sink = FfmpegSink::new("out/test.mp4", "test", true);
        assert!(sink.push_frame(&[0u8; 12]).is_err());
        assert!(sink.finish().is_err());
    }

    #[test]
    fn roundtrip_encodes_when_ffmpeg_available() {
        if !is_ffmpeg_on_path() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let dir = std::env::temp_dir().join(format!("inkstep_ffmpeg_test_{}", std::process::id()));
        let out = dir.join("clip.mp4");
        let mut sink = FfmpegSink::new(&out, "clip", true);
        sink.start(16, 16, 30).unwrap();
        for shade in [0u8, 128, 255] {
            sink.push_frame(&vec![shade; 16 * 16 * 3]).unwrap();
        }
        let artifact = sink.finish().unwrap();
        assert_eq!(artifact.path, out);
        assert!(out.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
