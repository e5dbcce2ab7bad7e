//! ffmpeg-backed media engine.
//!
//! Blobs are spooled into a per-call temp directory, processed with the
//! `ffmpeg`/`ffprobe` binaries and read back. The temp directory is removed
//! when the call returns, whether it succeeded or not.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{MediaEngine, MediaSource, SegmentSpan, fixed_spans};
use crate::{Error, Result};

/// Lines of stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 8;

/// Media engine that shells out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
    segment_secs: f64,
}

impl FfmpegEngine {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        ffprobe_path: impl Into<String>,
        segment_secs: f64,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            segment_secs,
        }
    }

    fn base_args() -> Vec<String> {
        ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Arguments decoding the audio track to 16-bit PCM WAV.
    pub fn extract_audio_args(input: &str, output: &str) -> Vec<String> {
        let mut args = Self::base_args();
        args.extend(["-i".to_string(), input.to_string()]);
        args.push("-vn".to_string());
        args.extend(["-acodec".to_string(), "pcm_s16le".to_string()]);
        args.extend(["-ar".to_string(), "44100".to_string()]);
        args.extend(["-ac".to_string(), "2".to_string()]);
        args.push(output.to_string());
        args
    }

    /// Arguments copying the video stream without audio.
    pub fn extract_video_args(input: &str, output: &str) -> Vec<String> {
        let mut args = Self::base_args();
        args.extend(["-i".to_string(), input.to_string()]);
        args.push("-an".to_string());
        args.extend(["-c:v".to_string(), "copy".to_string()]);
        args.push(output.to_string());
        args
    }

    /// ffprobe arguments printing the container duration in seconds.
    pub fn probe_duration_args(input: &str) -> Vec<String> {
        [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
            input,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Arguments cutting one span out of the video and audio tracks.
    pub fn split_args(video: &str, audio: &str, span: &SegmentSpan, output: &str) -> Vec<String> {
        let start = format!("{:.3}", span.start_secs);
        let end = format!("{:.3}", span.end_secs);

        let mut args = Self::base_args();
        for input in [video, audio] {
            args.extend(["-ss".to_string(), start.clone()]);
            args.extend(["-to".to_string(), end.clone()]);
            args.extend(["-i".to_string(), input.to_string()]);
        }
        args.extend(["-map".to_string(), "0:v:0".to_string()]);
        args.extend(["-map".to_string(), "1:a:0".to_string()]);
        args.extend(["-c:v".to_string(), "copy".to_string()]);
        args.extend(["-c:a".to_string(), "aac".to_string()]);
        args.push(output.to_string());
        args
    }

    /// Arguments joining the files listed in a concat list.
    pub fn concat_args(list: &str, output: &str) -> Vec<String> {
        let mut args = Self::base_args();
        args.extend(["-f".to_string(), "concat".to_string()]);
        args.extend(["-safe".to_string(), "0".to_string()]);
        args.extend(["-i".to_string(), list.to_string()]);
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.push(output.to_string());
        args
    }

    /// Arguments remuxing for progressive playback.
    pub fn finalise_args(input: &str, output: &str) -> Vec<String> {
        let mut args = Self::base_args();
        args.extend(["-i".to_string(), input.to_string()]);
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args.push(output.to_string());
        args
    }

    /// Parse ffprobe's duration output.
    pub fn parse_duration(stdout: &str) -> Result<f64> {
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| line.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .ok_or_else(|| Error::media(format!("unreadable duration '{}'", stdout.trim())))
    }

    fn workdir() -> Result<TempDir> {
        tempfile::Builder::new()
            .prefix("stagehand-")
            .tempdir()
            .map_err(|e| Error::media(format!("failed to create work directory: {e}")))
    }

    async fn spool(dir: &Path, name: &str, data: &Bytes) -> Result<PathBuf> {
        let path = dir.join(name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| Error::media(format!("failed to spool {name}: {e}")))?;
        Ok(path)
    }

    async fn read_back(path: &Path) -> Result<Bytes> {
        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|e| Error::media(format!("failed to read {}: {e}", path.display())))
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        debug!(program = %program, ?args, "Running media tool");

        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| Error::media(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            warn!(program = %program, status = %output.status, "Media tool failed");
            return Err(Error::media(format!(
                "{program} exited with {}: {tail}",
                output.status
            )));
        }
        Ok(output)
    }

    async fn transform(
        &self,
        input_name: &str,
        data: &Bytes,
        output_name: &str,
        build: fn(&str, &str) -> Vec<String>,
    ) -> Result<Bytes> {
        let dir = Self::workdir()?;
        let input = Self::spool(dir.path(), input_name, data).await?;
        let output = dir.path().join(output_name);

        let args = build(&input.to_string_lossy(), &output.to_string_lossy());
        self.run(&self.ffmpeg_path, &args).await?;
        Self::read_back(&output).await
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn extract_audio(&self, source: MediaSource) -> Result<Bytes> {
        let input = format!("source.{}", source.extension.as_deref().unwrap_or("mp4"));
        self.transform(&input, &source.data, "audio.wav", Self::extract_audio_args)
            .await
    }

    async fn extract_video(&self, source: MediaSource) -> Result<Bytes> {
        let input = format!("source.{}", source.extension.as_deref().unwrap_or("mp4"));
        self.transform(&input, &source.data, "video.mp4", Self::extract_video_args)
            .await
    }

    async fn detect_segments(&self, _audio: Bytes, video: Bytes) -> Result<Vec<SegmentSpan>> {
        let dir = Self::workdir()?;
        let input = Self::spool(dir.path(), "video.mp4", &video).await?;

        let args = Self::probe_duration_args(&path_str(&input));
        let output = self.run(&self.ffprobe_path, &args).await?;
        let duration = Self::parse_duration(&String::from_utf8_lossy(&output.stdout))?;

        Ok(fixed_spans(duration, self.segment_secs))
    }

    async fn split_segment(&self, video: Bytes, audio: Bytes, span: SegmentSpan) -> Result<Bytes> {
        let dir = Self::workdir()?;
        let video_path = Self::spool(dir.path(), "video.mp4", &video).await?;
        let audio_path = Self::spool(dir.path(), "audio.wav", &audio).await?;
        let output = dir.path().join(format!("segment_{}.mp4", span.index));

        let args = Self::split_args(
            &path_str(&video_path),
            &path_str(&audio_path),
            &span,
            &path_str(&output),
        );
        self.run(&self.ffmpeg_path, &args).await?;
        Self::read_back(&output).await
    }

    async fn render(&self, segments: Vec<Bytes>) -> Result<Bytes> {
        if segments.is_empty() {
            return Err(Error::media("nothing to render"));
        }

        let dir = Self::workdir()?;
        let mut list = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let name = format!("part_{i}.mp4");
            Self::spool(dir.path(), &name, segment).await?;
            list.push_str(&format!("file '{name}'\n"));
        }
        let list_path = Self::spool(dir.path(), "concat.txt", &Bytes::from(list)).await?;
        let output = dir.path().join("render.mp4");

        let args = Self::concat_args(&path_str(&list_path), &path_str(&output));
        self.run(&self.ffmpeg_path, &args).await?;
        Self::read_back(&output).await
    }

    async fn finalise_render(&self, rendered: Bytes) -> Result<Bytes> {
        self.transform("render.mp4", &rendered, "final.mp4", Self::finalise_args)
            .await
    }
}
