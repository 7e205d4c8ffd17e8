//! Probing and transcoding seams for video and audio.
//!
//! The platform integrates with an external codec tool; these traits are
//! the boundary. Production wires an ffmpeg-backed implementation;
//! [`StaticProber`] and [`StubTranscoder`] serve tests and local
//! development.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Native properties of a video source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

/// Native properties of an audio source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioProbe {
    pub duration_secs: f64,
    pub bitrate_kbps: u32,
}

/// Extracts native properties from source bytes.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe_video(&self, data: &[u8]) -> Result<VideoProbe>;
    async fn probe_audio(&self, data: &[u8]) -> Result<AudioProbe>;
}

/// Produces derived renditions from source bytes.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode to the given rendition height, preserving aspect ratio.
    async fn transcode_video(&self, data: &[u8], height: u32) -> Result<Vec<u8>>;

    /// Extract a poster frame at the given offset, encoded as JPEG.
    async fn poster_frame(&self, data: &[u8], at_secs: f64) -> Result<Vec<u8>>;

    /// Re-encode audio at the given bitrate.
    async fn transcode_audio(&self, data: &[u8], bitrate_kbps: u32) -> Result<Vec<u8>>;

    /// Compute waveform peaks, serialized as JSON.
    async fn waveform_peaks(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Prober returning fixed probe results. For tests and local development.
#[derive(Debug, Clone, Copy)]
pub struct StaticProber {
    pub video: VideoProbe,
    pub audio: AudioProbe,
}

impl Default for StaticProber {
    fn default() -> Self {
        Self {
            video: VideoProbe {
                width: 1920,
                height: 1080,
                duration_secs: 120.0,
            },
            audio: AudioProbe {
                duration_secs: 180.0,
                bitrate_kbps: 256,
            },
        }
    }
}

#[async_trait]
impl MediaProber for StaticProber {
    async fn probe_video(&self, _data: &[u8]) -> Result<VideoProbe> {
        Ok(self.video)
    }

    async fn probe_audio(&self, _data: &[u8]) -> Result<AudioProbe> {
        Ok(self.audio)
    }
}

#[derive(Serialize)]
struct WaveformPeaks {
    peaks: Vec<f32>,
}

/// Deterministic stand-in transcoder: output size scales with the
/// requested quality so size accounting is exercised realistically.
/// Optionally fails specific rendition heights to test partial-failure
/// handling.
#[derive(Debug, Clone, Default)]
pub struct StubTranscoder {
    pub failing_heights: Vec<u32>,
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode_video(&self, data: &[u8], height: u32) -> Result<Vec<u8>> {
        if self.failing_heights.contains(&height) {
            anyhow::bail!("transcode to {}p failed", height);
        }
        let len = ((data.len() as u64 * height as u64) / 2160).max(1) as usize;
        Ok(vec![0u8; len])
    }

    async fn poster_frame(&self, _data: &[u8], at_secs: f64) -> Result<Vec<u8>> {
        anyhow::ensure!(at_secs >= 0.0, "poster offset must not be negative");
        Ok(vec![0xff, 0xd8, 0xff, 0xd9])
    }

    async fn transcode_audio(&self, data: &[u8], bitrate_kbps: u32) -> Result<Vec<u8>> {
        let len = ((data.len() as u64 * bitrate_kbps as u64) / 320).max(1) as usize;
        Ok(vec![0u8; len])
    }

    async fn waveform_peaks(&self, data: &[u8]) -> Result<Vec<u8>> {
        let peaks: Vec<f32> = data
            .chunks(1024.max(data.len() / 64))
            .map(|chunk| {
                let max = chunk.iter().copied().max().unwrap_or(0);
                max as f32 / 255.0
            })
            .collect();
        Ok(serde_json::to_vec(&WaveformPeaks { peaks })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_video_output_scales_with_height() {
        let t = StubTranscoder::default();
        let data = vec![1u8; 21600];
        let hi = t.transcode_video(&data, 1080).await.unwrap();
        let lo = t.transcode_video(&data, 240).await.unwrap();
        assert!(hi.len() > lo.len());
    }

    #[tokio::test]
    async fn test_stub_failing_height() {
        let t = StubTranscoder {
            failing_heights: vec![720],
        };
        assert!(t.transcode_video(b"data", 720).await.is_err());
        assert!(t.transcode_video(b"data", 480).await.is_ok());
    }

    #[tokio::test]
    async fn test_waveform_is_json() {
        let t = StubTranscoder::default();
        let out = t.waveform_peaks(&[0, 128, 255, 64]).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(parsed.get("peaks").unwrap().is_array());
    }
}
