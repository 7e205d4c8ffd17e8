//! Variant planning.
//!
//! Decides which derived artifacts to generate for an item given its
//! native properties and the configured ladders. Planning is separate
//! from generation so the worker can record pending variants up front
//! and generate them independently.
//!
//! Invariant: no planned rendition exceeds the source's native
//! resolution or bitrate.

pub mod image;
pub mod media;

use greenroom_core::{VariantConfig, VariantKind};
use media::{AudioProbe, VideoProbe};

/// One planned variant: what to derive and how to store it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlan {
    pub kind: VariantKind,
    pub ext: &'static str,
    pub content_type: &'static str,
}

/// Thumbnail ladder for an image, keeping aspect ratio. Ladder entries
/// at or above the native width are skipped.
pub fn plan_image(native_width: u32, native_height: u32, config: &VariantConfig) -> Vec<VariantPlan> {
    if native_width == 0 || native_height == 0 {
        return Vec::new();
    }
    config
        .thumbnail_widths
        .iter()
        .filter(|&&w| w < native_width)
        .map(|&width| {
            let height =
                ((native_height as u64 * width as u64) / native_width as u64).max(1) as u32;
            VariantPlan {
                kind: VariantKind::Thumbnail { width, height },
                ext: "jpg",
                content_type: "image/jpeg",
            }
        })
        .collect()
}

/// Video renditions at qualities no taller than the source, plus a
/// poster frame.
pub fn plan_video(probe: &VideoProbe, config: &VariantConfig) -> Vec<VariantPlan> {
    let mut plans: Vec<VariantPlan> = config
        .video_rendition_heights
        .iter()
        .filter(|&&h| h <= probe.height)
        .map(|&height| VariantPlan {
            kind: VariantKind::VideoRendition { height },
            ext: "mp4",
            content_type: "video/mp4",
        })
        .collect();
    plans.push(VariantPlan {
        kind: VariantKind::Poster,
        ext: "jpg",
        content_type: "image/jpeg",
    });
    plans
}

/// Audio renditions at bitrates no higher than the source, plus optional
/// waveform peaks.
pub fn plan_audio(probe: &AudioProbe, config: &VariantConfig) -> Vec<VariantPlan> {
    let mut plans: Vec<VariantPlan> = config
        .audio_bitrates_kbps
        .iter()
        .filter(|&&b| b <= probe.bitrate_kbps)
        .map(|&bitrate_kbps| VariantPlan {
            kind: VariantKind::AudioRendition { bitrate_kbps },
            ext: "mp3",
            content_type: "audio/mpeg",
        })
        .collect();
    if config.waveform {
        plans.push(VariantPlan {
            kind: VariantKind::Waveform,
            ext: "json",
            content_type: "application/json",
        });
    }
    plans
}
