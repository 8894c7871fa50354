use crate::media::{LocalMedia, LocalTrack, MediaSource, TrackKind};
use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const OPUS_FRAME: Duration = Duration::from_millis(20);
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Capture source without devices: an Opus track fed with silence frames and
/// an idle VP8 track. Used by the simulator and headless runs.
#[derive(Debug, Clone)]
pub struct SyntheticMediaSource {
    pub audio: bool,
    pub video: bool,
    pub stream_id: String,
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            stream_id: "huddle-local".to_owned(),
        }
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self) -> anyhow::Result<Arc<LocalMedia>> {
        if !self.audio && !self.video {
            bail!("no capture device requested");
        }

        let mut tracks = Vec::new();
        if self.audio {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    ..Default::default()
                },
                "audio".to_owned(),
                self.stream_id.clone(),
            ));
            tracks.push(LocalTrack::new(TrackKind::Audio, track));
        }
        if self.video {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    ..Default::default()
                },
                "video".to_owned(),
                self.stream_id.clone(),
            ));
            tracks.push(LocalTrack::new(TrackKind::Video, track));
        }

        let media = Arc::new(LocalMedia::new(tracks));
        for track in media.tracks().iter().filter(|t| t.kind() == TrackKind::Audio) {
            spawn_silence_pump(track, media.stop_flag());
        }
        Ok(media)
    }
}

fn spawn_silence_pump(track: &LocalTrack, stopped: Arc<AtomicBool>) {
    let sample_track = track.track();
    let enabled = track.enabled_flag();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(OPUS_FRAME);
        while !stopped.load(Ordering::SeqCst) {
            ticker.tick().await;
            if !enabled.load(Ordering::SeqCst) {
                continue;
            }
            let sample = Sample {
                data: Bytes::from_static(&OPUS_SILENCE),
                duration: OPUS_FRAME,
                ..Default::default()
            };
            if let Err(e) = sample_track.write_sample(&sample).await {
                warn!("Synthetic audio pump stopped: {}", e);
                break;
            }
        }
        debug!("Synthetic audio pump finished");
    });
}
