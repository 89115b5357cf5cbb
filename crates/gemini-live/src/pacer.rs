//! Uploads captured audio as it arrives and samples video at a fixed cadence.

use crate::{audio::AudioChunk, outbound::OutboundHandle};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use std::time::Duration;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl VideoFrame {
    pub fn jpeg(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: "image/jpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCadence {
    Disabled,
    Every(Duration),
}

/// Produces microphone audio and camera frames.
#[async_trait]
pub trait CaptureSource: Send {
    /// The next audio chunk, or `None` once capture has ended. Must be cancel-safe.
    async fn next_audio(&mut self) -> Option<AudioChunk>;

    /// The current frame, or `None` if nothing new is available on this tick.
    fn capture_frame(&mut self) -> Option<VideoFrame>;
}

/// A capture source fed from channels, for hosts that capture on their own threads.
pub struct ChannelCapture {
    audio: mpsc::Receiver<AudioChunk>,
    frames: watch::Receiver<Option<VideoFrame>>,
}

impl ChannelCapture {
    pub fn new(
        audio: mpsc::Receiver<AudioChunk>,
        frames: watch::Receiver<Option<VideoFrame>>,
    ) -> Self {
        Self { audio, frames }
    }
}

#[async_trait]
impl CaptureSource for ChannelCapture {
    async fn next_audio(&mut self) -> Option<AudioChunk> {
        self.audio.recv().await
    }

    fn capture_frame(&mut self) -> Option<VideoFrame> {
        if !self.frames.has_changed().unwrap_or(false) {
            return None;
        }
        self.frames.borrow_and_update().clone()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacerStats {
    pub audio_sent: u64,
    pub audio_dropped: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub ticks_skipped: u64,
}

pub struct MediaPacer;

impl MediaPacer {
    /// Runs until the capture source runs out of audio.
    pub fn spawn<S>(
        mut source: S,
        outbound: OutboundHandle,
        cadence: VideoCadence,
    ) -> JoinHandle<PacerStats>
    where
        S: CaptureSource + 'static,
    {
        tokio::spawn(async move {
            let mut stats = PacerStats::default();
            let mut ticker = match cadence {
                VideoCadence::Every(period) if !period.is_zero() => {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    Some(interval)
                }
                _ => None,
            };
            info!(?cadence, "Media pacer started");

            loop {
                tokio::select! {
                    chunk = source.next_audio() => {
                        let Some(chunk) = chunk else { break };
                        if outbound.send_audio_chunk(&chunk) {
                            stats.audio_sent += 1;
                        } else {
                            stats.audio_dropped += 1;
                        }
                    }
                    _ = tick(&mut ticker) => {
                        match source.capture_frame() {
                            Some(frame) => {
                                let data = STANDARD.encode(&frame.bytes);
                                if outbound.send_video_frame(data, &frame.mime_type) {
                                    stats.frames_sent += 1;
                                } else {
                                    stats.frames_dropped += 1;
                                }
                            }
                            None => stats.ticks_skipped += 1,
                        }
                    }
                }
            }

            debug!(?stats, "Media pacer finished");
            stats
        })
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AudioUplink, event::SessionState, outbound::Outbound};
    use gemini_live_types::ClientMessage;

    fn outbound(
        state: SessionState,
    ) -> (
        OutboundHandle,
        watch::Sender<SessionState>,
        mpsc::Receiver<Outbound>,
    ) {
        let (state_tx, state_rx) = watch::channel(state);
        let (tx, rx) = mpsc::channel(64);
        (
            OutboundHandle::new(state_rx, tx, AudioUplink::Binary, "audio/pcm;rate=16000".into()),
            state_tx,
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_audio_and_samples_frames() {
        let (audio_tx, audio_rx) = mpsc::channel(8);
        let (frame_tx, frame_rx) = watch::channel(None);
        let (handle, _state, mut rx) = outbound(SessionState::Open);

        let pacer = MediaPacer::spawn(
            ChannelCapture::new(audio_rx, frame_rx),
            handle,
            VideoCadence::Every(Duration::from_millis(800)),
        );

        frame_tx.send(Some(VideoFrame::jpeg(vec![0xffu8, 0xd8]))).unwrap();
        audio_tx.send(AudioChunk::new(vec![1i16; 4], 16_000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        // The frame did not change, so this tick is skipped.
        tokio::time::sleep(Duration::from_millis(800)).await;
        drop(audio_tx);

        let stats = pacer.await.unwrap();
        assert_eq!(stats.audio_sent, 1);
        assert_eq!(stats.frames_sent, 1);
        assert!(stats.ticks_skipped >= 1);

        let mut saw_frame = false;
        while let Ok(frame) = rx.try_recv() {
            if let Outbound::Message(ClientMessage::RealtimeInput(input)) = frame {
                assert_eq!(input.media.mime_type, "image/jpeg");
                assert_eq!(input.media.data, STANDARD.encode([0xffu8, 0xd8]));
                saw_frame = true;
            }
        }
        assert!(saw_frame);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drops_media_while_not_open() {
        let (audio_tx, audio_rx) = mpsc::channel(8);
        let (_frame_tx, frame_rx) = watch::channel(None);
        let (handle, _state, mut rx) = outbound(SessionState::Connecting);

        let pacer = MediaPacer::spawn(
            ChannelCapture::new(audio_rx, frame_rx),
            handle,
            VideoCadence::Disabled,
        );
        audio_tx.send(AudioChunk::new(vec![1i16; 4], 16_000)).await.unwrap();
        audio_tx.send(AudioChunk::new(vec![2i16; 4], 16_000)).await.unwrap();
        drop(audio_tx);

        let stats = pacer.await.unwrap();
        assert_eq!(stats.audio_dropped, 2);
        assert_eq!(stats.audio_sent, 0);
        assert!(rx.try_recv().is_err());
    }
}
