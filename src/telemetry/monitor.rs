//! Inbound frame observer.

use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::messages::{Frame, InboundMessage, SimState};

/// Running totals over the received frame stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frames received since start.
    pub frames: u64,
    /// Frames missed because the monitor fell behind.
    pub skipped: u64,
    /// Decoded JPEG bytes of the most recent frame.
    pub last_image_bytes: usize,
    /// Frames whose image failed to decode.
    pub bad_images: u64,
    /// Simulator state of the most recent frame.
    pub latest: Option<SimState>,
}

impl FrameStats {
    pub fn record(&mut self, frame: &Frame) {
        self.frames += 1;
        match frame.decode_image() {
            Ok(bytes) => self.last_image_bytes = bytes.len(),
            Err(e) => {
                self.bad_images += 1;
                debug!("Frame image not decodable: {}", e);
            }
        }
        self.latest = Some(frame.state.clone());
    }
}

/// Handle to a running telemetry monitor task.
#[derive(Debug)]
pub struct TelemetryMonitor {
    stats: watch::Receiver<FrameStats>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TelemetryMonitor {
    /// Spawns the monitor. Stats are logged every `report_interval`.
    pub fn spawn(frames: broadcast::Receiver<InboundMessage>, report_interval: Duration) -> Self {
        let (sender, stats) = watch::channel(FrameStats::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_monitor(frames, sender, report_interval, cancel.clone()));

        Self {
            stats,
            cancel,
            task: Some(task),
        }
    }

    /// Receiver for the running totals.
    #[must_use]
    pub fn stats(&self) -> watch::Receiver<FrameStats> {
        self.stats.clone()
    }

    /// Stops the monitor. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Telemetry task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for TelemetryMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_monitor(
    mut frames: broadcast::Receiver<InboundMessage>,
    sender: watch::Sender<FrameStats>,
    report_interval: Duration,
    cancel: CancellationToken,
) {
    let mut report = tokio::time::interval_at(Instant::now() + report_interval, report_interval);
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames_at_last_report = 0;
    let mut last_report = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = frames.recv() => match received {
                Ok(InboundMessage::Frame(frame)) => {
                    sender.send_modify(|stats| stats.record(&frame));
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Telemetry fell behind, skipped {} frame(s)", count);
                    sender.send_modify(|stats| stats.skipped += count);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            now = report.tick() => {
                let stats = sender.borrow();
                let fps = frame_rate(
                    stats.frames - frames_at_last_report,
                    now.saturating_duration_since(last_report),
                );
                frames_at_last_report = stats.frames;
                last_report = now;
                match &stats.latest {
                    Some(state) => info!(
                        "Frames: {} ({:.1} fps), sim time {:.2}s, {} joint(s), image {} bytes",
                        stats.frames,
                        fps,
                        state.time,
                        state.joints.len(),
                        stats.last_image_bytes
                    ),
                    None => debug!("No frames received yet"),
                }
            }
        }
    }
}

/// Frames per second over the measured `elapsed` window.
fn frame_rate(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(time: f64) -> Frame {
        let mut state = SimState {
            time,
            ..SimState::default()
        };
        state.joints.insert("joint1".to_string(), 0.25);
        Frame {
            image: "/9j/4A==".to_string(),
            state,
        }
    }

    #[test]
    fn test_record_frame() {
        let mut stats = FrameStats::default();
        stats.record(&frame(1.0));
        stats.record(&frame(2.0));

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.last_image_bytes, 4);
        assert_eq!(stats.latest.unwrap().time, 2.0);
    }

    #[test]
    fn test_frame_rate_uses_elapsed_time() {
        assert_eq!(frame_rate(30, Duration::from_secs(1)), 30.0);
        // A skipped tick doubles the window, not the rate
        assert_eq!(frame_rate(60, Duration::from_secs(2)), 30.0);
        assert_eq!(frame_rate(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_record_bad_image() {
        let mut stats = FrameStats::default();
        let mut bad = frame(0.5);
        bad.image = "%%%".to_string();
        stats.record(&bad);

        assert_eq!(stats.frames, 1);
        assert_eq!(stats.bad_images, 1);
        assert!(stats.latest.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_counts_frames() {
        let (sender, receiver) = broadcast::channel(16);
        let mut monitor = TelemetryMonitor::spawn(receiver, Duration::from_secs(1));
        let mut stats = monitor.stats();

        sender.send(InboundMessage::Frame(frame(0.1))).unwrap();
        sender.send(InboundMessage::Frame(frame(0.2))).unwrap();

        while stats.borrow_and_update().frames < 2 {
            stats.changed().await.unwrap();
        }
        assert_eq!(stats.borrow().latest.as_ref().unwrap().time, 0.2);

        monitor.shutdown().await;
        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_records_lag() {
        let (sender, receiver) = broadcast::channel(2);
        for i in 0..5 {
            sender.send(InboundMessage::Frame(frame(f64::from(i)))).unwrap();
        }

        let mut monitor = TelemetryMonitor::spawn(receiver, Duration::from_secs(1));
        let mut stats = monitor.stats();
        while stats.borrow_and_update().frames < 2 {
            stats.changed().await.unwrap();
        }
        assert_eq!(stats.borrow().skipped, 3);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_when_session_closes() {
        let (sender, receiver) = broadcast::channel::<InboundMessage>(4);
        let mut monitor = TelemetryMonitor::spawn(receiver, Duration::from_secs(1));

        drop(sender);
        let task = monitor.task.take().unwrap();
        task.await.unwrap();
    }
}
