//! Blocking outbound pump: microphone ring → encoded envelopes → transport.
//!
//! Runs on the same blocking thread that owns the (`!Send`) capture stream.
//! Per iteration: drain the ring, resample to 16 kHz, accumulate fixed-size
//! frames, encode, hand off. Frames go out strictly in capture order; the
//! transport's bounded queue provides the "queued behind session-ready"
//! behavior, so this loop never needs to know whether the handshake has
//! finished. Send failures are surfaced on the error channel and end the
//! pump — no retry here.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::audio::resample::RateConverter;
use crate::audio::ring::{Consumer, SampleConsumer};
use crate::codec::envelope::MediaEnvelope;
use crate::codec::pcm::floats_to_pcm16;
use crate::events::SessionErrorEvent;
use crate::session::SessionTransport;

/// Samples drained from the capture ring per iteration (20 ms at 48 kHz).
const DRAIN_CHUNK: usize = 960;

/// Sleep when the ring is empty (avoids busy-waiting a core).
const SLEEP_EMPTY: Duration = Duration::from_millis(5);

/// Wire sample rate for outbound audio.
pub const OUTBOUND_SAMPLE_RATE: u32 = 16_000;

/// Samples per outbound frame at 16 kHz (256 ms).
pub const FRAME_SAMPLES: usize = 4096;

pub struct PumpContext {
    pub consumer: SampleConsumer,
    pub running: Arc<AtomicBool>,
    pub transport: Arc<dyn SessionTransport>,
    pub capture_sample_rate: u32,
    pub error_tx: broadcast::Sender<SessionErrorEvent>,
    /// Optional WAV tee of the outbound 16 kHz stream, for diagnostics.
    pub debug_wav: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>,
}

/// Run the pump until `running` goes false or the transport dies.
pub fn run(mut ctx: PumpContext) {
    let mut converter = match RateConverter::new(
        ctx.capture_sample_rate,
        OUTBOUND_SAMPLE_RATE,
        DRAIN_CHUNK,
    ) {
        Ok(c) => c,
        Err(e) => {
            let _ = ctx.error_tx.send(SessionErrorEvent {
                message: format!("capture resampler failed: {e}"),
                fatal: true,
            });
            return;
        }
    };

    if !converter.is_passthrough() {
        info!(
            from = ctx.capture_sample_rate,
            to = OUTBOUND_SAMPLE_RATE,
            "outbound resampling enabled"
        );
    }

    let mut raw = vec![0f32; DRAIN_CHUNK];
    // Samples at 16 kHz awaiting a full frame
    let mut frame_buf: Vec<f32> = Vec::with_capacity(FRAME_SAMPLES * 2);
    let mut frames_sent = 0u64;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            std::thread::sleep(SLEEP_EMPTY);
            continue;
        }

        let resampled = converter.process(&raw[..n]);
        if resampled.is_empty() {
            // Partial chunk — converter is still accumulating input
            continue;
        }
        frame_buf.extend_from_slice(&resampled);

        while frame_buf.len() >= FRAME_SAMPLES {
            let frame: Vec<f32> = frame_buf.drain(..FRAME_SAMPLES).collect();

            if let Some(writer) = ctx.debug_wav.as_mut() {
                for &s in &frame {
                    let _ = writer.write_sample((s * 32768.0).round() as i16);
                }
            }

            let envelope = MediaEnvelope::pcm_16k(&floats_to_pcm16(&frame));
            if let Err(e) = ctx.transport.send(envelope) {
                // During teardown the queue closing is expected, not an error
                if ctx.running.load(Ordering::Relaxed) {
                    warn!("outbound send failed: {e}");
                    let _ = ctx.error_tx.send(SessionErrorEvent {
                        message: format!("outbound send failed: {e}"),
                        fatal: false,
                    });
                }
                finalize_wav(ctx.debug_wav.take());
                return;
            }
            frames_sent += 1;
        }
    }

    debug!(frames_sent, "capture pump stopped");
    finalize_wav(ctx.debug_wav.take());
}

fn finalize_wav(writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>) {
    if let Some(writer) = writer {
        if let Err(e) = writer.finalize() {
            warn!("failed to finalize debug capture wav: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ring::{create_capture_ring, Producer};
    use crate::codec::envelope::MIME_PCM_16K;
    use crate::codec::{envelope, pcm};
    use crate::error::{Result, VibeError};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    /// Transport that records envelopes, optionally failing after a count.
    struct RecordingTransport {
        sent: Mutex<Vec<MediaEnvelope>>,
        fail_after: Option<usize>,
    }

    impl RecordingTransport {
        fn new(fail_after: Option<usize>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_after,
            }
        }
    }

    impl SessionTransport for RecordingTransport {
        fn send(&self, envelope: MediaEnvelope) -> Result<()> {
            let mut sent = self.sent.lock();
            if let Some(limit) = self.fail_after {
                if sent.len() >= limit {
                    return Err(VibeError::Transport("queue closed".into()));
                }
            }
            sent.push(envelope);
            Ok(())
        }

        fn close(&self) {}
    }

    fn run_pump_over(
        samples: &[f32],
        transport: Arc<RecordingTransport>,
    ) -> broadcast::Receiver<SessionErrorEvent> {
        let (mut producer, consumer) = create_capture_ring();
        assert_eq!(producer.push_slice(samples), samples.len());

        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, error_rx) = broadcast::channel(8);

        // Stop the pump once the ring is drained: flip the flag from another
        // thread after a short grace period.
        let stopper = Arc::clone(&running);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            stopper.store(false, Ordering::Relaxed);
        });

        run(PumpContext {
            consumer,
            running,
            transport,
            capture_sample_rate: OUTBOUND_SAMPLE_RATE, // passthrough
            error_tx,
            debug_wav: None,
        });
        handle.join().unwrap();
        error_rx
    }

    #[test]
    fn frames_are_sent_whole_and_in_capture_order() {
        // Ramp across two full frames plus a partial tail
        let total = FRAME_SAMPLES * 2 + 100;
        let samples: Vec<f32> = (0..total).map(|i| (i % 1000) as f32 / 2000.0).collect();

        let transport = Arc::new(RecordingTransport::new(None));
        run_pump_over(&samples, Arc::clone(&transport));

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2, "partial tail frame is not sent");

        let mut decoded = Vec::new();
        for env in sent.iter() {
            assert_eq!(env.mime_type, MIME_PCM_16K);
            let bytes = envelope::decode_str(&env.data).unwrap();
            assert_eq!(bytes.len(), FRAME_SAMPLES * 2);
            decoded.extend(pcm::pcm16_to_mono_floats(&bytes).unwrap());
        }

        // Concatenated frames reproduce the capture order within 1 LSB
        for (a, b) in samples[..decoded.len()].iter().zip(&decoded) {
            assert!((a - b).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn send_failure_surfaces_on_the_error_channel() {
        let samples = vec![0.25f32; FRAME_SAMPLES * 3];
        let transport = Arc::new(RecordingTransport::new(Some(1)));
        let mut error_rx = run_pump_over(&samples, Arc::clone(&transport));

        assert_eq!(transport.sent.lock().len(), 1);
        let event = error_rx.try_recv().expect("error event");
        assert!(!event.fatal);
        assert!(event.message.contains("send failed"));
    }
}
