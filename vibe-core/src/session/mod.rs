//! `VoiceSession` — top-level lifecycle controller for a live voice
//! conversation.
//!
//! ## Lifecycle
//!
//! ```text
//! VoiceSession::new()
//!     └─► start()        → mic + output clock open, status = Active,
//!         │                remote handshake continues in the background
//!         └─► stop()     → transport closed, devices released, status = Idle
//! ```
//!
//! `start()` is valid only while idle; `stop()` is idempotent from any state.
//! Capture frames produced before the handshake completes queue in a bounded
//! in-order channel and flush once the session is ready.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so the capture stream is
//! created *inside* a `spawn_blocking` closure that also runs the outbound
//! pump, and a oneshot channel reports the open result back to `start()`.
//! Inbound server events are consumed by a single task, which keeps the
//! playback scheduler single-writer without a lock.

pub mod pump;

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audio::capture::MicCapture;
use crate::audio::frame::AudioFrame;
use crate::audio::ring::create_capture_ring;
use crate::codec::envelope::{self, MediaEnvelope, INBOUND_SAMPLE_RATE};
use crate::codec::pcm;
use crate::error::{Result, VibeError};
use crate::events::{
    ActivityEvent, SessionErrorEvent, SessionStatus, SessionStatusEvent, Speaker, TranscriptEvent,
};
use crate::gemini::live::{self, ServerEvent};
use crate::gemini::GeminiConfig;
use crate::playback::sink::{OutputSink, StreamClock};
use crate::playback::{OutputClock, PlaybackScheduler, PlaybackShared};

/// Broadcast channel capacity: events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Bounded pending-send queue between the capture pump and the live writer.
/// At one frame per 256 ms this is over 16 s of slack while connecting.
const PENDING_SEND_CAP: usize = 64;

/// How often the io task reaps finished playback sources.
const REAP_TICK: Duration = Duration::from_millis(50);

/// Opaque capability surface of the remote session: ordered send + close.
///
/// Keeps transport-library types out of the capture path, and lets tests
/// substitute a recording transport.
pub trait SessionTransport: Send + Sync {
    /// Queue one envelope for in-order delivery. Blocks briefly when the
    /// pending queue is full; fails once the session is gone.
    fn send(&self, envelope: MediaEnvelope) -> Result<()>;

    /// Ask the transport to close cleanly. Idempotent.
    fn close(&self);
}

/// Production transport: bounded queue drained by the live writer task.
struct LiveTransport {
    outbound: mpsc::Sender<MediaEnvelope>,
    closer: Arc<Notify>,
}

impl SessionTransport for LiveTransport {
    fn send(&self, envelope: MediaEnvelope) -> Result<()> {
        self.outbound
            .blocking_send(envelope)
            .map_err(|_| VibeError::Transport("session send queue closed".into()))
    }

    fn close(&self) {
        self.closer.notify_one();
    }
}

/// Configuration for one voice session.
#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    pub gemini: GeminiConfig,
    /// Input device name to prefer, `None` for the system default.
    pub preferred_input_device: Option<String>,
    /// When set, tee the outbound 16 kHz stream into a WAV file.
    pub debug_capture_wav: Option<PathBuf>,
}

impl VoiceSessionConfig {
    pub fn new(gemini: GeminiConfig) -> Self {
        Self {
            gemini,
            preferred_input_device: None,
            debug_capture_wav: None,
        }
    }
}

/// The top-level session handle.
///
/// `VoiceSession` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<VoiceSession>` to share between a command loop and
/// event-forwarding tasks.
pub struct VoiceSession {
    config: VoiceSessionConfig,
    /// `true` while capture + io are active.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<SessionStatus>>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    activity_tx: broadcast::Sender<ActivityEvent>,
    error_tx: broadcast::Sender<SessionErrorEvent>,
    parts: Mutex<Option<ActiveParts>>,
}

/// Handles needed to tear an active session down.
struct ActiveParts {
    transport: Arc<dyn SessionTransport>,
    shutdown: Arc<Notify>,
    io_task: JoinHandle<()>,
}

impl VoiceSession {
    /// Create a session controller. Does nothing until `start()`.
    pub fn new(config: VoiceSessionConfig) -> Self {
        let (transcript_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (error_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            transcript_tx,
            status_tx,
            activity_tx,
            error_tx,
            parts: Mutex::new(None),
        }
    }

    /// Start the voice session.
    ///
    /// Opens the microphone first (a permission/device failure leaves no
    /// other state behind), then the output device and playback scheduler,
    /// then transitions to `Active` — the remote handshake continues in the
    /// background while capture frames queue.
    ///
    /// # Errors
    /// - `VibeError::SessionActive` if already started.
    /// - Device errors from the microphone or output stream.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(VibeError::SessionActive);
        }
        self.set_status(SessionStatus::Connecting, None);

        // ── Pending-send queue + transport capability ─────────────────────
        let (media_tx, media_rx) = mpsc::channel(PENDING_SEND_CAP);
        let closer = Arc::new(Notify::new());
        let transport: Arc<dyn SessionTransport> = Arc::new(LiveTransport {
            outbound: media_tx,
            closer: Arc::clone(&closer),
        });

        // ── Microphone + outbound pump (blocking thread, !Send stream) ────
        let (open_tx, open_rx) = oneshot::channel::<Result<u32>>();
        let (producer, consumer) = create_capture_ring();
        let running = Arc::clone(&self.running);
        let pump_transport = Arc::clone(&transport);
        let pump_error_tx = self.error_tx.clone();
        let preferred = self.config.preferred_input_device.clone();
        let wav_path = self.config.debug_capture_wav.clone();

        tokio::task::spawn_blocking(move || {
            let capture = match MicCapture::open(producer, Arc::clone(&running), preferred.as_deref())
            {
                Ok(c) => {
                    let _ = open_tx.send(Ok(c.sample_rate));
                    c
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    return;
                }
            };

            let debug_wav = wav_path.and_then(|path| {
                let spec = hound::WavSpec {
                    channels: 1,
                    sample_rate: pump::OUTBOUND_SAMPLE_RATE,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };
                match hound::WavWriter::create(&path, spec) {
                    Ok(w) => Some(w),
                    Err(e) => {
                        warn!("debug capture wav disabled: {e}");
                        None
                    }
                }
            });

            pump::run(pump::PumpContext {
                consumer,
                running: Arc::clone(&running),
                transport: pump_transport,
                capture_sample_rate: capture.sample_rate,
                error_tx: pump_error_tx,
                debug_wav,
            });

            // Stream drops here, releasing the microphone on this thread.
            drop(capture);
        });

        match open_rx.await {
            Ok(Ok(rate)) => info!(capture_rate = rate, "microphone open"),
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some("capture thread died".into()));
                return Err(VibeError::AudioStream("capture thread died".into()));
            }
        }

        // ── Output device + playback scheduler ────────────────────────────
        let shared = PlaybackShared::new();
        let sink_shared = shared.clone();
        let sink = match tokio::task::spawn_blocking(move || OutputSink::open(sink_shared)).await {
            Ok(Ok(sink)) => sink,
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                return Err(e);
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                return Err(VibeError::AudioStream(format!("sink open task: {e}")));
            }
        };
        let scheduler = PlaybackScheduler::new(sink.clock(), shared);

        // Local resources are live — the session is usable even while the
        // remote handshake is still in flight.
        self.set_status(SessionStatus::Active, None);

        let wiring = InboundWiring::new(
            scheduler,
            self.transcript_tx.clone(),
            self.activity_tx.clone(),
            self.error_tx.clone(),
        );

        let shutdown = Arc::new(Notify::new());
        let io_task = tokio::spawn(run_io(IoContext {
            gemini: self.config.gemini.clone(),
            media_rx,
            closer: Arc::clone(&closer),
            shutdown: Arc::clone(&shutdown),
            wiring,
            sink,
            running: Arc::clone(&self.running),
            status: Arc::clone(&self.status),
            status_tx: self.status_tx.clone(),
            error_tx: self.error_tx.clone(),
        }));

        *self.parts.lock() = Some(ActiveParts {
            transport,
            shutdown,
            io_task,
        });

        info!("voice session started");
        Ok(())
    }

    /// Stop the session: close the transport, release both audio devices,
    /// tear down playback. Safe to call from any state, any number of times.
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        let parts = self.parts.lock().take();

        if let Some(parts) = parts {
            parts.transport.close();
            parts.shutdown.notify_one();
            if parts.io_task.await.is_err() {
                warn!("session io task panicked during stop");
            }
        }

        if was_running || *self.status.lock() != SessionStatus::Idle {
            self.set_status(SessionStatus::Idle, None);
            info!("voice session stopped");
        }
    }

    /// Current session status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Subscribe to transcription events.
    pub fn subscribe_transcripts(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.transcript_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to speaking-activity events.
    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Subscribe to error notifications.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<SessionErrorEvent> {
        self.error_tx.subscribe()
    }

    fn set_status(&self, new_status: SessionStatus, detail: Option<String>) {
        set_status(&self.status, &self.status_tx, new_status, detail);
    }
}

fn set_status(
    status: &Mutex<SessionStatus>,
    status_tx: &broadcast::Sender<SessionStatusEvent>,
    new_status: SessionStatus,
    detail: Option<String>,
) {
    *status.lock() = new_status;
    let _ = status_tx.send(SessionStatusEvent {
        status: new_status,
        detail,
    });
}

// ---------------------------------------------------------------------------
// Inbound wiring
// ---------------------------------------------------------------------------

/// Routes decoded server events into the playback scheduler and the
/// broadcast channels. Driven by the session's io task; public so the flow
/// can be exercised end-to-end without a network or audio device.
pub struct InboundWiring<C: OutputClock> {
    scheduler: PlaybackScheduler<C>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    activity_tx: broadcast::Sender<ActivityEvent>,
    error_tx: broadcast::Sender<SessionErrorEvent>,
    transcript_seq: u64,
    activity_seq: u64,
    user_speaking: bool,
    model_speaking: bool,
}

impl<C: OutputClock> InboundWiring<C> {
    pub fn new(
        scheduler: PlaybackScheduler<C>,
        transcript_tx: broadcast::Sender<TranscriptEvent>,
        activity_tx: broadcast::Sender<ActivityEvent>,
        error_tx: broadcast::Sender<SessionErrorEvent>,
    ) -> Self {
        Self {
            scheduler,
            transcript_tx,
            activity_tx,
            error_tx,
            transcript_seq: 0,
            activity_seq: 0,
            user_speaking: false,
            model_speaking: false,
        }
    }

    pub fn scheduler(&self) -> &PlaybackScheduler<C> {
        &self.scheduler
    }

    /// Apply one server event, strictly in delivery order.
    pub fn handle(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Audio(media) => self.handle_audio(media),

            ServerEvent::Transcription { text, speaker } => {
                let seq = self.transcript_seq;
                self.transcript_seq += 1;
                let _ = self.transcript_tx.send(TranscriptEvent { seq, text, speaker });
                if speaker == Speaker::User && !self.user_speaking {
                    self.user_speaking = true;
                    self.emit_activity();
                }
            }

            ServerEvent::Interrupted => {
                self.scheduler.interrupt();
                if self.model_speaking {
                    self.model_speaking = false;
                    self.emit_activity();
                }
            }

            ServerEvent::TurnComplete => {
                if self.user_speaking {
                    self.user_speaking = false;
                    self.emit_activity();
                }
            }

            ServerEvent::TransportError(message) => {
                // Report-only: the session does not transition on remote errors.
                warn!("live transport error: {message}");
                let _ = self.error_tx.send(SessionErrorEvent {
                    message,
                    fatal: false,
                });
            }

            ServerEvent::Closed => {
                info!("live session closed by remote");
            }
        }
    }

    /// Retire finished playback sources; emits the speaking-state change
    /// when the model's audio drains out.
    pub fn tick(&mut self) {
        if self.scheduler.reap() && self.model_speaking {
            self.model_speaking = false;
            self.emit_activity();
        }
    }

    /// Teardown the playback side. Late events are ignored afterwards.
    pub fn finish(&mut self) {
        self.scheduler.finish();
        if self.model_speaking {
            self.model_speaking = false;
            self.emit_activity();
        }
    }

    fn handle_audio(&mut self, media: MediaEnvelope) {
        let bytes = match envelope::decode_str(&media.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("dropping undecodable audio chunk: {e}");
                let _ = self.error_tx.send(SessionErrorEvent {
                    message: format!("bad audio chunk: {e}"),
                    fatal: false,
                });
                return;
            }
        };
        let samples = match pcm::pcm16_to_mono_floats(&bytes) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("dropping malformed PCM chunk: {e}");
                let _ = self.error_tx.send(SessionErrorEvent {
                    message: format!("bad audio chunk: {e}"),
                    fatal: false,
                });
                return;
            }
        };

        let frame = AudioFrame::new(samples, INBOUND_SAMPLE_RATE);
        if self.scheduler.enqueue(frame).is_some() && !self.model_speaking {
            self.model_speaking = true;
            self.emit_activity();
        }
    }

    fn emit_activity(&mut self) {
        let seq = self.activity_seq;
        self.activity_seq += 1;
        let _ = self.activity_tx.send(ActivityEvent {
            seq,
            user_speaking: self.user_speaking,
            model_speaking: self.model_speaking,
        });
    }
}

// ---------------------------------------------------------------------------
// io task
// ---------------------------------------------------------------------------

struct IoContext {
    gemini: GeminiConfig,
    media_rx: mpsc::Receiver<MediaEnvelope>,
    closer: Arc<Notify>,
    shutdown: Arc<Notify>,
    wiring: InboundWiring<StreamClock>,
    sink: OutputSink,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<SessionStatus>>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    error_tx: broadcast::Sender<SessionErrorEvent>,
}

/// Connect, then route server events until shutdown or stream end.
async fn run_io(ctx: IoContext) {
    let IoContext {
        gemini,
        media_rx,
        closer,
        shutdown,
        mut wiring,
        mut sink,
        running,
        status,
        status_tx,
        error_tx,
    } = ctx;

    let connect = live::connect(&gemini, media_rx, closer);
    tokio::pin!(connect);

    // A stop() issued mid-handshake must not wait for the dial to resolve.
    let connected = tokio::select! {
        _ = shutdown.notified() => {
            wiring.finish();
            sink.close();
            return;
        }
        res = &mut connect => res,
    };

    let mut events = match connected {
        Ok(events) => events,
        Err(e) => {
            // Connect-phase failures are fatal: tear the session down.
            warn!("live connect failed: {e}");
            let _ = error_tx.send(SessionErrorEvent {
                message: e.to_string(),
                fatal: true,
            });
            running.store(false, Ordering::SeqCst);
            set_status(&status, &status_tx, SessionStatus::Error, Some(e.to_string()));
            wiring.finish();
            sink.close();
            return;
        }
    };

    let mut tick = tokio::time::interval(REAP_TICK);

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = tick.tick() => wiring.tick(),
            event = events.recv() => match event {
                Some(event) => wiring.handle(event),
                None => break,
            },
        }
    }

    wiring.finish();
    sink.close();
}
