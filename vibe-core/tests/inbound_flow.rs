//! End-to-end inbound flow: envelope-encoded PCM chunks through the session
//! wiring into the playback scheduler and render queue, without a network or
//! an audio device.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use vibe_core::codec::envelope::{self, MediaEnvelope};
use vibe_core::codec::pcm::floats_to_pcm16;
use vibe_core::events::{ActivityEvent, SessionErrorEvent, Speaker, TranscriptEvent};
use vibe_core::gemini::live::ServerEvent;
use vibe_core::playback::{OutputClock, PlaybackScheduler, PlaybackShared};
use vibe_core::session::InboundWiring;

#[derive(Clone, Default)]
struct ManualClock(Arc<Mutex<f64>>);

impl ManualClock {
    fn advance_to(&self, secs: f64) {
        *self.0.lock() = secs;
    }
}

impl OutputClock for ManualClock {
    fn now(&self) -> f64 {
        *self.0.lock()
    }
}

struct Harness {
    wiring: InboundWiring<ManualClock>,
    clock: ManualClock,
    shared: PlaybackShared,
    transcripts: broadcast::Receiver<TranscriptEvent>,
    activity: broadcast::Receiver<ActivityEvent>,
    errors: broadcast::Receiver<SessionErrorEvent>,
}

fn harness() -> Harness {
    let clock = ManualClock::default();
    let shared = PlaybackShared::new();
    let scheduler = PlaybackScheduler::new(clock.clone(), shared.clone());
    let (transcript_tx, transcripts) = broadcast::channel(64);
    let (activity_tx, activity) = broadcast::channel(64);
    let (error_tx, errors) = broadcast::channel(64);
    Harness {
        wiring: InboundWiring::new(scheduler, transcript_tx, activity_tx, error_tx),
        clock,
        shared,
        transcripts,
        activity,
        errors,
    }
}

/// A chunk of `duration_secs` of 24 kHz audio, wire-encoded the way the live
/// session delivers it.
fn wire_chunk(duration_secs: f64) -> ServerEvent {
    let samples = (duration_secs * 24_000.0).round() as usize;
    let floats: Vec<f32> = (0..samples).map(|i| ((i % 200) as f32 - 100.0) / 400.0).collect();
    ServerEvent::Audio(MediaEnvelope {
        data: envelope::encode_bytes(&floats_to_pcm16(&floats)),
        mime_type: "audio/pcm;rate=24000".into(),
    })
}

#[test]
fn burst_of_chunks_renders_gapless_in_order() {
    let mut h = harness();

    // 0.5 s, 0.3 s, 0.4 s delivered back-to-back at t=0
    h.wiring.handle(wire_chunk(0.5));
    h.wiring.handle(wire_chunk(0.3));
    h.wiring.handle(wire_chunk(0.4));

    let scheduler = h.wiring.scheduler();
    assert_eq!(scheduler.active_len(), 3);
    assert!((scheduler.next_start() - 1.2).abs() < 1e-9);

    // The render queue holds exactly 1.2 s of sequential audio
    let mut rendered = vec![0.0f32; 40_000];
    let pulled = h.shared.queue.lock().pull(&mut rendered);
    assert_eq!(pulled, 28_800);

    // One activity event: the model started speaking
    let activity = h.activity.try_recv().expect("speaking event");
    assert!(activity.model_speaking);
    assert!(h.activity.try_recv().is_err(), "no duplicate events");
}

#[test]
fn interruption_mid_turn_restarts_from_the_live_clock() {
    let mut h = harness();

    h.wiring.handle(wire_chunk(0.5));
    h.wiring.handle(ServerEvent::Interrupted);

    assert!(h.wiring.scheduler().is_idle());
    assert_eq!(h.wiring.scheduler().next_start(), 0.0);
    assert!(h.shared.queue.lock().is_empty());

    // Chunk 2 arrives at t=0.6 after the user cut the model off: it starts
    // at 0.6, not at the stale 0.5 offset.
    h.clock.advance_to(0.6);
    h.wiring.handle(wire_chunk(0.4));
    assert!((h.wiring.scheduler().next_start() - 1.0).abs() < 1e-9);
}

#[test]
fn mixed_server_traffic_routes_to_the_right_channels() {
    let mut h = harness();

    h.wiring.handle(ServerEvent::Transcription {
        text: "feeling kind of low today".into(),
        speaker: Speaker::User,
    });
    h.wiring.handle(wire_chunk(0.2));
    h.wiring.handle(ServerEvent::Transcription {
        text: "I hear you. Want a terrible pun?".into(),
        speaker: Speaker::Model,
    });
    h.wiring.handle(ServerEvent::TurnComplete);

    let user = h.transcripts.try_recv().unwrap();
    assert_eq!(user.speaker, Speaker::User);
    let model = h.transcripts.try_recv().unwrap();
    assert_eq!(model.speaker, Speaker::Model);
    assert!(model.seq > user.seq);

    // user speaking → model speaking → user done
    assert!(h.activity.try_recv().unwrap().user_speaking);
    assert!(h.activity.try_recv().unwrap().model_speaking);
    let after_turn = h.activity.try_recv().unwrap();
    assert!(!after_turn.user_speaking);
    assert!(after_turn.model_speaking, "model audio still draining");

    assert!(h.errors.try_recv().is_err(), "no errors on the happy path");
}

#[test]
fn zero_length_and_malformed_chunks_do_not_disturb_scheduling() {
    let mut h = harness();

    h.wiring.handle(wire_chunk(0.5));
    // Zero-length payload: decodes fine, schedules nothing
    h.wiring.handle(ServerEvent::Audio(MediaEnvelope {
        data: String::new(),
        mime_type: "audio/pcm;rate=24000".into(),
    }));
    // Malformed payload: dropped with a non-fatal error
    h.wiring.handle(ServerEvent::Audio(MediaEnvelope {
        data: "???".into(),
        mime_type: "audio/pcm;rate=24000".into(),
    }));

    assert_eq!(h.wiring.scheduler().active_len(), 1);
    assert!((h.wiring.scheduler().next_start() - 0.5).abs() < 1e-9);
    let err = h.errors.try_recv().expect("malformed chunk reported");
    assert!(!err.fatal);

    // The next good chunk continues the gapless schedule
    h.wiring.handle(wire_chunk(0.25));
    assert!((h.wiring.scheduler().next_start() - 0.75).abs() < 1e-9);
}

#[test]
fn teardown_then_late_chunk_is_silent_discard() {
    let mut h = harness();
    h.wiring.handle(wire_chunk(0.3));
    h.wiring.finish();

    h.wiring.handle(wire_chunk(0.3));
    assert!(h.wiring.scheduler().is_idle());
    assert!(h.shared.queue.lock().is_empty());
    // Teardown is idempotent
    h.wiring.finish();
}
