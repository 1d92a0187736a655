//! Gapless playback scheduling for inbound audio chunks.
//!
//! ## Algorithm (per chunk, in delivery order)
//!
//! ```text
//! 1. start = max(next_start, clock.now())
//! 2. append samples to the render queue (played strictly sequentially)
//! 3. next_start = start + chunk.duration
//! 4. register an active source ending at next_start
//! ```
//!
//! Chunks may arrive faster than real time (they queue behind `next_start`)
//! or after a stall (`clock.now()` has moved past `next_start`, so the chunk
//! starts immediately — never in the past). Interruption stops every active
//! source, clears the queue, and resets the clock bookkeeping to zero.
//!
//! All scheduler state is owned by one instance, constructed per session and
//! discarded on teardown. The scheduler is driven from a single task; the
//! render side reads the shared queue under a short-lived mutex and
//! re-validates the epoch marker before committing samples, so an in-flight
//! render that loses a race with `interrupt()` is dropped instead of played.

pub mod sink;

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::frame::AudioFrame;

/// Monotonically increasing playback clock, in seconds.
///
/// The production implementation is driven by frames actually consumed by the
/// output device callback; tests advance a manual clock.
pub trait OutputClock: Send {
    fn now(&self) -> f64;
}

/// Sequential sample queue shared between the scheduler and the render pump.
///
/// Starts are strictly ordered and gapless, so the renderer never needs
/// timestamps — it plays segments back-to-back and goes silent when empty.
#[derive(Default)]
pub struct RenderQueue {
    segments: VecDeque<Vec<f32>>,
    /// Read offset into the front segment.
    front_read: usize,
}

impl RenderQueue {
    pub fn push(&mut self, samples: Vec<f32>) {
        if !samples.is_empty() {
            self.segments.push_back(samples);
        }
    }

    /// Copy up to `out.len()` queued samples into `out`, returning how many
    /// were written. No silence is synthesized here — a shortfall means the
    /// queue ran dry, and the device callback zero-fills on underrun. That
    /// keeps a momentary dry spell from injecting padding between two chunks
    /// of one continuous utterance.
    pub fn pull(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;
        while written < out.len() {
            let Some(front) = self.segments.front() else { break };
            let available = &front[self.front_read..];
            let n = available.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&available[..n]);
            written += n;
            self.front_read += n;
            if self.front_read >= front.len() {
                self.segments.pop_front();
                self.front_read = 0;
            }
        }
        written
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.front_read = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Handles shared between the scheduler, the render pump, and the device
/// callback.
#[derive(Clone)]
pub struct PlaybackShared {
    pub queue: Arc<Mutex<RenderQueue>>,
    /// Bumped on interruption/teardown; the render pump re-checks it before
    /// committing samples it pulled earlier.
    pub epoch: Arc<AtomicU64>,
    /// Tells the device callback to drop whatever is already ring-buffered.
    pub purge: Arc<AtomicBool>,
}

impl PlaybackShared {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(RenderQueue::default())),
            epoch: Arc::new(AtomicU64::new(0)),
            purge: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for PlaybackShared {
    fn default() -> Self {
        Self::new()
    }
}

/// A scheduled-or-playing source, tracked until natural completion or a
/// forced stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSource {
    pub id: u64,
    pub start: f64,
    pub end: f64,
}

/// Per-session playback scheduler.
pub struct PlaybackScheduler<C: OutputClock> {
    clock: C,
    shared: PlaybackShared,
    /// Earliest time the next chunk may begin playing. Non-decreasing while
    /// the session is live; reset to zero only by interruption or teardown.
    next_start: f64,
    active: VecDeque<ActiveSource>,
    next_source_id: u64,
    finished: bool,
}

impl<C: OutputClock> PlaybackScheduler<C> {
    pub fn new(clock: C, shared: PlaybackShared) -> Self {
        Self {
            clock,
            shared,
            next_start: 0.0,
            active: VecDeque::new(),
            next_source_id: 0,
            finished: false,
        }
    }

    /// Schedule one decoded chunk for playback. Returns its start time, or
    /// `None` when nothing was scheduled (empty buffer, or torn down).
    pub fn enqueue(&mut self, frame: AudioFrame) -> Option<f64> {
        if self.finished {
            debug!("discarding chunk scheduled after teardown");
            return None;
        }
        if frame.is_empty() {
            // Zero-duration buffer: nothing to play, clock untouched.
            return None;
        }

        let duration = frame.duration_secs();
        let start = self.next_start.max(self.clock.now());

        self.shared.queue.lock().push(frame.samples);
        self.next_start = start + duration;

        let id = self.next_source_id;
        self.next_source_id += 1;
        self.active.push_back(ActiveSource {
            id,
            start,
            end: start + duration,
        });

        Some(start)
    }

    /// Retire sources whose scheduled end has passed.
    ///
    /// Returns `true` when the active set just transitioned to empty — the
    /// moment the model stopped speaking.
    pub fn reap(&mut self) -> bool {
        if self.active.is_empty() {
            return false;
        }
        let now = self.clock.now();
        while matches!(self.active.front(), Some(src) if src.end <= now) {
            self.active.pop_front();
        }
        self.active.is_empty()
    }

    /// Forcibly stop every scheduled-or-playing source and reset the clock
    /// bookkeeping. Idempotent — a second call against an empty set is a
    /// no-op.
    pub fn interrupt(&mut self) {
        self.shared.queue.lock().clear();
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.shared.purge.store(true, Ordering::Release);
        if !self.active.is_empty() {
            debug!(stopped = self.active.len(), "interrupted active playback");
        }
        self.active.clear();
        self.next_start = 0.0;
    }

    /// Teardown: interrupt and refuse all further scheduling. Chunks that
    /// arrive later are discarded silently.
    pub fn finish(&mut self) {
        self.interrupt();
        self.finished = true;
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    /// Test clock advanced by hand, in microseconds for atomic storage.
    #[derive(Clone, Default)]
    struct ManualClock(Arc<AtomicU64>);

    impl ManualClock {
        fn advance_to(&self, secs: f64) {
            self.0.store((secs * 1e6) as u64, Ordering::SeqCst);
        }
    }

    impl OutputClock for ManualClock {
        fn now(&self) -> f64 {
            self.0.load(Ordering::SeqCst) as f64 / 1e6
        }
    }

    fn chunk(duration_secs: f64) -> AudioFrame {
        let samples = (duration_secs * 24_000.0).round() as usize;
        AudioFrame::new(vec![0.1; samples], 24_000)
    }

    fn scheduler() -> (PlaybackScheduler<ManualClock>, ManualClock, PlaybackShared) {
        let clock = ManualClock::default();
        let shared = PlaybackShared::new();
        (
            PlaybackScheduler::new(clock.clone(), shared.clone()),
            clock,
            shared,
        )
    }

    #[test]
    fn back_to_back_chunks_schedule_gapless() {
        let (mut sched, _clock, _) = scheduler();
        // Three chunks of 0.5 s, 0.3 s, 0.4 s delivered in a burst at t=0
        assert_eq!(sched.enqueue(chunk(0.5)), Some(0.0));
        assert_eq!(sched.enqueue(chunk(0.3)), Some(0.5));
        assert_eq!(sched.enqueue(chunk(0.4)), Some(0.8));
        assert!((sched.next_start() - 1.2).abs() < 1e-9);
        assert_eq!(sched.active_len(), 3);
    }

    #[test]
    fn start_times_are_monotone_under_bursts() {
        let (mut sched, clock, _) = scheduler();
        let mut last = f64::NEG_INFINITY;
        for (i, d) in [0.2, 0.1, 0.3, 0.05, 0.25].into_iter().enumerate() {
            clock.advance_to(i as f64 * 0.01);
            let start = sched.enqueue(chunk(d)).unwrap();
            assert!(start >= last, "start {start} regressed below {last}");
            last = start + d;
        }
    }

    #[test]
    fn late_chunk_catches_up_to_the_live_clock() {
        let (mut sched, clock, _) = scheduler();
        assert_eq!(sched.enqueue(chunk(0.5)), Some(0.0));
        // Real-time gap longer than everything buffered
        clock.advance_to(2.0);
        assert_eq!(sched.enqueue(chunk(0.3)), Some(2.0));
        assert!((sched.next_start() - 2.3).abs() < 1e-9);
    }

    #[test]
    fn interruption_clears_sources_and_resets_clock() {
        let (mut sched, clock, shared) = scheduler();
        sched.enqueue(chunk(0.5));
        sched.enqueue(chunk(0.5));
        assert_eq!(sched.active_len(), 2);

        sched.interrupt();

        assert!(sched.is_idle());
        assert_eq!(sched.next_start(), 0.0);
        assert!(shared.queue.lock().is_empty());
        assert!(shared.purge.load(Ordering::Acquire));

        // A chunk arriving after resumption starts at the live clock, not a
        // leftover offset.
        clock.advance_to(0.6);
        assert_eq!(sched.enqueue(chunk(0.2)), Some(0.6));
    }

    #[test]
    fn interruption_between_chunks_reschedules_from_now() {
        let (mut sched, clock, _) = scheduler();
        // Chunk 1 scheduled at 0.0 for 0.5 s, then interruption before
        // chunk 2 arrives at t=0.6.
        sched.enqueue(chunk(0.5));
        sched.interrupt();
        clock.advance_to(0.6);
        assert_eq!(sched.enqueue(chunk(0.4)), Some(0.6), "not 0.5");
    }

    #[test]
    fn double_interrupt_is_idempotent() {
        let (mut sched, _clock, shared) = scheduler();
        sched.enqueue(chunk(0.5));
        sched.interrupt();
        let epoch_after_first = shared.epoch.load(Ordering::Acquire);
        sched.interrupt();
        assert!(sched.is_idle());
        assert_eq!(sched.next_start(), 0.0);
        assert!(shared.epoch.load(Ordering::Acquire) > epoch_after_first);
    }

    #[test]
    fn zero_length_chunk_leaves_state_untouched() {
        let (mut sched, _clock, _) = scheduler();
        sched.enqueue(chunk(0.5));
        let before = sched.next_start();
        assert_eq!(sched.enqueue(AudioFrame::new(vec![], 24_000)), None);
        assert_eq!(sched.next_start(), before);
        assert_eq!(sched.active_len(), 1);
    }

    #[test]
    fn chunks_after_finish_are_discarded() {
        let (mut sched, _clock, shared) = scheduler();
        sched.enqueue(chunk(0.5));
        sched.finish();
        assert_eq!(sched.enqueue(chunk(0.3)), None);
        assert!(shared.queue.lock().is_empty());
        assert_eq!(sched.next_start(), 0.0);
        // Finishing twice must not fail either
        sched.finish();
        assert!(sched.is_idle());
    }

    #[test]
    fn reap_reports_the_transition_to_idle() {
        let (mut sched, clock, _) = scheduler();
        sched.enqueue(chunk(0.5));
        sched.enqueue(chunk(0.3));

        clock.advance_to(0.4);
        assert!(!sched.reap(), "first source still playing");
        assert_eq!(sched.active_len(), 2);

        clock.advance_to(0.6);
        assert!(!sched.reap(), "second source still playing");
        assert_eq!(sched.active_len(), 1);

        clock.advance_to(0.81);
        assert!(sched.reap(), "all sources finished");
        assert!(sched.is_idle());

        // Reaping an already-empty set reports no transition
        assert!(!sched.reap());
    }

    #[test]
    fn render_queue_pull_crosses_segment_boundaries() {
        let mut queue = RenderQueue::default();
        queue.push(vec![1.0, 2.0, 3.0]);
        queue.push(vec![4.0, 5.0]);

        let mut out = [0.0f32; 4];
        assert_eq!(queue.pull(&mut out), 4);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        // Shortfall: only the one remaining sample is written
        let mut out = [9.0f32; 4];
        assert_eq!(queue.pull(&mut out), 1);
        assert_eq!(out[0], 5.0);
        assert!(queue.is_empty());
    }
}
