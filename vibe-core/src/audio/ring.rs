//! Lock-free SPSC ring buffers for audio samples.
//!
//! `ringbuf::HeapRb<f32>` provides wait-free `push_slice`/`pop_slice` safe to
//! call from real-time audio callbacks.

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half — held by the capture callback thread.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Consumer half — held by a worker thread.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// Capture ring capacity: 2^21 = 2 097 152 f32 samples ≈ 43.7 s at 48 kHz.
/// Enough slack for the outbound pump to stall on a slow send without the
/// capture callback dropping frames.
pub const CAPTURE_RING_CAPACITY: usize = 1 << 21;

/// Playback ring capacity: 2^14 = 16 384 samples ≈ 340 ms at 48 kHz.
/// Deliberately small — audio already pushed here keeps playing after an
/// interruption until the purge flag is honored, so depth bounds cutoff
/// latency.
pub const PLAYBACK_RING_CAPACITY: usize = 1 << 14;

/// Create the capture-side producer/consumer pair.
pub fn create_capture_ring() -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(CAPTURE_RING_CAPACITY).split()
}

/// Create the playback-side producer/consumer pair.
pub fn create_playback_ring() -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(PLAYBACK_RING_CAPACITY).split()
}
