//! Audio capture and shared sample plumbing.
//!
//! # Design constraints
//!
//! The cpal callbacks (input here, output in [`crate::playback::sink`]) run on
//! OS audio threads at elevated priority. They **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! Both directions satisfy that contract with lock-free SPSC ring buffers
//! whose `push_slice`/`pop_slice` are wait-free.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). Capture streams are therefore created and dropped on the same
//! blocking thread; the session arranges this via `spawn_blocking`.

pub mod capture;
pub mod frame;
pub mod resample;
pub mod ring;

pub use capture::MicCapture;
pub use frame::AudioFrame;
pub use resample::RateConverter;
