//! Wire codecs for the live audio stream.
//!
//! Two layers, both pure and stateless:
//!
//! - [`pcm`] — f32 samples ↔ little-endian 16-bit PCM bytes
//! - [`envelope`] — PCM bytes ↔ base64 text + MIME tag, as embedded in the
//!   JSON messages of the live session

pub mod envelope;
pub mod pcm;
