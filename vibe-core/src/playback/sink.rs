//! Device output via cpal.
//!
//! The render pump thread pulls sequential 24 kHz samples from the shared
//! [`RenderQueue`](super::RenderQueue), resamples them to the device rate, and
//! pushes them into a small SPSC ring. The device callback only does a
//! wait-free `pop_slice`, zero-fills on underrun, honors the purge flag, and
//! advances the frame counter that backs [`StreamClock`] — silence moves the
//! clock exactly like audio, matching a free-running output context.
//!
//! `cpal::Stream` is `!Send`, so the stream is opened on the pump thread and
//! dropped there when the sink shuts down. The ring is kept shallow on
//! purpose: audio already pushed past the queue keeps playing after an
//! interruption until the purge flag is honored, so ring depth bounds the
//! cutoff latency.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;
#[cfg(feature = "audio-cpal")]
use std::time::Duration;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info};

use super::{OutputClock, PlaybackShared};
#[cfg(feature = "audio-cpal")]
use crate::audio::resample::RateConverter;
#[cfg(feature = "audio-cpal")]
use crate::audio::ring::{
    create_playback_ring, Consumer, Observer, Producer, SampleConsumer, SampleProducer,
};
#[cfg(feature = "audio-cpal")]
use crate::codec::envelope::INBOUND_SAMPLE_RATE;
use crate::error::{Result, VibeError};

/// Input samples fed to the render resampler per iteration (20 ms at 24 kHz).
#[cfg(feature = "audio-cpal")]
const RENDER_CHUNK: usize = 480;

/// Pump sleep when the ring is topped up or the queue is dry.
#[cfg(feature = "audio-cpal")]
const PUMP_IDLE: Duration = Duration::from_millis(5);

/// Playback clock driven by frames the device callback has consumed.
#[derive(Clone)]
pub struct StreamClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl StreamClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }
}

impl OutputClock for StreamClock {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

/// Handle to the active output device and its render pump thread.
pub struct OutputSink {
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    /// Device output rate (Hz).
    pub sample_rate: u32,
    pump: Option<JoinHandle<()>>,
}

impl OutputSink {
    /// Open the default output device and start the render pump.
    ///
    /// Blocks until the device is confirmed open (or failed).
    ///
    /// # Errors
    /// `VibeError::NoDefaultOutputDevice` when no output device exists,
    /// `VibeError::AudioStream` when cpal fails to build or start the stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open(shared: PlaybackShared) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(AtomicU64::new(0));

        let running_pump = Arc::clone(&running);
        let frames_pump = Arc::clone(&frames);

        // Sync handshake: pump thread reports open success (device rate) or
        // failure back to open().
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let pump = std::thread::Builder::new()
            .name("vibe-playback".into())
            .spawn(move || {
                // Stream must be created (and dropped) on this thread.
                let (stream, device_rate, producer) =
                    match build_output_stream(&shared, Arc::clone(&frames_pump)) {
                        Ok(parts) => parts,
                        Err(e) => {
                            let _ = open_tx.send(Err(e));
                            return;
                        }
                    };

                let mut converter =
                    match RateConverter::new(INBOUND_SAMPLE_RATE, device_rate, RENDER_CHUNK) {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = open_tx.send(Err(e));
                            return;
                        }
                    };

                let _ = open_tx.send(Ok(device_rate));

                run_render_pump(&shared, &running_pump, &mut converter, producer, device_rate);

                // Stream drops here, releasing the output device.
                drop(stream);
            })
            .map_err(|e| VibeError::AudioStream(format!("spawn render pump: {e}")))?;

        match open_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Self {
                running,
                frames,
                sample_rate,
                pump: Some(pump),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(VibeError::AudioStream(
                "render pump died before reporting device state".into(),
            )),
        }
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub fn open(_shared: PlaybackShared) -> Result<Self> {
        Err(VibeError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    /// Clock tied to this device's playback position.
    pub fn clock(&self) -> StreamClock {
        StreamClock::new(Arc::clone(&self.frames), self.sample_rate)
    }

    /// Stop the pump and release the device. Idempotent.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.pump.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build and start the cpal output stream; the callback drains `ring_cons`.
#[cfg(feature = "audio-cpal")]
fn build_output_stream(
    shared: &PlaybackShared,
    frames: Arc<AtomicU64>,
) -> Result<(cpal::Stream, u32, SampleProducer)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(VibeError::NoDefaultOutputDevice)?;

    info!(
        device = device.name().unwrap_or_default().as_str(),
        "opening output device"
    );

    let supported = device
        .default_output_config()
        .map_err(|e| VibeError::AudioDevice(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config = supported.config();

    info!(sample_rate, channels, "playback config selected");

    // Consumer moves into the callback; the producer is returned to the pump.
    let (producer, consumer) = create_playback_ring();

    let purge = Arc::clone(&shared.purge);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let mut mono_buf: Vec<f32> = Vec::new();
            let mut cons: SampleConsumer = consumer;
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _info| {
                    if purge.swap(false, Ordering::AcqRel) {
                        cons.clear();
                    }
                    let out_frames = data.len() / channels;
                    mono_buf.resize(out_frames, 0.0);
                    let got = cons.pop_slice(&mut mono_buf);
                    mono_buf[got..].fill(0.0);
                    for (frame, &s) in data.chunks_mut(channels).zip(&mono_buf) {
                        frame.fill(s);
                    }
                    // Clock advances for silence exactly like audio.
                    frames.fetch_add(out_frames as u64, Ordering::Release);
                },
                |err| error!("playback stream error: {err}"),
                None,
            )
        }

        SampleFormat::I16 => {
            let mut mono_buf: Vec<f32> = Vec::new();
            let mut cons: SampleConsumer = consumer;
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _info| {
                    if purge.swap(false, Ordering::AcqRel) {
                        cons.clear();
                    }
                    let out_frames = data.len() / channels;
                    mono_buf.resize(out_frames, 0.0);
                    let got = cons.pop_slice(&mut mono_buf);
                    mono_buf[got..].fill(0.0);
                    for (frame, &s) in data.chunks_mut(channels).zip(&mono_buf) {
                        frame.fill((s * 32768.0).round() as i16);
                    }
                    frames.fetch_add(out_frames as u64, Ordering::Release);
                },
                |err| error!("playback stream error: {err}"),
                None,
            )
        }

        fmt => {
            return Err(VibeError::AudioStream(format!(
                "unsupported output sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| VibeError::AudioStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| VibeError::AudioStream(e.to_string()))?;

    Ok((stream, sample_rate, producer))
}

/// Feed the ring from the render queue until the sink shuts down.
#[cfg(feature = "audio-cpal")]
fn run_render_pump(
    shared: &PlaybackShared,
    running: &AtomicBool,
    converter: &mut RateConverter,
    mut producer: SampleProducer,
    device_rate: u32,
) {
    // ~125 ms of lead at the device rate; bounds both latency and the
    // amount of stale audio an interruption still has to purge.
    let target_fill = (device_rate as usize / 8).min(producer.capacity().get() / 2);

    let mut src = vec![0f32; RENDER_CHUNK];

    while running.load(Ordering::Acquire) {
        if producer.occupied_len() >= target_fill {
            std::thread::sleep(PUMP_IDLE);
            continue;
        }

        // Epoch is sampled before pulling; an interruption that lands while
        // we resample makes this batch stale and it is dropped un-played.
        let epoch = shared.epoch.load(Ordering::Acquire);
        let pulled = {
            let mut queue = shared.queue.lock();
            queue.pull(&mut src)
        };

        if pulled == 0 {
            std::thread::sleep(PUMP_IDLE);
            continue;
        }

        let rendered = converter.process(&src[..pulled]);
        if rendered.is_empty() {
            continue;
        }

        if shared.epoch.load(Ordering::Acquire) == epoch {
            let mut offset = 0;
            while offset < rendered.len() && running.load(Ordering::Acquire) {
                if shared.epoch.load(Ordering::Acquire) != epoch {
                    break;
                }
                offset += producer.push_slice(&rendered[offset..]);
                if offset < rendered.len() {
                    std::thread::sleep(PUMP_IDLE);
                }
            }
        }
    }
}
