//! Microphone capture via cpal.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    audio::ring::{Producer, SampleProducer},
    error::{Result, VibeError},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active microphone stream.
///
/// **Not `Send`** — `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Create and drop this type on the same OS thread.
pub struct MicCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag — set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

/// Downmix an interleaved frame block to mono into `mono_buf`.
#[cfg(feature = "audio-cpal")]
fn mix_to_mono(data: &[f32], channels: usize, mono_buf: &mut Vec<f32>) {
    let frames = data.len() / channels;
    mono_buf.resize(frames, 0.0);
    for f in 0..frames {
        let base = f * channels;
        let sum: f32 = data[base..base + channels].iter().sum();
        mono_buf[f] = sum / channels as f32;
    }
}

impl MicCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available one.
    ///
    /// Captured audio is mixed down to mono f32 and pushed into `producer`
    /// from the real-time callback (wait-free, allocation-free).
    ///
    /// # Errors
    /// `VibeError::NoDefaultInputDevice` when no microphone exists,
    /// `VibeError::AudioStream` when cpal fails to build or start the stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open(
        mut producer: SampleProducer,
        running: Arc<AtomicBool>,
        preferred_device: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let mut selected = None;
        if let Some(name) = preferred_device {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected =
                        devices.find(|d| d.name().map(|n| n == name).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{name}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices: {e}"),
            }
        }

        let device = if let Some(device) = selected {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| VibeError::AudioDevice(e.to_string()))?;
            devices.next().ok_or(VibeError::NoDefaultInputDevice)?
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| VibeError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        info!(sample_rate, channels, "capture config selected");

        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let flag = Arc::clone(&running);
        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let mut mono_buf: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if !flag.load(Ordering::Relaxed) {
                            return;
                        }
                        let written = if channels == 1 {
                            producer.push_slice(data)
                        } else {
                            mix_to_mono(data, channels, &mut mono_buf);
                            producer.push_slice(&mono_buf)
                        };
                        let frames = data.len() / channels;
                        if written < frames {
                            warn!("capture ring full: dropped {} frames", frames - written);
                        }
                    },
                    |err| error!("capture stream error: {err}"),
                    None,
                )
            }

            SampleFormat::I16 => {
                let mut float_buf: Vec<f32> = Vec::new();
                let mut mono_buf: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if !flag.load(Ordering::Relaxed) {
                            return;
                        }
                        float_buf.resize(data.len(), 0.0);
                        for (dst, &src) in float_buf.iter_mut().zip(data) {
                            *dst = src as f32 / 32768.0;
                        }
                        let written = if channels == 1 {
                            producer.push_slice(&float_buf)
                        } else {
                            mix_to_mono(&float_buf, channels, &mut mono_buf);
                            producer.push_slice(&mono_buf)
                        };
                        let frames = data.len() / channels;
                        if written < frames {
                            warn!("capture ring full: dropped {} frames", frames - written);
                        }
                    },
                    |err| error!("capture stream error: {err}"),
                    None,
                )
            }

            fmt => {
                return Err(VibeError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| VibeError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| VibeError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl MicCapture {
    pub fn open(
        _producer: SampleProducer,
        _running: Arc<AtomicBool>,
        _preferred_device: Option<&str>,
    ) -> Result<Self> {
        Err(VibeError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
