//! Audio device output using cpal
//!
//! The device callback is the clock: every rendered buffer advances the
//! shared frame counter, so source start times are honored to the frame.
//! While suspended the callback writes silence and the counter holds.
//!
//! `cpal::Stream` is not `Send`; a `DeviceOutput` must stay on the thread
//! that created it.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

use super::mixer::SourceMixer;
use super::output::{AudioOutput, SourceHandle, SourceRequest};
use super::types::{frames_to_seconds, seconds_to_frames};
use crate::error::{Error, Result};

/// State shared with the audio callback
#[derive(Debug)]
struct Shared {
    mixer: SourceMixer,
    clock_frame: u64,
    suspended: bool,
}

/// Output to the system audio device
pub struct DeviceOutput {
    shared: Arc<Mutex<Shared>>,
    sample_rate: u32,
    _stream: Stream,
}

impl DeviceOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open a device and start its stream
    ///
    /// `device_name` of `None` uses the default device. A named device that
    /// cannot be found falls back to the default one.
    pub fn open(device_name: Option<&str>, preferred_rate: u32) -> Result<Self> {
        let device = Self::select_device(device_name)?;
        let (config, sample_format) = Self::get_best_config(&device, preferred_rate)?;
        let sample_rate = config.sample_rate.0;

        if sample_rate != preferred_rate {
            warn!(
                "Device does not offer {} Hz; rendering at {} Hz with nearest-frame lookup",
                preferred_rate, sample_rate
            );
        }
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            sample_rate, config.channels, sample_format
        );

        let shared = Arc::new(Mutex::new(Shared {
            mixer: SourceMixer::new(sample_rate),
            clock_frame: 0,
            suspended: false,
        }));

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream_f32(&device, &config, Arc::clone(&shared))?,
            SampleFormat::I16 => Self::build_stream_i16(&device, &config, Arc::clone(&shared))?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!("Audio stream started at {} Hz", sample_rate);
        Ok(Self {
            shared,
            sample_rate,
            _stream: stream,
        })
    }

    fn select_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    /// Prefer stereo f32 at the stream rate, else the device default
    fn get_best_config(device: &Device, rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported_configs.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= rate
                && config.max_sample_rate().0 >= rate
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(rate))
                .config();
            return Ok((config, sample_format));
        }

        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        Ok((supported_config.config(), sample_format))
    }

    /// Fill one device buffer: silence, then the mix, then advance the clock
    fn fill(shared: &Mutex<Shared>, data: &mut [f32], channels: usize) {
        data.fill(0.0);
        let Ok(mut shared) = shared.lock() else {
            return;
        };
        if shared.suspended {
            return;
        }
        let clock_frame = shared.clock_frame;
        shared.mixer.render(clock_frame, data, channels);
        for sample in data.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        let frames = (data.len() / channels.max(1)) as u64;
        shared.clock_frame += frames;
        let now = shared.clock_frame;
        shared.mixer.retire_finished(now);
    }

    fn build_stream_f32(
        device: &Device,
        config: &StreamConfig,
        shared: Arc<Mutex<Shared>>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    Self::fill(&shared, data, channels);
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_i16(
        device: &Device,
        config: &StreamConfig,
        shared: Arc<Mutex<Shared>>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    Self::fill(&shared, &mut scratch, channels);
                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = (sample * i16::MAX as f32) as i16;
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn with_shared<T>(&self, f: impl FnOnce(&mut Shared) -> T) -> Option<T> {
        match self.shared.lock() {
            Ok(mut shared) => Some(f(&mut shared)),
            Err(_) => {
                error!("Audio callback state poisoned");
                None
            }
        }
    }
}

impl AudioOutput for DeviceOutput {
    fn current_time(&self) -> f64 {
        let frame = self.with_shared(|s| s.clock_frame).unwrap_or(0);
        frames_to_seconds(frame, self.sample_rate)
    }

    fn suspend(&mut self) {
        self.with_shared(|s| s.suspended = true);
    }

    fn resume(&mut self) {
        self.with_shared(|s| s.suspended = false);
    }

    fn is_suspended(&self) -> bool {
        self.with_shared(|s| s.suspended).unwrap_or(true)
    }

    fn start_source(&mut self, request: SourceRequest) -> SourceHandle {
        debug!(
            "Device source at frame {}",
            seconds_to_frames(request.when, self.sample_rate)
        );
        self.with_shared(|s| s.mixer.add(request))
            .unwrap_or(SourceHandle(0))
    }

    fn stop_source(&mut self, handle: SourceHandle) {
        self.with_shared(|s| s.mixer.remove(handle));
    }
}
