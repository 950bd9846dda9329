use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use crate::engine::EngineError;

pub const OUTPUT_SAMPLE_RATE: u32 = 48000;
pub const OUTPUT_CHANNELS: u16 = 2;

// =============================================================================
// DEVICE SELECTION
// =============================================================================

#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub struct AudioDeviceManager {
    host: Host,
}

impl AudioDeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn devices(&self) -> Result<Vec<AudioDeviceInfo>, EngineError> {
        let default_device_name = self.host.default_output_device()
            .and_then(|device| device.name().ok());

        let devices = self.host.output_devices()
            .map_err(|e| EngineError::AudioOutput(format!("Failed to enumerate output devices: {}", e)))?;

        let mut found = Vec::new();
        for device in devices {
            match device.name() {
                Ok(name) => {
                    let is_default = default_device_name.as_ref() == Some(&name);
                    log::debug!("Found audio device: {} (default: {})", name, is_default);
                    found.push(AudioDeviceInfo { name, is_default });
                }
                Err(e) => {
                    log::warn!("Failed to get device name: {}", e);
                }
            }
        }
        Ok(found)
    }

    /// Named device if present, otherwise the default one.
    pub fn device(&self, name: Option<&str>) -> Result<Device, EngineError> {
        if let Some(name) = name {
            let devices = self.host.output_devices()
                .map_err(|e| EngineError::AudioOutput(format!("Failed to enumerate output devices: {}", e)))?;

            for device in devices {
                if device.name().map(|n| n == name).unwrap_or(false) {
                    log::debug!("Using audio device: {}", name);
                    return Ok(device);
                }
            }
            log::warn!("Audio device '{}' not found, falling back to default", name);
        }

        self.host.default_output_device()
            .ok_or_else(|| EngineError::AudioOutput("No default audio output device available".to_string()))
    }
}

impl Default for AudioDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SAMPLE RING BUFFER
// =============================================================================

/// Interleaved f32 samples handed from the decoder reader to the sink.
pub struct AudioRingBuffer {
    samples: Vec<f32>,
    read_pos: usize,
    write_pos: usize,
    capacity: usize,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            read_pos: 0,
            write_pos: 0,
            capacity,
        }
    }

    /// Two seconds of output-format audio.
    pub fn with_default_capacity() -> Self {
        Self::new(OUTPUT_SAMPLE_RATE as usize * OUTPUT_CHANNELS as usize * 2)
    }

    /// Writes as much as fits and returns how many samples were taken.
    pub fn write(&mut self, data: &[f32]) -> usize {
        let mut written = 0;
        for &sample in data {
            let next_write = (self.write_pos + 1) % self.capacity;
            if next_write == self.read_pos {
                break;
            }
            self.samples[self.write_pos] = sample;
            self.write_pos = next_write;
            written += 1;
        }
        written
    }

    pub fn read(&mut self) -> Option<f32> {
        if self.read_pos == self.write_pos {
            return None;
        }
        let sample = self.samples[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.capacity;
        Some(sample)
    }

    pub fn available(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.capacity - self.read_pos + self.write_pos
        }
    }
}

/// Endless rodio source over the ring buffer; plays silence on underrun and
/// ends once `stop_flag` is raised.
struct StreamingAudioSource {
    buffer: Arc<Mutex<AudioRingBuffer>>,
    stop_flag: Arc<AtomicBool>,
}

impl Iterator for StreamingAudioSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop_flag.load(Ordering::Relaxed) {
            return None;
        }

        match self.buffer.lock() {
            Ok(mut buffer) => buffer.read().or(Some(0.0)),
            Err(_) => Some(0.0),
        }
    }
}

impl Source for StreamingAudioSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        OUTPUT_SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// An open output stream. Not `Send`: lives on the pipeline thread.
pub struct AudioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioOutput {
    pub fn open(device_name: Option<&str>) -> Result<Self, EngineError> {
        let manager = AudioDeviceManager::new();
        if log::log_enabled!(log::Level::Debug) {
            if let Err(e) = manager.devices() {
                log::debug!("{}", e);
            }
        }

        let (stream, handle) = match manager.device(device_name) {
            Ok(device) => OutputStream::try_from_device(&device),
            Err(e) => {
                log::warn!("{}, trying rodio default", e);
                OutputStream::try_default()
            }
        }
        .map_err(|e| EngineError::AudioOutput(format!("Failed to open output stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Starts a sink that plays whatever lands in `buffer` until `stop_flag` is set.
    pub fn play(&self, buffer: Arc<Mutex<AudioRingBuffer>>, stop_flag: Arc<AtomicBool>) -> Result<Sink, EngineError> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| EngineError::AudioOutput(format!("Failed to create sink: {}", e)))?;
        sink.append(StreamingAudioSource { buffer, stop_flag });
        sink.play();
        Ok(sink)
    }
}
