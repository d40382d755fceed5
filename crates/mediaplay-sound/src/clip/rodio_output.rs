//! Clip output on the system audio device using rodio
//!
//! The rodio `OutputStream` is not `Send` on every platform, so it lives on a
//! dedicated thread for as long as the [`RodioOutput`] exists; lines only use
//! the `Send` stream handle. Each line owns a monitor thread that reports
//! [`LineEvent::Stop`] when the sink drains.

use super::device::{ClipEventSink, ClipLine, ClipOutput, LineEvent};
use super::format::{AudioFormat, ClipMedia, Encoding};
use mediaplay_common::{PlaybackError, Result};
use parking_lot::{Condvar, Mutex};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a line checks whether its sink has drained.
const MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// [`ClipOutput`] backed by the default system audio device.
pub struct RodioOutput {
    handle: OutputStreamHandle,
    /// Dropping this sender lets the stream thread exit.
    _keepalive: mpsc::Sender<()>,
}

impl RodioOutput {
    /// Open the default audio device.
    pub fn new() -> Result<Self> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (keepalive, keepalive_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("mediaplay-audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = handle_tx.send(Ok(handle));
                    // Blocks until the owning RodioOutput is dropped.
                    let _ = keepalive_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| PlaybackError::DeviceUnavailable(format!("audio thread: {e}")))?;

        let handle = handle_rx
            .recv()
            .map_err(|_| PlaybackError::DeviceUnavailable("audio thread exited".into()))?
            .map_err(|e| {
                PlaybackError::DeviceUnavailable(format!("Failed to create audio stream: {e}"))
            })?;

        Ok(Self {
            handle,
            _keepalive: keepalive,
        })
    }
}

impl ClipOutput for RodioOutput {
    fn supports(&self, format: &AudioFormat) -> bool {
        format.encoding == Encoding::PcmSigned
            && !format.big_endian
            && matches!(format.sample_size_bits, 8 | 16 | 24 | 32)
            && format.channels > 0
            && format.sample_rate > 0
    }

    fn open(&self, media: ClipMedia, events: ClipEventSink) -> Result<Box<dyn ClipLine>> {
        let samples = to_i16(&media);
        let shared = Arc::new(LineShared {
            state: Mutex::new(LineState {
                sink: None,
                position_frame: 0,
                started_at: None,
                closed: false,
            }),
            wake: Condvar::new(),
            handle: self.handle.clone(),
            format: media.format,
            total_frames: media.frame_count(),
            samples,
        });

        let monitor = Arc::clone(&shared);
        thread::Builder::new()
            .name("mediaplay-clip-monitor".into())
            .spawn(move || run_monitor(monitor, events))
            .map_err(|e| PlaybackError::Device(format!("clip monitor thread: {e}")))?;

        Ok(Box::new(RodioLine { shared }))
    }
}

fn to_i16(media: &ClipMedia) -> Arc<[i16]> {
    let width = media.format.sample_bytes();
    media
        .data
        .chunks_exact(width)
        .map(|sample| match width {
            1 => i16::from(sample[0] as i8) << 8,
            // Keep the two most significant bytes.
            _ => i16::from_le_bytes([sample[width - 2], sample[width - 1]]),
        })
        .collect()
}

struct LineState {
    sink: Option<Sink>,
    /// Frame where the current (or next) run starts.
    position_frame: u64,
    started_at: Option<Instant>,
    closed: bool,
}

struct LineShared {
    state: Mutex<LineState>,
    wake: Condvar,
    handle: OutputStreamHandle,
    format: AudioFormat,
    total_frames: u64,
    samples: Arc<[i16]>,
}

impl LineShared {
    fn current_frame(&self, state: &LineState) -> u64 {
        match state.started_at {
            Some(started) => {
                let played = self
                    .format
                    .frames_at_micros(started.elapsed().as_micros() as u64);
                (state.position_frame + played).min(self.total_frames)
            }
            None => state.position_frame,
        }
    }

    fn start_sink(&self, state: &mut LineState) -> Result<()> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| PlaybackError::Device(format!("Failed to create audio sink: {e}")))?;
        let channels = usize::from(self.format.channels);
        let offset = (state.position_frame.min(self.total_frames) as usize) * channels;
        sink.append(SamplesBuffer::new(
            self.format.channels,
            self.format.sample_rate,
            self.samples[offset..].to_vec(),
        ));
        state.sink = Some(sink);
        state.started_at = Some(Instant::now());
        Ok(())
    }

    fn halt(&self, state: &mut LineState) {
        state.position_frame = self.current_frame(state);
        state.started_at = None;
        if let Some(sink) = state.sink.take() {
            sink.stop();
        }
    }
}

fn run_monitor(shared: Arc<LineShared>, events: ClipEventSink) {
    loop {
        let mut state = shared.state.lock();
        if state.closed {
            return;
        }
        let drained = state.started_at.is_some() && state.sink.as_ref().is_some_and(Sink::empty);
        if !drained {
            shared.wake.wait_for(&mut state, MONITOR_INTERVAL);
            continue;
        }

        state.sink = None;
        state.started_at = None;
        state.position_frame = shared.total_frames;
        drop(state);
        events.emit(LineEvent::Stop);
    }
}

struct RodioLine {
    shared: Arc<LineShared>,
}

impl ClipLine for RodioLine {
    fn start(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed || state.started_at.is_some() {
            return Ok(());
        }
        self.shared.start_sink(&mut state)?;
        self.shared.wake.notify_all();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.shared.halt(&mut state);
        Ok(())
    }

    fn set_position_micros(&mut self, micros: u64) -> Result<()> {
        let frame = self.shared.format.frames_at_micros(micros);
        self.set_frame_position(frame)
    }

    fn set_frame_position(&mut self, frame: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        let running = state.started_at.is_some();
        self.shared.halt(&mut state);
        state.position_frame = frame.min(self.shared.total_frames);
        if running {
            self.shared.start_sink(&mut state)?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.state.lock().started_at.is_some()
    }

    fn close(&mut self) {
        let mut state = self.shared.state.lock();
        self.shared.halt(&mut state);
        state.closed = true;
        drop(state);
        self.shared.wake.notify_all();
    }
}

impl Drop for RodioLine {
    fn drop(&mut self) {
        self.close();
    }
}
