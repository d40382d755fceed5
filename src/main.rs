//! mediaplay demo
//!
//! Walks a named frame group on a manual clock, then plays two sequenced
//! sounds that compete for the one software sequencer.

use std::env;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use mediaplay::prelude::*;
use mediaplay::sound::{ClipEventSink, ClipLine, ClipOutput, LineEvent, SequencerDevice};

struct Options {
    config: Option<String>,
    ticks: u32,
    show_help: bool,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut options = Options {
        config: None,
        ticks: 8,
        show_help: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => options.show_help = true,
            "--config" => {
                options.config = Some(args.next().context("--config requires a path")?);
            }
            "--ticks" => {
                let value = args.next().context("--ticks requires a number")?;
                options.ticks = value
                    .parse()
                    .with_context(|| format!("invalid tick count: {value}"))?;
            }
            _ => bail!("unknown argument: {arg}"),
        }
    }
    Ok(options)
}

fn print_help() {
    println!("Usage: mediaplay-demo [--config <file.json>] [--ticks <n>]");
    println!();
    println!("  --config <file>  Playback defaults (JSON)");
    println!("  --ticks <n>      Animation ticks to run (default: 8)");
}

// ============================================================================
// Animation
// ============================================================================

struct EndPrinter;

impl SequenceWatcher<NamedFrameSource<&'static str>> for EndPrinter {
    fn sequence_ended(&self, seq: &AnimationSequencer<NamedFrameSource<&'static str>>) {
        println!("  walk ended at frame {}", seq.current_index());
    }

    fn sequence_looped(&self, _: &AnimationSequencer<NamedFrameSource<&'static str>>) {
        println!("  walk looped");
    }
}

fn run_animation(config: &PlaybackConfig, ticks: u32) -> anyhow::Result<()> {
    let mut library = FrameLibrary::with_config(config.animation);
    library.insert_group(
        "walker",
        NamedFrameSource::from_named([
            ("idle", "o"),
            ("walk1", "o/"),
            ("walk2", "o|"),
            ("walk3", "o\\"),
        ])?,
    )?;
    let group = library
        .group("walker")?
        .context("walker is registered as a group")?;

    let clock = ManualClock::new();
    let period = i64::try_from(config.animation.tick_period_ms).unwrap_or(i64::MAX);
    let walk = GroupSequencer::with_clock(group, period, clock.clone());
    walk.set_repeating(config.animation.repeating);
    let printer: Arc<dyn SequenceWatcher<NamedFrameSource<&'static str>>> = Arc::new(EndPrinter);
    walk.add_watcher(&printer);

    walk.set_current_by_name("walk1")?;
    walk.start();
    println!("Animation ({} ms per frame):", walk.period_ms());
    for tick in 0..ticks {
        clock.fire_period();
        println!(
            "  tick {tick}: {:<6} {}",
            walk.current_name().unwrap_or("-"),
            walk.current_frame().copied().unwrap_or("")
        );
        if walk.is_stopped() {
            break;
        }
    }
    walk.destroy();
    Ok(())
}

// ============================================================================
// Sound
// ============================================================================

/// Clip output that discards audio and reports the end after the clip's
/// playing time.
struct SilentOutput;

struct SilentLine {
    events: ClipEventSink,
    duration: Duration,
    running: bool,
}

impl ClipLine for SilentLine {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        let events = self.events.clone();
        let duration = self.duration;
        thread::spawn(move || {
            thread::sleep(duration);
            events.emit(LineEvent::Stop);
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }

    fn set_position_micros(&mut self, _: u64) -> Result<()> {
        Ok(())
    }

    fn set_frame_position(&mut self, _: u64) -> Result<()> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn close(&mut self) {}
}

impl ClipOutput for SilentOutput {
    fn supports(&self, _: &AudioFormat) -> bool {
        true
    }

    fn open(&self, media: ClipMedia, events: ClipEventSink) -> Result<Box<dyn ClipLine>> {
        Ok(Box::new(SilentLine {
            events,
            duration: Duration::from_micros(media.duration_micros()),
            running: false,
        }))
    }
}

#[cfg(feature = "streaming")]
fn clip_output() -> Arc<dyn ClipOutput> {
    match mediaplay::sound::RodioOutput::new() {
        Ok(output) => Arc::new(output),
        Err(err) => {
            log::warn!("falling back to silent clip output: {err}");
            Arc::new(SilentOutput)
        }
    }
}

#[cfg(not(feature = "streaming"))]
fn clip_output() -> Arc<dyn ClipOutput> {
    Arc::new(SilentOutput)
}

struct EndSignal(mpsc::Sender<PlayerId>);

impl SoundWatcher for EndSignal {
    fn sequence_ended(&self, player: &dyn SoundPlayer) {
        let _ = self.0.send(player.id());
    }

    fn sequence_looped(&self, player: &dyn SoundPlayer) {
        log::info!("{} looped", player.id());
    }
}

fn sine_clip(sample_rate: u32, millis: u32) -> ClipMedia {
    let frames = sample_rate * millis / 1_000;
    let data = (0..frames)
        .flat_map(|n| {
            let phase = n as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32;
            ((phase.sin() * 8_000.0) as i16).to_le_bytes()
        })
        .collect();
    ClipMedia::new(AudioFormat::pcm_signed(sample_rate, 16, 1), data)
}

fn run_sound(config: &PlaybackConfig) -> anyhow::Result<()> {
    let mut library = SoundLibrary::new(clip_output(), || {
        Ok(Box::new(ClockedSequencer::new()) as Box<dyn SequencerDevice>)
    })
    .with_config(config.sound);

    let beep = library.clip("beep", sine_clip(22_050, 200))?;
    // 2 beats and 1 beat at 120 bpm.
    let theme = library.sequenced("theme", SequenceData::new(96, 96 * 2, Vec::new()))?;
    let jingle = library.sequenced("jingle", SequenceData::new(96, 96, Vec::new()))?;
    theme.set_looping(false);
    jingle.set_looping(false);

    let (tx, rx) = mpsc::channel();
    let signal: Arc<dyn SoundWatcher> = Arc::new(EndSignal(tx));
    theme.add_watcher(&signal);
    jingle.add_watcher(&signal);

    println!("Sound ({} registered):", library.names().join(", "));
    beep.play()?;
    println!("  beep: {}", beep.state());

    theme.play()?;
    jingle.play()?;
    println!("  theme: {}, jingle: {} (sequencer busy)", theme.state(), jingle.state());

    let ended = rx
        .recv_timeout(Duration::from_secs(5))
        .context("theme never reached end of track")?;
    println!("  {ended} ended; theme is {}", theme.state());

    theme.stop()?;
    jingle.play()?;
    println!("  jingle: {}", jingle.state());
    let ended = rx
        .recv_timeout(Duration::from_secs(5))
        .context("jingle never reached end of track")?;
    println!("  {ended} ended");

    library.close();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let options = parse_args()?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    let config = match &options.config {
        Some(path) => PlaybackConfig::load(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => PlaybackConfig::default(),
    };
    log::debug!("using {config:?}");

    run_animation(&config, options.ticks)?;
    println!();
    run_sound(&config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
