use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use firscope::audio::{AudioPlayback, AudioSource, WavFileSource};
use firscope::config::FirscopeConfig;
use firscope::control::{ControlHandle, FilterState, ParameterChange};
use firscope::output::{OutputFormat, create_formatter};
use firscope::signal_processing::{FilterType, MagnitudeSpectrum};
use firscope::{FirProcessor, save_wav};

#[derive(Parser, Debug)]
#[command(name = "firscope")]
#[command(about = "Real-time FIR lowpass/highpass filter with response analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Cutoff frequency in Hz
    #[arg(long, global = true)]
    cutoff: Option<f32>,

    /// Filter type: lowpass, highpass
    #[arg(short = 't', long = "type", value_enum, global = true)]
    filter_type: Option<FilterType>,

    /// Number of FIR taps (odd)
    #[arg(long, global = true)]
    taps: Option<usize>,

    /// Disable output clipping
    #[arg(long, global = true)]
    no_clip: bool,

    /// Processing block size in frames
    #[arg(short = 'b', long, global = true)]
    block_size: Option<usize>,

    /// Filter state JSON to restore before running
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter a WAV file
    Filter {
        input: PathBuf,
        output: PathBuf,
    },
    /// Print the magnitude response of the filter
    Response {
        /// Output format: text, csv, json
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Sample rate in Hz
        #[arg(short = 'r', long)]
        sample_rate: Option<u32>,

        /// Transform size (power of two)
        #[arg(long)]
        fft_size: Option<usize>,
    },
    /// Print the filter coefficients
    Coefficients {
        /// Output format: text, csv, json
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Sample rate in Hz
        #[arg(short = 'r', long)]
        sample_rate: Option<u32>,
    },
    /// Play a WAV file through the filter; parameters are read from stdin
    Play { input: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match &cli.config {
        Some(path) => FirscopeConfig::from_toml_file(path)?,
        None => FirscopeConfig::default(),
    };
    apply_overrides(&mut config, &cli);

    match &cli.command {
        Command::Filter { input, output } => run_filter(config, &cli, input, output),
        Command::Response {
            format,
            sample_rate,
            fft_size,
        } => {
            if let Some(rate) = sample_rate {
                config.audio.sample_rate = *rate;
            }
            if let Some(size) = fft_size {
                config.analyzer.fft_size = *size;
            }
            run_response(config, &cli, *format)
        }
        Command::Coefficients {
            format,
            sample_rate,
        } => {
            if let Some(rate) = sample_rate {
                config.audio.sample_rate = *rate;
            }
            run_coefficients(config, &cli, *format)
        }
        Command::Play { input } => run_play(config, &cli, input),
    }
}

fn apply_overrides(config: &mut FirscopeConfig, cli: &Cli) {
    if let Some(cutoff) = cli.cutoff {
        config.filter.default_cutoff_hz = cutoff;
    }
    if let Some(filter_type) = cli.filter_type {
        config.filter.default_type = filter_type;
    }
    if let Some(taps) = cli.taps {
        config.filter.tap_count = taps;
        // Keep the analyzer large enough for longer filters
        if config.analyzer.fft_size < taps {
            config.analyzer.fft_size = taps.next_power_of_two();
        }
    }
    if cli.no_clip {
        config.filter.clip_output = false;
    }
    if let Some(block_size) = cli.block_size {
        config.audio.block_size = block_size;
    }
}

/// Build the processor and restore `--state` if given
fn build_processor(config: FirscopeConfig, cli: &Cli) -> anyhow::Result<FirProcessor> {
    let processor = FirProcessor::new(config)?;
    if let Some(path) = &cli.state {
        let state = load_state(path)?;
        processor.restore_state(state);
        processor.sync()?;
        log::info!(
            "Restored state: {} at {:.1} Hz",
            state.filter_type,
            state.cutoff_hz
        );
    }
    Ok(processor)
}

fn load_state(path: &Path) -> anyhow::Result<FilterState> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn save_state(path: &Path, state: &FilterState) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(state)?)?;
    Ok(())
}

fn run_filter(
    mut config: FirscopeConfig,
    cli: &Cli,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let mut source = WavFileSource::new(input, config.audio.block_size)?;
    config.audio.sample_rate = source.sample_rate();
    config.audio.channels = source.channels();

    let block_size = config.audio.block_size;
    let mut processor = build_processor(config, cli)?;
    let channels = source.channels() as usize;
    let mut engine = processor.prepare(source.sample_rate(), block_size, channels)?;

    let mut filtered = Vec::with_capacity(source.frames() * channels);
    let mut peak_in = 0.0f32;
    let mut peak_out = 0.0f32;

    while let Some(mut block) = source.next_buffer()? {
        peak_in = block.iter().fold(peak_in, |m, s| m.max(s.abs()));
        engine.process_interleaved(&mut block, channels);
        peak_out = block.iter().fold(peak_out, |m, s| m.max(s.abs()));
        filtered.extend_from_slice(&block);
    }

    save_wav(output, &filtered, source.sample_rate(), source.channels())?;

    let state = processor.state();
    log::info!(
        "Filtered {} frames ({} at {:.1} Hz): peak {:.3} -> {:.3}",
        source.frames(),
        state.filter_type,
        state.cutoff_hz,
        peak_in,
        peak_out
    );

    Ok(())
}

fn run_response(config: FirscopeConfig, cli: &Cli, format: OutputFormat) -> anyhow::Result<()> {
    let processor = build_processor(config, cli)?;
    let spectrum = processor.analyzer()?.analyze();
    let formatter = create_formatter(format);

    if let Some(header) = formatter.response_header() {
        println!("{}", header);
    }
    for point in spectrum.iter() {
        println!("{}", formatter.format_point(point));
    }

    Ok(())
}

fn run_coefficients(
    config: FirscopeConfig,
    cli: &Cli,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let processor = build_processor(config, cli)?;
    let coefficients = processor.coefficients();
    let formatter = create_formatter(format);

    if let Some(header) = formatter.taps_header() {
        println!("{}", header);
    }
    for (index, &tap) in coefficients.taps().iter().enumerate() {
        println!("{}", formatter.format_tap(index, tap));
    }

    Ok(())
}

fn run_play(mut config: FirscopeConfig, cli: &Cli, input: &Path) -> anyhow::Result<()> {
    let source = WavFileSource::new(input, config.audio.block_size)?;
    let sample_rate = source.sample_rate();
    let channels = source.channels();
    config.audio.sample_rate = sample_rate;
    config.audio.channels = channels;

    let block_size = config.audio.block_size;
    let refresh = Duration::from_secs_f32(1.0 / config.analyzer.refresh_hz);

    let mut processor = build_processor(config, cli)?;
    let engine = processor.prepare(sample_rate, block_size, channels as usize)?;
    let mut analyzer = processor.analyzer()?;

    println!("=== firscope ===");
    println!("Input: {} ({} Hz, {} channels)", input.display(), sample_rate, channels);
    println!("Commands: cutoff <hz> | type <lowpass|highpass> | save <file.json>");
    println!();

    let samples = Arc::new(source.into_samples());
    let playback = AudioPlayback::new(samples, channels, sample_rate, block_size, engine)?;

    let control = processor.control();
    std::thread::Builder::new()
        .name("firscope-stdin".into())
        .spawn(move || read_commands(control))?;

    while !playback.is_finished() {
        if let Some(spectrum) = analyzer.analyze_if_changed() {
            report_response(&processor.state(), &spectrum);
        }
        std::thread::sleep(refresh);
    }

    log::info!("Played {} of {} frames", playback.position(), playback.frames());
    Ok(())
}

fn read_commands(control: ControlHandle) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(path) = line.strip_prefix("save ") {
            match save_state(Path::new(path.trim()), &control.state()) {
                Ok(()) => println!("Saved state to {}", path.trim()),
                Err(e) => eprintln!("Could not save state: {}", e),
            }
            continue;
        }

        match line.parse::<ParameterChange>() {
            Ok(change) => {
                if !control.set_parameter(change) {
                    eprintln!("Ignored: {}", line);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn report_response(state: &FilterState, spectrum: &MagnitudeSpectrum) {
    let at_cutoff = spectrum
        .magnitude_at(state.cutoff_hz as f64)
        .unwrap_or(f64::NEG_INFINITY);
    println!(
        "{} {:>8.1} Hz  response at cutoff: {:>6.1} dB",
        state.filter_type, state.cutoff_hz, at_cutoff
    );
}
