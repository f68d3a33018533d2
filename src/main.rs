//! usbloop - command line front end
//!
//! Runs duplex sessions against the simulated DAC/ADC loop, generates test
//! tones and measures clock drift in captured recordings.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::info;
use usbloop::analysis::{drift, tone};
use usbloop::config::AppConfig;
use usbloop::{sim, wav, Session};

/// Command-line arguments for usbloop
#[derive(Parser, Debug)]
#[command(name = "usbloop")]
#[command(about = "Full-duplex USB DAC/ADC streaming and loopback analysis")]
#[command(version)]
struct Args {
    /// Config file (default: <config_dir>/usbloop/config.json)
    #[arg(short, long, global = true, env = "USBLOOP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a WAV file through the simulated DAC and capture it from the simulated ADC
    Simulate {
        /// Mono 16-bit WAV file to play
        input: PathBuf,

        /// Capture output (default: capture_path from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON session report here
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Delay before each DAC request, emulating a full peripheral buffer
        #[arg(long, default_value = "0")]
        request_delay_ms: u64,
    },

    /// Measure the frequency and clock drift of a captured tone
    Analyze {
        /// Captured WAV file
        capture: PathBuf,

        /// Frequency the tone was generated at
        #[arg(short, long, conflicts_with = "reference")]
        nominal: Option<f64>,

        /// Played WAV file whose measured frequency is the reference
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Also print per-window estimates over this many periods
        #[arg(long)]
        window_periods: Option<usize>,

        /// Print the drift report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a mono 16-bit test tone
    Tone {
        /// Output WAV file
        output: PathBuf,

        /// Tone frequency in Hz
        #[arg(short, long, default_value = "1000")]
        frequency: f64,

        /// Sample rate in Hz
        #[arg(short, long, default_value = "48000")]
        rate: u32,

        /// Length in milliseconds
        #[arg(short, long, default_value = "1000")]
        duration_ms: u64,

        /// Peak amplitude relative to full scale
        #[arg(short, long, default_value = "0.8")]
        amplitude: f64,

        #[arg(long, value_enum, default_value = "sine")]
        shape: ShapeArg,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShapeArg {
    Sine,
    Square,
}

impl From<ShapeArg> for tone::Shape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Sine => tone::Shape::Sine,
            ShapeArg::Square => tone::Shape::Square,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging; stdout is kept for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("usbloop=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(AppConfig::path);
    let config = AppConfig::load_from(&config_path);

    match args.command {
        Command::Simulate {
            input,
            output,
            report,
            request_delay_ms,
        } => simulate(
            &config,
            input,
            output.unwrap_or_else(|| config.capture_path.clone()),
            report.or_else(|| config.report_path.clone()),
            Duration::from_millis(request_delay_ms),
        ),
        Command::Analyze {
            capture,
            nominal,
            reference,
            window_periods,
            json,
        } => analyze(capture, nominal, reference, window_periods, json),
        Command::Tone {
            output,
            frequency,
            rate,
            duration_ms,
            amplitude,
            shape,
        } => {
            if rate == 0 || frequency <= 0.0 {
                bail!("sample rate and frequency must be positive");
            }
            let buffer = tone::generate(
                shape.into(),
                rate,
                frequency,
                Duration::from_millis(duration_ms),
                amplitude,
            );
            wav::write_wav(&output, &buffer)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Wrote {} samples of {:?} at {} Hz to {}",
                buffer.len(),
                shape,
                frequency,
                output.display()
            );
            Ok(())
        }
        Command::Config { init } => {
            println!("Config file: {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            if init {
                config.save(&config_path)?;
                println!("Saved.");
            }
            Ok(())
        }
    }
}

fn simulate(
    config: &AppConfig,
    input: PathBuf,
    output: PathBuf,
    report: Option<PathBuf>,
    request_delay: Duration,
) -> Result<()> {
    let playback =
        wav::read_wav(&input).with_context(|| format!("reading {}", input.display()))?;
    info!(
        path = %input.display(),
        samples = playback.len(),
        sample_rate = playback.sample_rate(),
        duration_ms = playback.duration().as_millis() as u64,
        "Loaded playback file"
    );

    let (dac, adc) = sim::loopback(config.loop_capacity);
    let dac = dac.with_request_delay(request_delay);
    let overruns = dac.overruns();

    let outcome = Session::new(config.session.clone())
        .run(dac, adc, &playback)
        .context("duplex session failed")?;

    wav::write_wav(&output, &outcome.capture)
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Sent {} bytes in {} packets, captured {} samples in {} chunks ({} ms)",
        outcome.feed.bytes_sent,
        outcome.feed.packets_sent,
        outcome.capture_report.samples_captured,
        outcome.capture_report.chunks,
        outcome.elapsed.as_millis()
    );
    let dropped = overruns.load(Ordering::Relaxed);
    if dropped > 0 {
        println!("Warning: simulated loop dropped {} samples", dropped);
    }
    println!("Capture saved as {}", output.display());

    if let Some(path) = report {
        outcome.report().save(&path)?;
        println!("Report saved as {}", path.display());
    }
    Ok(())
}

fn analyze(
    capture_path: PathBuf,
    nominal: Option<f64>,
    reference: Option<PathBuf>,
    window_periods: Option<usize>,
    json: bool,
) -> Result<()> {
    let capture = wav::read_wav(&capture_path)
        .with_context(|| format!("reading {}", capture_path.display()))?;

    let has_reference = reference.is_some();
    let nominal = match reference {
        Some(path) => {
            let reference =
                wav::read_wav(&path).with_context(|| format!("reading {}", path.display()))?;
            let f = drift::estimate_frequency(reference.samples(), reference.sample_rate())
                .with_context(|| format!("no periodic signal in {}", path.display()))?;
            info!(path = %path.display(), frequency_hz = f, "Measured reference");
            Some(f)
        }
        None => nominal,
    };

    let Some(mut report) = drift::analyze(&capture, nominal) else {
        bail!("no periodic signal in {}", capture_path.display());
    };
    if has_reference {
        report = report.with_reference();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let label = if has_reference { "Reference" } else { "Nominal" };
        println!("{:<21}{:.6} Hz", format!("{} frequency:", label), report.nominal_hz);
        println!("Estimated frequency: {:.6} Hz", report.estimated_hz);
        println!("Clock skew:          {:.3} ppm", report.skew_ppm);
        match report.slip_period_secs {
            Some(secs) => println!("Slip period:         {:.3} s per cycle", secs),
            None => println!("Slip period:         none"),
        }
        if let Some(mismatch) = report.relative_mismatch {
            println!("Relative mismatch:   {:.3e}", mismatch);
        }
    }

    if let Some(periods) = window_periods {
        let freqs = drift::sliding_frequencies(
            capture.samples(),
            capture.sample_rate(),
            report.nominal_hz,
            periods,
            0.5,
        );
        for (i, f) in freqs.iter().enumerate() {
            println!("window {:>5}: {:.6} Hz", i, f);
        }
    }
    Ok(())
}
