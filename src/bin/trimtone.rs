use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use trimtone::{
    CancellationToken, DecodedAudio, ProgressCallback, ProgressInfo, TrimOptions, TrimtoneError,
};

const CLI_AFTER_HELP: &str = "Examples:\n  trimtone info song.mp3 --json\n  trimtone trim song.mp3 --out ringtone.m4a --start 0:30 --end 1:00 --progress\n  trimtone trim voice.m4a --out clip.wav --start 10 --end 25 --format wav\n  trimtone record memo.wav --seconds 15\n  trimtone completions zsh > _trimtone";

#[derive(Debug, Parser)]
#[command(
    name = "trimtone",
    version,
    about = "Trim audio files into ringtone-ready M4A or WAV clips",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// Cap the decoded sample buffer at this many MiB (longer inputs are
    /// truncated rather than exhausting memory).
    #[arg(long)]
    memory_limit_mb: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print audio metadata for a file (alias: probe).
    #[command(
        about = "Print audio metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  trimtone info song.mp3\n  trimtone info song.mp3 --json"
    )]
    Info {
        /// Input audio path.
        input: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Trim a time range out of an audio file.
    #[command(
        about = "Trim a range into an M4A or WAV file",
        after_help = "Examples:\n  trimtone trim song.mp3 --out ringtone.m4a --start 0:30 --end 1:00\n  trimtone trim song.mp3 --out clip.wav --start 75 --end 90 --format wav\n\nIf AAC encoding fails, the clip is re-saved as WAV next to the requested output."
    )]
    Trim {
        /// Input audio path.
        input: String,

        /// Output file path.
        #[arg(long)]
        out: PathBuf,

        /// Range start (seconds, mm:ss, or hh:mm:ss[.fff]).
        #[arg(long)]
        start: String,

        /// Range end (seconds, mm:ss, or hh:mm:ss[.fff]).
        #[arg(long)]
        end: String,

        /// Output format (m4a, wav). Defaults to the output extension.
        #[arg(long)]
        format: Option<String>,

        /// Do not fall back to WAV when AAC encoding fails.
        #[arg(long)]
        no_fallback: bool,
    },

    /// Record from the default input device.
    #[command(
        about = "Record mono 44.1 kHz audio and save it",
        after_help = "Examples:\n  trimtone record memo.wav --seconds 15\n  trimtone record memo.m4a --seconds 30"
    )]
    Record {
        /// Output file path (.wav or .m4a).
        out: PathBuf,

        /// How long to record, in seconds.
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Output container formats the CLI can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    M4a,
    Wav,
}

fn parse_output_format(value: &str) -> Option<OutputFormat> {
    match value.to_ascii_lowercase().as_str() {
        "m4a" | "mp4" | "aac" => Some(OutputFormat::M4a),
        "wav" | "wave" => Some(OutputFormat::Wav),
        _ => None,
    }
}

/// Parse `"75"`, `"1:15"`, or `"0:01:15.5"` into a [`Duration`].
fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = value.split(':').collect();
    let seconds = match parts.as_slice() {
        [seconds] => seconds.parse::<f64>()?,
        [minutes, seconds] => minutes.parse::<f64>()? * 60.0 + seconds.parse::<f64>()?,
        [hours, minutes, seconds] => {
            hours.parse::<f64>()? * 3600.0 + minutes.parse::<f64>()? * 60.0 + seconds.parse::<f64>()?
        }
        _ => return Err(format!("unsupported timecode: {value}").into()),
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("unsupported timecode: {value}").into());
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !overwrite {
        return Err(format!(
            "output file already exists: {} (use --overwrite)",
            path.display()
        )
        .into());
    }
    Ok(())
}

fn base_options(global: &GlobalOptions) -> TrimOptions {
    let mut options = TrimOptions::new();
    if let Some(limit_mb) = global.memory_limit_mb {
        options = options.with_memory_limit(limit_mb * (1 << 20));
    }
    options
}

/// Bridges library progress callbacks onto an indicatif bar.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::no_length();
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

fn decode_input(
    input: &str,
    global: &GlobalOptions,
) -> Result<DecodedAudio, Box<dyn std::error::Error>> {
    let mut options = base_options(global);
    let bar = if global.progress {
        let bar = Arc::new(BarProgress::new()?);
        options = options.with_progress(bar.clone());
        Some(bar)
    } else {
        None
    };
    let audio = trimtone::decode_file(input, &options)?;
    if let Some(bar) = bar {
        bar.finish();
    }
    Ok(audio)
}

/// Save one trimmed range, removing the partial file when encoding fails.
fn save_clip(
    audio: &DecodedAudio,
    format: OutputFormat,
    out: &Path,
    start: Duration,
    end: Duration,
    options: &TrimOptions,
) -> Result<(), TrimtoneError> {
    let result = match format {
        OutputFormat::M4a => audio.save_m4a(out, start, end, options),
        OutputFormat::Wav => audio.save_wav(out, start, end, options),
    };
    if result.is_err() {
        // An aborted encode leaves an invalid file behind.
        let _ = fs::remove_file(out);
    }
    result
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.global.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    let _ = logger.try_init();

    match cli.command {
        Commands::Info { input, json } => {
            let audio = decode_input(&input, &cli.global)?;
            if json {
                let payload = json!({
                    "format": audio.source_format(),
                    "sample_rate": audio.sample_rate(),
                    "channels": audio.channels(),
                    "samples_per_channel": audio.num_samples(),
                    "duration_seconds": audio.duration().as_secs_f64(),
                    "avg_bitrate_kbps": audio.avg_bitrate_kbps(),
                    "frames": audio.num_frames(),
                    "file_size": audio.file_size(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", audio.source_format().unwrap_or("unknown"));
                println!("Duration: {:?}", audio.duration());
                println!(
                    "Audio: {} Hz, {} ch, {} samples/channel",
                    audio.sample_rate(),
                    audio.channels(),
                    audio.num_samples(),
                );
                println!("Average bitrate: {} kbps", audio.avg_bitrate_kbps());
            }
        }
        Commands::Trim {
            input,
            out,
            start,
            end,
            format,
            no_fallback,
        } => {
            let start = parse_timecode(&start)?;
            let end = parse_timecode(&end)?;
            if start >= end {
                return Err("--start must be < --end".into());
            }

            let format = match format {
                Some(value) => {
                    parse_output_format(&value).ok_or("Unsupported --format (m4a|wav)")?
                }
                None => out
                    .extension()
                    .and_then(|extension| extension.to_str())
                    .and_then(parse_output_format)
                    .ok_or("Cannot infer format from output extension; pass --format")?,
            };

            ensure_writable_path(&out, cli.global.overwrite)?;
            let audio = decode_input(&input, &cli.global)?;
            let options = base_options(&cli.global);

            match save_clip(&audio, format, &out, start, end, &options) {
                Ok(()) => {
                    println!("{} {}", "saved".green().bold(), out.display());
                }
                Err(error)
                    if format == OutputFormat::M4a
                        && !no_fallback
                        && matches!(
                            error,
                            TrimtoneError::EncodeError(_) | TrimtoneError::HeaderSynthesis(_)
                        ) =>
                {
                    // AAC encoding is the fragile step; the same range as
                    // WAV always works.
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("AAC encoding failed ({error}); saving as WAV instead").yellow()
                    );
                    let wav_out = out.with_extension("wav");
                    ensure_writable_path(&wav_out, cli.global.overwrite)?;
                    save_clip(&audio, OutputFormat::Wav, &wav_out, start, end, &options)?;
                    println!("{} {}", "saved".green().bold(), wav_out.display());
                }
                Err(error) => return Err(error.into()),
            }
        }
        Commands::Record { out, seconds } => {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err("--seconds must be positive".into());
            }
            let format = out
                .extension()
                .and_then(|extension| extension.to_str())
                .and_then(parse_output_format)
                .ok_or("Cannot infer format from output extension (.wav or .m4a)")?;
            ensure_writable_path(&out, cli.global.overwrite)?;

            let token = CancellationToken::new();
            let stopper = token.clone();
            let timer = thread::spawn(move || {
                thread::sleep(Duration::from_secs_f64(seconds));
                stopper.cancel();
            });

            eprintln!("{} {seconds} s from the default input device", "recording".cyan().bold());
            let options = base_options(&cli.global).with_cancellation(token);
            let clip = trimtone::record(&options)?;
            let _ = timer.join();

            let write_options = base_options(&cli.global);
            save_clip(&clip, format, &out, Duration::ZERO, clip.duration(), &write_options)?;
            println!(
                "{} {} ({:.1} s)",
                "saved".green().bold(),
                out.display(),
                clip.duration().as_secs_f64()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "trimtone", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputFormat, parse_output_format, parse_timecode};

    #[test]
    fn parse_output_format_aliases() {
        assert_eq!(parse_output_format("m4a"), Some(OutputFormat::M4a));
        assert_eq!(parse_output_format("WAV"), Some(OutputFormat::Wav));
        assert_eq!(parse_output_format("aac"), Some(OutputFormat::M4a));
        assert_eq!(parse_output_format("flac"), None);
    }

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("1:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("0:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_secs(), 75);
    }

    #[test]
    fn parse_timecode_rejects_negative() {
        assert!(parse_timecode("-5").is_err());
    }
}
