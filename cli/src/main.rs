//! StegoTriage CLI
//!
//! Hide payloads in PNG least-significant bits and triage images that may carry them.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use stegotriage_core::{
    create_registry, decode_container, encode_png, scan_path, Classification, Codec,
    EvidenceKind, Extraction, FileCodec, Framing, ScanConfig, SkillError, SkillRegistry,
    StegoError, StegoResult, VerdictRecord,
};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "stegotriage")]
#[command(author = "StegoTriage Team")]
#[command(version)]
#[command(
    about = "StegoTriage - LSB steganography codec and gated detection pipeline",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Scan configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hide a payload in a cover PNG
    Embed {
        /// Cover image
        cover: PathBuf,

        /// Output image
        output: PathBuf,

        /// Payload text
        #[arg(
            short,
            long,
            conflicts_with = "payload_file",
            required_unless_present = "payload_file"
        )]
        payload: Option<String>,

        /// Read the payload from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },

    /// Recover a hidden payload
    Extract {
        image: PathBuf,

        /// Write raw payload bytes here instead of printing them
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show how many payload bytes an image can hold
    Capacity { image: PathBuf },

    /// Triage a PNG file or a directory of PNGs
    Scan {
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// List available detection skills
    Skills,

    /// Export skill schemas for tool-calling clients
    Export {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn classification_color(classification: Classification) -> colored::ColoredString {
    match classification {
        Classification::Malicious => "MALICIOUS".red().bold(),
        Classification::Suspicious => "SUSPICIOUS".yellow().bold(),
        Classification::Indeterminate => "INDETERMINATE".blue(),
        Classification::Clean => "CLEAN".green(),
    }
}

fn load_config(path: Option<&Path>) -> StegoResult<ScanConfig> {
    let config = match path {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    debug!(?path, framing = ?config.framing, "configuration loaded");
    Ok(config)
}

/// Codec for the configured framing; length-prefixed embeds keep the file extension
fn load_codec(config: &ScanConfig, payload_file: Option<&Path>) -> StegoResult<Arc<dyn Codec>> {
    let codec: Arc<dyn Codec> = match (config.framing, payload_file) {
        (Framing::LengthPrefixed, Some(file)) => {
            let extension = file
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            Arc::new(FileCodec::with_extension(extension)?)
        }
        _ => config.build_codec()?,
    };
    debug!(codec = codec.name(), "codec ready");
    Ok(codec)
}

fn load_registry(config: &ScanConfig) -> StegoResult<SkillRegistry> {
    create_registry(config).map_err(|e| match e {
        SkillError::Scan(e) => e,
        SkillError::Io(e) => StegoError::Io(e),
        SkillError::Serialization(e) => StegoError::Serialization(e),
        SkillError::InvalidParams(reason) => StegoError::InvalidConfig(reason),
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> StegoResult<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Embed {
            cover,
            output,
            payload,
            payload_file,
        } => {
            let payload = match (payload, &payload_file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(file)) => fs::read(file)?,
                (None, None) => Vec::new(),
            };

            let codec = load_codec(&config, payload_file.as_deref())?;
            let (image, _) = decode_container(&fs::read(&cover)?)?;
            let stego = codec.embed(&image, &payload)?;
            fs::write(&output, encode_png(&stego)?)?;
            info!(
                codec = codec.name(),
                bytes = payload.len(),
                output = %output.display(),
                "payload embedded"
            );

            println!(
                "{} {} bytes into {} ({} bytes available)",
                "Embedded".green().bold(),
                payload.len(),
                output.display(),
                codec.max_payload_len(&image)
            );
        }

        Commands::Extract { image, out } => {
            let codec = load_codec(&config, None)?;
            let (buffer, _) = decode_container(&fs::read(&image)?)?;

            let extraction = codec.extract(&buffer)?;
            if let Extraction::Found(payload) = &extraction {
                info!(codec = codec.name(), bytes = payload.len(), "payload recovered");
            }

            match extraction {
                Extraction::Found(payload) => match out {
                    Some(path) => {
                        fs::write(&path, &payload)?;
                        println!("{} bytes written to {}", payload.len(), path.display());
                    }
                    None => println!("{}", String::from_utf8_lossy(&payload)),
                },
                Extraction::NotFound => println!("{}", "No hidden payload found".yellow()),
            }
        }

        Commands::Capacity { image } => {
            let codec = load_codec(&config, None)?;
            let (buffer, info) = decode_container(&fs::read(&image)?)?;

            println!("  Image:     {}", image.display().to_string().white().bold());
            println!(
                "  Geometry:  {}x{} with {} channels",
                info.width, info.height, info.channels
            );
            println!("  Bits:      {}", codec.capacity_bits(&buffer));
            println!(
                "  Payload:   {} bytes",
                codec.max_payload_len(&buffer).to_string().cyan().bold()
            );
        }

        Commands::Scan {
            path,
            format,
            recursive,
        } => {
            let verdicts = scan_path(&path, recursive, &config)?;
            info!(path = %path.display(), images = verdicts.len(), "scan finished");

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&verdicts)?);
            } else {
                print_verdicts(&verdicts);
            }
        }

        Commands::Skills => {
            let registry = load_registry(&config)?;

            println!();
            println!("{}", "Available Detection Skills:".green().bold());
            println!();

            for name in registry.list() {
                if let Some(skill) = registry.get(name) {
                    println!("  {} {}", "●".cyan(), name.white().bold());

                    if cli.verbose {
                        println!("    {}", skill.description().dimmed());
                        println!("    Categories: {:?}", skill.categories());
                        println!();
                    }
                }
            }

            if !cli.verbose {
                println!();
                println!("Use --verbose for detailed descriptions");
            }
        }

        Commands::Export { output } => {
            let json = serde_json::to_string_pretty(&load_registry(&config)?.export_schemas())?;

            match output {
                Some(path) => {
                    fs::write(&path, &json)?;
                    println!("Schemas exported to: {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn print_verdicts(verdicts: &[VerdictRecord]) {
    if verdicts.is_empty() {
        println!("{}", "No PNG images found".yellow());
        return;
    }

    for verdict in verdicts {
        let degraded = if verdict.is_degraded() {
            " (degraded)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  [{}] {}{}",
            classification_color(verdict.classification()),
            verdict.label().white().bold(),
            degraded
        );

        if let Some(score) = verdict.suspicion() {
            match &score.peak {
                Some(peak) => println!(
                    "    Suspicion: {} (deviation {:.2}, peak {} at bit {})",
                    score.level, score.deviation, peak.test, peak.window_offset
                ),
                None => println!("    Suspicion: {}", score.level),
            }
        }
        if let Some(payload) = verdict.payload() {
            println!(
                "    Payload: {} bytes, sha256 {}",
                payload.digest().len,
                payload.digest().sha256.dimmed()
            );
        }
        for m in verdict.matches() {
            println!("    Rule: {} (score {})", m.rule.red(), m.score);
        }
        for e in verdict.evidence() {
            if matches!(e.kind, EvidenceKind::Degraded | EvidenceKind::Rejected) {
                println!("    {}", e.detail.dimmed());
            }
        }
        println!();
    }

    let malicious = verdicts
        .iter()
        .filter(|v| v.classification() == Classification::Malicious)
        .count();
    let suspicious = verdicts
        .iter()
        .filter(|v| v.classification() == Classification::Suspicious)
        .count();

    if malicious > 0 || suspicious > 0 {
        println!(
            "{}",
            format!(
                "⚠ {} malicious, {} suspicious of {} scanned",
                malicious,
                suspicious,
                verdicts.len()
            )
            .red()
            .bold()
        );
    } else {
        println!("{}", format!("✓ {} images clean", verdicts.len()).green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stegotriage_core::PixelBuffer;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, json).unwrap();
        path
    }

    fn cover(width: usize, height: usize) -> PixelBuffer {
        let data = (0..width * height * 3).map(|i| (i * 31 % 251) as u8).collect();
        PixelBuffer::new(width, height, 3, 8, data).unwrap()
    }

    #[test]
    fn test_skills_and_export_load_config() {
        let dir = TempDir::new().unwrap();
        let missing_rules = dir.path().join("missing-rules.json");
        let config = write_config(
            &dir,
            &format!(r#"{{ "rules": {:?} }}"#, missing_rules.display().to_string()),
        );
        let config = config.to_str().unwrap();

        for command in ["skills", "export"] {
            let cli = Cli::try_parse_from(["stegotriage", "--config", config, command]).unwrap();
            assert!(matches!(run(cli), Err(StegoError::Io(_))), "{}", command);
        }

        let cli = Cli::try_parse_from(["stegotriage", "skills"]).unwrap();
        assert!(run(cli).is_ok());
    }

    #[test]
    fn test_registry_uses_configured_rules() {
        let dir = TempDir::new().unwrap();
        let rules = dir.path().join("rules.json");
        let config = ScanConfig {
            rules: Some(rules.clone()),
            ..ScanConfig::default()
        };

        fs::write(&rules, "[]").unwrap();
        let registry = load_registry(&config).unwrap();
        assert!(registry.get("detect_lsb_steganography").is_some());

        fs::write(
            &rules,
            r#"[{ "name": "loud", "description": "x", "score": 101, "patterns": ["a"] }]"#,
        )
        .unwrap();
        assert!(matches!(
            load_registry(&config),
            Err(StegoError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_length_prefixed_embed_keeps_extension() {
        let config = ScanConfig {
            framing: Framing::LengthPrefixed,
            ..ScanConfig::default()
        };
        let codec = load_codec(&config, Some(Path::new("drop/notes.txt"))).unwrap();
        assert_eq!(codec.name(), "lsb_length_prefixed");

        let stego = codec.embed(&cover(32, 32), b"line one<<END>>line two").unwrap();
        let file = FileCodec::new().extract_file(&stego).unwrap().unwrap();
        assert_eq!(file.extension, ".txt");
        assert_eq!(file.data, b"line one<<END>>line two".to_vec());

        assert_eq!(load_codec(&config, None).unwrap().name(), "lsb_length_prefixed");
        assert_eq!(
            load_codec(&ScanConfig::default(), None).unwrap().name(),
            "lsb_sequential"
        );
    }
}
