use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;

use proof_of_image_provenance::{
    batch_commit, commit, export_compact, export_full, export_url, export_widget, import_compact,
    import_full, import_url, import_widget, redact, reveal, sign_root,
    verify_commitment_signature, BatchOptions, BatchOutcome, CancellationToken, ChainRegistry,
    CircuitEvaluator, CommitRequest, EvaluatorOptions, Hash32, HashBindingEvaluator, ImageData,
    KeyEncoding, ProofChain, ProvenanceError, ProvenanceResult, RedactionStyle, RegionDescriptor,
    SignatureEncoding, SignaturePackage, StrictnessPolicy, TileSet, TransformationDescriptor,
    VerificationOutcome, DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH,
};

#[derive(Parser)]
#[command(name = "imgprove", version, about = "Image provenance proof toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum SigEncodingArg {
    Der,
    RawFixed,
}

impl From<SigEncodingArg> for SignatureEncoding {
    fn from(arg: SigEncodingArg) -> Self {
        match arg {
            SigEncodingArg::Der => SignatureEncoding::Der,
            SigEncodingArg::RawFixed => SignatureEncoding::RawFixed,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyEncodingArg {
    Sec1Uncompressed,
    Sec1Compressed,
    WrappedDigest,
}

impl From<KeyEncodingArg> for KeyEncoding {
    fn from(arg: KeyEncodingArg) -> Self {
        match arg {
            KeyEncodingArg::Sec1Uncompressed => KeyEncoding::Sec1Uncompressed,
            KeyEncodingArg::Sec1Compressed => KeyEncoding::Sec1Compressed,
            KeyEncodingArg::WrappedDigest => KeyEncoding::WrappedDigest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Blackout,
    Checkerboard,
}

impl From<StyleArg> for RedactionStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Blackout => RedactionStyle::Blackout,
            StyleArg::Checkerboard => RedactionStyle::Checkerboard,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Full,
    Compact,
    Url,
    Widget,
}

/// Raw image file parameters shared by commands that read pixels
#[derive(clap::Args, Clone)]
struct ImageArgs {
    /// Raw pixel file (row-major, no header)
    image: PathBuf,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[arg(long, default_value_t = 1)]
    bytes_per_pixel: u32,
    #[arg(long, default_value_t = DEFAULT_TILE_WIDTH)]
    tile_width: u32,
    #[arg(long, default_value_t = DEFAULT_TILE_HEIGHT)]
    tile_height: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Commit to a raw image and print the commitment document
    Commit(ImageArgs),
    /// Generate a P-256 signing key
    Keygen {
        /// Where the hex-encoded secret scalar is written
        out: PathBuf,
    },
    /// Sign a commitment root with a generated key
    Sign {
        /// Key file produced by `keygen`
        key: PathBuf,
        /// Commitment root, 64 hex characters
        root: String,
        #[arg(long, value_enum, default_value_t = SigEncodingArg::Der)]
        signature_encoding: SigEncodingArg,
        #[arg(long, value_enum, default_value_t = KeyEncodingArg::Sec1Uncompressed)]
        key_encoding: KeyEncodingArg,
    },
    /// Verify a signature package against a commitment root
    VerifySignature {
        /// Signature package JSON file produced by `sign`
        package: PathBuf,
        /// Commitment root, 64 hex characters
        root: String,
        /// Accept packages that parse but cannot be cryptographically checked
        #[arg(long)]
        lenient: bool,
    },
    /// Build a reveal proof for one region of a committed image
    Reveal {
        #[command(flatten)]
        image: ImageArgs,
        /// Region as x,y,width,height in pixels
        #[arg(long)]
        region: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Redact regions of a committed image and emit the scope proof
    Redact {
        #[command(flatten)]
        image: ImageArgs,
        /// Region as x,y,width,height in pixels; repeatable
        #[arg(long = "region", required = true)]
        regions: Vec<String>,
        #[arg(long, value_enum, default_value_t = StyleArg::Blackout)]
        style: StyleArg,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Anchor a chain, extend it through the development evaluator, verify it
    ChainDemo {
        #[arg(long, default_value_t = 64)]
        width: u32,
        #[arg(long, default_value_t = 64)]
        height: u32,
        /// Transformation links to append
        #[arg(long, default_value_t = 3)]
        steps: u8,
    },
    /// Convert a full proof document into any export format
    Export {
        /// Full JSON proof document
        input: PathBuf,
        #[arg(long, value_enum)]
        format: FormatArg,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Base URL or template for the url format
        #[arg(long, default_value = "https://verify.example.com/p")]
        base_url: String,
    },
    /// Parse any export format and print the chain as a full document
    Import {
        input: PathBuf,
        #[arg(long, value_enum)]
        format: FormatArg,
    },
    /// Commit every raw image file in a directory
    BatchCommit {
        dir: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, default_value_t = 1)]
        bytes_per_pixel: u32,
        #[arg(long, default_value_t = DEFAULT_TILE_WIDTH)]
        tile_width: u32,
        #[arg(long, default_value_t = DEFAULT_TILE_HEIGHT)]
        tile_height: u32,
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(error) = run(cli.command) {
        eprintln!("error: {}", error);
        process::exit(error.exit_code());
    }
}

fn run(command: Command) -> ProvenanceResult<()> {
    match command {
        Command::Commit(args) => {
            let image = load_image(&args)?;
            let commitment = commit(&image, args.tile_width, args.tile_height)?;
            println!("{}", serde_json::to_string_pretty(&commitment)?);
            Ok(())
        }
        Command::Keygen { out } => {
            let key = SigningKey::random(&mut OsRng);
            fs::write(&out, hex::encode(key.to_bytes()))?;
            println!(
                "public key: {}",
                hex::encode(key.verifying_key().to_encoded_point(false).as_bytes())
            );
            info!("Wrote signing key to {}", out.display());
            Ok(())
        }
        Command::Sign {
            key,
            root,
            signature_encoding,
            key_encoding,
        } => {
            let key = load_signing_key(&key)?;
            let root = parse_root(&root)?;
            let package = sign_root(&key, &root, signature_encoding.into(), key_encoding.into());
            println!("{}", serde_json::to_string_pretty(&package)?);
            Ok(())
        }
        Command::VerifySignature {
            package,
            root,
            lenient,
        } => {
            let package: SignaturePackage = serde_json::from_str(&fs::read_to_string(package)?)?;
            let root = parse_root(&root)?;
            let outcome = verify_commitment_signature(&root, &package)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            let policy = if lenient {
                StrictnessPolicy::Lenient
            } else {
                StrictnessPolicy::Strict
            };
            if outcome.is_acceptable(policy) {
                Ok(())
            } else {
                let reason = match outcome {
                    VerificationOutcome::FormatValid { reason } => reason,
                    VerificationOutcome::VerificationFailed { reason } => reason,
                    VerificationOutcome::Verified => unreachable!("Verified is acceptable"),
                };
                Err(ProvenanceError::VerificationFailed { reason })
            }
        }
        Command::Reveal { image, region, out } => {
            let img = load_image(&image)?;
            let tile_set = TileSet::from_image(&img, image.tile_width, image.tile_height)?;
            let commitment = commit(&img, image.tile_width, image.tile_height)?;
            let region = parse_region(&region)?;
            let proof = reveal(&commitment, &tile_set, &region)?;
            write_output(out, serde_json::to_string_pretty(&proof)?)
        }
        Command::Redact {
            image,
            regions,
            style,
            out,
        } => {
            let img = load_image(&image)?;
            let tile_set = TileSet::from_image(&img, image.tile_width, image.tile_height)?;
            let commitment = commit(&img, image.tile_width, image.tile_height)?;
            let regions = regions
                .iter()
                .map(|r| parse_region(r))
                .collect::<ProvenanceResult<Vec<_>>>()?;
            let (proof, _) = redact(&commitment, &tile_set, &regions, style.into())?;
            eprintln!(
                "redacted root {}  ({} tiles altered)",
                hex::encode(proof.redacted_root),
                proof.touched.len()
            );
            write_output(out, serde_json::to_string_pretty(&proof)?)
        }
        Command::ChainDemo {
            width,
            height,
            steps,
        } => {
            let evaluator: Arc<dyn CircuitEvaluator> = Arc::new(HashBindingEvaluator);
            let registry = ChainRegistry::default();
            let genesis = commit(
                &gradient_image(width, height, 0)?,
                DEFAULT_TILE_WIDTH,
                DEFAULT_TILE_HEIGHT,
            )?;
            let chain_id = registry.anchor(&genesis);
            for salt in 1..=steps {
                let depth = registry.extend(
                    &chain_id,
                    TransformationDescriptor::Brightness { delta: salt as i16 },
                    &gradient_image(width, height, salt)?,
                    &evaluator,
                    EvaluatorOptions::default(),
                )?;
                println!("extended to depth {}", depth);
            }
            let valid = registry.verify(&chain_id, &evaluator, EvaluatorOptions::default())?;
            let snapshot = registry.mark_exported(&chain_id)?;
            println!("{}", export_full(&snapshot, None)?);
            if valid {
                Ok(())
            } else {
                Err(ProvenanceError::VerificationFailed {
                    reason: "demo chain failed verification".into(),
                })
            }
        }
        Command::Export {
            input,
            format,
            out,
            base_url,
        } => {
            let (chain, disclosures) = import_full(&fs::read_to_string(input)?)?;
            let disclosures = if disclosures.is_empty() {
                None
            } else {
                Some(disclosures.as_slice())
            };
            let bytes = match format {
                FormatArg::Full => export_full(&chain, disclosures)?.into_bytes(),
                FormatArg::Compact => export_compact(&chain)?,
                FormatArg::Url => export_url(&chain, &base_url)?.into_bytes(),
                FormatArg::Widget => export_widget(&chain, disclosures)?.into_bytes(),
            };
            match out {
                Some(path) => fs::write(path, bytes)?,
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
            Ok(())
        }
        Command::Import { input, format } => {
            let chain = match format {
                FormatArg::Full => import_full(&fs::read_to_string(input)?)?.0,
                FormatArg::Compact => import_compact(&fs::read(input)?)?,
                FormatArg::Url => import_url(fs::read_to_string(input)?.trim())?,
                FormatArg::Widget => import_widget(&fs::read_to_string(input)?)?.0,
            };
            print_chain_summary(&chain);
            println!("{}", export_full(&chain, None)?);
            Ok(())
        }
        Command::BatchCommit {
            dir,
            width,
            height,
            bytes_per_pixel,
            tile_width,
            tile_height,
            concurrency,
        } => {
            let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .collect();
            paths.sort();

            let mut requests = Vec::with_capacity(paths.len());
            for path in &paths {
                requests.push(CommitRequest {
                    image: ImageData::new(width, height, bytes_per_pixel, fs::read(path)?)?,
                    tile_width,
                    tile_height,
                });
            }

            let options = BatchOptions {
                concurrency,
                cancel: CancellationToken::new(),
            };
            let result = batch_commit(&requests, &options)?;
            for (path, outcome) in paths.iter().zip(&result.outcomes) {
                match outcome {
                    BatchOutcome::Succeeded(commitment) => {
                        println!("{}  {}", hex::encode(commitment.root), path.display());
                    }
                    BatchOutcome::Failed { error, .. } => {
                        println!("FAILED ({})  {}", error, path.display());
                    }
                }
            }
            let failed = result.failed();
            if failed > 0 {
                return Err(ProvenanceError::BatchItemFailed {
                    index: result
                        .outcomes
                        .iter()
                        .position(|o| !o.is_success())
                        .unwrap_or_default(),
                    reason: format!("{} of {} images failed", failed, result.len()),
                });
            }
            Ok(())
        }
    }
}

fn load_image(args: &ImageArgs) -> ProvenanceResult<ImageData> {
    let pixels = fs::read(&args.image)?;
    ImageData::new(args.width, args.height, args.bytes_per_pixel, pixels)
}

fn load_signing_key(path: &Path) -> ProvenanceResult<SigningKey> {
    let hex_str = fs::read_to_string(path)?;
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("key file hex: {}", e)))?;
    SigningKey::from_slice(&bytes)
        .map_err(|_| ProvenanceError::MalformedEncoding("not a valid P-256 scalar".into()))
}

/// Parse a CLI region argument of the form `x,y,width,height`
fn parse_region(arg: &str) -> ProvenanceResult<RegionDescriptor> {
    let parts: Vec<u32> = arg
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("region '{}': {}", arg, e)))?;
    match parts.as_slice() {
        [x, y, width, height] => RegionDescriptor::new(*x, *y, *width, *height),
        _ => Err(ProvenanceError::MalformedEncoding(format!(
            "region '{}' must be x,y,width,height",
            arg
        ))),
    }
}

fn write_output(out: Option<PathBuf>, content: String) -> ProvenanceResult<()> {
    match out {
        Some(path) => fs::write(path, content)?,
        None => println!("{}", content),
    }
    Ok(())
}

fn parse_root(hex_str: &str) -> ProvenanceResult<Hash32> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("root hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| ProvenanceError::MalformedEncoding("root must be 32 bytes".into()))
}

fn gradient_image(width: u32, height: u32, salt: u8) -> ProvenanceResult<ImageData> {
    let pixels: Vec<u8> = (0..width as usize * height as usize)
        .map(|i| (i % 251) as u8 ^ salt)
        .collect();
    ImageData::new(width, height, 1, pixels)
}

fn print_chain_summary(chain: &ProofChain) {
    eprintln!(
        "chain {}  genesis {}  depth {}",
        hex::encode(chain.chain_id),
        hex::encode(chain.genesis_root),
        chain.depth()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_argument() {
        let region = parse_region("16, 32, 64,128").unwrap();
        assert_eq!(region, RegionDescriptor::new(16, 32, 64, 128).unwrap());

        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("1,2,3,four").is_err());
        assert!(parse_region("1,2,0,4").is_err());
    }

    #[test]
    fn test_cli_parses_reveal_subcommand() {
        let cli = Cli::try_parse_from([
            "imgprove", "reveal", "photo.raw", "--width", "128", "--height", "96", "--region",
            "0,0,32,32",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Reveal { .. }));
    }

    #[test]
    fn test_cli_parses_redact_subcommand_with_repeated_regions() {
        let cli = Cli::try_parse_from([
            "imgprove",
            "redact",
            "photo.raw",
            "--width",
            "128",
            "--height",
            "96",
            "--region",
            "0,0,32,32",
            "--region",
            "64,0,32,32",
            "--style",
            "checkerboard",
        ])
        .unwrap();
        match cli.command {
            Command::Redact { regions, .. } => assert_eq!(regions.len(), 2),
            _ => panic!("expected redact subcommand"),
        }
    }

    #[test]
    fn test_redact_requires_a_region() {
        let result = Cli::try_parse_from([
            "imgprove", "redact", "photo.raw", "--width", "128", "--height", "96",
        ]);
        assert!(result.is_err());
    }
}
