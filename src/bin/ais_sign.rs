//! Sign PDFs with AIS
//!
//! Signs every input file with one AIS request and writes
//! `<name>.signed.pdf` next to it.
//!
//! Usage:
//!   ais_sign --config ais.json contract.pdf
//!   ais_sign --config ais.json --sig-size 32768 --field Approval a.pdf b.pdf
//!
//! Set `RUST_LOG=debug` for request and placeholder details.

use pdf_ais::{AisClient, AisConfig, PdfBuilder, PdfOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

struct SignArgs {
    config: PathBuf,
    options: PdfOptions,
    inputs: Vec<PathBuf>,
}

impl SignArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut config = None;
        let mut options = PdfOptions::new();
        let mut inputs = Vec::new();

        let mut i = 1;
        while i < args.len() {
            let value = |i: usize| args.get(i + 1).cloned().ok_or_else(|| format!("{} needs a value", args[i]));
            match args[i].as_str() {
                "--config" | "-c" => {
                    config = Some(PathBuf::from(value(i)?));
                    i += 1;
                },
                "--sig-size" => {
                    let size = value(i)?;
                    options.sig_size = size.parse().map_err(|_| format!("invalid --sig-size {:?}", size))?;
                    i += 1;
                },
                "--field" => {
                    options.field_name = value(i)?;
                    i += 1;
                },
                "--reason" => {
                    options.reason = Some(value(i)?);
                    i += 1;
                },
                "--location" => {
                    options.location = Some(value(i)?);
                    i += 1;
                },
                "--help" | "-h" => return Err(String::new()),
                flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
                input => inputs.push(PathBuf::from(input)),
            }
            i += 1;
        }

        let config = config.ok_or("--config is required")?;
        if inputs.is_empty() {
            return Err("no input files".to_string());
        }
        Ok(Self {
            config,
            options,
            inputs,
        })
    }
}

fn signed_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    input.with_file_name(format!("{}.signed.pdf", stem))
}

fn run(args: SignArgs) -> pdf_ais::Result<()> {
    let config = AisConfig::from_json_file(&args.config)?;
    let client = AisClient::new(&config)?;

    let mut pdfs = args
        .inputs
        .iter()
        .map(|input| PdfBuilder::new().input_path(input).options(args.options.clone()).build())
        .collect::<pdf_ais::Result<Vec<_>>>()?;

    let outcome = client.sign_batch(&mut pdfs)?;
    println!("Signed {} document(s), request {}", outcome.documents, outcome.request_id);

    for (input, pdf) in args.inputs.iter().zip(pdfs) {
        let output = signed_path(input);
        let bytes = pdf.into_signed_bytes().unwrap_or_default();
        std::fs::write(&output, bytes)?;
        println!("  {} -> {}", input.display(), output.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match SignArgs::from_args() {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}", message);
            }
            eprintln!("Usage: ais_sign --config <ais.json> [--sig-size N] [--field NAME] [--reason TEXT] [--location TEXT] <file.pdf>...");
            return ExitCode::FAILURE;
        },
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
