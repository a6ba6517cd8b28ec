use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use papermine::analyze::{self, ImageAnalyzer, TextAnalyzer};
use papermine::capability::detector::DetectorBridge;
use papermine::capability::llm::CommandModel;
use papermine::capability::ocr::TesseractOcr;
use papermine::capability::parse_command;
use papermine::core::cancel::CancelFlag;
use papermine::core::fields::FieldRegistry;
use papermine::export::{AnswerReportExporter, FigureMetadataExporter};
use papermine::extract::{rasterizer, scan, text, ExtractorConfig, FigureExtractor};
use papermine::reconcile::{reconcile_all, RuleBasedReconciler};
use papermine::Extraction;

#[derive(Parser, Debug)]
#[command(name = "papermine")]
#[command(version, about = "Extract figures from ML paper PDFs and reconcile text/image answers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract figures, captions and full text from a PDF
    Extract {
        /// Input PDF file path
        input: PathBuf,

        /// Output directory (default: ./<input_name>_output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rendering DPI for page rasters
        #[arg(long, default_value_t = 200)]
        dpi: u32,

        /// Maximum pages processed concurrently
        #[arg(long, default_value_t = 4)]
        jobs: usize,

        /// Deadline in seconds for each external call
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,

        /// Detection bridge command, e.g. "python3 detect.py --weights w.onnx"
        #[arg(long)]
        detector_cmd: String,

        /// Tesseract language codes for the OCR path
        #[arg(long, default_value = "eng")]
        ocr_lang: String,
    },

    /// Extract, run text/image analysis, and reconcile final answers
    Analyze {
        /// Input PDF file path
        input: PathBuf,

        /// Output directory (default: ./<input_name>_output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 200)]
        dpi: u32,

        #[arg(long, default_value_t = 4)]
        jobs: usize,

        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,

        #[arg(long)]
        detector_cmd: String,

        #[arg(long, default_value = "eng")]
        ocr_lang: String,

        /// Language-model bridge command (prompt on stdin, answer on stdout)
        #[arg(long)]
        model_cmd: String,

        /// Vision-model bridge command (gets --image <path> per figure)
        #[arg(long)]
        vision_cmd: String,

        /// YAML field registry overriding the built-in table
        #[arg(long)]
        fields: Option<PathBuf>,

        /// Paper abstract to prepend to the analyzed text
        #[arg(long)]
        paper_abstract: Option<String>,
    },

    /// Show page count and scan verdict for a PDF
    Info {
        /// Input PDF file path
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n[!] Cancellation requested; letting in-flight pages finish...");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Extract {
            input,
            output,
            dpi,
            jobs,
            timeout_secs,
            detector_cmd,
            ocr_lang,
        } => {
            let extractor = build_extractor(dpi, jobs, timeout_secs, &detector_cmd, &ocr_lang)?;
            let output_dir = resolve_output(&input, output);
            let (extraction, _) = run_extract(&extractor, &input, &output_dir, &cancel).await?;
            println!(
                "\n[✓] Done! {} figure(s) saved to: {}",
                extraction.figures.len(),
                output_dir.display()
            );
            Ok(())
        }
        Commands::Analyze {
            input,
            output,
            dpi,
            jobs,
            timeout_secs,
            detector_cmd,
            ocr_lang,
            model_cmd,
            vision_cmd,
            fields,
            paper_abstract,
        } => {
            let extractor = build_extractor(dpi, jobs, timeout_secs, &detector_cmd, &ocr_lang)?;
            let output_dir = resolve_output(&input, output);
            let timeout = Duration::from_secs(timeout_secs);

            let registry = match fields {
                Some(path) => FieldRegistry::from_yaml(&path)
                    .with_context(|| format!("failed to load field registry: {}", path.display()))?,
                None => FieldRegistry::builtin(),
            };

            let (extraction, crop_paths) =
                run_extract(&extractor, &input, &output_dir, &cancel).await?;
            let image_paths: Vec<PathBuf> =
                crop_paths.into_iter().map(|(_, path)| path).collect();

            println!("[+] Analyzing text and images ({} questions)...", registry.len());

            let language_model = Arc::new(command_model(&model_cmd, timeout)?);
            let vision_model = Arc::new(command_model(&vision_cmd, timeout)?);

            let document_text =
                analyze::with_abstract(&extraction.full_text(), paper_abstract.as_deref());
            let pairs = analyze::analyze_document(
                Arc::new(TextAnalyzer::new(language_model.clone())),
                Arc::new(ImageAnalyzer::new(vision_model)),
                document_text,
                image_paths,
                registry.questions(),
                &cancel,
            )
            .await?;

            println!("[+] Reconciling answers...");
            let reconciler = RuleBasedReconciler::new(Some(language_model));
            let records = reconcile_all(&reconciler, &registry, &pairs);
            let report_path = AnswerReportExporter::new(output_dir.clone()).export(&records)?;

            let failed = records.iter().filter(|r| r.error.is_some()).count();
            println!(
                "\n[✓] Done! {} answer(s) ({} failed) written to: {}",
                records.len(),
                failed,
                report_path.display()
            );
            Ok(())
        }
        Commands::Info { input } => show_info(&input),
    }
}

fn build_extractor(
    dpi: u32,
    jobs: usize,
    timeout_secs: u64,
    detector_cmd: &str,
    ocr_lang: &str,
) -> Result<FigureExtractor> {
    let timeout = Duration::from_secs(timeout_secs);
    let (program, args) =
        parse_command(detector_cmd).context("empty --detector-cmd")?;
    let detector = Arc::new(DetectorBridge::new(program, args, timeout));
    let recognizer = Arc::new(TesseractOcr::new(ocr_lang, timeout));

    let config = ExtractorConfig {
        dpi,
        max_concurrent_pages: jobs,
        call_timeout: timeout,
        ..ExtractorConfig::default()
    };
    Ok(FigureExtractor::new(config, detector, recognizer))
}

fn command_model(spec: &str, timeout: Duration) -> Result<CommandModel> {
    let (program, args) = parse_command(spec).context("empty model bridge command")?;
    Ok(CommandModel::new(program, args, timeout))
}

fn resolve_output(input: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "paper".to_string());
        PathBuf::from(format!("{stem}_output"))
    })
}

async fn run_extract(
    extractor: &FigureExtractor,
    input: &Path,
    output_dir: &Path,
    cancel: &CancelFlag,
) -> Result<(Extraction, Vec<(u32, PathBuf)>)> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    if !input.is_file() {
        anyhow::bail!("Input is not a file: {}", input.display());
    }

    println!("[*] Processing: {}", input.display());
    println!("[*] Output: {}", output_dir.display());

    let extraction = extractor
        .extract(input, cancel)
        .await
        .with_context(|| format!("Failed to process PDF: {}", input.display()))?;

    for warning in &extraction.warnings {
        eprintln!("  [!] {warning}");
    }

    let exporter = FigureMetadataExporter::new(output_dir.to_path_buf());
    let crop_paths = exporter.save_crops(&extraction.figures)?;
    exporter.export(&extraction.records())?;
    std::fs::write(output_dir.join("extracted_text.txt"), extraction.full_text())
        .with_context(|| format!("Failed to write text to: {}", output_dir.display()))?;

    Ok((extraction, crop_paths))
}

fn show_info(input: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let page_count = rasterizer::page_count(input)
        .with_context(|| format!("Failed to open PDF: {}", input.display()))?;
    let lengths = text::sample_text_lengths(input, page_count, scan::SAMPLE_PAGES)?;
    let verdict = scan::classify(&lengths);

    println!("PDF Information");
    println!("===============");
    println!("File: {}", input.display());
    println!("Pages: {page_count}");
    println!("Verdict: {verdict:?}");

    Ok(())
}
