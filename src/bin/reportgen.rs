//! CLI binary for reportgen.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReportConfig` / `RecordFilter` and writes the resulting files.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use reportgen::naming::archive_filename;
use reportgen::{
    fetch_sheet, missing_columns, parse_date, read_csv_file, write_output, FormKind, ProgressCallback,
    RecordFilter, RecordTable, ReportConfig, ReportGenerator, ReportOutput, ReportProgressCallback,
    SheetSource, Template,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const SHIFT_FIELD: &str = "Shift";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per finished record.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    skipped_images: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading template…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            skipped_images: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ReportProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_records: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} reports  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_records as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn on_record_start(&self, index: usize, _total: usize, filename: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_record_complete(&self, index: usize, total: usize, filename: &str, pdf_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index + 1,
            total,
            filename,
            dim(&format!("{:>7} bytes", pdf_len)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_record_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_image_skipped(&self, index: usize, url: &str, error: &str) {
        self.skipped_images.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} record {}: image skipped ({}) {}",
            yellow("⚠"),
            index + 1,
            error,
            dim(url),
        ));
    }

    fn on_batch_complete(&self, total_records: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped_images.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!("{} {} report(s) generated", green("✔"), bold(&total_records.to_string()));
        } else {
            eprintln!(
                "{} {} report(s) generated  ({} image(s) skipped)",
                yellow("⚠"),
                bold(&total_records.to_string()),
                yellow(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Which template placeholders match the sheet columns?
  reportgen placeholders --csv responses.csv client_template.docx

  # One PDF per visit in January, packaged as a ZIP
  reportgen client --csv responses.csv --from 2024-01-01 --to 2024-01-31 template.docx

  # Night-shift visits to one site, straight from the shared Google Sheet
  reportgen client --sheet-id 1AbC... --shift Night --site "4-311-DLF SCO-84" template.docx

  # Incident form, template downloaded from a URL
  reportgen client --form incident --gid 123456 https://example.com/incident.docx

  # Company audit report for a date range
  reportgen internal --csv responses.csv --from 2024-01-01 --to 2024-01-31 -o audit.pdf

  # List sites and shifts present in the data
  reportgen sites --csv responses.csv
  reportgen shifts --csv responses.csv

TEMPLATES:
  Write {Column Name} anywhere in a DOCX (body or table cells). Matching is
  exact first, then case-insensitive. {Images} (monitoring) and
  {EVIDENCE & ATTACHMENTS - Photos} (incident) are replaced by the photos
  linked in that column; unreachable images are skipped with a warning.

ENVIRONMENT VARIABLES:
  GOOGLE_SHEET_ID         Spreadsheet id (also read from .env)
  SHEET_GID               Sheet tab id (also read from .env)
  REPORTGEN_FORM          monitoring | incident
  REPORTGEN_SOFFICE       LibreOffice executable
  RUST_LOG                Override the log filter

SETUP:
  LibreOffice must be installed; `soffice --version` should work.
  The sheet must be shared as "Anyone with the link can view".
"#;

/// Generate PDF reports from form responses and DOCX templates.
#[derive(Parser, Debug)]
#[command(
    name = "reportgen",
    version,
    about = "Generate PDF reports from form responses and DOCX templates",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REPORTGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REPORTGEN_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "REPORTGEN_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which template placeholders match a data column.
    Placeholders {
        #[command(flatten)]
        source: SourceArgs,

        /// Local DOCX path or HTTP/HTTPS URL.
        template: String,

        /// Print the inspection as JSON.
        #[arg(long)]
        json: bool,
    },
    /// One PDF per record from a DOCX template (ZIP when more than one).
    Client {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        convert: ConvertArgs,

        /// Local DOCX path or HTTP/HTTPS URL.
        template: String,

        /// Output file or directory. Default: derived name in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// The fixed-layout internal report covering every filtered record.
    Internal {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        convert: ConvertArgs,

        /// Output file or directory. Default: derived name in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List distinct site names.
    Sites {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List distinct shifts.
    Shifts {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Form type: monitoring or incident.
    #[arg(long, env = "REPORTGEN_FORM", default_value = "monitoring")]
    form: FormKind,

    /// Read records from a local CSV export; takes precedence over --sheet-id.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Google Sheet id (the long token in the sheet URL).
    #[arg(long, env = "GOOGLE_SHEET_ID")]
    sheet_id: Option<String>,

    /// Sheet tab id.
    #[arg(long, env = "SHEET_GID", default_value = "0")]
    gid: String,

    /// Sheet and template download timeout in seconds.
    #[arg(long, env = "REPORTGEN_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// First date to include (YYYY-MM-DD).
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Only records of this shift ("All" for every shift).
    #[arg(long)]
    shift: Option<String>,

    /// Only records of this site ("All" for every site).
    #[arg(long)]
    site: Option<String>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// LibreOffice executable.
    #[arg(long, env = "REPORTGEN_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// Timeout for one DOCX → PDF conversion in seconds.
    #[arg(long, env = "REPORTGEN_CONVERSION_TIMEOUT", default_value_t = 120)]
    conversion_timeout: u64,

    /// Per-image download timeout in seconds.
    #[arg(long, env = "REPORTGEN_IMAGE_TIMEOUT", default_value_t = 10)]
    image_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for batch commands.
    let batch = matches!(cli.command, Command::Client { .. } | Command::Internal { .. });
    let show_progress = batch && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Placeholders {
            source,
            template,
            json,
        } => {
            let table = load_records(&source).await?;
            let template = Template::load(&template, source.download_timeout)
                .await
                .context("Failed to load template")?;
            let config = ReportConfig::builder()
                .form(source.form)
                .build()
                .context("Invalid configuration")?;
            let generator = ReportGenerator::from_config(config)?;
            let inspection = generator
                .inspect(&template, table.columns())
                .context("Failed to read template placeholders")?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&inspection)
                        .context("Failed to serialise inspection")?
                );
                return Ok(());
            }
            println!("Template:     {}", template.name());
            println!("Placeholders: {}", inspection.placeholders.len());
            for (placeholder, field) in &inspection.matches.matched {
                let kind = if inspection.image_placeholders.contains(placeholder) {
                    " (images)"
                } else {
                    ""
                };
                if placeholder == field {
                    println!("  {} {{{}}}{}", green("✓"), placeholder, dim(kind));
                } else {
                    println!("  {} {{{}}} → {}{}", green("✓"), placeholder, field, dim(kind));
                }
            }
            for placeholder in &inspection.matches.unmatched {
                println!("  {} {{{}}} {}", red("✗"), placeholder, dim("no matching column"));
            }
        }

        Command::Client {
            source,
            filter,
            convert,
            template,
            output,
        } => {
            let table = load_records(&source).await?;
            let table = apply_filter(&table, source.form, &filter)?;
            if table.is_empty() {
                bail!("No records match the selected filters");
            }
            let template = Template::load(&template, source.download_timeout)
                .await
                .context("Failed to load template")?;

            let progress = progress_callback(show_progress);
            let config = build_config(&source, &convert, progress)?;
            let generator = ReportGenerator::from_config(config)?;
            let result = generator
                .generate(&template, &table)
                .await
                .context("Report generation failed")?;

            let default_name = match &result {
                ReportOutput::Single(r) => r.filename.clone(),
                ReportOutput::Archive(_) => {
                    archive_filename(source.form, Local::now().naive_local())
                }
            };
            let path = output_path(output.as_deref(), &default_name);
            write_output(&path, result.bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            if !cli.quiet {
                eprintln!(
                    "{}  {} report(s)  {} bytes  →  {}",
                    green("✔"),
                    result.report_count(),
                    result.bytes().len(),
                    bold(&path.display().to_string()),
                );
            }
        }

        Command::Internal {
            source,
            filter,
            convert,
            output,
        } => {
            let table = load_records(&source).await?;
            let record_filter = record_filter(&filter)?;
            let table = apply_filter(&table, source.form, &filter)?;
            if table.is_empty() {
                bail!("No records match the selected filters");
            }

            let config = build_config(&source, &convert, None)?;
            let generator = ReportGenerator::from_config(config)?;
            let spinner = spinner(show_progress, table.len());
            let report = generator
                .generate_internal(&table, &record_filter, Local::now().naive_local())
                .await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }
            let report = report.context("Internal report generation failed")?;

            let path = output_path(output.as_deref(), &report.filename);
            write_output(&path, &report.pdf)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} record(s)  {} bytes  →  {}",
                    green("✔"),
                    report.record_count,
                    report.pdf.len(),
                    bold(&path.display().to_string()),
                );
            }
        }

        Command::Sites { source } => {
            let table = load_records(&source).await?;
            for site in table.unique_values("Site Name") {
                println!("{site}");
            }
        }

        Command::Shifts { source } => {
            let table = load_records(&source).await?;
            for shift in table.unique_values(SHIFT_FIELD) {
                println!("{shift}");
            }
        }
    }

    Ok(())
}

/// Read the record table from `--csv` or the configured Google Sheet.
async fn load_records(source: &SourceArgs) -> Result<RecordTable> {
    let table = if let Some(ref path) = source.csv {
        read_csv_file(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else if let Some(ref sheet_id) = source.sheet_id {
        fetch_sheet(&SheetSource::new(sheet_id, &source.gid), source.download_timeout)
            .await
            .context("Failed to load Google Sheet")?
    } else {
        bail!("No data source: pass --csv <file> or --sheet-id <id> (or set GOOGLE_SHEET_ID)");
    };
    missing_columns(&table, source.form);
    Ok(table)
}

fn record_filter(args: &FilterArgs) -> Result<RecordFilter> {
    let mut filter = RecordFilter::new();
    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        let start = parse_cli_date(from)?;
        let end = parse_cli_date(to)?;
        if start > end {
            bail!("Invalid date range: {from} is after {to}");
        }
        filter = filter.date_range(start, end);
    }
    if let Some(ref shift) = args.shift {
        filter = filter.shift(shift);
    }
    if let Some(ref site) = args.site {
        filter = filter.site(site);
    }
    Ok(filter)
}

fn apply_filter(table: &RecordTable, form: FormKind, args: &FilterArgs) -> Result<RecordTable> {
    let filtered = record_filter(args)?.apply(table, form.date_field(), SHIFT_FIELD, "Site Name");
    tracing::info!("{} of {} records selected", filtered.len(), table.len());
    Ok(filtered)
}

fn parse_cli_date(s: &str) -> Result<NaiveDate> {
    parse_date(s).with_context(|| format!("Invalid date '{s}' (expected YYYY-MM-DD)"))
}

/// Map CLI args to `ReportConfig`.
fn build_config(
    source: &SourceArgs,
    convert: &ConvertArgs,
    progress: Option<ProgressCallback>,
) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .form(source.form)
        .download_timeout_secs(source.download_timeout)
        .soffice_program(convert.soffice.clone())
        .conversion_timeout_secs(convert.conversion_timeout)
        .image_timeout_secs(convert.image_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn progress_callback(show: bool) -> Option<ProgressCallback> {
    show.then(|| CliProgressCallback::new() as Arc<dyn ReportProgressCallback>)
}

fn spinner(show: bool, records: usize) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_prefix("Building");
    bar.set_message(format!("internal report for {records} record(s)…"));
    bar.enable_steady_tick(Duration::from_millis(80));
    Some(bar)
}

/// `-o` as given, `-o <dir>/name` when it is a directory, else `name`.
fn output_path(output: Option<&Path>, default_name: &str) -> PathBuf {
    match output {
        Some(p) if p.is_dir() => p.join(default_name),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(default_name),
    }
}
