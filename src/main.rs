use clap::{Parser, Subcommand};
use mail_archive::config::{self, ArchiveConfig};
use mail_archive::metadata::MetadataSchema;
use mail_archive::output;
use mail_archive::preview::PreviewService;
use mail_archive::render::{RenderedArchive, Renderer};
use mail_archive::repository::{self as repo, ArchiveRepository, StatusFilter};
use mail_archive::template::FsTemplateSource;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mail-archive")]
#[command(about = "Browse, validate and preview archived email campaigns")]
#[command(long_about = "\
Browse, validate and preview archived email campaigns

Your filesystem is the data source. Every campaign lives in a dated
directory holding its metadata, its template and its images.

Content structure:

  public/archives/
  ├── 2024/
  │   └── 12/
  │       └── 28-launch/
  │           ├── config.json      # subject, segmentId or audienceId, sentAt
  │           ├── mail.md          # template (or mail.html, mail.json)
  │           └── assets/          # images referenced as /mail-assets/NAME
  └── 2025/
      └── ...

Metadata (config.json):
  subject      non-empty string
  segmentId    UUID v4          \\ at least one; segmentId wins
  audienceId   aud_[A-Za-z0-9]+ /
  sentAt       timestamp string, or null while unsent

Run 'mail-archive gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Archive content root (overrides content_root in config.toml)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to config.toml
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Remote asset base URL for rendered previews
    #[arg(long, env = "MAIL_ARCHIVE_ASSET_BASE_URL", global = true)]
    asset_base_url: Option<String>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List archives with status, subject and recipient
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
        /// Only archives with this send status: all, sent or unsent
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Only archives whose subject contains this text (case-insensitive)
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one archive's metadata
    Show(ArchiveArgs),
    /// Render one archive to standalone HTML
    Render {
        #[command(flatten)]
        archive: ArchiveArgs,
        /// Write the HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate every archive and report the ones that would be skipped
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Path segments naming one archive.
#[derive(clap::Args, Clone)]
struct ArchiveArgs {
    /// Four-digit year, e.g. 2024
    year: String,
    /// Two-digit month, e.g. 12
    month: String,
    /// Day and slug, e.g. 28-launch
    dayed_slug: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = resolve_cli_config(&cli)?;
    let root = PathBuf::from(&config.content_root);
    let repository = ArchiveRepository::new(&root, Arc::new(MetadataSchema::new()))
        .with_order(config.listing.order);
    let renderer = Renderer::new(FsTemplateSource::new(&root, config.layout.clone()));
    let base = config.asset_base_url().map(str::to_string);
    let service = PreviewService::new(repository, renderer, base);

    match cli.command {
        Command::List {
            json,
            status,
            search,
        } => {
            let archives = repo::filter_archives(&service.list(), status, search.as_deref());
            if json {
                println!("{}", serde_json::to_string_pretty(&archives)?);
            } else {
                output::print_list_output(&archives);
            }
        }
        Command::Show(args) => {
            let archive = service
                .repository()
                .get_archive(&args.year, &args.month, &args.dayed_slug)
                .ok_or_else(|| not_found(&args))?;
            output::print_archive_detail(&archive);
        }
        Command::Render { archive: args, out } => {
            let preview = service
                .preview(&args.year, &args.month, &args.dayed_slug)
                .ok_or_else(|| not_found(&args))?;
            match preview.rendered {
                RenderedArchive::Html(html) => match out {
                    Some(path) => {
                        std::fs::write(&path, html)?;
                        println!("==> Rendered {} → {}", preview.archive.path, path.display());
                    }
                    None => print!("{html}"),
                },
                RenderedArchive::Error(message) => {
                    return Err(format!("{}: {message}", preview.archive.path).into());
                }
            }
        }
        Command::Check => {
            let root = service.repository().root();
            println!("==> Checking {}", root.display());
            let report = service.repository().scan()?;
            output::print_check_output(&report, root);
            if !report.skipped.is_empty() {
                return Err(format!("{} archive(s) skipped", report.skipped.len()).into());
            }
            println!("==> Archives are valid");
        }
        Command::GenConfig => unreachable!("handled before config is loaded"),
    }

    Ok(())
}

/// Load `config.toml`, then apply CLI and environment overrides.
fn resolve_cli_config(cli: &Cli) -> Result<ArchiveConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(root) = &cli.root {
        config.content_root = root.to_string_lossy().into_owned();
    }
    if let Some(base) = &cli.asset_base_url {
        config.asset_base_url = base.clone();
    }
    config.validate()?;
    Ok(config)
}

fn not_found(args: &ArchiveArgs) -> String {
    format!(
        "archive not found: {}/{}/{}",
        args.year, args.month, args.dayed_slug
    )
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mail_archive={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
