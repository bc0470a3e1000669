use cardgen::batch::{run_batch, BatchOptions};
use cardgen::cdp::CdpSession;
use cardgen::content::CardPaths;
use cardgen::{CardConfig, ImageFormat};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate social card images for blog articles", long_about = None)]
struct Args {
    #[arg(long = "skipImage", help = "Do not capture any card image")]
    skip_image: bool,
    #[arg(long = "skipPostUpdate", help = "Do not add card paths to article front matter")]
    skip_post_update: bool,
    #[arg(long, help = "Regenerate cards that already exist")]
    force: bool,

    #[arg(long, default_value = "data/blog", help = "Directory holding the articles")]
    content_dir: PathBuf,
    #[arg(long, default_value = "public", help = "Root of the statically served site")]
    public_dir: PathBuf,
    #[arg(long, default_value = "static/images/twitter-cards", help = "Card directory inside the public dir")]
    cards_dir: String,
    #[arg(
        long,
        env = "CARDGEN_BASE_URL",
        default_value = "http://localhost:3000/blog",
        help = "URL articles are served under"
    )]
    base_url: String,
    #[arg(long, default_value = "png", help = "Card image format (png, jpeg, webp)")]
    format: ImageFormat,
    #[arg(long, help = "Articles processed at once [default: CPUs, at most 4]")]
    concurrency: Option<usize>,
    #[arg(long, default_value_t = 30000, help = "Navigation timeout in milliseconds")]
    timeout_ms: u64,
}

impl Args {
    fn options(&self) -> BatchOptions {
        BatchOptions {
            skip_image: self.skip_image,
            skip_post_update: self.skip_post_update,
            force: self.force,
        }
    }

    fn into_config(self) -> CardConfig {
        let defaults = CardConfig::default();
        CardConfig {
            content_dir: self.content_dir,
            public_dir: self.public_dir,
            cards_dir: self.cards_dir,
            base_url: self.base_url,
            format: self.format,
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            timeout_ms: self.timeout_ms,
            ..defaults
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = args.options();
    let config = args.into_config();

    log::info!("Reading articles from `{}`", config.content_dir.display());
    log::info!("Writing cards to `{}`", CardPaths::new(&config).output_root().display());

    let report = run_batch(&config, options, CdpSession::new).await?;

    for (slug, reason) in &report.failures {
        log::warn!("Card for `{}` not produced: {}", slug, reason);
    }
    log::info!("Attempted {} articles.", report.attempted());
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize Logging.
    let log_environ = env_logger::Env::new()
        .filter("CARDGEN_LOG")
        .write_style("CARDGEN_LOG_STYLE");
    let mut log_builder = env_logger::Builder::new();

    log_builder.filter_level(log::LevelFilter::Info);
    log_builder.parse_env(log_environ);
    log_builder.init();

    // Parse Arguments.
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("cardgen failed: {:#}", e);
        std::process::exit(1);
    }
}
