use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use toy_catalog::catalog::{CrawlOptions, ListingClient, ListingConfig};
use toy_catalog::cli::finder;
use toy_catalog::database_ops::db::Db;
use toy_catalog::database_ops::ingest::LoadMode;
use toy_catalog::database_ops::search::{search_toys, SearchCriteria, SortOrder};
use toy_catalog::logging::{init_tracing, DEFAULT_FILTER};
use toy_catalog::media::{HttpImageFetcher, ImageMaterializer};
use toy_catalog::util::env;

#[derive(Parser, Debug)]
#[command(name = "toys", version, about = "Toy catalog scraper, loader and finder")]
struct Cli {
    /// SQLite database file (defaults to TOYS_DB_PATH or toys.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Crawl the listing (metadata only) into a JSON snapshot
    Scrape {
        #[arg(long, default_value = "toys_data.json")]
        output: PathBuf,
        /// Override the page size (defaults to TOYS_PAGE_SIZE or 12)
        #[arg(long)]
        page_size: Option<u32>,
        /// Override the delay between pages in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Crawl the listing and download every page's images as it arrives
    ScrapeImages {
        #[arg(long, default_value = "toys_with_local_images.json")]
        output: PathBuf,
        /// Image directory (defaults to TOYS_IMAGE_DIR or toy_images)
        #[arg(long)]
        image_dir: Option<PathBuf>,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Download images for an existing snapshot
    DownloadImages {
        #[arg(long, default_value = "toys_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "toys_with_local_images.json")]
        output: PathBuf,
        #[arg(long)]
        image_dir: Option<PathBuf>,
    },
    /// Overlay local image paths onto a complete-metadata snapshot
    Merge {
        #[arg(long, default_value = "toys_data.json")]
        complete: PathBuf,
        #[arg(long, default_value = "toys_with_local_images.json")]
        local: PathBuf,
        #[arg(long, default_value = "toys_complete_with_local_images.json")]
        output: PathBuf,
    },
    /// Load a snapshot into the SQLite store
    Load {
        #[arg(long, default_value = "toys_complete_with_local_images.json")]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = LoadMode::Append)]
        mode: LoadMode,
    },
    /// One-shot search against the store
    Search {
        /// Child age in years
        #[arg(long)]
        age: Option<f64>,
        /// Lower/upper age bounds in months (overlap match)
        #[arg(long, requires = "age_to_months", conflicts_with = "age")]
        age_from_months: Option<i64>,
        #[arg(long, requires = "age_from_months")]
        age_to_months: Option<i64>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        /// Case-insensitive substring of name or description
        #[arg(long)]
        text: Option<String>,
        #[arg(long = "type")]
        toy_type: Option<String>,
        /// Required feature names (comma-separated; all must match)
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
        #[arg(long, value_enum, default_value_t = SortOrder::PriceAsc)]
        sort: SortOrder,
        #[arg(long)]
        limit: Option<i64>,
        /// Print results as JSON instead of text blocks
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Interactive finder; `find quick` runs one quick search, `find <years>` prints the top 10
    Find {
        target: Option<String>,
    },
    /// Print store statistics
    Stats,
}

fn crawl_setup(page_size: Option<u32>, delay_ms: Option<u64>) -> Result<(ListingClient, CrawlOptions)> {
    let mut cfg = ListingConfig::from_env();
    if let Some(size) = page_size {
        cfg.page_size = size.max(1);
    }
    if let Some(ms) = delay_ms {
        cfg.page_delay = Duration::from_millis(ms);
    }
    let opts = CrawlOptions::from(&cfg);
    info!(
        url = %cfg.api_url,
        page_size = cfg.page_size,
        delay_ms = cfg.page_delay.as_millis() as u64,
        "listing client configured"
    );
    Ok((ListingClient::new(cfg)?, opts))
}

fn build_materializer(image_dir: Option<PathBuf>) -> Result<ImageMaterializer<HttpImageFetcher>> {
    let dir = image_dir.unwrap_or_else(|| PathBuf::from(env::image_dir()));
    Ok(ImageMaterializer::new(dir, HttpImageFetcher::from_env()?))
}

async fn open_db(path: Option<PathBuf>) -> Result<Db> {
    let path = path
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(env::db_path);
    Db::connect(&path).await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER)?;
    env::bootstrap_cli("toys");

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            output,
            page_size,
            delay_ms,
        } => {
            let (client, opts) = crawl_setup(page_size, delay_ms)?;
            let outcome = toy_catalog::scrape_snapshot(&client, &opts, &output).await?;
            if !outcome.crawl.is_complete() {
                warn!(failed = ?outcome.crawl.failed_offsets, "some pages were skipped");
            }
            println!("{}", outcome.stats);
            println!("Saved {} toys to {}", outcome.crawl.entries.len(), output.display());
        }
        Commands::ScrapeImages {
            output,
            image_dir,
            page_size,
            delay_ms,
        } => {
            let (client, opts) = crawl_setup(page_size, delay_ms)?;
            let materializer = build_materializer(image_dir)?;
            let outcome =
                toy_catalog::scrape_with_images(&client, &opts, &materializer, &output).await?;
            let images = outcome.images.unwrap_or_default();
            println!("{}", outcome.stats);
            println!(
                "Saved {} toys to {}; images downloaded {}, already present {}, failed {} (in {})",
                outcome.crawl.entries.len(),
                output.display(),
                images.downloaded,
                images.skipped,
                images.failed,
                materializer.dir().display()
            );
        }
        Commands::DownloadImages {
            input,
            output,
            image_dir,
        } => {
            let materializer = build_materializer(image_dir)?;
            let report =
                toy_catalog::download_snapshot_images(&input, &output, &materializer).await?;
            println!(
                "Images downloaded {}, already present {}, failed {}; snapshot written to {}",
                report.downloaded,
                report.skipped,
                report.failed,
                output.display()
            );
        }
        Commands::Merge {
            complete,
            local,
            output,
        } => {
            let merged = toy_catalog::merge_snapshot_files(&complete, &local, &output)?;
            println!(
                "Indexed {} toys with local images; updated {} of {} entries -> {}",
                merged.indexed,
                merged.updated,
                merged.entries.len(),
                output.display()
            );
        }
        Commands::Load { input, mode } => {
            let db = open_db(cli.db).await?;
            let report = toy_catalog::load_snapshot(&db, &input, mode).await?;
            println!(
                "Imported {} toys ({} skipped), {} images, {} feature links",
                report.imported, report.skipped, report.images, report.feature_links
            );
            println!("{}", db.stats().await?);
        }
        Commands::Search {
            age,
            age_from_months,
            age_to_months,
            min_price,
            max_price,
            text,
            toy_type,
            features,
            sort,
            limit,
            json,
        } => {
            let mut criteria = SearchCriteria::default()
                .price_between(min_price, max_price)
                .with_features(features)
                .sorted_by(sort);
            if let Some(years) = age {
                criteria = criteria.at_age_years(years);
            }
            if let (Some(from), Some(to)) = (age_from_months, age_to_months) {
                criteria = criteria.overlapping_ages(from, to);
            }
            criteria.text = text;
            criteria.toy_type = toy_type;
            criteria.limit = limit;

            let db = open_db(cli.db).await?;
            let hits = search_toys(&db, &criteria).await?;
            let mut out = io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut out, &hits)?;
                writeln!(out)?;
            } else {
                let base = env::link_base();
                for (i, hit) in hits.iter().enumerate() {
                    write!(out, "{}", finder::render_toy(i + 1, hit, &base))?;
                }
                writeln!(out, "\nTotal: {} toys found", hits.len())?;
            }
        }
        Commands::Find { target } => {
            let db = open_db(cli.db).await?;
            let base = env::link_base();
            let mut out = io::stdout().lock();
            match target.as_deref() {
                None => finder::run(&db, io::stdin().lock(), &mut out, &base).await?,
                Some("quick") => finder::run_quick(&db, io::stdin().lock(), &mut out, &base).await?,
                Some(raw) => {
                    let Ok(years) = raw.trim().parse::<f64>() else {
                        bail!("usage: toys find [age_in_years|quick]");
                    };
                    finder::print_for_age(&db, years, &mut out, &base)
                        .await
                        .context("age lookup")?;
                }
            }
        }
        Commands::Stats => {
            let db = open_db(cli.db).await?;
            println!("{}", db.stats().await?);
        }
    }

    Ok(())
}
