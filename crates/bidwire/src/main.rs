use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bidwire_harvester::{
    BidStore, Fetch, Harvester, HttpFetcher, MemoryStore, PageOutcome, RunReport, Site,
    SiteScraper, SqliteStore,
};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use tokio::runtime;

mod config;

use config::BidwireConfig;

/// Harvests new grant and procurement announcements
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "harvest")]
    Harvest(HarvestArgs),
    #[clap(name = "parse")]
    Parse(ParseArgs),
    #[clap(name = "list")]
    List(ListArgs),
    /// List the registered sites and their listing pages
    #[clap(name = "sites")]
    Sites,
    #[clap(hide = true)]
    Completion,
}

#[derive(Debug, clap::Args)]
pub struct StoreArgs {
    /// Optional yaml configuration file
    #[clap(env = "BIDWIRE_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
    /// Override the database url (e.g. sqlite://bidwire.db)
    #[clap(env = "BIDWIRE_DATABASE_URL", long)]
    pub database_url: Option<String>,
}

impl StoreArgs {
    fn load(&self) -> anyhow::Result<BidwireConfig> {
        let mut conf = BidwireConfig::load(self.config.as_deref())?;
        if let Some(database_url) = &self.database_url {
            conf.database_url = database_url.to_string();
        }
        Ok(conf)
    }
}

/// Fetch the listing pages of the registered sites and record new documents
#[derive(Debug, clap::Args)]
pub struct HarvestArgs {
    #[clap(flatten)]
    pub store: StoreArgs,
    /// Only harvest these sites (default: all registered sites)
    #[clap(long = "site")]
    pub sites: Vec<Site>,
    /// Override the user agent used to download listing pages
    #[clap(long)]
    pub user_agent: Option<String>,
    /// Override the maximum number of listing pages of a site processed at once
    #[clap(long)]
    pub concurrent_pages: Option<usize>,
    /// Override the maximum number of sites harvested at once
    #[clap(long)]
    pub concurrent_sites: Option<usize>,
    /// No SIGINT handling, pages in progress are abandoned on Ctrl-C
    #[clap(long)]
    pub no_sigint: bool,
    /// Record into memory only, the database is left untouched
    #[clap(long)]
    pub dry_run: bool,
    /// When quiet no logs are outputted
    #[clap(long, short)]
    pub quiet: bool,
}

impl TryFrom<&HarvestArgs> for BidwireConfig {
    type Error = anyhow::Error;

    fn try_from(args: &HarvestArgs) -> Result<Self, Self::Error> {
        let mut conf = args.store.load()?;
        if let Some(user_agent) = &args.user_agent {
            conf.harvester.user_agent = user_agent.to_string();
        }
        if let Some(concurrent_pages) = args.concurrent_pages {
            conf.harvester.concurrent_pages = concurrent_pages;
        }
        if let Some(concurrent_sites) = args.concurrent_sites {
            conf.harvester.concurrent_sites = concurrent_sites;
        }
        if args.no_sigint {
            conf.harvester.handle_sigint = false;
        }
        Ok(conf)
    }
}

fn selected_scrapers(sites: &[Site]) -> anyhow::Result<Vec<SiteScraper>> {
    if sites.is_empty() {
        return Ok(bidwire_sites::registry());
    }
    sites
        .iter()
        .map(|&site| bidwire_sites::find(site).with_context(|| format!("No scraper for {site}")))
        .collect()
}

pub fn harvest(args: HarvestArgs) -> anyhow::Result<()> {
    let conf: BidwireConfig = (&args).try_into()?;
    let scrapers = selected_scrapers(&args.sites)?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let report = rt.block_on(async {
        let fetcher = Arc::new(HttpFetcher::new(&conf.harvester)?);
        let store: Arc<dyn BidStore> = if args.dry_run {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(SqliteStore::connect(&conf.database_url).await?)
        };
        let harvester = Harvester::new(conf.harvester.clone(), fetcher, store);
        Ok::<_, anyhow::Error>(harvester.run(&scrapers).await)
    })?;

    print_report(&report);

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} listing page(s) failed");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for page in report.pages() {
        let outcome = match &page.outcome {
            PageOutcome::Committed {
                found,
                new,
                inserted,
            } => format!("found {found}, new {new}, recorded {inserted}"),
            PageOutcome::Failed(e) => format!("failed: {e}"),
            PageOutcome::Cancelled => String::from("cancelled"),
        };
        println!("{}\t{}\t{}", page.site, page.sub_path, outcome);
    }
    println!("{} new document(s) recorded", report.inserted());
}

/// Run the listing parser of a registered page on a local or downloaded page
/// and print its entries
#[derive(Debug, clap::Args)]
#[clap(group = clap::ArgGroup::new("page").required(true))]
pub struct ParseArgs {
    /// Site whose parser is used
    #[clap(long)]
    pub site: Site,
    /// Listing page of the site (default: its first registered page)
    #[clap(long)]
    pub sub_path: Option<String>,
    /// A local html page to parse
    #[clap(group = "page", parse(from_os_str), long)]
    pub file: Option<PathBuf>,
    /// Download the page to parse from this url (e.g. a mirror of the listing)
    #[clap(group = "page", long)]
    pub url: Option<String>,
    /// Custom user agent to download the page
    #[clap(long, conflicts_with = "file")]
    pub ua: Option<String>,
}

pub fn parse(args: ParseArgs) -> anyhow::Result<()> {
    let scraper = bidwire_sites::find(args.site)
        .with_context(|| format!("No scraper for {}", args.site))?;
    let sub_path = match &args.sub_path {
        Some(sub_path) => sub_path.clone(),
        None => scraper
            .sub_paths()
            .next()
            .map(String::from)
            .with_context(|| format!("{} has no listing page", args.site))?,
    };
    let parser = scraper
        .parser(&sub_path)
        .with_context(|| format!("{} has no listing page {sub_path}", args.site))?;

    let page = match (&args.file, &args.url) {
        (Some(path), _) => fs::read_to_string(path)?,
        (None, Some(url)) => {
            let mut conf = BidwireConfig::default().harvester;
            if let Some(ua) = &args.ua {
                conf.user_agent = ua.to_string();
            }
            let fetcher = HttpFetcher::new(&conf)?;
            let rt = runtime::Builder::new_current_thread().enable_all().build()?;
            let page = rt.block_on(fetcher.get(url))?;
            page.text().into_owned()
        }
        (None, None) => anyhow::bail!("Either --file or --url is required"),
    };

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(io::stdout());
    for entry in parser.scrape_results_page(&page)? {
        wtr.write_record([&entry.identifier, &entry.description])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Print recorded documents, newest first
#[derive(Debug, clap::Args)]
pub struct ListArgs {
    #[clap(flatten)]
    pub store: StoreArgs,
    /// Only list documents of this site
    #[clap(long)]
    pub site: Option<Site>,
    /// Maximum number of documents listed
    #[clap(long, default_value = "20")]
    pub limit: usize,
}

pub fn list(args: ListArgs) -> anyhow::Result<()> {
    let conf = args.store.load()?;
    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    let bids = rt.block_on(async {
        let store = SqliteStore::connect(&conf.database_url).await?;
        store.recent(args.site, args.limit).await
    })?;

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(io::stdout());
    wtr.write_record(["created_at", "site", "identifier", "url", "description"])?;
    for stored in bids {
        let bid = &stored.bid;
        let url = bidwire_sites::domain(bid.site)
            .map(|domain| bid.url(domain))
            .unwrap_or_else(|| bid.identifier.clone());
        wtr.write_record([
            stored.created_at.to_rfc3339().as_str(),
            bid.site.as_str(),
            bid.identifier.as_str(),
            url.as_str(),
            bid.description.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn sites() {
    for scraper in bidwire_sites::registry() {
        for sub_path in scraper.sub_paths() {
            println!("{}\t{}", scraper.site(), scraper.url(sub_path));
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("bidwire=info"))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Harvest(args) => {
            if !args.quiet {
                init_logger();
            }
            harvest(args)
        }
        SubCommand::Parse(args) => {
            init_logger();
            parse(args)
        }
        SubCommand::List(args) => list(args),
        SubCommand::Sites => {
            sites();
            Ok(())
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "bidwire", &mut io::stdout());
            Ok(())
        }
    }
}
