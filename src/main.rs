use anyhow::{bail, Context, Result};
use clap::Parser;
use ragent_selectors::{
    generate_selector, Config, FileSource, GenerateOptions, HtmlSource, SelectorReport,
};
use scraper::{Html, Selector};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate stable selectors for elements of an HTML page", long_about = None)]
struct Args {
    /// HTML file to load
    #[arg(long, conflicts_with = "url")]
    html: Option<PathBuf>,

    /// Page to render in headless Chrome
    #[arg(long)]
    url: Option<String>,

    /// CSS selector locating the element(s) to describe
    #[arg(long)]
    target: String,

    /// Describe every element matched by --target instead of the first
    #[arg(long)]
    all: bool,

    /// CSS selector of the element that bounds uniqueness
    #[arg(long)]
    root: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    test_id_attribute: Option<String>,

    #[arg(long)]
    retarget_action: bool,

    #[arg(long)]
    retarget_text: bool,

    /// Only emit plain CSS and positional connectives
    #[arg(long)]
    omit_internal: bool,

    #[arg(long)]
    include_hidden: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(attr) = &args.test_id_attribute {
        config.generator.test_id_attribute_name = attr.clone();
    }
    config.generator.retarget_for_action |= args.retarget_action;
    config.generator.retarget_for_text |= args.retarget_text;
    config.generator.omit_internal_engines |= args.omit_internal;
    config.generator.include_hidden |= args.include_hidden;
    config.validate()?;
    Ok(config)
}

fn source_for(args: &Args, config: &Config) -> Result<Box<dyn HtmlSource>> {
    if let Some(path) = &args.html {
        return Ok(Box::new(FileSource::new(path)));
    }
    match &args.url {
        #[cfg(feature = "chrome")]
        Some(url) => Ok(Box::new(ragent_selectors::ChromeSource::new(url, config.browser.clone())?)),
        #[cfg(not(feature = "chrome"))]
        Some(_) => {
            let _ = config;
            bail!("--url requires the \"chrome\" feature")
        }
        None => bail!("one of --html or --url is required"),
    }
}

fn parse_css(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid CSS selector \"{}\": {:?}", css, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let source = source_for(&args, &config)?;
    info!("Loading {}", source.describe());
    let page = source.load().await?;
    let html = Html::parse_document(&page.html);

    let mut options = GenerateOptions::new(config.generator.clone());
    if let Some(root_css) = &args.root {
        let root = html
            .select(&parse_css(root_css)?)
            .next()
            .with_context(|| format!("no element matches --root \"{}\"", root_css))?;
        options = options.root(root);
    }

    let selector = parse_css(&args.target)?;
    let mut targets = html.select(&selector);
    let targets: Vec<_> = if args.all {
        targets.collect()
    } else {
        targets.next().into_iter().collect()
    };
    if targets.is_empty() {
        bail!("no element matches --target \"{}\"", args.target);
    }

    let mut reports = Vec::with_capacity(targets.len());
    for target in targets {
        match generate_selector(&html, target, &options) {
            Ok(generated) => {
                if !generated.is_unique() {
                    warn!("\"{}\" matches {} elements", generated.selector, generated.elements.len());
                }
                reports.push(SelectorReport::new(page.source.clone(), &html, target, &generated));
            }
            Err(e) => warn!("skipping <{}>: {}", target.value().name(), e),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}\t{}", report.target.label(), report.selector);
        }
    }
    Ok(())
}
