use clap::{Parser, Subcommand};
use postgen::{config, generate, output, scan, serve, watch};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn version_string() -> &'static str {
    let on_tag = env!("POSTGEN_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("POSTGEN_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "postgen")]
#[command(about = "Static generator for multi-language markdown posts")]
#[command(long_about = "\
Static generator for multi-language markdown posts

Every post is a directory. Each language has its own metadata and markdown
file; the first language listed in info.yml is the primary one and also
answers at the directory URL.

Site structure:

  site/
  ├── config.toml              # Site config (optional)
  ├── templates/
  │   ├── header.html          # Fragment placed at the top of every page
  │   └── about.html           # Static page contents (see [[pages]])
  ├── static/main.css
  └── posts/
      └── globe/
          ├── info.yml         # languages: [en, fr], date, published
          ├── en.yml           # title (and per-language overrides)
          ├── en.md
          ├── fr.yml
          ├── fr.md
          ├── globe.png        # ![Globe at night](globe.png) → Figure 1
          ├── en.html          # generated
          ├── fr.html          # generated
          └── index.html       # generated alias to en.html

Inside a post, [[globe]] is replaced with the number of the figure whose
file stem is 'globe'.

Run 'postgen gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Show debug diagnostics
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Regenerate every page once
    Build,
    /// Discover posts and print the language variants as JSON
    Scan,
    /// Report discovered and skipped posts without writing anything
    Check,
    /// Build, then regenerate whenever a watched file changes
    Watch,
    /// Build, watch, and serve the site over HTTP
    Serve,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Build => {
            let site_config = config::load_config(&cli.root)?;
            init_thread_pool(&site_config.processing);
            let report = generate::generate_all(&cli.root, &site_config)?;
            output::print_generate_report(&report, &cli.root);
            if !report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Scan => {
            let site_config = config::load_config(&cli.root)?;
            let discovery = scan::scan(&cli.root.join(&site_config.paths.posts))?;
            println!("{}", serde_json::to_string_pretty(&discovery.variants)?);
        }
        Command::Check => {
            let site_config = config::load_config(&cli.root)?;
            let discovery = scan::scan(&cli.root.join(&site_config.paths.posts))?;
            output::print_check_output(&discovery, &cli.root);
        }
        Command::Watch => {
            let site_config = config::load_config(&cli.root)?;
            init_thread_pool(&site_config.processing);
            watch::watch_blocking(&cli.root)?;
        }
        Command::Serve => {
            let site_config = config::load_config(&cli.root)?;
            init_thread_pool(&site_config.processing);
            serve::serve_site(&cli.root)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so `scan` output stays machine-readable.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
