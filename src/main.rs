use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use keyfind::aggregate::DuplicatePolicy;
use keyfind::config::{find_workspace_root, AppConfig};
use keyfind::engine::{Outbound, Outbox, PatternQuery, SearchEngine, Subscription};
use keyfind::matcher::{open_matcher, LocaleDictionary, Matcher, RipgrepMatcher};
use keyfind::server::{serve, SessionOptions};
use keyfind::output;
use keyfind::rewrite::apply_changes;
use std::io::{self, BufWriter, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyfind")]
#[command(about = "Find i18n keys by their translation text")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the one in the app data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging on stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct SearchArgs {
    /// Translation text to look for
    pattern: String,

    /// Comma-separated paths or globs to search
    #[arg(short, long, default_value = "")]
    include: String,

    /// Comma-separated paths or globs to skip
    #[arg(short, long, default_value = "")]
    exclude: String,

    /// Locale file (overrides the configured one)
    #[arg(short, long)]
    locale: Option<PathBuf>,

    /// Path inside the workspace
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Drop repeated records for the same location
    #[arg(long)]
    dedup: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search and print results grouped by key and file
    Search {
        #[command(flatten)]
        args: SearchArgs,

        /// Text every match would be replaced with (shown, not written)
        #[arg(short, long)]
        rewrite: Option<String>,

        /// Print the result snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Only print the number of matches per key
        #[arg(short, long)]
        count: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Search, then replace every match in place
    Replace {
        #[command(flatten)]
        args: SearchArgs,

        /// Replacement text
        #[arg(short, long)]
        rewrite: String,
    },
    /// List dictionary keys whose translation contains the pattern
    Keys {
        /// Translation text to look for
        pattern: String,

        /// Locale file (overrides the configured one)
        #[arg(short, long)]
        locale: Option<PathBuf>,

        /// Path inside the workspace
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
    /// Run the stdio sidecar for an editor host
    Serve {
        /// Path inside the workspace
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Locale file (overrides the configured one)
        #[arg(short, long)]
        locale: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Commands::Search {
            args,
            rewrite,
            json,
            count,
            no_color,
        } => {
            let (_, matcher) = workspace(&config, &args.path, args.locale.as_deref())?;
            let query = pattern_query(&args, rewrite.unwrap_or_default());
            let (engine, _) = run_once(&matcher, policy(&config, args.dedup), query, !json)?;

            if json {
                output::print_json(&engine.snapshot())?;
            } else if count {
                output::print_key_counts(engine.aggregate().groups(), !no_color)?;
            } else {
                output::print_groups(engine.aggregate().groups(), !no_color)?;
            }
        }
        Commands::Replace { args, rewrite } => {
            let (root, matcher) = workspace(&config, &args.path, args.locale.as_deref())?;
            let query = pattern_query(&args, rewrite);
            let (mut engine, outbound) = run_once(&matcher, policy(&config, args.dedup), query, true)?;

            let files = engine.replace_all()?;
            info!(files, "applying replacements");
            for request in outbound.try_iter() {
                if let Outbound::ReplaceAll(request) = request {
                    let results = apply_changes(
                        &root,
                        &request.changes,
                        config.effective_rewrite_threads(),
                    );
                    let failures = output::print_replace_results(&results, true)?;
                    if failures > 0 {
                        bail!("{} file(s) could not be rewritten", failures);
                    }
                }
            }
        }
        Commands::Keys {
            pattern,
            locale,
            path,
        } => {
            let root = find_workspace_root(&path)?;
            let locale = locale_file(&config, &root, locale.as_deref())
                .context("No locale file given; pass --locale or set locale_file in the config")?;
            let dictionary = LocaleDictionary::load(&locale)?;
            let entries = dictionary
                .keys_containing(&pattern)
                .map(|key| (key, dictionary.get(key).unwrap_or_default()));
            output::print_keys(entries, io::stdout().is_terminal())?;
        }
        Commands::Serve { path, locale } => {
            let (root, matcher) = workspace(&config, &path, locale.as_deref())?;
            let options = SessionOptions::from_config(root, &config);
            let writer = BufWriter::new(io::stdout().lock());
            serve(matcher, io::stdin(), writer, options)?;
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries results and sidecar frames
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn locale_file(config: &AppConfig, root: &Path, flag: Option<&Path>) -> Option<PathBuf> {
    match flag {
        Some(path) => Some(path.to_path_buf()),
        None => config.locale_path(root),
    }
}

fn workspace(
    config: &AppConfig,
    path: &Path,
    locale: Option<&Path>,
) -> Result<(PathBuf, RipgrepMatcher)> {
    let root = find_workspace_root(path)?;
    let locale = locale_file(config, &root, locale);
    let matcher = open_matcher(config.matcher_config(&root), locale.as_deref())?;
    Ok((root, matcher))
}

fn pattern_query(args: &SearchArgs, rewrite: String) -> PatternQuery {
    PatternQuery::new(args.pattern.clone())
        .with_include(args.include.clone())
        .with_exclude(args.exclude.clone())
        .with_rewrite(rewrite)
}

fn policy(config: &AppConfig, dedup: bool) -> DuplicatePolicy {
    if dedup {
        DuplicatePolicy::Suppress
    } else {
        config.duplicate_policy
    }
}

/// Run one generation to completion.
///
/// Returns the engine holding the result plus the receiving end of its outbox.
fn run_once(
    matcher: &RipgrepMatcher,
    policy: DuplicatePolicy,
    query: PatternQuery,
    show_progress: bool,
) -> Result<(SearchEngine<Sender<Outbound>>, Receiver<Outbound>)> {
    let (out_tx, out_rx) = mpsc::channel();
    let (stream_tx, stream_rx) = mpsc::channel();
    let mut engine = SearchEngine::new(out_tx).with_duplicate_policy(policy);

    let spinner = (show_progress && io::stderr().is_terminal()).then(|| Spinner::attach(&engine));
    engine.submit(query);

    for request in out_rx.try_iter() {
        if let Outbound::Search(request) = request {
            let _ = matcher.start(request, stream_tx.clone());
        }
    }
    drop(stream_tx);

    for event in stream_rx {
        engine.handle_event(event);
        if !engine.is_searching() {
            break;
        }
    }

    if let Some(spinner) = spinner {
        spinner.finish();
    }
    if let Some(error) = engine.error() {
        bail!("Search failed: {}", error);
    }
    Ok((engine, out_rx))
}

/// Spinner on stderr, advanced by engine change notifications
struct Spinner {
    #[cfg(feature = "progress")]
    bar: indicatif::ProgressBar,
    subscription: Subscription,
}

impl Spinner {
    #[cfg(feature = "progress")]
    fn attach<O: Outbox>(engine: &SearchEngine<O>) -> Self {
        use indicatif::{ProgressBar, ProgressStyle};
        use std::time::Duration;

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Searching...");
        bar.enable_steady_tick(Duration::from_millis(100));

        let handle = bar.clone();
        let subscription =
            engine.subscribe(move |version| handle.set_message(format!("Searching... (update {})", version)));
        Self { bar, subscription }
    }

    #[cfg(not(feature = "progress"))]
    fn attach<O: Outbox>(engine: &SearchEngine<O>) -> Self {
        let subscription = engine.subscribe(|version| tracing::trace!(version, "engine changed"));
        Self { subscription }
    }

    fn finish(self) {
        #[cfg(feature = "progress")]
        self.bar.finish_and_clear();
        self.subscription.unsubscribe();
    }
}
