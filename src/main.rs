mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use paddock_config::Config;
use paddock_league::{Context, Pipeline, Summary};
use paddock_source::ResponseCache;
use paddock_source::backend::HttpSource;
use paddock_table::Store;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "paddock", version, about)]
struct Cli {
    /// Config file (TOML, YAML or JSON). Defaults to paddock.toml in the
    /// user config directory, if present.
    #[arg(short, long, global = true, env = "PADDOCK_CONFIG")]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG
    /// takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a league and fold everything new into the output tables.
    Sync {
        league_id: u64,
        /// Directory for the consolidated tables.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for the response cache.
        #[arg(long)]
        cache: Option<PathBuf>,
    },
    /// Recover the output directory and merge pending shards, offline.
    Consolidate {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn report_sync(league_id: u64, summary: &Summary) {
    info!(
        league_id,
        seasons = summary.seasons,
        sessions = summary.sessions,
        processed = summary.processed,
        skipped = summary.skipped,
        shards = summary.shards,
        merges = summary.merges,
        "sync finished"
    );
    println!("{summary}");
}

fn report_consolidate(output: &Path, merges: usize) {
    info!(merges, output = %output.display(), "consolidation finished");
    println!("{merges} tables consolidated in {}", output.display());
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Sync { league_id, output, cache } => {
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(cache) = cache {
                config.cache_dir = cache;
            }
            info!(
                league_id,
                output = %config.output_dir.display(),
                cache = %config.cache_dir.display(),
                base_url = %config.api.base_url,
                "starting sync"
            );
            let cache = ResponseCache::open(&config.cache_dir).or_raise(|| ErrorKind::Source)?;
            let source = HttpSource::new(
                "iracing",
                config.api.base_url.as_str(),
                config.api.token.as_deref(),
                config.api.timeout(),
                Some(cache),
            )
            .or_raise(|| ErrorKind::Source)?;
            let ctx = Context {
                league_id,
                source: Arc::new(source),
                ttl: config.ttl.policy(),
                store: Store::open(&config.output_dir).or_raise(|| ErrorKind::Output)?,
            };
            let summary = Pipeline::new(&ctx).run().await.or_raise(|| ErrorKind::Sync)?;
            report_sync(league_id, &summary);
        },
        Command::Consolidate { output } => {
            let output = output.unwrap_or(config.output_dir);
            info!(output = %output.display(), "starting consolidation");
            let store = Store::open(&output).or_raise(|| ErrorKind::Output)?;
            let merges = paddock_league::consolidate(&store).or_raise(|| ErrorKind::Consolidate)?;
            report_consolidate(&output, merges);
        },
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;
    use std::io::Write;
    use std::sync::Mutex;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["paddock", "sync", "123"], 0)]
    #[case(&["paddock", "-vv", "sync", "123", "--output", "/tmp/out"], 2)]
    #[case(&["paddock", "consolidate", "-v"], 1)]
    fn test_parse(#[case] args: &[&str], #[case] verbose: u8) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, verbose);
    }

    #[test]
    fn test_sync_overrides() {
        let cli = Cli::try_parse_from(["paddock", "-c", "league.yaml", "sync", "123", "-o", "out", "--cache", "c"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("league.yaml")));
        match cli.command {
            Command::Sync { league_id, output, cache } => {
                assert_eq!(league_id, 123);
                assert_eq!(output, Some(PathBuf::from("out")));
                assert_eq!(cache, Some(PathBuf::from("c")));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);
    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_sync_summary_is_logged() {
        let summary = Summary { seasons: 2, sessions: 5, processed: 3, skipped: 1, shards: 9, merges: 4 };
        let log = logged(|| report_sync(123, &summary));
        assert!(log.contains("sync finished"), "{log}");
        assert!(log.contains("league_id=123"), "{log}");
        assert!(log.contains("processed=3"), "{log}");
        assert!(log.contains("merges=4"), "{log}");
    }

    #[test]
    fn test_consolidate_is_logged() {
        let log = logged(|| report_consolidate(Path::new("/srv/league"), 2));
        assert!(log.contains("consolidation finished"), "{log}");
        assert!(log.contains("merges=2"), "{log}");
        assert!(log.contains("/srv/league"), "{log}");
    }

    #[test]
    fn test_league_id_must_be_numeric() {
        assert!(Cli::try_parse_from(["paddock", "sync", "abc"]).is_err());
    }
}
