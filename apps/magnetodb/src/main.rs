//! MagnetoDB - in-memory table storage and query engine.
//!
//! Requests are newline-delimited JSON envelopes, one per line, read from a
//! file or stdin. Every envelope produces exactly one JSON response line on
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! magnetodb [REQUESTS]
//! magnetodb bulk-load PROJECT TABLE FILE [REQUESTS]
//! ```
//!
//! `REQUESTS` defaults to stdin (`-`). `bulk-load` first runs `REQUESTS`, if
//! given, so the target table can be created in the same process, then
//! streams `FILE` into the table and prints the load summary.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `MAGNETODB_DEFAULT_PROJECT` | `default` | Project for envelopes without `project_id` |
//! | `MAGNETODB_TABLE_ACTIVATION_DELAY_MS` | `0` | Time a new table spends in `CREATING` |
//! | `MAGNETODB_TABLE_REMOVAL_DELAY_MS` | `0` | Time a deleted table spends in `DELETING` |
//! | `MAGNETODB_MAX_ITEM_SIZE` | `65536` | Largest storable item in bytes |
//! | `MAGNETODB_BULK_CONCURRENCY` | `16` | Concurrent stores during a bulk load |
//! | `MAGNETODB_SHOW_TRACE` | `false` | Include source chains in error bodies |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use magnetodb_api::{MagnetoService, MagnetoServiceConfig};
use magnetodb_core::{LogFormat, MagnetoConfig, ProjectId};
use magnetodb_model::output::BulkLoadOutput;
use magnetodb_storage::{MagnetoProvider, MagnetoStorageHandler, StorageConfig};

/// Version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: magnetodb [REQUESTS]\n       magnetodb bulk-load PROJECT TABLE FILE [REQUESTS]";

type InputStream = Box<dyn AsyncBufRead + Unpin + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Answer every envelope of a request stream.
    Serve { requests: Option<PathBuf> },
    /// Stream a file of items into one table.
    BulkLoad {
        project: String,
        table: String,
        file: PathBuf,
        requests: Option<PathBuf>,
    },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [] => Ok(Command::Serve { requests: None }),
        [cmd, rest @ ..] if cmd == "bulk-load" => match rest {
            [project, table, file] | [project, table, file, _] => Ok(Command::BulkLoad {
                project: project.clone(),
                table: table.clone(),
                file: PathBuf::from(file),
                requests: rest.get(3).and_then(|p| input_path(p)),
            }),
            _ => anyhow::bail!("bulk-load expects PROJECT TABLE FILE [REQUESTS]\n{USAGE}"),
        },
        [flag] if flag.starts_with("--") && flag != "--" => {
            anyhow::bail!("unknown option '{flag}'\n{USAGE}")
        }
        [requests] => Ok(Command::Serve {
            requests: input_path(requests),
        }),
        _ => anyhow::bail!("too many arguments\n{USAGE}"),
    }
}

/// `-` selects stdin.
fn input_path(raw: &str) -> Option<PathBuf> {
    (raw != "-").then(|| PathBuf::from(raw))
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(config: &MagnetoConfig) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log level filter: {}", config.log_level))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

async fn open_input(path: Option<&Path>) -> Result<InputStream> {
    match path {
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Answer every envelope in `input`, one response line per non-blank line.
///
/// Returns the number of envelopes processed.
async fn run_requests<R, W>(
    service: &MagnetoService<MagnetoStorageHandler>,
    input: R,
    output: &mut W,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut handled = 0;
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read request stream")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = service.call_line(line).await;
        let mut encoded =
            serde_json::to_vec(&response).context("failed to encode response envelope")?;
        encoded.push(b'\n');
        output
            .write_all(&encoded)
            .await
            .context("failed to write response")?;
        handled += 1;
    }
    output.flush().await.context("failed to flush responses")?;
    Ok(handled)
}

async fn bulk_load(
    provider: &MagnetoProvider,
    project: &str,
    table: &str,
    file: &Path,
) -> Result<BulkLoadOutput> {
    let project = ProjectId::new(project).context("invalid project id")?;
    let reader = open_input(Some(file)).await?;
    provider
        .handle_bulk_load(&project, table, reader)
        .await
        .with_context(|| format!("bulk load into '{table}' failed"))
}

fn build_service(
    config: &MagnetoConfig,
    storage_config: StorageConfig,
) -> MagnetoService<MagnetoStorageHandler> {
    let service_config = MagnetoServiceConfig {
        default_project: config.default_project.clone(),
        show_trace: storage_config.show_trace,
    };
    let provider = Arc::new(MagnetoProvider::new(storage_config));
    MagnetoService::new(
        Arc::new(MagnetoStorageHandler::new(provider)),
        service_config,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = MagnetoConfig::from_env().context("invalid configuration")?;
    init_tracing(&config)?;

    let storage_config = StorageConfig::from_env();
    info!(
        version = VERSION,
        default_project = %config.default_project,
        max_item_size = storage_config.max_item_size,
        bulk_concurrency = storage_config.bulk_concurrency,
        activation_delay_ms = u64::try_from(storage_config.table_activation_delay.as_millis())
            .unwrap_or(u64::MAX),
        "starting MagnetoDB",
    );
    let service = build_service(&config, storage_config);
    let mut stdout = tokio::io::stdout();

    match command {
        Command::Serve { requests } => {
            let input = open_input(requests.as_deref()).await?;
            let handled = run_requests(&service, input, &mut stdout).await?;
            info!(handled, "request stream finished");
        }
        Command::BulkLoad {
            project,
            table,
            file,
            requests,
        } => {
            if let Some(requests) = requests {
                let input = open_input(Some(&requests)).await?;
                run_requests(&service, input, &mut stdout).await?;
            }
            let summary =
                bulk_load(service.handler().provider(), &project, &table, &file).await?;
            let mut encoded =
                serde_json::to_vec(&summary).context("failed to encode load summary")?;
            encoded.push(b'\n');
            stdout.write_all(&encoded).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
