use anyhow::{Context, Result};
use asset_gateway::{Address, RequestKind, RequestRouter, ResponsePayload, WritePayload};
use asset_registry::{self as registry, DeviceListener, DeviceRegistry, MetricsHub};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "assetctl",
    version,
    about = "Read and write device channels through the asset gateway",
    disable_help_subcommand = true
)]
struct Cli {
    /// Directory containing YAML device descriptors
    #[arg(long, default_value = "configs/devices", global = true)]
    devices: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered devices by ordinal
    List,
    /// Issue a read: `assets`, `assets/<device>` or `assets/<device>/<a_b_c>`
    Get { path: String },
    /// Write one channel: `assets/<device>/<channel>`
    Put {
        path: String,
        /// Value in its textual form
        #[arg(long)]
        value: String,
        /// Type tag, e.g. INTEGER or double
        #[arg(long = "type")]
        value_type: String,
    },
    /// Answer JSON-lines requests from stdin on stdout
    Serve {
        /// On end of input, print the session's metrics to stderr in Prometheus text format
        #[arg(long)]
        dump_metrics: bool,
    },
}

/// One line of `serve` input.
#[derive(Debug, Deserialize)]
struct ServeRequest {
    method: RequestKind,
    path: String,
    #[serde(default)]
    payload: Option<WritePayload>,
}

/// One line of `serve` output.
#[derive(Debug, Serialize)]
struct ServeReply {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<ResponsePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct Gateway {
    router: RequestRouter,
    hub: Arc<MetricsHub>,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let gw = open_gateway(&cli.devices)?;

    match cli.command {
        Commands::List => {
            print_response(&request(&gw.router, RequestKind::Read, "assets", None).await?)
        }
        Commands::Get { path } => {
            print_response(&request(&gw.router, RequestKind::Read, &path, None).await?)
        }
        Commands::Put {
            path,
            value,
            value_type,
        } => {
            let payload = WritePayload::new(value, value_type);
            print_response(&request(&gw.router, RequestKind::Write, &path, Some(payload)).await?)
        }
        Commands::Serve { dump_metrics } => {
            serve(gw.router).await?;
            if dump_metrics {
                eprint!("{}", gw.hub.encode_text());
            }
            Ok(())
        }
    }
}

fn setup_tracing() {
    // Best-effort; stdout carries responses, so logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_gateway(dir: &str) -> Result<Gateway> {
    let hub = Arc::new(MetricsHub::new().context("creating metrics registry")?);
    let devices = Arc::new(DeviceRegistry::new());
    devices.subscribe(Arc::clone(&hub) as Arc<dyn DeviceListener>);

    let descriptors = registry::load_descriptors_dir(dir)?;
    let count = registry::register_descriptors(&devices, descriptors)?;
    info!(dir, count, "devices registered");

    let router = RequestRouter::with_metrics(devices, &hub);
    Ok(Gateway { router, hub })
}

/// Split a slash path into resources and strip the resource root.
fn parse_address(path: &str) -> Result<Address> {
    let resources: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    Address::parse(&resources)
        .with_context(|| format!("path must start with assets/ or devices/: {path}"))
}

async fn request(
    router: &RequestRouter,
    kind: RequestKind,
    path: &str,
    payload: Option<WritePayload>,
) -> Result<ResponsePayload> {
    let address = parse_address(path)?;
    Ok(router.handle(kind, address, payload).await)
}

fn print_response(resp: &ResponsePayload) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(resp)?);
    Ok(())
}

async fn serve(router: RequestRouter) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    info!("serving requests from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let id = Uuid::new_v4();
        let span = tracing::info_span!("request", id = %id);
        let router = router.clone();
        let tx = tx.clone();
        tokio::spawn(
            async move {
                let reply = answer(&router, id, &line).await;
                match serde_json::to_string(&reply) {
                    Ok(json) => {
                        if tx.send(json).is_err() {
                            warn!("response writer closed");
                        }
                    }
                    Err(e) => warn!(error = %e, "encoding response"),
                }
            }
            .instrument(span),
        );
    }

    drop(tx);
    writer.await??;
    Ok(())
}

async fn answer(router: &RequestRouter, id: Uuid, line: &str) -> ServeReply {
    let outcome = match serde_json::from_str::<ServeRequest>(line) {
        Ok(req) => request(router, req.method, &req.path, req.payload).await,
        Err(e) => Err(anyhow::Error::new(e).context("decoding request")),
    };
    match outcome {
        Ok(resp) => ServeReply {
            id: id.to_string(),
            response: Some(resp),
            error: None,
        },
        Err(e) => {
            warn!(error = %format!("{e:#}"), "request rejected");
            ServeReply {
                id: id.to_string(),
                response: None,
                error: Some(format!("{e:#}")),
            }
        }
    }
}
