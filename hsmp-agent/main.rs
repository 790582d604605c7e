use axum::{response::IntoResponse, routing::get, Router};
use clap::{Parser, Subcommand};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hsmp::{
    strerror, DfPstate, Hsmp, HsmpConfig, HsmpError, HsmpMetricExporter, LinuxPlatform,
    NbioPstate, Result, XgmiWidth,
};

#[derive(Parser, Debug)]
#[command(name = "hsmpctl")]
#[command(about = "Query and control AMD EPYC power management through the SMU mailbox")]
struct Args {
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging (shows every register access and mailbox message)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Socket selection shared by the per-socket commands
#[derive(clap::Args, Debug, Clone, Copy)]
struct SocketArgs {
    #[arg(long, default_value_t = 0, help = "Socket to address")]
    socket: usize,

    #[arg(long, conflicts_with = "socket", help = "Address every socket")]
    all: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SMU firmware and HSMP interface versions
    Version,

    /// Average socket power
    SocketPower(SocketArgs),

    /// Show or set the socket power limit
    PowerLimit {
        #[command(flatten)]
        sockets: SocketArgs,

        #[arg(long, value_name = "mW")]
        set: Option<u32>,
    },

    /// Highest settable socket power limit
    MaxPower(SocketArgs),

    /// Show (per CPU) or set the core boost limit
    #[command(group(
        clap::ArgGroup::new("target")
            .required(true)
            .args(["cpu", "socket", "all"])
    ))]
    BoostLimit {
        #[arg(long)]
        cpu: Option<usize>,

        #[arg(long)]
        socket: Option<usize>,

        #[arg(long)]
        all: bool,

        #[arg(long, value_name = "MHz")]
        set: Option<u32>,
    },

    /// PROC_HOT status
    ProcHot(SocketArgs),

    /// Bound the xGMI link width on every socket: `<min> <max>` or `auto`
    XgmiWidth {
        #[arg(required = true, num_args = 1..=2, value_names = ["MIN", "MAX"])]
        widths: Vec<String>,
    },

    /// Pin the data fabric P-state (0-3) or return it to `auto`
    DfPstate {
        #[command(flatten)]
        sockets: SocketArgs,

        pstate: String,
    },

    /// Data fabric and memory clocks
    FabricClocks(SocketArgs),

    /// Core clock ceiling under the current limits
    CoreClockMax(SocketArgs),

    /// C0 residency
    C0Residency(SocketArgs),

    /// Set the NBIO P-state of the root complex hosting a PCI bus
    NbioPstate {
        #[arg(long, value_parser = parse_bus)]
        bus: u8,

        /// `auto` or `0`
        pstate: String,
    },

    /// DDR bandwidth
    DdrBw(SocketArgs),

    /// Sockets, CPUs and root complex buses
    List,

    /// Export the read-only telemetry over HTTP in Prometheus format
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
    },
}

fn parse_bus(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid bus number {s:?}: {e}"))
}

fn invalid(what: &str, value: &str) -> HsmpError {
    HsmpError::InvalidArgument(format!("unknown {what} {value:?}"))
}

impl SocketArgs {
    fn resolve(&self, hsmp: &Hsmp) -> Result<Vec<usize>> {
        if self.all {
            let sockets = hsmp.enter(None)?.topology.socket_count();
            Ok((0..sockets).collect())
        } else {
            Ok(vec![self.socket])
        }
    }
}

/// Run `read` on every selected socket and print one line per socket
fn per_socket<T, F>(hsmp: &Hsmp, sockets: &SocketArgs, read: F) -> Result<()>
where
    F: Fn(usize) -> Result<T>,
    T: std::fmt::Display,
{
    for socket in sockets.resolve(hsmp)? {
        println!("socket {}: {}", socket, read(socket)?);
    }
    Ok(())
}

fn run(hsmp: &Hsmp, command: Command) -> Result<()> {
    match command {
        Command::Version => {
            println!("SMU firmware version: {}", hsmp.smu_fw_version()?);
            println!("HSMP interface version: {}", hsmp.interface_version()?);
        }
        Command::SocketPower(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.socket_power(s).map(|mw| format!("{mw} mW"))
            })?;
        }
        Command::PowerLimit { sockets, set } => {
            if let Some(limit) = set {
                for socket in sockets.resolve(hsmp)? {
                    hsmp.set_socket_power_limit(socket, limit)?;
                }
            }
            per_socket(hsmp, &sockets, |s| {
                hsmp.socket_power_limit(s).map(|mw| format!("{mw} mW"))
            })?;
        }
        Command::MaxPower(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.socket_max_power_limit(s).map(|mw| format!("{mw} mW"))
            })?;
        }
        Command::BoostLimit {
            cpu,
            socket,
            all,
            set,
        } => match (set, cpu, socket) {
            (Some(mhz), Some(cpu), _) => hsmp.set_cpu_boost_limit(cpu, mhz)?,
            (Some(mhz), None, Some(socket)) => hsmp.set_socket_boost_limit(socket, mhz)?,
            (Some(mhz), None, None) if all => hsmp.set_system_boost_limit(mhz)?,
            (None, Some(cpu), _) => {
                println!("cpu {}: {} MHz", cpu, hsmp.cpu_boost_limit(cpu)?);
            }
            _ => {
                return Err(HsmpError::InvalidArgument(
                    "boost limits can only be read per CPU".to_string(),
                ))
            }
        },
        Command::ProcHot(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.proc_hot(s)
                    .map(|hot| if hot { "active" } else { "inactive" })
            })?;
        }
        Command::XgmiWidth { widths } => match widths.as_slice() {
            [auto] if auto == "auto" => hsmp.set_xgmi_auto()?,
            [min, max] => {
                let min = XgmiWidth::from_name(min).ok_or_else(|| invalid("xGMI width", min))?;
                let max = XgmiWidth::from_name(max).ok_or_else(|| invalid("xGMI width", max))?;
                hsmp.set_xgmi_width(min, max)?;
            }
            _ => {
                return Err(HsmpError::InvalidArgument(
                    "expected <min> <max> or auto".to_string(),
                ))
            }
        },
        Command::DfPstate { sockets, pstate } => {
            let pstate =
                DfPstate::from_name(&pstate).ok_or_else(|| invalid("DF P-state", &pstate))?;
            for socket in sockets.resolve(hsmp)? {
                hsmp.set_data_fabric_pstate(socket, pstate)?;
            }
        }
        Command::FabricClocks(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.fabric_clocks(s)
                    .map(|c| format!("fclk {} MHz, mclk {} MHz", c.fclk_mhz, c.mclk_mhz))
            })?;
        }
        Command::CoreClockMax(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.core_clock_max_frequency(s)
                    .map(|mhz| format!("{mhz} MHz"))
            })?;
        }
        Command::C0Residency(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.c0_residency(s).map(|pct| format!("{pct} %"))
            })?;
        }
        Command::NbioPstate { bus, pstate } => {
            let pstate =
                NbioPstate::from_name(&pstate).ok_or_else(|| invalid("NBIO P-state", &pstate))?;
            hsmp.set_nbio_pstate(bus, pstate)?;
        }
        Command::DdrBw(sockets) => {
            per_socket(hsmp, &sockets, |s| {
                hsmp.ddr_bandwidths(s).map(|bw| {
                    format!(
                        "max {} GB/s, utilized {} GB/s ({} %)",
                        bw.max_gbps, bw.utilized_gbps, bw.utilized_pct
                    )
                })
            })?;
        }
        Command::List => list(hsmp)?,
        Command::Serve { listen } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(hsmp.config().clone(), listen))?;
        }
    }

    Ok(())
}

fn list(hsmp: &Hsmp) -> Result<()> {
    let state = hsmp.enter(None)?;

    println!("processor: {}", state.processor.name());
    println!("sockets: {}", state.topology.socket_count());
    for tile in state.topology.tiles() {
        println!(
            "  socket {} tile {}: {} buses 0x{:02X}-0x{:02X}",
            tile.socket, tile.id, tile.address, tile.bus_base, tile.bus_limit
        );
    }

    println!("cpus: {}", state.cpus.len());
    for (cpu, entry) in state.cpus.iter() {
        println!(
            "  cpu {}: socket {} apic 0x{:X}",
            cpu, entry.socket, entry.apic_id
        );
    }

    print!("buses:");
    let mut index = 0;
    loop {
        let (bus, next) = hsmp.next_bus(index)?;
        print!(" 0x{bus:02X}");
        if next == 0 {
            break;
        }
        index = next;
    }
    println!();

    Ok(())
}

async fn metrics_handler(
    axum::extract::State(exporter): axum::extract::State<Arc<HsmpMetricExporter>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    let metric_families = exporter.registry().gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode HSMP metrics: {}", e);
    }

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    tracing::info!("Installing signal handlers...");

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Ctrl+C received!");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("SIGTERM received!");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }

    cancel_token.cancel();
    tracing::warn!("Cancellation token activated");
}

/// Wait for a task, logging rather than propagating a panic or cancellation
async fn join_logged(handle: tokio::task::JoinHandle<()>, what: &str) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("{} failed: {}", what, e);
            false
        }
    }
}

async fn serve(config: HsmpConfig, addr: SocketAddr) -> Result<()> {
    // Discovery sleeps while polling the mailbox, keep it off the reactor
    let exporter = tokio::task::spawn_blocking(move || {
        let hsmp = Hsmp::new(Box::new(LinuxPlatform::new(config.clone())), config);
        HsmpMetricExporter::new(Arc::new(hsmp))
    })
    .await
    .map_err(|e| HsmpError::ConfigError(format!("exporter setup failed: {e}")))??;
    let exporter = Arc::new(exporter);

    let cancel_token = CancellationToken::new();
    let collection_handle = exporter.start(cancel_token.clone());

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::clone(&exporter));

    tracing::warn!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("Server shutdown complete, waiting for collection loop to finish...");
    join_logged(collection_handle, "Collection loop").await;

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Hsmp::instance(), args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{}", e);
            eprintln!("ERROR: {}", strerror(e.code()));
            eprintln!("{}", e.hint());
            ExitCode::FAILURE
        }
    }
}
