use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quotawatch::config::MonitorConfig;
use quotawatch::control::{routes::create_control_router, ControlRequest, Controller};
use quotawatch::monitor::fetcher::HttpQuotaFetcher;
use quotawatch::monitor::scheduler::Scheduler;
use quotawatch::monitor::sweep::Sweeper;
use quotawatch::notifications::indicator::StatusFileIndicator;
use quotawatch::notifications::service::NotificationService;
use quotawatch::store::{json_file::JsonFileStore, TargetStore};
use quotawatch::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the monitor daemon with its control endpoint (default)
    Run,
    /// Check every target once and exit
    Check,
    /// Print the stored targets and their last known balances
    Status,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "quotawatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("quotawatch version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();
    let config = MonitorConfig::load(args.config.as_deref())?;

    init_logging(&config.log_dir);
    info!("Starting quotawatch, version: {}", VERSION);

    // --- Storage ---
    let store = TargetStore::new(Arc::new(JsonFileStore::new(config.store_dir())));
    if let Err(e) = store.migrate_legacy_config().await {
        warn!(error = %e, "Legacy configuration migration failed.");
    }

    // --- Monitor wiring ---
    let fetcher = Arc::new(HttpQuotaFetcher::new(config.request_timeout())?);
    let notifier = Arc::new(NotificationService::with_defaults(config.webhook.as_ref())?);
    let indicator = Arc::new(StatusFileIndicator::new(config.indicator_path()));
    let sweeper = Arc::new(Sweeper::new(
        store,
        fetcher,
        notifier,
        indicator,
        config.sweep_delays(),
    ));
    let scheduler = Arc::new(Scheduler::new(sweeper));
    let controller = Arc::new(Controller::new(scheduler.clone()));

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(&config, scheduler, controller).await,
        Command::Check => {
            let ticket = scheduler.fire_force_sweep().await?;
            if ticket.queued == 0 {
                println!("No targets configured.");
                return Ok(());
            }
            if let Some(report) = ticket.wait().await {
                println!(
                    "Checked {}, failed {}, skipped {}, low balance alerts {}",
                    report.checked.len(),
                    report.failed.len(),
                    report.skipped.len(),
                    report.low_balance_alerts
                );
            }
            Ok(())
        }
        Command::Status => {
            let reply = controller.handle(ControlRequest::DebugStatus).await;
            match (reply.message, reply.error) {
                (Some(report), _) => println!("{report}"),
                (None, Some(err)) => error!("{err}"),
                (None, None) => {}
            }
            Ok(())
        }
    }
}

async fn run_daemon(
    config: &MonitorConfig,
    scheduler: Arc<Scheduler>,
    controller: Arc<Controller>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = scheduler.rearm().await {
        error!(error = %e, "Failed to arm the recurring check at startup.");
    }
    scheduler.spawn_gated_sweep(config.startup_check_delay());

    let app = create_control_router(controller);
    let listener = tokio::net::TcpListener::bind(&config.control_address).await?;
    info!("Control endpoint listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal.");
            }
            info!("Shutdown signal received.");
        })
        .await?;

    scheduler.cancel().await;
    info!("quotawatch stopped.");
    Ok(())
}
