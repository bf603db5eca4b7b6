use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use clap::{Arg, ArgAction, Command};
use commonware_runtime::{tokio, Handle, Metrics, Runner, Spawner};
use commonware_utils::hex;
use futures::future::try_join_all;
use raffle_node::{api::Api, client::Client, raffle, Config, ValidatedConfig};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tracing::{error, info};

struct MetricsState {
    context: tokio::Context,
}

async fn metrics_handler(
    State(state): State<Arc<MetricsState>>,
) -> Result<Response<Body>, StatusCode> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(state.context.encode()))
        .map_err(|err| {
            error!("metrics response build failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

fn spawn_metrics_server(context: tokio::Context, addr: SocketAddr) -> Handle<()> {
    let state = Arc::new(MetricsState {
        context: context.clone(),
    });
    context.with_label("metrics").spawn(move |_context| async move {
        let listener = match ::tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!("metrics server bind failed on {addr}: {err}");
                return;
            }
        };
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(state);
        if let Err(err) = axum::serve(listener, app.into_make_service()).await {
            error!("metrics server failed on {addr}: {err}");
        }
    })
}

fn spawn_api_server(context: tokio::Context, addr: SocketAddr, api: Api) -> Handle<()> {
    context.with_label("api").spawn(move |_context| async move {
        let listener = match ::tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!("api server bind failed on {addr}: {err}");
                return;
            }
        };
        info!(%addr, "api listening");
        if let Err(err) = axum::serve(listener, api.router().into_make_service()).await {
            error!("api server failed on {addr}: {err}");
        }
    })
}

struct Clients {
    price_feed: Client,
    randomness_coordinator: Client,
    treasury: Client,
}

fn build_clients(config: &ValidatedConfig) -> Result<Clients> {
    let price_feed = Client::new(&config.price_feed, config.request_timeout)
        .context("Failed to create price feed client")?;
    let randomness_coordinator =
        Client::new(&config.randomness_coordinator, config.request_timeout)
            .context("Failed to create randomness coordinator client")?;
    let treasury = Client::new(&config.treasury, config.request_timeout)
        .context("Failed to create treasury client")?
        .with_auth_token(config.treasury_auth_token.clone());
    Ok(Clients {
        price_feed,
        randomness_coordinator,
        treasury,
    })
}

fn print_dry_run_report(config: &ValidatedConfig) {
    println!("dry-run report");
    println!("  owner: {}", hex(config.owner.as_ref()));
    println!("  coordinator: {}", hex(config.coordinator.as_ref()));
    println!(
        "  ports: api={} metrics={}",
        config.port, config.metrics_port
    );
    println!(
        "  oracles: price_feed={} randomness_coordinator={} treasury={}",
        config.price_feed, config.randomness_coordinator, config.treasury
    );
    println!(
        "  treasury_auth: {}",
        if config.treasury_auth_token.is_some() {
            "set"
        } else {
            "none"
        }
    );
    println!("  request_timeout: {:?}", config.request_timeout);
    println!(
        "  minimum_reference_value: {}",
        config.minimum_reference_value
    );
    println!(
        "  randomness: subscription_id={} key_hash={} confirmations={} callback_gas_limit={} num_words={}",
        config.randomness.subscription_id,
        hex(&config.randomness.key_hash),
        config.randomness.request_confirmations,
        config.randomness.callback_gas_limit,
        config.randomness.num_words
    );
    println!(
        "  mailbox_size={} event_log_capacity={}",
        config.mailbox_size, config.event_log_capacity
    );
}

fn main() {
    if let Err(err) = main_result() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn main_result() -> Result<()> {
    // Parse arguments
    let matches = Command::new("node")
        .about("Runs an oracle-priced raffle behind an HTTP API.")
        .arg(Arg::new("config").long("config").required(true))
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate config and exit without starting the node")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Emit structured (JSON) logs")
                .action(ArgAction::SetTrue),
        )
        .get_matches();
    let dry_run = matches.get_flag("dry-run");
    let use_json_logs = matches.get_flag("json-logs");

    // Load config
    let config_file = matches
        .get_one::<String>("config")
        .context("missing --config")?;
    let config_file = std::fs::read_to_string(config_file)
        .with_context(|| format!("Could not read config file {config_file}"))?;
    let config: Config =
        serde_yaml::from_str(&config_file).context("Could not parse config file")?;

    if dry_run {
        println!("{:#?}", config.redacted_debug());
        let config = config.validate()?;
        let _clients = build_clients(&config)?;
        print_dry_run_report(&config);
        println!("config ok");
        return Ok(());
    }

    let redacted = format!("{:?}", config.redacted_debug());
    let config = config.validate()?;

    // Initialize runtime
    let cfg = tokio::Config::default()
        .with_worker_threads(config.worker_threads)
        .with_catch_panics(true);
    let executor = tokio::Runner::new(cfg);

    // Start runtime
    executor.start(|context| async move {
        let context = context.with_label("raffle");
        let result: Result<()> = async {
            // Configure telemetry
            tokio::telemetry::init(
                context.with_label("telemetry"),
                tokio::telemetry::Logging {
                    level: config.log_level,
                    json: use_json_logs,
                },
                None,
                None,
            );
            info!(config = %redacted, "loaded config file");

            let metrics = spawn_metrics_server(
                context.clone(),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.metrics_port),
            );

            // Create oracle clients
            let clients = build_clients(&config)?;
            info!(
                owner = ?config.owner,
                coordinator = ?config.coordinator,
                port = config.port,
                minimum_reference_value = config.minimum_reference_value,
                "loaded config"
            );

            // Start raffle
            let (actor, mailbox) = raffle::Actor::new(
                context.with_label("round"),
                raffle::Config {
                    lottery: config.lottery(),
                    price_feed: clients.price_feed,
                    randomness_coordinator: clients.randomness_coordinator,
                    treasury: clients.treasury,
                    coordinator: config.coordinator.clone(),
                    mailbox_size: config.mailbox_size,
                },
            );
            let actor = actor.start();

            // Serve API
            let api = spawn_api_server(
                context.clone(),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port),
                Api::new(mailbox),
            );

            // Wait for any task to error
            if let Err(e) = try_join_all(vec![metrics, actor, api]).await {
                error!(?e, "task failed");
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(?e, "node initialization failed");
        }
    });

    Ok(())
}
