//! s3gw - entry point

use std::path::PathBuf;

use tracing::{error, info};

use s3gw_gateway::{Gateway, GatewayConfig, ShutdownSignal};
use s3gw_telemetry::TelemetryConfig;

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("s3gw {}", s3gw_gateway::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"s3gw - policy-enforcing S3 gateway

USAGE:
    s3gw [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

Without --config, /etc/s3gw/s3gw.toml is read when present.

ENVIRONMENT VARIABLES:
    S3GW_LISTEN_ADDR            Listen address (default: 0.0.0.0)
    S3GW_LISTEN_PORT            Listen port (default: 8080)
    S3GW_BACKEND_URL            Storage backend URL
    S3GW_BACKEND_TIMEOUT        Backend request timeout, e.g. 30s
    S3GW_TLS_CERT               PEM certificate chain; enables TLS with S3GW_TLS_KEY
    S3GW_TLS_KEY                PEM private key
    S3GW_POLICY_ENDPOINT        Policy admin base URL
    S3GW_POLICY_SERVICE         Policy service name
    S3GW_POLICY_USERNAME        Policy admin user
    S3GW_POLICY_PASSWORD        Policy admin password
    S3GW_REFRESH_INTERVAL       Policy and key refresh interval, e.g. 60s
    S3GW_IDENTITY_ENDPOINT      Storage admin API URL
    S3GW_IDENTITY_ACCESS_KEY    Storage admin access key
    S3GW_IDENTITY_SECRET_KEY    Storage admin secret key
    S3GW_LOG_LEVEL              Log level or filter directive (default: info)
"
    );
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match GatewayConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let telemetry = TelemetryConfig::builder()
        .service_name(&config.telemetry.service_name)
        .service_version(s3gw_gateway::VERSION)
        .log_level(&config.telemetry.log_level)
        .json_logs(config.telemetry.json_logs)
        .metrics_enabled(config.telemetry.metrics_enabled)
        .build();
    if let Err(e) = s3gw_telemetry::init_telemetry(&telemetry) {
        eprintln!("Failed to initialize telemetry: {e}");
        std::process::exit(1);
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    info!(
        version = s3gw_gateway::VERSION,
        listen = %format!("{}:{}", config.server.listen_addr, config.server.listen_port),
        backend = %config.server.backend_url,
        service = %config.policy.service_name,
        "Starting s3gw"
    );

    let gateway = match Gateway::from_config(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "Failed to create gateway");
            std::process::exit(1);
        }
    };

    if let Err(e) = gateway.run(ShutdownSignal::with_os_signals()).await {
        error!(error = %e, category = e.category(), "Gateway error");
        std::process::exit(1);
    }
}
