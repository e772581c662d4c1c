//! # Registrar
//!
//! The binary for the Registrar academic records system.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │              apps/registrar (THE BINARY)           │
//! │                                                    │
//! │  ┌─────────────┐    ┌─────────────┐   ┌─────────┐  │
//! │  │   CLI       │    │   HTTP API  │   │ Config  │  │
//! │  │  (clap)     │    │   (axum)    │   │ (toml)  │  │
//! │  └──────┬──────┘    └──────┬──────┘   └────┬────┘  │
//! │         └──────────────────┼───────────────┘       │
//! │                            ▼                       │
//! │                  ┌──────────────────┐              │
//! │                  │  registrar-core  │              │
//! │                  │   (THE LOGIC)    │              │
//! │                  └──────────────────┘              │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! registrar init
//! registrar student add --id S1 --name "Ada Lovelace" --email ada@uni.edu
//! registrar course add --id CS101 --title "Intro" --credits 3 --department CS
//! registrar enroll --student S1 --course CS101
//! registrar grade --student S1 --course CS101 --score 91.5
//! registrar server --port 8080
//! ```

use clap::Parser;
use registrar::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    init_tracing(cli.verbose);

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. `REGISTRAR_LOG_FORMAT=json` switches to
/// machine-parseable output; `RUST_LOG` overrides the default filter.
fn init_tracing(verbose: bool) {
    let log_format = std::env::var("REGISTRAR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if verbose {
        "registrar=debug,registrar_core=debug,tower_http=debug"
    } else {
        "registrar=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

fn print_banner() {
    println!(
        r#"
  ╦═╗╔═╗╔═╗╦╔═╗╔╦╗╦═╗╔═╗╦═╗
  ╠╦╝║╣ ║ ╦║╚═╗ ║ ╠╦╝╠═╣╠╦╝
  ╩╚═╚═╝╚═╝╩╚═╝ ╩ ╩╚═╩ ╩╩╚═

  Academic Records v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
