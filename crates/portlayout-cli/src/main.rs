//! Portal layout administration CLI.
//!
//! Provides the `portlayout` binary for working with a layout database
//! directly: registering users, publishing content definitions and
//! inspecting a user's merged layout or fragment subscriptions.
//!
//! Uses the same `LayoutService` as the HTTP server, so every command goes
//! through the same validation and locking.

use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use portlayout_server::error::ApiError;
use portlayout_server::service::LayoutService;
use portlayout_storage::{ProfileId, SqliteStore};

/// Portal layout administration tools.
#[derive(Parser)]
#[command(name = "portlayout", about = "Portal layout administration tools")]
struct Cli {
    /// Path to the layout database file.
    #[arg(short, long, global = true, default_value = "portlayout.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Register a user and create their default layout.
    RegisterUser {
        /// User name to register.
        name: String,
    },

    /// Publish a content definition that portlets can reference.
    Publish {
        /// Functional name; must be unique.
        #[arg(short, long)]
        fname: String,

        /// Display title used for new portlets.
        #[arg(short, long)]
        title: String,

        #[arg(short = 'D', long, default_value = "")]
        description: String,
    },

    /// Print a user's merged layout.
    Show {
        /// User name whose layout to print.
        user: String,

        /// Profile id.
        #[arg(short, long, default_value_t = 1)]
        profile: u32,
    },

    /// List a user's fragment subscriptions.
    Subscriptions {
        user: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let service = match SqliteStore::new(&cli.db) {
        Ok(store) => LayoutService::new(Box::new(store)),
        Err(e) => {
            eprintln!("Error: failed to open database '{}': {}", cli.db, e);
            process::exit(3);
        }
    };

    let exit_code = match cli.command {
        Commands::RegisterUser { name } => report(service.register_user(&name)),
        Commands::Publish {
            fname,
            title,
            description,
        } => report(service.publish(&fname, &title, &description)),
        Commands::Show { user, profile } => report(service.layout(&user, ProfileId(profile))),
        Commands::Subscriptions { user } => report(service.subscriptions(&user)),
    };
    process::exit(exit_code);
}

/// Prints a result as JSON and picks the exit code.
///
/// Returns exit code: 0 = success, 1 = rejected request,
/// 3 = storage or I/O error.
fn report<T: Serialize>(result: Result<T, ApiError>) -> i32 {
    match result {
        Ok(value) => {
            let json = serde_json::to_string_pretty(&value).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize result: {}\"}}", e)
            });
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(err: &ApiError) -> i32 {
    match err {
        ApiError::PersistenceFailure(_) | ApiError::InternalError(_) => 3,
        _ => 1,
    }
}
