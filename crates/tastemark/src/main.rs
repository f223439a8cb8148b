//! `tastemark` - CLI for the tastemark review server
//!
//! This binary runs the HTTP API and offers a few maintenance commands for the
//! database and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use tastemark::auth::hash_password;
use tastemark::cli::{AdminCommand, Cli, Command, ConfigCommand};
use tastemark::{init_logging, Config, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match cli.command {
        Command::Serve(serve_cmd) => {
            let mut config = Config::load_from(cli.config)?;
            serve_cmd.apply(&mut config);
            config.validate()?;
            tastemark::api::serve(&config)
                .await
                .context("server failed")?;
        }
        Command::Status(status_cmd) => {
            let config = Config::load_from(cli.config)?;
            handle_status(&config, status_cmd.json)?;
        }
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd)?,
        Command::Admin(admin_cmd) => {
            let config = Config::load_from(cli.config)?;
            handle_admin(&config, admin_cmd)?;
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("cannot open database at {}", path.display()))?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": path,
            "bind_addr": format!("{}:{}", config.server.host, config.server.port),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("tastemark status");
        println!("----------------");
        println!("Database:      {}", path.display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Listen:        {}:{}", config.server.host, config.server.port);
        println!();
        println!("Restaurants:   {}", stats.restaurants);
        println!("Stores:        {}", stats.stores);
        println!("Reviews:       {}", stats.reviews);
        println!("Users:         {}", stats.users);
    }
    Ok(())
}

fn handle_admin(config: &Config, cmd: AdminCommand) -> anyhow::Result<()> {
    match cmd {
        AdminCommand::Create { password } => {
            anyhow::ensure!(!password.is_empty(), "password cannot be empty");
            let username = config.auth.admin_username.as_str();
            let storage = Storage::open(config.database_path())?;
            let hashed = hash_password(&password)?;

            match storage.create_user(username, &hashed) {
                Ok(user) => {
                    println!("Created admin account {} (id {})", user.username, user.user_id);
                }
                Err(e) if e.is_unique_violation() => {
                    anyhow::bail!("user {username} already exists");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let mut config = Config::load_from(config_path)?;
            let has_secret = config.auth.token_secret.is_some();
            if has_secret {
                config.auth.token_secret = Some("<redacted>".to_string());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Host:               {}", config.server.host);
                println!("  Port:               {}", config.server.port);
                match &config.server.static_dir {
                    Some(dir) => println!("  Static dir:         {}", dir.display()),
                    None => println!("  Static dir:         (none)"),
                }
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Auth]");
                println!(
                    "  Token secret:       {}",
                    if has_secret { "set" } else { "not set" }
                );
                println!("  Token TTL (hours):  {}", config.auth.token_ttl_hours);
                println!("  Admin username:     {}", config.auth.admin_username);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(config) if config.auth.token_secret.is_none() => {
                    println!("Configuration is valid.");
                    println!("Note: auth.token_secret is not set; `serve` will refuse to start.");
                }
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
