// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetlink::{
    auth::{AuthStateCache, FileCredentialStore},
    bulk::BulkOrchestrator,
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    gateway::DeviceGateway,
    mdns::NullMdnsDiscovery,
    scanner::Scanner,
    transport::{LegacyHttpTransport, RpcTransport},
};
use serde_json::{Value, json};
use tracing::info;

#[derive(Parser)]
#[command(name = "fleetlinkctl", about = "Manage and operate a fleet of smart-plug/relay/meter devices")]
struct Cli {
    #[arg(long, default_value = "config.yaml")]
    config: String,

    #[arg(long, default_value = "config_logger.yaml")]
    log_config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep a set of targets (or mDNS) for devices.
    Scan {
        /// IPs, CIDR ranges, or "start-end" ranges to probe.
        targets: Vec<String>,
        #[arg(long)]
        mdns: bool,
    },
    /// Fetch the full status of a single device.
    Status { address: String },
    /// Execute a single component action on a device.
    Action {
        address: String,
        component_key: String,
        action: String,
        /// JSON object of extra params, e.g. '{"id":0}'.
        #[arg(long)]
        params: Option<String>,
    },
    /// Update firmware on many devices.
    BulkUpdate {
        addresses: Vec<String>,
        #[arg(long, default_value = "stable")]
        channel: String,
    },
    /// Reboot many devices.
    BulkReboot { addresses: Vec<String> },
    /// Factory-reset many devices.
    BulkFactoryReset { addresses: Vec<String> },
    /// Fetch full status from many devices concurrently.
    BulkStatus { addresses: Vec<String> },
    /// Export component configuration from many devices.
    BulkConfigExport {
        addresses: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        component_types: Vec<String>,
    },
    /// Apply configuration to a component type across many devices.
    BulkConfigApply {
        addresses: Vec<String>,
        component_type: String,
        /// JSON object with the new configuration.
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger_guard = init_logger(&cli.log_config).context("failed to initialize logging")?;

    let cfg = resolve_config_path(&cli.config).and_then(Config::load_from_file).context("failed to resolve or load config")?;

    let credential_store = Arc::new(
        FileCredentialStore::open(cfg.auth.credential_store_path.clone())
            .await
            .context("failed to open credential store")?,
    );
    let auth_state = Arc::new(AuthStateCache::new(cfg.auth.auth_state_ttl.as_secs()));

    let rpc = RpcTransport::new(Arc::clone(&credential_store), Arc::clone(&auth_state));
    let legacy = LegacyHttpTransport::new();
    let gateway = Arc::new(DeviceGateway::new(
        rpc,
        legacy,
        auth_state,
        cfg.network.discovery_timeout,
        cfg.network.status_timeout,
        cfg.network.action_timeout,
    ));

    let output = match cli.command {
        Command::Scan { targets, mdns } => {
            let scanner = Scanner::new(Arc::clone(&gateway), Arc::new(NullMdnsDiscovery));
            let results = scanner.scan(&targets, cfg.network.discovery_timeout, cfg.concurrency.max_concurrent_scans, mdns).await?;
            json!(results)
        },
        Command::Status { address } => {
            let snapshot = gateway.get_full_status(&address).await?;
            json!(snapshot)
        },
        Command::Action { address, component_key, action, params } => {
            let params: Option<Value> = params.map(|p| serde_json::from_str(&p)).transpose().context("params must be valid JSON")?;
            let result = gateway.execute_component_action(&address, &component_key, &action, params).await;
            json!(result)
        },
        Command::BulkUpdate { addresses, channel } => {
            let bulk = BulkOrchestrator::new(Arc::clone(&gateway), cfg.concurrency.max_concurrent_bulk_ops);
            json!(bulk.bulk_update(&addresses, &channel).await?)
        },
        Command::BulkReboot { addresses } => {
            let bulk = BulkOrchestrator::new(Arc::clone(&gateway), cfg.concurrency.max_concurrent_bulk_ops);
            json!(bulk.bulk_reboot(&addresses).await?)
        },
        Command::BulkFactoryReset { addresses } => {
            let bulk = BulkOrchestrator::new(Arc::clone(&gateway), cfg.concurrency.max_concurrent_bulk_ops);
            json!(bulk.bulk_factory_reset(&addresses).await?)
        },
        Command::BulkStatus { addresses } => {
            let bulk = BulkOrchestrator::new(Arc::clone(&gateway), cfg.concurrency.max_concurrent_bulk_ops);
            json!(bulk.bulk_status(&addresses).await?)
        },
        Command::BulkConfigExport { addresses, component_types } => {
            let bulk = BulkOrchestrator::new(Arc::clone(&gateway), cfg.concurrency.max_concurrent_bulk_ops);
            bulk.bulk_config_export(&addresses, &component_types).await?
        },
        Command::BulkConfigApply { addresses, component_type, config } => {
            let config: Value = serde_json::from_str(&config).context("config must be valid JSON")?;
            let bulk = BulkOrchestrator::new(Arc::clone(&gateway), cfg.concurrency.max_concurrent_bulk_ops);
            json!(bulk.bulk_config_apply(&addresses, &component_type, config).await?)
        },
    };

    info!("command completed");
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
