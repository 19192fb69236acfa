//! Stockledger admin CLI.
//!
//! Thin inbound caller of the reservation engine for restock crews and
//! operators. Results are printed as JSON on stdout; logs go to stderr via
//! tracing.

mod cli;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use stockledger_core::{ProductId, StoreId};
use stockledger_infra::{
    EngineConfig, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, ReservationEngine,
    TracingReorderSink,
};
use stockledger_inventory::{InventoryError, ItemSettings};

use crate::cli::{Cli, Command};

type Engine = ReservationEngine<Arc<dyn InventoryStore>, TracingReorderSink>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("invalid engine configuration")?;

    let postgres = match &cli.database_url {
        Some(url) => Some(
            PostgresInventoryStore::connect(url, cli.max_connections)
                .await
                .context("failed to connect to Postgres")?,
        ),
        None => {
            warn!("DATABASE_URL not set; using an in-memory ledger that is discarded on exit");
            None
        }
    };

    if let Command::Migrate = cli.command {
        let Some(store) = postgres else {
            bail!("migrate needs DATABASE_URL");
        };
        store.migrate().await.context("failed to apply schema")?;
        info!("inventory schema applied");
        return Ok(());
    }

    let store: Arc<dyn InventoryStore> = match postgres {
        Some(store) => Arc::new(store),
        None => Arc::new(InMemoryInventoryStore::new()),
    };
    info!(strategy = ?config.strategy, trigger = ?config.reorder_trigger, "engine ready");
    let engine = Arc::new(ReservationEngine::new(store, TracingReorderSink, config));

    run(engine, cli.command).await
}

async fn run(engine: Arc<Engine>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Adjust { key, delta } => {
            let record = engine.adjust_on_hand(key.store_id, key.product_id, delta).await?;
            print_json(&record)
        }
        Command::Reserve { key, quantity } => {
            let (record, token) = engine.reserve(key.store_id, key.product_id, quantity).await?;
            print_json(&serde_json::json!({ "record": record, "token": token }))
        }
        Command::Release { key, quantity } => {
            let record = engine.release(key.store_id, key.product_id, quantity).await?;
            print_json(&record)
        }
        Command::Availability { key } => {
            let availability = engine.get_availability(key.store_id, key.product_id).await?;
            print_json(&availability)
        }
        Command::Configure {
            key,
            sku,
            reorder_point,
            reorder_quantity,
        } => {
            let settings = ItemSettings {
                sku,
                reorder_point,
                reorder_quantity,
            };
            let record = engine.configure_item(key.store_id, key.product_id, settings).await?;
            print_json(&record)
        }
        Command::ByStore { store_id } => print_json(&engine.list_by_store(store_id).await?),
        Command::LowStock { store_id } => print_json(&engine.list_low_stock(store_id).await?),
        Command::BySku { sku } => print_json(&engine.list_by_sku(&sku).await?),
        Command::Soak { stock, tasks } => soak(engine, stock, tasks).await,
        Command::Migrate => bail!("migrate does not go through the engine"),
    }
}

#[derive(Debug, Default, Serialize)]
struct SoakReport {
    store_id: StoreId,
    product_id: ProductId,
    stock: i64,
    tasks: usize,
    granted: i64,
    refused: i64,
    timed_out: i64,
    reserved: i64,
    available: i64,
    elapsed_ms: u128,
}

/// Race `tasks` reserve(1) calls against `stock` units on a fresh key.
async fn soak(engine: Arc<Engine>, stock: i64, tasks: usize) -> anyhow::Result<()> {
    if stock <= 0 {
        bail!("soak needs a positive --stock");
    }

    let (store_id, product_id) = (StoreId::new(), ProductId::new());
    engine.adjust_on_hand(store_id, product_id, stock).await?;

    let started = Instant::now();
    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reserve(store_id, product_id, 1).await })
        })
        .collect();

    let mut report = SoakReport {
        store_id,
        product_id,
        stock,
        tasks,
        ..SoakReport::default()
    };
    for handle in handles {
        match handle.await.context("reservation task failed")? {
            Ok(_) => report.granted += 1,
            Err(InventoryError::InsufficientInventory { .. }) => report.refused += 1,
            Err(e) if e.is_transient() => report.timed_out += 1,
            Err(e) => return Err(e.into()),
        }
    }
    report.elapsed_ms = started.elapsed().as_millis();

    let availability = engine.get_availability(store_id, product_id).await?;
    report.reserved = availability.reserved;
    report.available = availability.available;
    print_json(&report)?;

    if availability.reserved > stock || availability.reserved != report.granted {
        bail!(
            "oversold: {} granted, {} reserved against {} on hand",
            report.granted,
            availability.reserved,
            stock
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory_engine() -> Arc<Engine> {
        let store: Arc<dyn InventoryStore> = Arc::new(InMemoryInventoryStore::new());
        Arc::new(ReservationEngine::new(store, TracingReorderSink, EngineConfig::default()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn soak_passes_against_in_memory_ledger() {
        soak(in_memory_engine(), 25, 100).await.unwrap();
    }

    #[tokio::test]
    async fn soak_rejects_empty_stock() {
        assert!(soak(in_memory_engine(), 0, 10).await.is_err());
    }
}
