use clap::{Parser, Subcommand};

use stockledger_core::{ProductId, StoreId};

#[derive(Debug, Parser)]
#[command(name = "stockledger-admin")]
#[command(about = "Restock and inspection tool for the store inventory ledger")]
#[command(version)]
pub struct Cli {
    /// Postgres connection URL; an in-memory ledger is used when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled Postgres connections
    #[arg(long, default_value_t = 10)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// Identifies one inventory record.
#[derive(Debug, Clone, clap::Args)]
pub struct KeyArgs {
    #[arg(long = "store")]
    pub store_id: StoreId,

    #[arg(long = "product")]
    pub product_id: ProductId,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add (restock) or remove (shrinkage, correction) on-hand units
    Adjust {
        #[command(flatten)]
        key: KeyArgs,

        /// Signed change to quantity on hand
        #[arg(long, allow_negative_numbers = true)]
        delta: i64,
    },

    /// Hold units against an order
    Reserve {
        #[command(flatten)]
        key: KeyArgs,

        #[arg(long)]
        quantity: i64,
    },

    /// Return reserved units (over-release is clamped)
    Release {
        #[command(flatten)]
        key: KeyArgs,

        #[arg(long)]
        quantity: i64,
    },

    /// Show available / on-hand / reserved for one item
    Availability {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Set the SKU and restock policy of an item
    Configure {
        #[command(flatten)]
        key: KeyArgs,

        /// Keeps the current SKU when omitted
        #[arg(long)]
        sku: Option<String>,

        /// Replaces the stored point, so it must always be given
        #[arg(long)]
        reorder_point: i64,

        #[arg(long)]
        reorder_quantity: i64,
    },

    /// List every item of a store
    ByStore {
        #[arg(long = "store")]
        store_id: StoreId,
    },

    /// List items of a store at or below their reorder point
    LowStock {
        #[arg(long = "store")]
        store_id: StoreId,
    },

    /// List a SKU across all stores
    BySku { sku: String },

    /// Create the inventory schema (Postgres only)
    Migrate,

    /// Race concurrent reserve(1) calls against a freshly stocked item and
    /// verify nothing was oversold
    Soak {
        /// Units put on hand before the race
        #[arg(long, default_value_t = 100)]
        stock: i64,

        /// Concurrent reservation attempts
        #[arg(long, default_value_t = 500)]
        tasks: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_adjustment() {
        let store = StoreId::new();
        let product = ProductId::new();
        let cli = Cli::try_parse_from([
            "stockledger-admin",
            "adjust",
            "--store",
            &store.to_string(),
            "--product",
            &product.to_string(),
            "--delta",
            "-4",
        ])
        .unwrap();

        match cli.command {
            Command::Adjust { key, delta } => {
                assert_eq!(key.store_id, store);
                assert_eq!(key.product_id, product);
                assert_eq!(delta, -4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn configure_args<'a>(store: &'a str, product: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
        let mut args = vec!["stockledger-admin", "configure", "--store", store, "--product", product];
        args.extend_from_slice(extra);
        args
    }

    #[test]
    fn configure_requires_the_full_restock_policy() {
        let store = StoreId::new().to_string();
        let product = ProductId::new().to_string();

        assert!(Cli::try_parse_from(configure_args(&store, &product, &["--sku", "SKU-9"])).is_err());
        assert!(
            Cli::try_parse_from(configure_args(&store, &product, &["--reorder-point", "4"])).is_err()
        );

        let cli = Cli::try_parse_from(configure_args(
            &store,
            &product,
            &["--reorder-point", "4", "--reorder-quantity", "12"],
        ))
        .unwrap();
        match cli.command {
            Command::Configure {
                sku,
                reorder_point,
                reorder_quantity,
                ..
            } => {
                assert_eq!(sku, None);
                assert_eq!(reorder_point, 4);
                assert_eq!(reorder_quantity, 12);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        let err = Cli::try_parse_from([
            "stockledger-admin",
            "availability",
            "--store",
            "not-a-uuid",
            "--product",
            &ProductId::new().to_string(),
        ]);
        assert!(err.is_err());
    }
}
