//! CLI argument definitions using clap
//!
//! Commands:
//! - pagestream serve [--config <path>] [--port <port>]
//! - pagestream watch [--url <base>] [filter flags] [--position N] [--size N]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::records::{OrderFilter, OrderStatus};
use crate::sync::DEFAULT_WINDOW_SIZE;

/// pagestream - live filtered pagination over server-sent events
#[derive(Parser, Debug)]
#[command(name = "pagestream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the order server
    Serve {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },

    /// Follow the live count and one window of a running server
    Watch {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:8080")]
        url: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// First index of the window
        #[arg(long, default_value_t = 0)]
        position: u64,

        /// Window size
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        size: u64,
    },
}

/// Filter flags; omitted flags do not constrain
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Exact status, e.g. PAID
    #[arg(long)]
    pub status: Option<OrderStatus>,

    /// Customer name substring
    #[arg(long)]
    pub customer: Option<String>,

    /// Delivery address substring
    #[arg(long)]
    pub address: Option<String>,

    /// Exact order date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,

    /// Exact amount
    #[arg(long)]
    pub amount: Option<f64>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> OrderFilter {
        let mut filter = OrderFilter::all();
        if let Some(status) = self.status {
            filter = filter.with_status(status);
        }
        if let Some(customer) = &self.customer {
            filter = filter.with_customer(customer.clone());
        }
        if let Some(address) = &self.address {
            filter = filter.with_delivery_address(address.clone());
        }
        if let Some(date) = &self.date {
            filter = filter.with_order_date(date.clone());
        }
        if let Some(amount) = self.amount {
            filter = filter.with_amount(amount);
        }
        filter
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["pagestream", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve { config, port } => {
                assert!(config.is_none());
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_watch_filter() {
        let cli = Cli::try_parse_from([
            "pagestream", "watch", "--status", "paid", "--customer", "Mia", "--position", "30",
        ])
        .unwrap();
        match cli.command {
            Command::Watch { url, filter, position, size } => {
                assert_eq!(url, "http://localhost:8080");
                assert_eq!(position, 30);
                assert_eq!(size, DEFAULT_WINDOW_SIZE);
                assert_eq!(
                    filter.to_filter(),
                    OrderFilter::all().with_status(OrderStatus::Paid).with_customer("Mia")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Cli::try_parse_from(["pagestream", "watch", "--status", "LOST"]).is_err());
    }
}
