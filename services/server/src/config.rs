//! Server configuration
//!
//! Intentionally simple: defaults overridable through a few environment
//! variables:
//!
//! - `MATCHER_BIND_ADDR`     (default: "0.0.0.0")
//! - `MATCHER_PORT`          (default: "8080")
//! - `MATCHER_ADDRESS`       (default: a simulator operator address)
//! - `MATCHER_BUS_CAPACITY`  (default: "1024")
//! - `MATCHER_TX_QUEUES`     (default: "1")

use std::env;
use std::str::FromStr;

/// Default operator address for runs against the built-in chain simulator.
const SIM_OPERATOR_ADDRESS: &str = "SIMOPERATORADDRESS00000000000000";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind the websocket listener to.
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// This operator's matcher address.
    pub matcher_address: String,

    /// Capacity of each bus topic.
    pub bus_capacity: usize,

    /// Number of settlement transaction queues.
    pub tx_queue_count: usize,
}

impl Config {
    /// Construct a `Config` from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let bind_addr = env::var("MATCHER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = read_env_or_default("MATCHER_PORT", 8080u16)?;
        let matcher_address =
            env::var("MATCHER_ADDRESS").unwrap_or_else(|_| SIM_OPERATOR_ADDRESS.to_string());
        let bus_capacity = read_env_or_default("MATCHER_BUS_CAPACITY", 1024usize)?;
        let tx_queue_count = read_env_or_default("MATCHER_TX_QUEUES", 1usize)?;

        Ok(Config { bind_addr, port, matcher_address, bus_capacity, tx_queue_count })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            matcher_address: SIM_OPERATOR_ADDRESS.into(),
            bus_capacity: 1024,
            tx_queue_count: 1,
        }
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::error::Error + 'static,
{
    match env::var(key) {
        Ok(val) => Ok(val.parse::<T>()?),
        Err(_) => Ok(default),
    }
}
