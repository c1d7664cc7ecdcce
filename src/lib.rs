//! simbridge library
//!
//! A narrow bridge for driving an EDA simulator's command console from an
//! external automation client:
//!
//! - `protocol` - length-prefixed framing and the `{kind, payload}` codec
//! - `driver` - client endpoint issuing the logical operations
//! - `bridge` - server endpoint embedded in the tool
//! - `translate` - request ↔ tool-command mapping and the file grammars
//! - `tool` - line-oriented duplex channel to the tool interpreter
//! - `config` - explicit endpoint configuration
//!
//! # Driving a simulation
//!
//! ```ignore
//! use simbridge::config::DriverConfig;
//! use simbridge::driver::Driver;
//!
//! let mut driver = Driver::connect(&DriverConfig::from_env()?).await?;
//! let mut variables = driver.load_simulator().await?;
//! variables.insert("vdd".to_string(), 1.8);
//! let results = driver.update_and_run(&variables).await?;
//! driver.shutdown().await?;
//! ```

pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod tool;
pub mod translate;

pub use error::{BridgeError, Result};
