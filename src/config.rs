//! Endpoint configuration.
//!
//! Connection parameters and script paths are plain structs passed to the
//! endpoint constructors. The binaries assemble them from the environment
//! via `from_env()`; the library itself never reads the environment.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable naming the address the bridge binds and the driver
/// connects to.
pub const ENV_CLIENT_ADDR: &str = "SIMBRIDGE_CLIENT_ADDR";
/// Environment variable naming the port for the same.
pub const ENV_CLIENT_PORT: &str = "SIMBRIDGE_CLIENT_PORT";
/// Environment variable naming the directory holding the tool scripts.
pub const ENV_SCRIPT_DIR: &str = "SIMBRIDGE_SCRIPT_DIR";
/// Environment variable naming the working directory for simulation output.
pub const ENV_ROOT_DIR: &str = "SIMBRIDGE_ROOT_DIR";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

/// Configuration for the driver (client) endpoint.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Bridge host to connect to.
    pub host: String,
    /// Bridge port to connect to.
    pub port: u16,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl DriverConfig {
    /// Build from `SIMBRIDGE_CLIENT_ADDR` / `SIMBRIDGE_CLIENT_PORT`,
    /// defaulting to `localhost:3000`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var(ENV_CLIENT_ADDR).unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: port_from_env()?,
        })
    }
}

/// Configuration for the bridge (server) endpoint.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host to bind the listening socket on.
    pub host: String,
    /// Port to bind the listening socket on.
    pub port: u16,
    /// Script that loads the simulation environment.
    pub load_script: PathBuf,
    /// Script that runs one simulation.
    pub run_script: PathBuf,
    /// Variable file exchanged with the run script.
    pub var_file: PathBuf,
    /// Results file the simulation writes.
    pub results_file: PathBuf,
}

impl BridgeConfig {
    /// Build from the environment: bind address from
    /// `SIMBRIDGE_CLIENT_ADDR` / `SIMBRIDGE_CLIENT_PORT`, script paths
    /// under `SIMBRIDGE_SCRIPT_DIR`, results under `SIMBRIDGE_ROOT_DIR`.
    pub fn from_env() -> Result<Self> {
        let script_dir = PathBuf::from(
            std::env::var(ENV_SCRIPT_DIR)
                .with_context(|| format!("{ENV_SCRIPT_DIR} must point at the script directory"))?,
        );
        let root_dir = PathBuf::from(
            std::env::var(ENV_ROOT_DIR)
                .with_context(|| format!("{ENV_ROOT_DIR} must point at the working directory"))?,
        );

        Ok(Self {
            host: std::env::var(ENV_CLIENT_ADDR).unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: port_from_env()?,
            load_script: script_dir.join("loadSimulator.ocn"),
            run_script: script_dir.join("run.ocn"),
            var_file: script_dir.join("vars.ocn"),
            results_file: root_dir.join("sim_res"),
        })
    }
}

fn port_from_env() -> Result<u16> {
    match std::env::var(ENV_CLIENT_PORT) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{ENV_CLIENT_PORT} is not a valid port: {raw:?}")),
        Err(_) => Ok(DEFAULT_PORT),
    }
}
