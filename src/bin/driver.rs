//! Interactive driver client.
//!
//! Connects to a running bridge and walks the operator through the three
//! logical operations from a small menu: load the simulation environment
//! once, then push variables and run as many times as needed, then exit.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simbridge::config::DriverConfig;
use simbridge::driver::Driver;

fn print_menu() {
    println!();
    println!("1 - Load simulator");
    println!("2 - Update variables and run");
    println!("0 - Exit");
    print!("Option: ");
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

fn print_values(title: &str, values: &BTreeMap<String, f64>) {
    println!("{title}");
    for (name, value) in values {
        println!("  {name} = {value}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "simbridge=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = DriverConfig::from_env()?;

    println!("Connecting to bridge at {}:{}...", config.host, config.port);
    let mut driver = Driver::connect(&config)
        .await
        .context("could not reach the bridge")?;

    let mut variables: BTreeMap<String, f64> = BTreeMap::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_menu();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "1" => {
                variables = driver.load_simulator().await?;
                print_values("Simulator loaded. Received variables:", &variables);
            }
            "2" => {
                if variables.is_empty() {
                    println!("No variables yet - load the simulator first.");
                    continue;
                }
                print_values("Sending updated variables:", &variables);
                let results = driver.update_and_run(&variables).await?;
                print_values("Simulation results:", &results);

                // Stand-in for an optimizer step: nudge every variable so
                // consecutive runs are distinguishable.
                for value in variables.values_mut() {
                    *value *= 1.1;
                }
            }
            "0" => break,
            other => {
                if !other.is_empty() {
                    println!("Wrong option!");
                }
            }
        }
    }

    println!("Shutting down.");
    driver.shutdown().await?;
    Ok(())
}
