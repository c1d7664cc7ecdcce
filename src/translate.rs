//! Translation between logical requests and tool interpreter commands.
//!
//! The translator owns the two fixed text grammars exchanged with the tool
//! through the filesystem: the variable file (`desVar( "<name>" <value> )`
//! lines, values optionally carrying a metric-prefix letter) and the
//! results file (whitespace-separated `<name> <value>` pairs).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{Request, Response};

/// Acknowledgement markers the tool embeds in successful replies.
const LOAD_ACK: &str = "loadSimulator_OK";
const RUN_ACK: &str = "updateAndRun_OK";

/// Metric prefixes accepted in variable files, with their exponent text.
///
/// Kilo appears twice because the tool accepts both `k` and `K`. Prefix
/// letters are substituted as literal substrings anywhere in the value
/// token, matching the tool's historical reader; a prefix letter embedded
/// in a non-prefix token will still be substituted. Documented legacy
/// behavior, kept as-is.
const METRIC_PREFIXES: [(&str, &str); 10] = [
    ("f", "e-15"),
    ("p", "e-12"),
    ("n", "e-9"),
    ("u", "e-6"),
    ("m", "e-3"),
    ("k", "e3"),
    ("K", "e3"),
    ("M", "e6"),
    ("G", "e9"),
    ("T", "e12"),
];

static VAR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"desVar\(\s*"(?P<param>\w+)"\s*(?P<value>\S+)\s*\)"#)
        .expect("constant regex pattern is valid")
});

static RESULT_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?P<param>\S+)\s+(?P<value>\S+)").expect("constant regex pattern is valid")
});

/// One command for the tool interpreter, or the sanctioned shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    /// A single textual line to evaluate.
    Eval(String),
    /// End the conversation; nothing is sent to the tool.
    Exit,
}

/// Maps logical requests to tool commands and tool replies back to logical
/// responses.
pub struct Translator {
    load_script: PathBuf,
    run_script: PathBuf,
    var_file: PathBuf,
    results_file: PathBuf,
}

impl Translator {
    /// Build a translator from the bridge configuration's script paths.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            load_script: config.load_script.clone(),
            run_script: config.run_script.clone(),
            var_file: config.var_file.clone(),
            results_file: config.results_file.clone(),
        }
    }

    /// Translate a logical request into a tool command.
    ///
    /// `UpdateAndRun` first persists the variables to the variable file so
    /// the run script can pick them up.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Unsupported`] for informational requests other than
    ///   `exit`.
    /// - [`BridgeError::Serialization`] for non-finite variable values.
    /// - [`BridgeError::Io`] if the variable file cannot be written.
    pub fn translate_request(&self, req: &Request) -> Result<ToolCommand> {
        match req {
            Request::Info(text) if text.eq_ignore_ascii_case("exit") => Ok(ToolCommand::Exit),
            Request::Info(text) => Err(BridgeError::Unsupported(format!(
                "unexpected info request {text:?}"
            ))),
            Request::LoadSimulator => Ok(ToolCommand::Eval(format!(
                r#"loadSimulator( "{}" "{}")"#,
                self.load_script.display(),
                self.results_file.display()
            ))),
            Request::UpdateAndRun(vars) => {
                write_variable_file(&self.var_file, vars)?;
                Ok(ToolCommand::Eval(format!(
                    r#"updateAndRun("{}" "{}" "SIMBRIDGE_RESULT_FILE={}")"#,
                    self.run_script.display(),
                    self.var_file.display(),
                    self.results_file.display()
                )))
            }
        }
    }

    /// Translate a tool reply into a logical response, keyed on the `_OK`
    /// acknowledgement marker embedded in the reply text.
    ///
    /// A `loadSimulator` acknowledgement re-reads the variable file that was
    /// most recently written, so the driver receives back the variables it
    /// originally set. An `updateAndRun` acknowledgement parses the results
    /// file instead.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unsupported`] when no known acknowledgement
    /// marker is present.
    pub fn translate_reply(&self, reply: &str) -> Result<Response> {
        if reply.contains(LOAD_ACK) {
            Ok(Response::LoadSimulator(read_variable_file(&self.var_file)?))
        } else if reply.contains(RUN_ACK) {
            Ok(Response::UpdateAndRun(read_results_file(
                &self.results_file,
            )?))
        } else {
            Err(BridgeError::Unsupported(format!(
                "unrecognized tool reply {reply:?}"
            )))
        }
    }
}

/// Write variables to the variable file, one `desVar` line per entry.
///
/// Values are written as plain decimal text with no unit suffix.
pub fn write_variable_file(path: &Path, vars: &BTreeMap<String, f64>) -> Result<()> {
    let mut content = String::new();
    for (name, value) in vars {
        if !value.is_finite() {
            return Err(BridgeError::Serialization(format!(
                "variable {name:?} has non-finite value"
            )));
        }
        writeln!(content, "desVar(\t \"{name}\" {value}\t)").expect("writing to a String");
    }
    fs::write(path, content)?;
    Ok(())
}

/// Parse the variable file back into a name → value mapping.
pub fn read_variable_file(path: &Path) -> Result<BTreeMap<String, f64>> {
    let content = fs::read_to_string(path)?;
    let mut variables = BTreeMap::new();

    for cap in VAR_LINE.captures_iter(&content) {
        let name = cap["param"].to_string();
        let value = parse_value(&cap["value"])?;
        variables.insert(name, value);
    }

    Ok(variables)
}

/// Parse the results file: whitespace-separated `<name> <value>` pairs,
/// values as plain decimals.
pub fn read_results_file(path: &Path) -> Result<BTreeMap<String, f64>> {
    let content = fs::read_to_string(path)?;
    let mut results = BTreeMap::new();

    for cap in RESULT_PAIR.captures_iter(&content) {
        let name = cap["param"].to_string();
        let value: f64 = cap["value"].parse().map_err(|_| {
            BridgeError::Serialization(format!(
                "result {name:?} has non-numeric value {:?}",
                &cap["value"]
            ))
        })?;
        results.insert(name, value);
    }

    Ok(results)
}

/// Parse a numeric token, expanding metric-prefix letters on a plain-float
/// parse failure.
fn parse_value(token: &str) -> Result<f64> {
    if let Ok(value) = token.parse::<f64>() {
        return Ok(value);
    }

    let expanded = METRIC_PREFIXES
        .iter()
        .fold(token.to_string(), |acc, (prefix, exponent)| {
            acc.replace(prefix, exponent)
        });

    expanded.parse::<f64>().map_err(|_| {
        BridgeError::Serialization(format!("unparseable numeric value {token:?}"))
    })
}
