// Key/value dataset loading

use std::path::Path;

use crate::command::Command;
use crate::error::{BenchError, Result};

/// Index-aligned keys and values replayed by every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    keys: Vec<String>,
    values: Vec<String>,
}

impl Dataset {
    /// Build a dataset, checking that keys and values line up
    pub fn new(keys: Vec<String>, values: Vec<String>) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(BenchError::DatasetMismatch(format!(
                "{} keys but {} values",
                keys.len(),
                values.len()
            )));
        }

        if keys.is_empty() {
            return Err(BenchError::DatasetMismatch(
                "dataset contains no pairs".to_string(),
            ));
        }

        for (name, lines) in [("key", &keys), ("value", &values)] {
            for (index, line) in lines.iter().enumerate() {
                check_token(name, index, line)?;
            }
        }

        Ok(Self { keys, values })
    }

    /// Build a dataset from the raw contents of the two files
    pub fn from_text(keys: &str, values: &str) -> Result<Self> {
        Self::new(split_lines(keys), split_lines(values))
    }

    /// Read `keys` and `values` files, one entry per line
    pub fn load(keys_path: &Path, values_path: &Path) -> Result<Self> {
        let keys = read_file(keys_path)?;
        let values = read_file(values_path)?;
        let dataset = Self::from_text(&keys, &values)?;

        tracing::info!(
            pairs = dataset.len(),
            keys = %keys_path.display(),
            values = %values_path.display(),
            "Loaded dataset"
        );

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All commands in dataset order
    pub fn commands(&self) -> impl Iterator<Item = Command> + '_ {
        self.keys
            .iter()
            .zip(&self.values)
            .map(|(key, value)| Command::add(key.as_str(), value.as_str()))
    }
}

/// A key or value travels as one whitespace-delimited token of the wire
/// command, so it must be non-empty and free of any whitespace.
fn check_token(name: &str, index: usize, line: &str) -> Result<()> {
    if line.trim().is_empty() {
        return Err(BenchError::DatasetMismatch(format!(
            "{} at line {} is blank",
            name,
            index + 1
        )));
    }

    if line.chars().any(char::is_whitespace) {
        return Err(BenchError::DatasetMismatch(format!(
            "{} at line {} contains whitespace: {:?}",
            name,
            index + 1,
            line
        )));
    }

    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| BenchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split on newlines, dropping the empty entry a final newline leaves behind
fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();

    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines
}
