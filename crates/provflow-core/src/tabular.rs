//! Parser for the whitespace-aligned tables printed by the control-plane CLI

use crate::error::{ProvisionError, Result};

/// Token rows of one table blob, header row included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

/// Split `raw` into lines, then each line into whitespace-separated tokens.
///
/// Blank lines are dropped. A blank column contributes no token, so positions
/// shift left when a field is empty.
pub fn parse(raw: &str) -> Result<Table> {
    if raw.trim().is_empty() {
        return Err(ProvisionError::EmptyOutput);
    }

    let rows = raw
        .lines()
        .map(|line| {
            line.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    Ok(Table { rows })
}

impl Table {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// All tokens of the blob in reading order, header tokens first
    pub fn tokens(&self) -> Vec<&str> {
        self.rows.iter().flatten().map(String::as_str).collect()
    }

    pub fn token_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}
