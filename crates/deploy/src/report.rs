//! Operator-facing summary of a finished run.

use std::{io::Write, path::Path};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::{AddressRegistry, DeployedComponent};

/// The default name of the persisted address book.
pub const ADDRESSES_FILENAME: &str = "addresses.json";

/// `(name, address)` pairs in deployment order.
pub fn report(registry: &AddressRegistry) -> Vec<(String, Address)> {
    registry
        .iter()
        .map(|component| (component.key.to_string(), component.address))
        .collect()
}

/// Render the registry as a two-column table.
pub fn render(registry: &AddressRegistry) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Component", "Address"]);

    for (name, address) in report(registry) {
        table.add_row(vec![name, address.to_string()]);
    }

    table
}

/// Print the registry table to `out`.
pub fn emit(registry: &AddressRegistry, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", render(registry)).context("Failed to write address report")
}

/// Address book written next to the configuration after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    pub generated_at: DateTime<Utc>,
    pub components: Vec<DeployedComponent>,
}

impl AddressBook {
    pub fn new(registry: &AddressRegistry) -> Self {
        Self {
            generated_at: Utc::now(),
            components: registry.iter().cloned().collect(),
        }
    }

    /// Save the address book as formatted JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize address book")?;

        std::fs::write(path, json)
            .context(format!("Failed to write address book to {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            components = self.components.len(),
            "Address book saved"
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read address book from {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse address book")
    }
}
