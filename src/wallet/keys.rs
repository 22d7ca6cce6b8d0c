//! Private key list loading.

use std::{path::Path, str::FromStr};

use alloy::signers::local::PrivateKeySigner;
use tracing::info;

use crate::error::{Result, WalletError};

/// Parses one hex key per line. Blank lines and `#` comments are skipped,
/// the `0x` prefix is optional.
///
/// Errors name the line, never the key material.
pub fn parse_keys(contents: &str) -> Result<Vec<PrivateKeySigner>> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            let hex = line.strip_prefix("0x").unwrap_or(line);
            PrivateKeySigner::from_str(hex)
                .map_err(|_| WalletError::Key(format!("line {}: not a valid private key", line_no)))
        })
        .collect()
}

pub fn load_keys(path: &Path) -> Result<Vec<PrivateKeySigner>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        WalletError::Key(format!("failed to read key file {}: {}", path.display(), e))
    })?;
    let keys = parse_keys(&contents)?;
    if keys.is_empty() {
        return Err(WalletError::Key(format!(
            "no private keys found in {}",
            path.display()
        )));
    }
    info!(count = keys.len(), file = %path.display(), "Loaded wallets");
    Ok(keys)
}
