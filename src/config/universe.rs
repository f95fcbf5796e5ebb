use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::info;

use crate::error::{AppError, Context, Result};

/// USDT perpetuals sampled when no universe file has been provided.
const DEFAULT_UNIVERSE_CSV: &str = include_str!("../../assets/symbols.csv");

/// Built-in symbol list, in file order.
pub fn default_symbols() -> Vec<String> {
    DEFAULT_UNIVERSE_CSV
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with('#') && !line.eq_ignore_ascii_case("symbol")
        })
        .map(str::to_string)
        .collect()
}

/// Read the symbol universe, seeding the file with [`default_symbols`] when absent.
///
/// The first column of each row is used; a `symbol` header, blank lines and `#`
/// comments are skipped. Duplicates keep their first position.
pub fn load_universe(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        write_default_universe(path)?;
        info!(
            "Seeded symbol universe with {} defaults at {}",
            default_symbols().len(),
            path.display()
        );
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("Failed to open symbol universe {}", path.display()))?;

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read symbol universe record")?;
        let Some(raw) = record.get(0) else {
            continue;
        };
        let symbol = raw.trim();
        if symbol.is_empty() || (idx == 0 && symbol.eq_ignore_ascii_case("symbol")) {
            continue;
        }
        if seen.insert(symbol.to_string()) {
            symbols.push(symbol.to_string());
        }
    }

    if symbols.is_empty() {
        return Err(AppError::message(format!(
            "Symbol universe is empty: {}",
            path.display()
        )));
    }

    Ok(symbols)
}

fn write_default_universe(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    fs::write(path, DEFAULT_UNIVERSE_CSV)
        .with_context(|| format!("Failed to create symbol universe {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.csv");
        fs::write(
            &path,
            "symbol\nBTCUSDT.P\n# disabled\n\nETHUSDT.P\nBTCUSDT.P\n SOLUSDT.P ,extra\n",
        )
        .unwrap();

        let symbols = load_universe(&path).expect("universe loads");
        assert_eq!(symbols, vec!["BTCUSDT.P", "ETHUSDT.P", "SOLUSDT.P"]);
    }

    #[test]
    fn seeds_missing_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("symbols.csv");

        let symbols = load_universe(&path).expect("universe seeded");
        assert!(path.exists());
        assert_eq!(symbols, default_symbols());
        assert_eq!(symbols[0], "10000LADYSUSDT.P");
    }

    #[test]
    fn builtin_list_has_no_header_or_duplicates() {
        let symbols = default_symbols();
        let unique: HashSet<&String> = symbols.iter().collect();

        assert_eq!(symbols.len(), 241);
        assert_eq!(unique.len(), symbols.len());
        assert!(symbols.iter().all(|s| s.ends_with("USDT.P")));
    }

    #[test]
    fn empty_universe_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.csv");
        fs::write(&path, "symbol\n").unwrap();

        assert!(load_universe(&path).is_err());
    }
}
