use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::model::Symbol;

use super::SymbolParser;

/// Parser backed by universal-ctags JSON output
pub struct CtagsParser {
    bin: PathBuf,
}

impl CtagsParser {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for CtagsParser {
    fn default() -> Self {
        Self::new("ctags")
    }
}

impl SymbolParser for CtagsParser {
    fn parse(&self, path: &str, content: &[u8]) -> Result<Vec<Symbol>> {
        // ctags picks the language from the file name, so keep it
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "file".into());
        let dir = tempfile::tempdir().context("creating ctags scratch directory")?;
        let file = dir.path().join(file_name);
        std::fs::write(&file, content).with_context(|| format!("staging {path} for ctags"))?;

        let output = Command::new(&self.bin)
            .args(["--output-format=json", "--fields=+n", "-f", "-"])
            .arg(&file)
            .output()
            .with_context(|| format!("failed to run {}", self.bin.display()))?;

        if !output.status.success() {
            warn!(
                "ctags failed on {} ({}): {}",
                path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(Vec::new());
        }

        let symbols = parse_ctags_output(&output.stdout);
        debug!("ctags found {} symbols in {}", symbols.len(), path);
        Ok(symbols)
    }
}

#[derive(Deserialize)]
struct CtagsLine {
    #[serde(rename = "_type")]
    entry_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    scope: Option<String>,
}

/// Convert ctags JSON lines into symbols, skipping pseudo-tags and junk
pub fn parse_ctags_output(out: &[u8]) -> Vec<Symbol> {
    String::from_utf8_lossy(out)
        .lines()
        .filter_map(|line| serde_json::from_str::<CtagsLine>(line).ok())
        .filter(|tag| tag.entry_type == "tag" && !tag.name.is_empty())
        .map(|tag| Symbol {
            name: tag.name,
            parent: tag.scope.unwrap_or_default(),
            kind: tag.kind,
            line: tag.line,
        })
        .collect()
}
