#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use commission_recon::RawTable;
use tempfile::{TempDir, tempdir};

/// Absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Sales ledger export with `;` delimiters and decimal commas.
pub fn ledger_fixture() -> PathBuf {
    fixture_path("vendas.csv")
}

/// Settlement export matching [`ledger_fixture`], spanning 01/2025 and 02/2025.
pub fn settlement_fixture() -> PathBuf {
    fixture_path("extratos.csv")
}

/// Builds an in-memory table from string literals.
pub fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    rows.iter()
        .fold(RawTable::new(headers.iter().copied()), |table, row| {
            table.with_row(row.iter().copied())
        })
}

/// Scratch directory that is removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Raw bytes, for inputs in legacy encodings.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.file(name)).expect("read temp file")
    }
}
