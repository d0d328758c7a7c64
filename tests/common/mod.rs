#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_intake::{ColumnSpec, ColumnType, ReaderConfig};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// `Name` (required), `Email` (required, unique, lowercased), `Age` (integer).
pub fn people_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("name", "Name").required(),
        ColumnSpec::new("email", "Email").with_rules("required|unique|lowercase"),
        ColumnSpec::new("age", "Age").with_type(ColumnType::Integer),
    ]
}

pub fn people_config() -> ReaderConfig {
    ReaderConfig::new(people_columns())
}

pub const PEOPLE_CONFIG_YAML: &str = r#"
columns:
  - name: name
    column_name: Name
    required: true
  - name: email
    column_name: Email
    validate: required|unique|lowercase
  - name: age
    column_name: Age
    type: integer
"#;
