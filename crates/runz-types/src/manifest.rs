//! The package manifest — the `package.json` subset the runner reads.

use indexmap::IndexMap;
use serde::Deserialize;

/// A package manifest: the package name and its named scripts.
///
/// Loaded from `package.json` at each package location. Fields other than
/// `name` and `scripts` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// The package name, e.g. `my-pkg` or `@scope/my-pkg`.
    #[serde(default)]
    pub name: Option<String>,
    /// Script name → command line.
    #[serde(default)]
    pub scripts: IndexMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from raw `package.json` bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The command line of a named script, if declared.
    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }
}
