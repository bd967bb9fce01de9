//! Configuration for opening files and answering graph queries.
//!
//! All settings have defaults that reproduce the plain graph semantics;
//! a JSON document only needs to name the fields it changes.

use crate::error::{ElfGraphError, Result};
use crate::formats::elf::ElfClass;
use crate::io::IOLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Section name excluded from address dereference by default.
///
/// Thread-local `.tbss` occupies no file space and its addresses alias the
/// sections laid out after it.
pub const TBSS: &str = ".tbss";

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Force a file class instead of probing the file.
    pub class_override: Option<ElfClass>,
    /// Limits applied when mapping files.
    pub io: IOLimits,
    /// Address dereference configuration.
    pub deref: DerefConfig,
    /// File-level symbol index configuration.
    pub symbols: SymbolIndexConfig,
}

/// Configuration for `ElfFile::deref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerefConfig {
    /// Section names never considered when looking for the section that
    /// backs an address range.
    pub excluded_sections: Vec<String>,
    /// Only consider `SHF_ALLOC` sections.
    pub alloc_only: bool,
}

impl Default for DerefConfig {
    fn default() -> Self {
        Self {
            excluded_sections: vec![TBSS.to_string()],
            alloc_only: false,
        }
    }
}

impl DerefConfig {
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_sections.iter().any(|s| s == name)
    }
}

/// Configuration for the name → symbol map built when a file is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolIndexConfig {
    /// Also index `SHT_DYNSYM` tables (only `SHT_SYMTAB` by default).
    pub include_dynamic: bool,
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ElfGraphError::Config(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ElfGraphError::Config(e.to_string()))
    }

    pub fn with_class(mut self, class: ElfClass) -> Self {
        self.class_override = Some(class);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.class_override, None);
        assert_eq!(config.deref.excluded_sections, vec![".tbss".to_string()]);
        assert!(!config.deref.alloc_only);
        assert!(!config.symbols.include_dynamic);
        assert_eq!(config.io.max_file_size, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_partial_json() {
        let config =
            GraphConfig::from_json_str(r#"{"class_override":"Elf32","symbols":{"include_dynamic":true}}"#)
                .unwrap();
        assert_eq!(config.class_override, Some(ElfClass::Elf32));
        assert!(config.symbols.include_dynamic);
        assert!(config.deref.is_excluded(".tbss"));
    }

    #[test]
    fn test_json_round_trip() {
        let config = GraphConfig::default().with_class(ElfClass::Elf64);
        let json = config.to_json().unwrap();
        assert_eq!(GraphConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            GraphConfig::from_json_str("{not json"),
            Err(ElfGraphError::Config(_))
        ));
    }
}
