//! Plugin archive manifest parsing and validation.
//!
//! A plugin archive (`*.pkg`) is a TOML document whose attributes name the
//! plugin types to instantiate and, optionally, a shared library that
//! provides their factories:
//!
//! ```toml
//! Plugin-Classname = "probes.Cpu;probes.Memory"
//! Plugin-Library = "libprobes.so"
//! Plugin-Checksum = "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{PluginError, PluginResult, CLASSNAME_ATTRIBUTE, PLUGIN_API_VERSION};

/// Manifest of a plugin archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Semicolon-separated plugin type names.
    #[serde(rename = "Plugin-Classname", default, skip_serializing_if = "Option::is_none")]
    pub classnames: Option<String>,

    /// Shared library path, relative to the archive.
    #[serde(rename = "Plugin-Library", default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Library checksum, `sha256:<hex>`.
    #[serde(rename = "Plugin-Checksum", default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// API version the archive was built against.
    #[serde(rename = "Plugin-Api-Version", default = "default_api_version")]
    pub api_version: String,

    /// Free-form description.
    #[serde(rename = "Plugin-Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_api_version() -> String {
    PLUGIN_API_VERSION.to_string()
}

impl ArchiveManifest {
    /// Parse a manifest from TOML string.
    pub fn from_toml(content: &str) -> PluginResult<Self> {
        toml::from_str(content).map_err(|e| PluginError::InvalidManifest(e.to_string()))
    }

    /// Parse a manifest from an archive file.
    pub fn from_file(path: &Path) -> PluginResult<Self> {
        if !path.exists() {
            return Err(PluginError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Plugin type names listed by the manifest, in order.
    pub fn class_names(&self) -> Vec<String> {
        self.classnames
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate the manifest.
    pub fn validate(&self) -> PluginResult<()> {
        if self.class_names().is_empty() {
            return Err(PluginError::InvalidManifest(format!(
                "Failed to find {CLASSNAME_ATTRIBUTE} attribute in manifest"
            )));
        }

        if let Some(ref library) = self.library {
            if library.trim().is_empty() {
                return Err(PluginError::InvalidManifest(
                    "Plugin library path is empty".to_string(),
                ));
            }
        }

        if let Some(ref checksum) = self.checksum {
            let hex = checksum.strip_prefix("sha256:").ok_or_else(|| {
                PluginError::InvalidManifest(
                    "Checksum must be in the form sha256:<hex digest>".to_string(),
                )
            })?;

            if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PluginError::InvalidManifest(
                    "Checksum must be a 64 character hex digest".to_string(),
                ));
            }

            if self.library.is_none() {
                return Err(PluginError::InvalidManifest(
                    "Checksum given without a plugin library".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Check if this manifest is compatible with the given API version.
    pub fn is_compatible_with(&self, host_api_version: &str) -> bool {
        api_compatible(&self.api_version, host_api_version)
    }

    /// Resolve the library path against the archive's directory.
    pub fn library_path(&self, archive: &Path) -> Option<PathBuf> {
        let library = Path::new(self.library.as_deref()?.trim());
        if library.is_absolute() {
            return Some(library.to_path_buf());
        }

        let base = archive.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(library))
    }

    /// Verify library bytes against the declared checksum, if any.
    pub fn verify_checksum(&self, bytes: &[u8]) -> PluginResult<()> {
        let Some(ref checksum) = self.checksum else {
            return Ok(());
        };

        let expected = checksum.trim_start_matches("sha256:").to_ascii_lowercase();
        let actual = sha256_hex(bytes);

        if actual != expected {
            return Err(PluginError::Validation(format!(
                "Checksum mismatch: expected {expected}, got {actual}"
            )));
        }

        Ok(())
    }
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Major versions must match and the host minor must be at least the required one.
pub(crate) fn api_compatible(required: &str, available: &str) -> bool {
    let required: Vec<u32> = required.split('.').filter_map(|s| s.parse().ok()).collect();
    let available: Vec<u32> = available.split('.').filter_map(|s| s.parse().ok()).collect();

    if required.is_empty() || available.is_empty() {
        return false;
    }

    required[0] == available[0]
        && (available.len() < 2 || required.len() < 2 || available[1] >= required[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MANIFEST: &str = r#"
Plugin-Classname = "probes.Cpu; probes.Memory ;"
Plugin-Library = "libprobes.so"
Plugin-Checksum = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
Plugin-Api-Version = "1.0"
Plugin-Description = "CPU and memory probes"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ArchiveManifest::from_toml(SAMPLE_MANIFEST).unwrap();

        assert_eq!(manifest.class_names(), vec!["probes.Cpu", "probes.Memory"]);
        assert_eq!(manifest.library.as_deref(), Some("libprobes.so"));
        assert_eq!(manifest.api_version, "1.0");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_missing_classname_attribute() {
        let manifest = ArchiveManifest::from_toml("Plugin-Description = \"nothing\"\n").unwrap();

        let err = manifest.validate().unwrap_err();
        assert!(matches!(
            err,
            PluginError::InvalidManifest(ref m) if m.contains("Plugin-Classname")
        ));
    }

    #[test]
    fn test_blank_classname_attribute() {
        let manifest = ArchiveManifest::from_toml("Plugin-Classname = \" ; \"\n").unwrap();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_invalid_checksum() {
        let toml = r#"
Plugin-Classname = "a.B"
Plugin-Library = "liba.so"
Plugin-Checksum = "md5:abc"
"#;
        let manifest = ArchiveManifest::from_toml(toml).unwrap();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_checksum_without_library() {
        let toml = r#"
Plugin-Classname = "a.B"
Plugin-Checksum = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
"#;
        let manifest = ArchiveManifest::from_toml(toml).unwrap();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_default_api_version() {
        let manifest = ArchiveManifest::from_toml("Plugin-Classname = \"a.B\"\n").unwrap();

        assert_eq!(manifest.api_version, PLUGIN_API_VERSION);
        assert!(manifest.is_compatible_with(PLUGIN_API_VERSION));
    }

    #[test]
    fn test_api_compatibility() {
        assert!(api_compatible("1.0", "1.0"));
        assert!(api_compatible("1.0", "1.3"));
        assert!(!api_compatible("1.2", "1.1"));
        assert!(!api_compatible("2.0", "1.0"));
        assert!(!api_compatible("garbage", "1.0"));
    }

    #[test]
    fn test_library_path() {
        let manifest = ArchiveManifest::from_toml(SAMPLE_MANIFEST).unwrap();
        let path = manifest.library_path(Path::new("/opt/agent/probes.pkg")).unwrap();

        assert_eq!(path, PathBuf::from("/opt/agent/libprobes.so"));
    }

    #[test]
    fn test_verify_checksum() {
        let manifest = ArchiveManifest::from_toml(SAMPLE_MANIFEST).unwrap();

        // sha256("hello")
        assert!(manifest.verify_checksum(b"hello").is_ok());
        assert!(matches!(manifest.verify_checksum(b"hello!"), Err(PluginError::Validation(_))));
    }

    #[test]
    fn test_unreadable_archive() {
        let err = ArchiveManifest::from_file(Path::new("/nonexistent/probes.pkg")).unwrap_err();
        assert!(matches!(err, PluginError::NotFound(_)));
    }

    #[test]
    fn test_not_toml() {
        assert!(matches!(
            ArchiveManifest::from_toml("PK\u{3}\u{4} binary junk"),
            Err(PluginError::InvalidManifest(_))
        ));
    }
}
