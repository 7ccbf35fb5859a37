//! Shared-library plugin archives.

#![allow(unsafe_code)]

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use super::{guarded, FactoryCatalog, PluginError, PluginResult, REGISTER_SYMBOL};

/// Registration entry point exported by plugin libraries.
type RegisterFn = fn(&mut FactoryCatalog);

/// A loaded plugin library.
///
/// Must outlive every factory, plugin and capability item created from it.
pub struct NativeLibrary {
    path: PathBuf,
    _library: Library,
}

impl NativeLibrary {
    /// Load the library at `path` and let it register its factories.
    pub fn load(path: &Path, catalog: &mut FactoryCatalog) -> PluginResult<Self> {
        tracing::debug!(
            library_path = %path.display(),
            symbol = REGISTER_SYMBOL,
            "Loading plugin library"
        );

        let library = unsafe { Library::new(path) }.map_err(|e| {
            PluginError::LoadError(format!("Cannot open library {}: {e}", path.display()))
        })?;

        {
            let register: Symbol<'_, RegisterFn> =
                unsafe { library.get(REGISTER_SYMBOL.as_bytes()) }.map_err(|e| {
                    PluginError::LoadError(format!(
                        "Symbol '{REGISTER_SYMBOL}' not found in {}: {e}",
                        path.display()
                    ))
                })?;

            guarded(|| {
                register(catalog);
                Ok(())
            })?;
        }

        Ok(Self { path: path.to_path_buf(), _library: library })
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let mut catalog = FactoryCatalog::new();
        let err =
            NativeLibrary::load(Path::new("/nonexistent/libprobes.so"), &mut catalog).unwrap_err();

        assert!(matches!(err, PluginError::LoadError(_)));
        assert!(catalog.is_empty());
    }
}
