//! # lib-config
//!
//! Configuration front-end for ibisgen.
//!
//! Two input forms with identical semantics are accepted:
//! - the legacy *flat keyword* form (bracketed keywords, `+` continuations,
//!   `!` comments, `[Include]` splicing), and
//! - the *structured* form (TOML or JSON, nested groups, SI-suffixed
//!   numerics).
//!
//! Both yield the same in-memory [`lib_types::Document`]; either form can be
//! re-emitted from the document, and the two round-trip losslessly.

pub mod convert;
pub mod error;
pub mod flat;
pub mod resolve;
pub mod structured;

pub use error::{ConfigError, ResourceError};

use lib_types::Document;
use std::path::Path;

/// Load a configuration file, dispatching on extension: `.toml` / `.json`
/// select the structured form, anything else the flat keyword form. The
/// returned document is fully linked and resolved.
pub fn load_config(path: &Path) -> Result<Document, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ResourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let mut document = match ext.as_deref() {
        Some("toml") => structured::parse_toml(&content)?,
        Some("json") => structured::parse_json(&content)?,
        _ => flat::parse_flat(&content, path.parent())?,
    };

    if document.header.file_name.is_empty() {
        document.header.file_name = path
            .file_stem()
            .map(|s| format!("{}.ibs", s.to_string_lossy()))
            .unwrap_or_else(|| "buffer.ibs".to_string());
    }

    resolve::resolve_document(&mut document)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dispatch_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("buf.toml");
        let mut f = std::fs::File::create(&toml_path).unwrap();
        writeln!(
            f,
            r#"
ibis_version = "3.2"
file_name = "buf.ibs"

[global_defaults]
voltage_range = {{ typ = 3.3, min = 3.0, max = 3.6 }}

[[models]]
name = "driver"
type = "Output"

[[components]]
component = "chip"
manufacturer = "acme"
spice_file = "buf.sp"

[[components.pList]]
pinName = "1"
signalName = "sig"
modelName = "driver"

[[components.pList]]
pinName = "2"
signalName = "vdd"
modelName = "POWER"

[[components.pList]]
pinName = "3"
signalName = "vss"
modelName = "GND"
"#
        )
        .unwrap();

        let doc = load_config(&toml_path).unwrap();
        assert_eq!(doc.models.len(), 1);
        assert_eq!(doc.components[0].pins.len(), 3);
        assert_eq!(doc.header.file_name, "buf.ibs");
    }
}
