//! Settings documents and YAML rendering. JSON settings files load through the
//! same path since YAML is a superset of JSON.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Serialize, de::DeserializeOwned};
use serde_yaml::{Mapping, Value as YamlValue};

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Opening settings file {path:?}"))?;
    from_str(&raw).with_context(|| format!("Parsing settings file {path:?}"))
}

/// Parses a settings document. An empty document (or one holding only
/// comments) is an empty mapping, so every setting takes its default.
pub fn from_str<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let document: YamlValue = serde_yaml::from_str(raw)?;
    let document = match document {
        YamlValue::Null => YamlValue::Mapping(Mapping::new()),
        YamlValue::Mapping(_) => document,
        other => bail!(
            "Settings must be a mapping of option names to values, found {}",
            kind(&other)
        ),
    };
    Ok(serde_yaml::from_value(document)?)
}

pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).context("Rendering YAML")
}

fn kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a sequence",
        YamlValue::Mapping(_) => "a mapping",
        YamlValue::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorSettings;
    use crate::mapping::Axis;

    #[test]
    fn settings_parse_from_yaml() {
        let settings: ProcessorSettings = from_str(
            "mapping:\n  x: month\nkeys:\n  y: sales\nfilters:\n  - y > 10\nlimit: 5\n",
        )
        .unwrap();
        assert_eq!(settings.mapping.get(Axis::X).map(String::as_str), Some("month"));
        assert_eq!(settings.keys.get(Axis::Y).map(String::as_str), Some("sales"));
        assert_eq!(settings.filters, vec!["y > 10"]);
        assert_eq!(settings.limit, Some(5));
        assert!(settings.auto_detect);
    }

    #[test]
    fn empty_documents_yield_defaults() {
        let settings: ProcessorSettings = from_str("# nothing configured\n").unwrap();
        assert_eq!(settings, ProcessorSettings::default());
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        let err = from_str::<ProcessorSettings>("- x\n- y\n").unwrap_err();
        assert!(err.to_string().contains("found a sequence"));
    }

    #[test]
    fn unknown_axes_are_rejected() {
        let parsed = from_str::<ProcessorSettings>("mapping:\n  z: depth\n");
        assert!(parsed.is_err());
    }
}
