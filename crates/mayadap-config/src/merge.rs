use crate::config::Config;
use crate::error::ConfigError;

/// Merge an overlay TOML fragment on top of a base [`Config`].
///
/// Keys present in `overlay_toml` win; everything else keeps its `base`
/// value. Both sides are converted to [`toml::Value`] tables, deep-merged,
/// and deserialized back.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let base_str = toml::to_string(base).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let mut merged: toml::Value =
        toml::from_str(&base_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let overlay: toml::Value =
        toml::from_str(overlay_toml).map_err(|e| ConfigError::Parse(e.to_string()))?;

    merge_values(&mut merged, &overlay);

    merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
}

/// Tables merge key-by-key; any other value is replaced.
fn merge_values(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, val) in overlay_table {
                match base_table.get_mut(key) {
                    Some(existing) => merge_values(existing, val),
                    None => {
                        base_table.insert(key.clone(), val.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn merge_empty_overlay_returns_base() {
        let base = Config::default();
        assert_eq!(merge_configs(&base, "").expect("merge"), base);
    }

    #[test]
    fn merge_overrides_control_port_only() {
        let base = Config::default();
        let merged = merge_configs(&base, "[control]\nport = 9001\n").expect("merge");
        assert_eq!(merged.control.port, 9001);
        assert_eq!(merged.control.host, "localhost");
    }

    #[test]
    fn merge_adds_optional_field() {
        let base = Config::default();
        let merged =
            merge_configs(&base, "[remote]\nconnect_timeout_secs = 20\n").expect("merge");
        assert_eq!(merged.remote.connect_timeout_secs, Some(20));
    }

    #[test]
    fn merge_layers_twice() {
        let base = Config::default();
        let global = merge_configs(&base, "[log]\nlevel = \"debug\"\n").expect("global");
        let project =
            merge_configs(&global, "[runtime]\nhost_app = \"Houdini\"\n").expect("project");
        assert_eq!(project.log.level, LogLevel::Debug);
        assert_eq!(project.runtime.host_app, "Houdini");
        assert_eq!(project.control, base.control);
    }

    #[test]
    fn merge_invalid_overlay_returns_parse_error() {
        let result = merge_configs(&Config::default(), "{{invalid}}");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
