use crate::Dialect;
use once_cell::sync::Lazy;
use serde::Deserialize;

pub const STRICT_VALIDATION_ENV: &str = "QUERY_COMPILER_STRICT_VALIDATION";

static GLOBAL_SETTINGS: Lazy<CompilerSettings> = Lazy::new(CompilerSettings::from_env);

/// Process-wide defaults, read once from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSettings {
    #[serde(default)]
    pub strict_validation: bool,
}

impl CompilerSettings {
    pub fn from_env() -> Self {
        let strict_validation = std::env::var(STRICT_VALIDATION_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Self { strict_validation }
    }

    /// The settings every compiler starts from unless given others.
    pub fn global() -> Self {
        *GLOBAL_SETTINGS
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration of one compiler instance. An explicit `strict_validation` always wins over the
/// settings tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    pub dialect: Dialect,
    pub settings: CompilerSettings,
    pub strict_validation: Option<bool>,
}

impl CompilerConfig {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            settings: CompilerSettings::global(),
            strict_validation: None,
        }
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn strict_validation(mut self, enabled: bool) -> Self {
        self.strict_validation = Some(enabled);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict_validation.unwrap_or(self.settings.strict_validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_override_wins() {
        let strict_settings = CompilerSettings { strict_validation: true };

        let config = CompilerConfig::new(Dialect::Postgres).with_settings(strict_settings);
        assert!(config.is_strict());

        let config = config.strict_validation(false);
        assert!(!config.is_strict());

        let config = CompilerConfig::new(Dialect::Sqlite)
            .with_settings(CompilerSettings::default())
            .strict_validation(true);
        assert!(config.is_strict());
    }

    #[test]
    fn flags() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_flag(value), "{value}");
        }

        for value in ["0", "false", "", "nope"] {
            assert!(!parse_flag(value), "{value}");
        }
    }
}
