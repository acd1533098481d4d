//! Tracing initialisation.

use std::collections::BTreeMap;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Per-crate overrides: crate name → level
    pub components: BTreeMap<String, String>,
    /// JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            components: BTreeMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Parse `crate=level` pairs separated by commas. Entries without a
    /// level are skipped.
    pub fn parse_components(spec: &str) -> BTreeMap<String, String> {
        spec.split(',')
            .filter_map(|pair| {
                let (component, level) = pair.split_once('=')?;
                let (component, level) = (component.trim(), level.trim());
                (!component.is_empty() && !level.is_empty())
                    .then(|| (component.to_string(), level.to_string()))
            })
            .collect()
    }

    /// `EnvFilter` directives, e.g. `"info,chainclaim_http=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (component, level) in &self.components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Call once at startup.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_overrides() {
        let config = LogConfig {
            level: "warn".into(),
            components: LogConfig::parse_components(
                " chainclaim-http = trace,bogus,chainclaim-core=debug,=info",
            ),
            ..LogConfig::default()
        };
        assert_eq!(config.components.len(), 2);
        assert_eq!(
            config.directives(),
            "warn,chainclaim_core=debug,chainclaim_http=trace"
        );
    }
}
