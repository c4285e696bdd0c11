use super::TraceCollector;
use crate::trace::event_list::DEFAULT_CAPACITY;
use std::time::Instant;

pub const DEFAULT_LABEL: &str = "TraceCollector";

/// Enables the global collector at startup when set to a true value.
pub const ENV_ENABLED: &str = "DIAL9_TRACE_ENABLED";
/// Overrides the global collector's label.
pub const ENV_LABEL: &str = "DIAL9_TRACE_LABEL";
/// Overrides the initial per-thread event capacity.
pub const ENV_CAPACITY: &str = "DIAL9_TRACE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a boolean (1/0, true/false, yes/no, on/off), got {value:?}")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidCapacity { var: &'static str, value: String },
    #[error("collector label must not be empty")]
    EmptyLabel,
}

/// Configuration for a [`TraceCollector`].
#[derive(Debug, Clone)]
pub struct TraceCollectorBuilder {
    label: String,
    enabled: bool,
    initial_capacity: usize,
}

impl Default for TraceCollectorBuilder {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            enabled: false,
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl TraceCollectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read [`ENV_ENABLED`], [`ENV_LABEL`] and [`ENV_CAPACITY`] from the process
    /// environment. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let (builder, errors) = Self::from_lookup_lenient(lookup);
        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(builder),
        }
    }

    /// Like [`from_env`](Self::from_env), but a malformed variable only keeps
    /// its own default. The rest are still applied.
    pub fn from_env_lenient() -> (Self, Vec<ConfigError>) {
        Self::from_lookup_lenient(|name| std::env::var(name).ok())
    }

    /// Apply every well-formed variable from `lookup`, returning the errors
    /// for the others in [`ENV_ENABLED`], [`ENV_LABEL`], [`ENV_CAPACITY`] order.
    pub fn from_lookup_lenient(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<ConfigError>) {
        let mut builder = Self::default();
        let mut errors = Vec::new();
        if let Some(value) = lookup(ENV_ENABLED) {
            match parse_bool(ENV_ENABLED, &value) {
                Ok(enabled) => builder.enabled = enabled,
                Err(error) => errors.push(error),
            }
        }
        if let Some(value) = lookup(ENV_LABEL) {
            if value.trim().is_empty() {
                errors.push(ConfigError::EmptyLabel);
            } else {
                builder.label = value;
            }
        }
        if let Some(value) = lookup(ENV_CAPACITY) {
            match value.trim().parse() {
                Ok(capacity) => builder.initial_capacity = capacity,
                Err(_) => errors.push(ConfigError::InvalidCapacity {
                    var: ENV_CAPACITY,
                    value,
                }),
            }
        }
        (builder, errors)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Start with recording enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Events each thread's list reserves up front, and again after each drain.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<TraceCollector, ConfigError> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        Ok(TraceCollector::from_parts(
            self.label,
            self.enabled,
            self.initial_capacity,
            Instant::now(),
        ))
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let collector = TraceCollectorBuilder::new().build().unwrap();
        assert_eq!(collector.label(), DEFAULT_LABEL);
        assert!(!collector.is_enabled());
    }

    #[test]
    fn test_builder_options() {
        let collector = TraceCollectorBuilder::new()
            .with_label("frame")
            .with_enabled(true)
            .with_initial_capacity(4)
            .build()
            .unwrap();
        assert_eq!(collector.label(), "frame");
        assert!(collector.is_enabled());
    }

    #[test]
    fn test_empty_label_rejected() {
        let err = TraceCollectorBuilder::new().with_label("  ").build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyLabel);
    }

    #[test]
    fn test_from_lookup() {
        let builder = TraceCollectorBuilder::from_lookup(lookup(&[
            (ENV_ENABLED, "Yes"),
            (ENV_LABEL, "startup"),
            (ENV_CAPACITY, "32"),
        ]))
        .unwrap();
        assert!(builder.enabled);
        assert_eq!(builder.label, "startup");
        assert_eq!(builder.initial_capacity, 32);

        let unset = TraceCollectorBuilder::from_lookup(lookup(&[])).unwrap();
        assert!(!unset.enabled);
        assert_eq!(unset.label, DEFAULT_LABEL);
    }

    #[test]
    fn test_from_lookup_errors() {
        let err = TraceCollectorBuilder::from_lookup(lookup(&[(ENV_ENABLED, "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBool {
                var: ENV_ENABLED,
                value: "maybe".to_string()
            }
        );
        assert!(err.to_string().contains("DIAL9_TRACE_ENABLED"));

        let err = TraceCollectorBuilder::from_lookup(lookup(&[(ENV_CAPACITY, "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity { .. }));

        let err = TraceCollectorBuilder::from_lookup(lookup(&[(ENV_LABEL, "")])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyLabel);
    }

    #[test]
    fn test_lenient_lookup_keeps_valid_variables() {
        let (builder, errors) = TraceCollectorBuilder::from_lookup_lenient(lookup(&[
            (ENV_ENABLED, "1"),
            (ENV_LABEL, "startup"),
            (ENV_CAPACITY, "oops"),
        ]));
        assert!(builder.enabled);
        assert_eq!(builder.label, "startup");
        assert_eq!(builder.initial_capacity, DEFAULT_CAPACITY);
        assert_eq!(
            errors,
            vec![ConfigError::InvalidCapacity {
                var: ENV_CAPACITY,
                value: "oops".to_string()
            }]
        );

        let (builder, errors) =
            TraceCollectorBuilder::from_lookup_lenient(lookup(&[(ENV_ENABLED, "maybe"), (ENV_LABEL, " ")]));
        assert!(!builder.enabled);
        assert_eq!(builder.label, DEFAULT_LABEL);
        assert_eq!(errors.len(), 2);
    }
}
