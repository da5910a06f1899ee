use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Filters spans and events based on a set of filter directives
    /// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
    pub(crate) env_filter: String,
    /// Minimum level that is always written, regardless of the filter
    pub(crate) min_level: Option<Level>,
    /// Output log events as JSON
    pub(crate) use_json_format: bool,
}

impl Config {
    pub fn new(env_filter: &str, min_level: Option<Level>, use_json_format: bool) -> Self {
        Self {
            env_filter: env_filter.into(),
            min_level,
            use_json_format,
        }
    }
}
