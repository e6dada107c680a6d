pub mod config;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig, RedmineConfig,
    ServerConfig, SlackConfig,
};
