//! Provides network test configuration options.
//!
//! Configuration options can be parsed from config files in TOML format and
//! overridden by environment variables.

pub mod log;
pub mod quality;
pub mod thresholds;

use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use self::{
    log::Log,
    quality::Quality,
    thresholds::{AudioThresholds, Thresholds, VideoThresholds},
};

/// CLI argument that is responsible for holding application configuration
/// file path.
static APP_CONF_PATH_CMD_ARG_NAME: &str = "--conf";

/// Environment variable that is responsible for holding application
/// configuration file path.
static APP_CONF_PATH_ENV_VAR_NAME: &str = "MEDEA_NETWORK_TEST_CONF";

/// Prefix of the environment variables overriding configuration options.
static APP_CONF_ENV_PREFIX: &str = "MEDEA_NETWORK_TEST";

/// Holds application config.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Conf {
    /// Logging settings.
    pub log: Log,

    /// Quality test run loop settings.
    pub quality: Quality,

    /// Quality verdict thresholds.
    pub thresholds: Thresholds,
}

impl Conf {
    /// Creates new [`Conf`] and applies values from such sources
    /// and in that order:
    /// - default values;
    /// - configuration file, the name of which is given as a command line
    ///   parameter or environment variable;
    /// - environment variables.
    ///
    /// # Errors
    ///
    /// Errors if parsing fails.
    pub fn parse() -> Result<Self, ConfigError> {
        let mut cfg = Config::new();

        if let Some(path) = get_conf_file_name(
            env::var(APP_CONF_PATH_ENV_VAR_NAME),
            env::args(),
        ) {
            cfg.merge(File::with_name(&path))?;
        }

        cfg.merge(
            Environment::with_prefix(APP_CONF_ENV_PREFIX).separator("__"),
        )?;

        cfg.try_into()
    }
}

/// Returns the path to a configuration file, if it's set via CLI `args`
/// or environment variable `env_var`.
///
/// Environment variable takes precedence over the CLI argument.
fn get_conf_file_name<T>(
    env_var: Result<String, env::VarError>,
    cmd_args: T,
) -> Option<String>
where
    T: Iterator<Item = String>,
{
    if let Ok(path) = env_var {
        Some(path)
    } else {
        let mut args = cmd_args.skip_while(|x| x != APP_CONF_PATH_CMD_ARG_NAME);
        if args.next().is_some() {
            args.next().filter(|path| !path.is_empty())
        } else {
            None
        }
    }
}

/// Parses [`Conf`] with the provided environment variables set, removing them
/// afterwards.
#[cfg(test)]
#[macro_export]
macro_rules! overrided_by_env_conf {
    ($($env:expr => $value:expr),+ $(,)?) => {{
        $(std::env::set_var($env, $value);)+
        let conf = $crate::conf::Conf::parse().unwrap();
        $(std::env::remove_var($env);)+
        conf
    }};
}
