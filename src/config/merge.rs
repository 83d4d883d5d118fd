//! Layering of environment variables and CLI flags over file config.

use crate::domain::{Config, PatchPolicy, ProviderSpec, RemovalBackend};
use anyhow::{Context, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;

pub const ENV_PREFIX: &str = "SPLICE_";

/// Flags that override whatever the file and environment say.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub rewrite_line_threshold: Option<usize>,
    pub max_syntax_retries: Option<usize>,
    pub patch_policy: Option<PatchPolicy>,
    pub removal_backend: Option<RemovalBackend>,
    pub generator_command: Option<Vec<String>>,
}

/// Apply `SPLICE_*` environment variables on top of `config`.
pub fn merge_env(config: Config) -> Result<Config> {
    merge_env_with_prefix(config, ENV_PREFIX)
}

pub fn merge_env_with_prefix(config: Config, prefix: &str) -> Result<Config> {
    Figment::from(Serialized::defaults(config))
        .merge(Env::prefixed(prefix))
        .extract()
        .context("Invalid configuration in environment")
}

pub fn merge_cli_with_config(mut config: Config, cli: &CliOverrides) -> Config {
    if let Some(threshold) = cli.rewrite_line_threshold {
        config.rewrite_line_threshold = threshold;
    }
    if let Some(retries) = cli.max_syntax_retries {
        config.max_syntax_retries = retries;
    }
    if let Some(policy) = cli.patch_policy {
        config.patch_policy = policy;
    }
    if let Some(backend) = cli.removal_backend {
        config.removal_backend = backend;
    }
    if let Some(command) = cli.generator_command.as_ref() {
        if let Some((program, args)) = command.split_first() {
            config.generator =
                Some(ProviderSpec::Command { program: program.clone(), args: args.to_vec() });
        }
    }
    config
}
