use std::str::FromStr;

use anyhow::Result;

/// Load an environment variable, falling back to `default` when unset, and
/// parse it to the given type
///
/// # Errors
///
/// Returns an error if the resolved value cannot be parsed to the given type
pub fn load_env_var_or<T: FromStr>(var_name: &str, default: &str) -> Result<T> {
    let var = std::env::var(var_name).unwrap_or_else(|_| default.to_string());
    var.parse::<T>()
        .map_err(|_| anyhow::anyhow!("{} has an unparsable value: {}", var_name, var))
}

/// Loads an optional environment variable; `None` when unset or empty.
pub fn load_env_var_opt(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|value| !value.is_empty())
}
