mod assets;
mod env_helper;
mod local_config;

pub use assets::Asset;
pub use env_helper::{load_env_var_opt, load_env_var_or};
pub use local_config::LocalConfig;
