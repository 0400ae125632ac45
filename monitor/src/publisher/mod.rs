use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;

use crate::config::load_env_var_opt;

/// Commits and pushes the data directory to a remote repository using the
/// local git binary. Credentials come from the environment:
/// GITHUB_REPO and GITHUB_TOKEN are required, GIT_USER_NAME and
/// GIT_USER_EMAIL default to a bot identity.
pub struct GitPublisher {
    remote_url: String,
    user_name: String,
    user_email: String,
}

impl GitPublisher {
    pub fn from_env() -> Result<Self> {
        let Some(repo) = load_env_var_opt("GITHUB_REPO") else {
            bail!("Missing GITHUB_REPO in environment");
        };
        let Some(token) = load_env_var_opt("GITHUB_TOKEN") else {
            bail!("Missing GITHUB_TOKEN in environment");
        };

        Ok(Self {
            remote_url: remote_url_for(&repo, &token),
            user_name: load_env_var_opt("GIT_USER_NAME").unwrap_or_else(|| "bot".to_string()),
            user_email: load_env_var_opt("GIT_USER_EMAIL")
                .unwrap_or_else(|| "bot@example.com".to_string()),
        })
    }

    pub fn push(&self, data_dir: &Path) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339();
        let repo_root = data_dir.parent().unwrap_or(data_dir);

        git(repo_root, &["config", "user.name", &self.user_name])?;
        git(repo_root, &["config", "user.email", &self.user_email])?;
        git(repo_root, &["add", &data_dir.to_string_lossy()])?;
        git(
            repo_root,
            &["commit", "-m", &format!("Update data at {timestamp}")],
        )?;
        git(repo_root, &["push", &self.remote_url, "HEAD:main"])?;

        info!("Git push completed");
        Ok(())
    }
}

fn remote_url_for(repo: &str, token: &str) -> String {
    let host = repo
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    format!("https://{token}@{host}")
}

fn git(cwd: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .with_context(|| format!("Failed to spawn git {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_url_embeds_the_token() {
        assert_eq!(
            remote_url_for("https://github.com/org/repo.git", "secret"),
            "https://secret@github.com/org/repo.git"
        );
        assert_eq!(
            remote_url_for("github.com/org/repo.git", "secret"),
            "https://secret@github.com/org/repo.git"
        );
    }
}
