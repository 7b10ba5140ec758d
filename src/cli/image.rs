//! Application image build and publish.

use std::process::Command;

use tracing::info;

use crate::cli::{context, output};
use crate::error::{Error, Result};

const DEFAULT_TAG: &str = "latest";

/// Build the application image.
pub fn build(tag: Option<&str>) -> Result<()> {
    let (settings, env) = context()?;
    let tag = resolve_tag(&env, tag);
    let reference = image_reference(&env, &tag);

    which::which("docker").map_err(|_| Error::BuildFailed("docker not found on PATH".to_string()))?;

    output::section("Build");
    output::kv("image", &reference);

    info!(image = %reference, "building image");
    let status = Command::new("docker")
        .arg("build")
        .arg("-t")
        .arg(&reference)
        .arg(&settings.project_root)
        .status()
        .map_err(|e| Error::BuildFailed(e.to_string()))?;
    if !status.success() {
        return Err(Error::BuildFailed(format!(
            "docker build exited with {}",
            status
        )));
    }

    output::success(&format!("built {}", reference));
    Ok(())
}

/// Push the application image to its registry.
pub fn push(tag: Option<&str>) -> Result<()> {
    let (_settings, env) = context()?;
    let tag = resolve_tag(&env, tag);
    let reference = image_reference(&env, &tag);

    which::which("docker").map_err(|_| Error::PushFailed("docker not found on PATH".to_string()))?;

    output::section("Push");
    output::kv("image", &reference);

    info!(image = %reference, "pushing image");
    let status = Command::new("docker")
        .arg("push")
        .arg(&reference)
        .status()
        .map_err(|e| Error::PushFailed(e.to_string()))?;
    if !status.success() {
        return Err(Error::PushFailed(format!(
            "docker push exited with {}",
            status
        )));
    }

    output::success(&format!("pushed {}", reference));
    Ok(())
}

/// Build, then push.
pub fn build_push(tag: Option<&str>) -> Result<()> {
    build(tag)?;
    push(tag)
}

fn resolve_tag(env: &crate::core::env::EnvFile, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => tag.to_string(),
        None => env.get_or("IMAGE_TAG", DEFAULT_TAG),
    }
}

fn image_reference(env: &crate::core::env::EnvFile, tag: &str) -> String {
    let name = env.get_or("IMAGE_NAME", "app");
    match env.get("IMAGE_REGISTRY").filter(|r| !r.trim().is_empty()) {
        Some(registry) => format!("{}/{}:{}", registry.trim_end_matches('/'), name, tag),
        None => format!("{}:{}", name, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::EnvFile;

    #[test]
    fn image_reference_includes_registry_when_set() {
        let env = EnvFile::parse(
            "/tmp/.env",
            "IMAGE_REGISTRY=registry.example.com/team\nIMAGE_NAME=webapp\n",
        );
        assert_eq!(
            image_reference(&env, "v2"),
            "registry.example.com/team/webapp:v2"
        );
    }

    #[test]
    fn image_reference_defaults_without_registry() {
        let env = EnvFile::parse("/tmp/.env", "IMAGE_NAME=webapp\n");
        assert_eq!(image_reference(&env, "latest"), "webapp:latest");
    }

    #[test]
    fn tag_falls_back_to_env_then_latest() {
        let env = EnvFile::parse("/tmp/.env", "IMAGE_TAG=v7\n");
        assert_eq!(resolve_tag(&env, Some("v9")), "v9");
        assert_eq!(resolve_tag(&env, None), "v7");

        let bare = EnvFile::parse("/tmp/.env", "");
        assert_eq!(resolve_tag(&bare, None), "latest");
    }
}
