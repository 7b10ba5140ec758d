//! Configuration commands.

use dialoguer::Input;

use crate::cli::{context, output};
use crate::core::configure::auto_configure;
use crate::core::secrets::is_placeholder;
use crate::error::{Error, Result};

/// Set one configuration key.
///
/// Key and value are prompted for when omitted on a TTY; a
/// non-interactive invocation must supply both.
pub fn set(key: Option<String>, value: Option<String>) -> Result<()> {
    let (_settings, mut env) = context()?;

    let interactive = atty::is(atty::Stream::Stdin);
    let key = match key {
        Some(key) => key,
        None if interactive => Input::<String>::new().with_prompt("Key").interact_text()?,
        None => {
            return Err(Error::InvalidSelection(
                "specify a key when running non-interactively".to_string(),
            ))
        }
    };
    let value = match value {
        Some(value) => value,
        None if interactive => Input::<String>::new()
            .with_prompt(format!("Value for {}", key))
            .allow_empty(true)
            .interact_text()?,
        None => {
            return Err(Error::InvalidSelection(
                "specify a value when running non-interactively".to_string(),
            ))
        }
    };

    env.set(&key, &value);
    env.save()?;
    output::success(&format!("{} updated", key));
    Ok(())
}

/// Generate missing secrets and rewrite every external URL for the domain.
pub fn auto(domain: Option<&str>) -> Result<()> {
    let (_settings, mut env) = context()?;

    let domain = match domain {
        Some(domain) => domain.to_string(),
        None => env.get_or("DOMAIN", "localhost"),
    };

    output::section("Auto-configure");
    output::kv("domain", &domain);

    let summary = auto_configure(&mut env, &domain);
    env.save()?;

    if summary.generated.is_empty() {
        output::dimmed("all secrets already set");
    } else {
        for key in &summary.generated {
            output::list_item(&format!("generated {}", key));
        }
    }
    for key in &summary.urls {
        output::dimmed(&format!("  {} -> {}", key, env.get_or(key, "")));
    }

    let remaining: Vec<&str> = env
        .pairs()
        .into_iter()
        .filter(|(_, v)| is_placeholder(v))
        .map(|(k, _)| k)
        .collect();
    if !remaining.is_empty() {
        output::warn(&format!(
            "placeholder values remain: {}",
            remaining.join(", ")
        ));
    }

    output::success("configuration updated");
    Ok(())
}
