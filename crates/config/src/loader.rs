use std::path::Path;

use crate::Config;

const ENV_PREFIX: &str = "BEDROCK_PROXY";

/// Load configuration: compiled defaults, overlaid by an optional TOML file,
/// overlaid by environment variables, in that order. Every section is
/// validated eagerly so a misconfigured deployment fails at startup rather
/// than on the first request.
pub fn load(toml_path: Option<impl AsRef<Path>>) -> anyhow::Result<Config> {
    let mut config = match toml_path {
        Some(path) => {
            let content = std::fs::read_to_string(path.as_ref()).map_err(crate::Error::ConfigOpen)?;
            toml::from_str(&content).map_err(crate::Error::ConfigParse)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

/// Applies `BEDROCK_PROXY_*` environment variable overrides on top of the
/// file/default-derived configuration.
///
/// This is a deliberately small, explicit set of overrides rather than a
/// generic deep-merge: the teacher's own dynamic-interpolation crate
/// (`serde-dynamic-string`) has no retrievable source to ground a faithful
/// reimplementation on, so configuration here favors a short list of
/// well-known keys over an invented generic mechanism.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(region) = std::env::var(format!("{ENV_PREFIX}_AWS_REGION")) {
        config.aws.region = region;
    }

    if let Ok(key) = std::env::var(format!("{ENV_PREFIX}_AWS_ACCESS_KEY_ID")) {
        config.aws.access_key_id = Some(key);
    }

    if let Ok(secret) = std::env::var(format!("{ENV_PREFIX}_AWS_SECRET_ACCESS_KEY")) {
        config.aws.secret_access_key = Some(secrecy::SecretString::from(secret));
    }

    if let Ok(token) = std::env::var(format!("{ENV_PREFIX}_AWS_SESSION_TOKEN")) {
        config.aws.session_token = Some(secrecy::SecretString::from(token));
    }

    if let Ok(endpoint) = std::env::var(format!("{ENV_PREFIX}_BEDROCK_ENDPOINT_URL")) {
        config.aws.bedrock_endpoint_url = Some(endpoint);
    }

    if let Ok(addr) = std::env::var(format!("{ENV_PREFIX}_LISTEN_ADDRESS"))
        && let Ok(parsed) = addr.parse()
    {
        config.server.listen_address = parsed;
    }

    if let Ok(level) = std::env::var(format!("{ENV_PREFIX}_LOG_LEVEL")) {
        config.server.log_level = level;
    }

    if let Ok(flag) = std::env::var(format!("{ENV_PREFIX}_ENABLE_PROGRAMMATIC_TOOL_CALLING")) {
        config.ptc.enabled = parse_bool(&flag, config.ptc.enabled);
    }

    if let Ok(flag) = std::env::var(format!("{ENV_PREFIX}_ENABLE_STANDALONE_CODE_EXECUTION")) {
        config.standalone.enabled = parse_bool(&flag, config.standalone.enabled);
    }

    if let Ok(image) = std::env::var(format!("{ENV_PREFIX}_PTC_SANDBOX_IMAGE")) {
        config.ptc.sandbox_image = image;
    }
}

fn parse_bool(value: &str, fallback: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_minimal_toml_overlay() {
        let toml = indoc::indoc! {r#"
            [aws]
            region = "eu-west-1"

            [ptc]
            enabled = true
        "#};

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.aws.region, "eu-west-1");
        assert!(config.ptc.enabled);
        // Untouched sections still carry their defaults.
        assert_eq!(config.llm.bedrock_timeout_seconds, 1800);
    }
}
