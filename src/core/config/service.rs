use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::{AppConfig, ConfluenceConfig};
use super::validation::validate_config;
use super::ConfigError;

const CONFIG_PATH_ENV: &str = "RAGSERVE_CONFIG_PATH";

/// Loads the configuration from disk and the process environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_with(config_path().as_deref(), |key| env::var(key).ok())
}

/// Loads the configuration from an optional YAML file, then applies
/// overrides through `lookup` and validates the result.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_yaml_file(path)?,
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config)?;
    Ok(config)
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from("config.yml");
    local.exists().then_some(local)
}

fn load_yaml_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if contents.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(host) = get("HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("PORT") {
        config.server.port = parse_port("server.port", &port)?;
    }

    if let Some(host) = get("OLLAMA_HOST") {
        config.ollama.host = host;
    }
    if let Some(port) = get("OLLAMA_PORT") {
        config.ollama.port = parse_port("ollama.port", &port)?;
    }
    if let Some(model) = get("OLLAMA_CHAT_MODEL") {
        config.ollama.chat_model = model;
    }
    if let Some(model) = get("OLLAMA_EMBEDDING_MODEL") {
        config.ollama.embedding_model = model;
    }

    if let Some(url) = get("PG_VECTOR_DATABASE_URL") {
        config.database.url = Some(url);
    }

    if let Some(dir) = get("RAGSERVE_LOG_DIR") {
        config.logging.dir = PathBuf::from(dir);
    }

    let confluence_url = get("CONFLUENCE_URL");
    if confluence_url.is_some() || config.confluence.is_some() {
        let confluence = config.confluence.get_or_insert_with(ConfluenceConfig::default);
        if let Some(url) = confluence_url {
            confluence.url = url;
        }
        if let Some(username) = get("CONFLUENCE_USERNAME") {
            confluence.username = username;
        }
        if let Some(token) = get("CONFLUENCE_API_TOKEN") {
            confluence.api_token = token;
        }
        if let Some(keys) = get("CONFLUENCE_SPACE_KEYS") {
            confluence.space_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    Ok(())
}

fn parse_port(field: &'static str, raw: &str) -> Result<u16, ConfigError> {
    raw.parse::<u16>().map_err(|err| ConfigError::Invalid {
        field,
        reason: format!("'{}' is not a valid port: {}", raw, err),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_ollama_conventions() {
        let config = load_config_with(None, env_of(&[])).unwrap();
        assert_eq!(config.ollama.base_url(), "http://localhost:11434");
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert!(matches!(
            config.database_url(),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ollama:\n  host: model-box\n  chat_model: phi3:mini\nrag:\n  top_k: 6\n"
        )
        .unwrap();

        let config = load_config_with(
            Some(file.path()),
            env_of(&[
                ("OLLAMA_PORT", "9999"),
                ("PG_VECTOR_DATABASE_URL", "postgresql://u:p@db/vectors"),
            ]),
        )
        .unwrap();

        assert_eq!(config.ollama.base_url(), "http://model-box:9999");
        assert_eq!(config.ollama.chat_model, "phi3:mini");
        assert_eq!(config.rag.top_k, 6);
        assert_eq!(config.database_url().unwrap(), "postgresql://u:p@db/vectors");
    }

    #[test]
    fn confluence_section_built_from_environment() {
        let config = load_config_with(
            None,
            env_of(&[
                ("CONFLUENCE_URL", "https://wiki.example.com"),
                ("CONFLUENCE_SPACE_KEYS", "ENG, OPS,,"),
            ]),
        )
        .unwrap();

        let confluence = config.confluence.unwrap();
        assert_eq!(confluence.url, "https://wiki.example.com");
        assert_eq!(confluence.space_keys, vec!["ENG", "OPS"]);
    }

    #[test]
    fn rejects_bad_port() {
        let err = load_config_with(None, env_of(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "server.port", .. }));
    }
}
