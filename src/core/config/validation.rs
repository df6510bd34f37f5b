use super::settings::AppConfig;
use super::ConfigError;

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.host.trim().is_empty() {
        return Err(invalid("server.host", "must not be empty"));
    }

    if config.ollama.port == 0 {
        return Err(invalid("ollama.port", "must be between 1 and 65535"));
    }
    validate_non_empty("ollama.chat_model", &config.ollama.chat_model)?;
    validate_non_empty("ollama.embedding_model", &config.ollama.embedding_model)?;
    validate_range(
        "ollama.request_timeout_secs",
        config.ollama.request_timeout_secs,
        1,
        86_400,
    )?;
    if let Some(temperature) = config.ollama.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("ollama.temperature", "must be within 0.0..=2.0"));
        }
    }

    validate_range(
        "database.max_connections",
        u64::from(config.database.max_connections),
        1,
        1_000,
    )?;

    let rag = &config.rag;
    validate_range("rag.chunk_size", rag.chunk_size as u64, 1, 1_000_000)?;
    if rag.chunk_overlap >= rag.chunk_size {
        return Err(invalid(
            "rag.chunk_overlap",
            format!(
                "must be smaller than rag.chunk_size ({} >= {})",
                rag.chunk_overlap, rag.chunk_size
            ),
        ));
    }
    validate_range("rag.top_k", rag.top_k as u64, 1, 1_000)?;
    validate_range("rag.embed_batch_size", rag.embed_batch_size as u64, 1, 10_000)?;
    validate_non_empty("rag.default_collection", &rag.default_collection)?;
    for placeholder in ["{context}", "{input}"] {
        if !rag.prompt_template.contains(placeholder) {
            return Err(invalid(
                "rag.prompt_template",
                format!("missing {} placeholder", placeholder),
            ));
        }
    }
    if let Some(seed) = &rag.seed {
        validate_non_empty("rag.seed.collection", &seed.collection)?;
    }

    if let Some(confluence) = &config.confluence {
        validate_non_empty("confluence.url", &confluence.url)?;
    }

    Ok(())
}

fn validate_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(())
}

fn validate_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(invalid(
            field,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
