//! Warm-up run after the listener is bound and before the server is
//! marked ready.

use super::error::InitializationError;
use super::AppState;

pub async fn warm_up(state: &AppState) -> Result<(), InitializationError> {
    let provider = state.rag.provider();

    match provider.health_check().await {
        Ok(true) => tracing::info!("{} is reachable", provider.name()),
        Ok(false) => {
            return Err(InitializationError::ModelServer(format!(
                "{} health check failed",
                provider.name()
            )))
        }
        Err(err) => return Err(InitializationError::ModelServer(err.to_string())),
    }

    check_models(state).await;

    if let Some(seed) = &state.config.rag.seed {
        let path = seed.path.display().to_string();
        let content = tokio::fs::read_to_string(&seed.path)
            .await
            .map_err(|e| InitializationError::Seed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let outcome = state
            .rag
            .ingest(&seed.collection, &content, &path)
            .await
            .map_err(|e| InitializationError::Seed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            "Seeded collection '{}' with {} chunks from {}",
            outcome.collection_name,
            outcome.documents_added,
            path
        );
    }

    Ok(())
}

/// Warns about configured models the server does not have pulled.
async fn check_models(state: &AppState) {
    let models = match state.rag.provider().list_models().await {
        Ok(models) => models,
        Err(err) => {
            tracing::warn!("Could not list models: {}", err);
            return;
        }
    };

    let ollama = &state.config.ollama;
    for wanted in [&ollama.chat_model, &ollama.embedding_model] {
        if !models.iter().any(|m| model_matches(&m.id, wanted)) {
            tracing::warn!(
                "Model '{}' is not available on the model server; pull it before use",
                wanted
            );
        }
    }
}

/// `nomic-embed-text` matches `nomic-embed-text:latest`.
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || (!wanted.contains(':') && available.strip_suffix(":latest") == Some(wanted))
}
