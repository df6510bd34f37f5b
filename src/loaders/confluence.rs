//! Confluence Cloud/Server page loader over the REST content API.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::html::strip_html_tags;
use crate::core::config::ConfluenceConfig;
use crate::rag::SourceDocument;

const PAGE_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum ConfluenceError {
    #[error("confluence request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("confluence returned {status} for space {space}")]
    Status {
        space: String,
        status: reqwest::StatusCode,
    },
}

#[derive(Debug, Deserialize)]
struct ContentPage {
    #[serde(default)]
    results: Vec<Content>,
    #[serde(default, rename = "_links")]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    id: String,
    #[serde(default)]
    title: String,
    body: Option<ContentBody>,
    #[serde(default, rename = "_links")]
    links: ContentLinks,
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    storage: Option<StorageValue>,
}

#[derive(Debug, Deserialize)]
struct StorageValue {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct ContentLinks {
    webui: Option<String>,
}

#[derive(Clone)]
pub struct ConfluenceClient {
    client: Client,
    base_url: String,
    username: String,
    api_token: String,
    space_keys: Vec<String>,
}

impl ConfluenceClient {
    pub fn new(config: &ConfluenceConfig, timeout: Duration) -> Result<Self, ConfluenceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            space_keys: config.space_keys.clone(),
        })
    }

    pub fn space_keys(&self) -> &[String] {
        &self.space_keys
    }

    /// Loads every page of every space. A space that fails to load is
    /// logged and skipped.
    pub async fn load_spaces(&self, space_keys: &[String]) -> Vec<SourceDocument> {
        let mut documents = Vec::new();
        for space in space_keys {
            match self.load_space(space).await {
                Ok(pages) => {
                    tracing::info!("Loaded {} documents from space {}", pages.len(), space);
                    documents.extend(pages);
                }
                Err(err) => {
                    tracing::warn!("Error loading from space {}: {}", space, err);
                }
            }
        }
        documents
    }

    pub async fn load_space(&self, space: &str) -> Result<Vec<SourceDocument>, ConfluenceError> {
        let mut documents = Vec::new();
        let mut start = 0usize;

        loop {
            let response = self
                .client
                .get(format!("{}/rest/api/content", self.base_url))
                .basic_auth(&self.username, Some(&self.api_token))
                .query(&[
                    ("spaceKey", space.to_string()),
                    ("type", "page".to_string()),
                    ("expand", "body.storage".to_string()),
                    ("start", start.to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ConfluenceError::Status {
                    space: space.to_string(),
                    status: response.status(),
                });
            }

            let page: ContentPage = response.json().await?;
            let fetched = page.results.len();
            let has_next = page.links.next.is_some();
            documents.extend(self.page_documents(page.results));

            if fetched == 0 || !has_next {
                break;
            }
            start += fetched;
        }

        Ok(documents)
    }

    fn page_documents(&self, results: Vec<Content>) -> Vec<SourceDocument> {
        results
            .into_iter()
            .filter_map(|content| {
                let html = content.body?.storage?.value;
                let text = strip_html_tags(&html);
                if text.is_empty() {
                    return None;
                }
                let source = match content.links.webui {
                    Some(path) => format!("{}{}", self.base_url, path),
                    None if !content.title.is_empty() => content.title,
                    None => content.id,
                };
                Some(SourceDocument { source, text })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ConfluenceClient {
        let config = ConfluenceConfig {
            url: "https://wiki.example.com/".to_string(),
            username: "bot@example.com".to_string(),
            api_token: "token".to_string(),
            space_keys: vec!["ENG".to_string()],
        };
        ConfluenceClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn converts_storage_bodies_to_documents() {
        let page: ContentPage = serde_json::from_value(serde_json::json!({
            "results": [
                {
                    "id": "1",
                    "title": "Runbook",
                    "body": { "storage": { "value": "<h1>Deploys</h1><p>Run make ship.</p>" } },
                    "_links": { "webui": "/spaces/ENG/pages/1/Runbook" }
                },
                {
                    "id": "2",
                    "title": "Empty",
                    "body": { "storage": { "value": "<p> </p>" } }
                },
                {
                    "id": "3",
                    "title": "No links",
                    "body": { "storage": { "value": "plain text" } }
                }
            ],
            "_links": {}
        }))
        .unwrap();
        assert!(page.links.next.is_none());

        let docs = client().page_documents(page.results);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "https://wiki.example.com/spaces/ENG/pages/1/Runbook");
        assert_eq!(docs[0].text, "Deploys\nRun make ship.");
        assert_eq!(docs[1].source, "No links");
    }

    #[test]
    fn trims_base_url() {
        let client = client();
        assert_eq!(client.base_url, "https://wiki.example.com");
        assert_eq!(client.space_keys(), ["ENG".to_string()]);
    }
}
