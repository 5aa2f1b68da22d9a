// src/classify/backend.rs
// Chat-model boundary. The pipeline only ever sees `ChatBackend`; the
// concrete provider (OpenAI-compatible chat completions) lives here.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One blocking chat round trip: fixed system instruction plus a single
/// user turn, free-text reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
    /// Provider name for diagnostics/headers.
    fn name(&self) -> &'static str;
}

pub type DynChatBackend = Arc<dyn ChatBackend>;

/// Factory: build a backend according to config and environment.
/// `AI_TEST_MODE=mock` short-circuits to a deterministic mock client that
/// classifies everything as none, for local runs without credentials.
pub fn build_backend(cfg: &crate::config::ChatConfig) -> DynChatBackend {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockBackend::fixed(
            r#"{"topic":"none","rationale":"mock backend"}"#,
        ));
    }
    Arc::new(OpenAiBackend::new(cfg.api_key.clone(), cfg.model.clone()))
}

/// OpenAI-compatible chat completions provider.
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_endpoint(api_key, model, "https://api.openai.com/v1/chat/completions")
    }

    /// `endpoint` override for self-hosted OpenAI-compatible servers.
    pub fn with_endpoint(api_key: String, model: String, endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("company-news-radar/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(anyhow!("chat backend has no API key"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("chat completions request")?;
        let resp = resp
            .error_for_status()
            .context("chat completions status")?;
        let body: Resp = resp.json().await.context("chat completions body")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completions reply had no choices"))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Test/local double: replies with a fixed queue of canned responses,
/// falling back to the last one once drained.
pub struct MockBackend {
    replies: Mutex<Vec<String>>,
    last: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        let replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        Self {
            replies: Mutex::new(replies),
            last: Mutex::new(None),
        }
    }

    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            replies: Mutex::new(Vec::new()),
            last: Mutex::new(Some(reply)),
        }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        let mut q = self.replies.lock().expect("mock replies poisoned");
        if q.is_empty() {
            let last = self.last.lock().expect("mock last poisoned");
            return last
                .clone()
                .ok_or_else(|| anyhow!("mock backend out of replies"));
        }
        let next = q.remove(0);
        *self.last.lock().expect("mock last poisoned") = Some(next.clone());
        Ok(next)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
