use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::content::ContentKind;
use crate::domain::moderation::{ModerationAction, ModerationResult};

/// External content-classification capability.
///
/// The escalation policy behind it (which violation patterns yield which ban
/// type or duration) is opaque to this service; callers only consume the
/// returned verdict. Injected so tests can substitute a stub.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn submit(
        &self,
        body: &str,
        kind: ContentKind,
        content_id: Uuid,
        user_id: Uuid,
    ) -> Result<ModerationResult>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    content: &'a str,
    content_type: &'static str,
    content_id: Uuid,
    user_id: Uuid,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    approved: bool,
    flagged: bool,
    action: String,
    #[serde(default)]
    violations: Vec<String>,
    #[serde(default)]
    should_ban_user: Option<bool>,
    #[serde(default)]
    ban_duration_days: Option<i64>,
}

/// JSON-over-HTTP classifier client with a per-call deadline.
#[derive(Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    classify_url: String,
}

impl HttpClassifier {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.classifier_timeout_ms))
            .build()
            .map_err(|err| anyhow!("failed to build classifier client: {}", err))?;

        Ok(Self {
            client,
            classify_url: format!("{}/v1/classify", config.classifier_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ContentClassifier for HttpClassifier {
    async fn submit(
        &self,
        body: &str,
        kind: ContentKind,
        content_id: Uuid,
        user_id: Uuid,
    ) -> Result<ModerationResult> {
        let request = ClassifyRequest {
            content: body,
            content_type: kind.as_db(),
            content_id,
            user_id,
        };

        let response = self
            .client
            .post(&self.classify_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let verdict: ClassifyResponse = response.json().await?;
        let action = ModerationAction::from_db(&verdict.action)
            .ok_or_else(|| anyhow!("unknown moderation action: {}", verdict.action))?;

        Ok(ModerationResult {
            approved: verdict.approved,
            flagged: verdict.flagged,
            action,
            violations: verdict.violations,
            should_ban_user: verdict.should_ban_user,
            ban_duration_days: verdict.ban_duration_days,
        })
    }
}
