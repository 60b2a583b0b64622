use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CoverJob, CoverRequest, CoverStatus, PromptPreferences};

use super::notify::{Notifier, StatusEvent};
use super::preferences::PreferenceService;
use super::watermark;

/// Provider polling cadence.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Generation jobs in flight at once; a burst of requests queues here
/// instead of fanning out unbounded outbound calls.
const MAX_CONCURRENT_JOBS: usize = 4;

/// Style catalog. `{network}` is substituted with the requested network name.
const STYLE_PROMPTS: &[(&str, &str)] = &[
    (
        "energy_fields",
        "crypto news cover background, glowing energy fields, particle effects, cosmic energy, vibrant auras, {network} branding colors, professional design",
    ),
    (
        "dark_theme",
        "crypto news cover background, dark professional background, subtle geometric patterns, minimal lighting, {network} color scheme, corporate style",
    ),
    (
        "network_nodes",
        "crypto news cover background, connected network nodes, digital connections, tech visualization, {network} branding, futuristic design",
    ),
    (
        "particle_waves",
        "crypto news cover background, flowing particle waves, dynamic motion, wave patterns, {network} colors, energy flow",
    ),
    (
        "corporate_style",
        "crypto news cover background, clean corporate design, professional gradients, {network} branding",
    ),
];

const NEGATIVE_PROMPT: &str =
    "text, letters, words, title, subtitle, watermark, signature, blurry, low quality, distorted, people, faces";

#[derive(Debug, Serialize)]
struct GenerationRequest {
    prompt: String,
    negative_prompt: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
    output: Option<String>,
    error: Option<String>,
}

/// Orchestrates cover generation against the external text-to-image API:
/// build prompt, submit, poll until terminal, download, watermark, persist.
pub struct CoverService {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    covers_dir: PathBuf,
    poll_attempts: u32,
    jobs: RwLock<HashMap<String, CoverJob>>,
    permits: Semaphore,
    preferences: Arc<PreferenceService>,
    notifier: Notifier,
}

impl CoverService {
    pub fn new(
        config: &Config,
        preferences: Arc<PreferenceService>,
        notifier: Notifier,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: config.image_api_url.clone(),
            api_key: config.image_api_key.clone(),
            covers_dir: PathBuf::from(&config.covers_dir),
            poll_attempts: config.cover_poll_attempts,
            jobs: RwLock::new(HashMap::new()),
            permits: Semaphore::new(MAX_CONCURRENT_JOBS),
            preferences,
            notifier,
        }
    }

    pub fn style_names() -> Vec<&'static str> {
        STYLE_PROMPTS.iter().map(|(name, _)| *name).collect()
    }

    /// Register a job and spawn its generation task. Returns immediately with
    /// the job snapshot; progress is observed via `get_job`.
    pub async fn start_job(self: &Arc<Self>, request: CoverRequest) -> Result<CoverJob> {
        if self.api_key.is_none() {
            return Err(AppError::Unavailable(
                "image generation API key not configured".to_string(),
            ));
        }
        if request.network.trim().is_empty() {
            return Err(AppError::InvalidRequest("network is required".to_string()));
        }

        let (style, template) = match &request.style {
            Some(style) => {
                let template = STYLE_PROMPTS
                    .iter()
                    .find(|(name, _)| name == style)
                    .map(|(_, t)| *t)
                    .ok_or_else(|| {
                        AppError::InvalidRequest(format!("unknown style: {}", style))
                    })?;
                (style.clone(), template)
            }
            None => {
                let (name, template) = STYLE_PROMPTS
                    .choose(&mut rand::thread_rng())
                    .expect("style catalog is non-empty");
                (name.to_string(), *template)
            }
        };

        let prefs = self.preferences.current().await;
        let prompt = build_prompt(template, &request.network, &prefs);

        let job = CoverJob {
            id: new_job_id(),
            network: request.network.clone(),
            style,
            prompt: prompt.clone(),
            status: CoverStatus::Queued,
            image_path: None,
            error: None,
            created_at: Utc::now(),
        };

        self.jobs.write().await.insert(job.id.clone(), job.clone());

        let service = Arc::clone(self);
        let job_id = job.id.clone();
        let negative = build_negative_prompt(&prefs);
        tokio::spawn(async move {
            if let Err(e) = service.run_job(&job_id, prompt, negative).await {
                tracing::error!("cover job {} failed: {}", job_id, e);
                service.mark_failed(&job_id, e.to_string()).await;
            }
        });

        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Option<CoverJob> {
        self.jobs.read().await.get(id).cloned()
    }

    async fn run_job(&self, job_id: &str, prompt: String, negative_prompt: String) -> Result<()> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("job semaphore never closes");
        self.set_status(job_id, CoverStatus::Generating).await;

        let provider_id = self.submit(prompt, negative_prompt).await?;
        let output_url = self.poll_until_done(&provider_id).await?;

        let bytes = self.download(&output_url).await?;
        let watermark_path = self.covers_dir.join("watermark.png");
        let stamped = watermark::apply_watermark(&bytes, Some(&watermark_path))?;

        tokio::fs::create_dir_all(&self.covers_dir).await?;
        let file_name = format!("{}.png", job_id);
        tokio::fs::write(self.covers_dir.join(&file_name), stamped).await?;

        let image_path = format!("covers/{}", file_name);
        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(job_id) {
                job.status = CoverStatus::Completed;
                job.image_path = Some(image_path.clone());
            }
        }
        self.notifier.send(StatusEvent::CoverCompleted {
            job_id: job_id.to_string(),
            image_path,
        });
        Ok(())
    }

    async fn submit(&self, prompt: String, negative_prompt: String) -> Result<String> {
        let request = GenerationRequest {
            prompt,
            negative_prompt,
            width: 1024,
            height: 512,
        };

        let mut req = self
            .client
            .post(format!("{}/generate", self.api_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ImageApi(format!("submit failed: {}", error_text)));
        }

        let submitted: SubmitResponse = response.json().await?;
        Ok(submitted.id)
    }

    /// Poll the provider status endpoint every 2s until completed, failed,
    /// or the attempt cap is reached.
    async fn poll_until_done(&self, provider_id: &str) -> Result<String> {
        for _ in 0..self.poll_attempts {
            tokio::time::sleep(POLL_INTERVAL).await;

            let mut req = self
                .client
                .get(format!("{}/predictions/{}", self.api_url, provider_id));
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let response = req.send().await?;
            if !response.status().is_success() {
                continue;
            }

            let status: JobStatusResponse = response.json().await?;
            match status.status.as_str() {
                "completed" => {
                    return status.output.ok_or_else(|| {
                        AppError::ImageApi("completed without output url".to_string())
                    });
                }
                "failed" => {
                    return Err(AppError::ImageApi(
                        status.error.unwrap_or_else(|| "generation failed".to_string()),
                    ));
                }
                _ => {}
            }
        }

        Err(AppError::ImageApi(format!(
            "generation timed out after {} polls",
            self.poll_attempts
        )))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ImageApi(format!(
                "download failed: HTTP {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn set_status(&self, job_id: &str, status: CoverStatus) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = status;
        }
    }

    async fn mark_failed(&self, job_id: &str, error: String) {
        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(job_id) {
                job.status = CoverStatus::Failed;
                job.error = Some(error.clone());
            }
        }
        self.notifier.send(StatusEvent::CoverFailed {
            job_id: job_id.to_string(),
            error,
        });
    }
}

fn new_job_id() -> String {
    // Timestamp plus a random suffix keeps ids sortable in the covers dir.
    format!(
        "{}-{:06x}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u32>() & 0xffffff
    )
}

/// Substitute the network into the template and append preference biases.
pub fn build_prompt(template: &str, network: &str, prefs: &PromptPreferences) -> String {
    let mut prompt = template.replace("{network}", network);

    let biases: Vec<&str> = prefs
        .good_keywords
        .iter()
        .rev()
        .take(3)
        .chain(prefs.preferred_materials.iter().rev().take(2))
        .chain(prefs.preferred_scenes.iter().rev().take(2))
        .map(|s| s.as_str())
        .collect();

    for bias in biases {
        prompt.push_str(", ");
        prompt.push_str(bias);
    }
    prompt
}

pub fn build_negative_prompt(prefs: &PromptPreferences) -> String {
    let mut negative = NEGATIVE_PROMPT.to_string();
    for avoid in prefs.bad_keywords.iter().rev().take(5) {
        negative.push_str(", ");
        negative.push_str(avoid);
    }
    negative
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_substitutes_network() {
        let prefs = PromptPreferences::default();
        let prompt = build_prompt(STYLE_PROMPTS[0].1, "hedera", &prefs);
        assert!(prompt.contains("hedera branding colors"));
        assert!(!prompt.contains("{network}"));
    }

    #[test]
    fn prompt_appends_recent_biases() {
        let prefs = PromptPreferences {
            good_keywords: vec!["clean composition".into(), "sharp focus".into()],
            preferred_materials: vec!["glass material".into()],
            ..Default::default()
        };
        let prompt = build_prompt(STYLE_PROMPTS[1].1, "algorand", &prefs);
        assert!(prompt.contains("sharp focus"));
        assert!(prompt.contains("glass material"));
    }

    #[test]
    fn negative_prompt_includes_avoided_fragments() {
        let prefs = PromptPreferences {
            bad_keywords: vec!["neon glow".into()],
            ..Default::default()
        };
        let negative = build_negative_prompt(&prefs);
        assert!(negative.starts_with(NEGATIVE_PROMPT));
        assert!(negative.contains("neon glow"));
    }

    #[test]
    fn every_style_template_has_placeholder() {
        for (name, template) in STYLE_PROMPTS {
            assert!(
                template.contains("{network}"),
                "style {} lacks a network placeholder",
                name
            );
        }
    }
}
