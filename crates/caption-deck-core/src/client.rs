use crate::config::JobConfig;
use crate::error::{CaptionError, Error};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Instruction appended to every system prompt.
pub const DESCRIBE_INSTRUCTION: &str = "Describe this image in detail.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Anything that can turn an image into a caption. The batch worker only
/// talks to this seam, which keeps retry and skip policy out of the client.
pub trait Captioner: Send {
    fn caption(&self, image_path: &Path) -> Result<String, CaptionError>;
}

/// [`Captioner`] backed by an Ollama-style `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaCaptioner {
    endpoint: String,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl OllamaCaptioner {
    pub fn new(endpoint: &str, model: &str, system_prompt: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            timeout,
        }
    }

    pub fn from_job(job: &JobConfig) -> Self {
        Self::new(&job.endpoint, &job.model, &job.prompt, job.timeout)
    }
}

impl Captioner for OllamaCaptioner {
    fn caption(&self, image_path: &Path) -> Result<String, CaptionError> {
        generate_caption(
            &self.endpoint,
            image_path,
            &self.model,
            &self.system_prompt,
            self.timeout,
        )
    }
}

pub fn encode_image_to_base64(image_path: &Path) -> Result<String, CaptionError> {
    let bytes = fs::read(image_path).map_err(|e| CaptionError::Encoding(e.to_string()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

pub fn build_prompt(system_prompt: &str) -> String {
    format!("{}\n\n{}", system_prompt, DESCRIBE_INSTRUCTION)
}

fn api_url(endpoint: &str, route: &str) -> String {
    format!("{}/api/{}", endpoint.trim_end_matches('/'), route)
}

/// Send one image to `{endpoint}/api/generate` and return the trimmed
/// caption.
///
/// Single attempt, no retries. Every failure comes back as a
/// [`CaptionError`] value; nothing here panics or propagates.
pub fn generate_caption(
    endpoint: &str,
    image_path: &Path,
    model: &str,
    system_prompt: &str,
    timeout: Duration,
) -> Result<String, CaptionError> {
    let image = encode_image_to_base64(image_path)?;

    let payload = GenerateRequest {
        model,
        prompt: build_prompt(system_prompt),
        images: vec![image],
        stream: false,
    };

    let url = api_url(endpoint, "generate");
    debug!("POST {} for {}", url, image_path.display());

    let body = post_json(&url, &payload, timeout).map_err(|e| {
        warn!("Caption request for {} failed: {}", image_path.display(), e);
        CaptionError::Transport(e.to_string())
    })?;

    let caption = parse_generate_response(&body)?;
    if caption.is_empty() {
        warn!("Model returned an empty caption for {}", image_path.display());
        return Err(CaptionError::EmptyCaption);
    }
    Ok(caption)
}

fn post_json(url: &str, payload: &GenerateRequest<'_>, timeout: Duration) -> Result<String, Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let response = client.post(url).json(payload).send()?.error_for_status()?;
    Ok(response.text()?)
}

/// Pull the trimmed `response` field out of a generate reply. A missing
/// field reads as an empty caption; a body that is not JSON is a transport
/// failure.
pub fn parse_generate_response(body: &str) -> Result<String, CaptionError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| CaptionError::Transport(format!("malformed response: {}", e)))?;
    Ok(parsed.response.trim().to_string())
}

/// Names of the models the endpoint has installed (`GET /api/tags`).
pub fn list_models(endpoint: &str, timeout: Duration) -> Result<Vec<String>, Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let response = client
        .get(api_url(endpoint, "tags"))
        .send()?
        .error_for_status()?;
    let tags: TagsResponse = serde_json::from_str(&response.text()?)?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}
