use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gen_core::env::{self, EnvError};
use gen_core::{GeneratedImage, ImageProvider, Prompt, ProviderError, ProviderFuture, ProviderResult};
use serde_json::{Value, json};

const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp-image-generation";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_IMAGES_PER_REQUEST: u32 = 4;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Longest slice of an error body kept in failure messages.
const MAX_ERROR_BODY: usize = 512;

/// Settings for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL up to and including the API version.
    pub api_base: String,
    /// Number of `generateContent` calls made per job.
    pub images_per_request: u32,
    /// Timeout applied to each HTTP call.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            images_per_request: DEFAULT_IMAGES_PER_REQUEST,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                         | Default                                  |
    /// |---------------------------------|------------------------------------------|
    /// | `GOOGLE_API_KEY`                | required                                 |
    /// | `GEMINI_MODEL`                  | `gemini-2.0-flash-exp-image-generation`  |
    /// | `GEMINI_API_BASE`               | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `IMAGES_PER_REQUEST`            | `4`                                      |
    /// | `PROVIDER_REQUEST_TIMEOUT_SECS` | `60`                                     |
    pub fn from_env() -> Result<Self, EnvError> {
        let images_per_request = env::parse_or("IMAGES_PER_REQUEST", DEFAULT_IMAGES_PER_REQUEST)?;
        if images_per_request == 0 {
            return Err(EnvError::invalid(
                "IMAGES_PER_REQUEST",
                "0",
                "must be at least 1",
            ));
        }

        Ok(Self {
            api_key: env::required("GOOGLE_API_KEY")?,
            model: env::optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: env::optional("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            images_per_request,
            request_timeout: Duration::from_secs(env::parse_or(
                "PROVIDER_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        })
    }

    /// Full URL of the model's `generateContent` endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini-backed [`ImageProvider`].
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    config: Arc<GeminiConfig>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Run the configured number of calls, keeping whatever images arrive.
    async fn generate_batch(&self, prompt: &Prompt) -> ProviderResult {
        let attempts = self.config.images_per_request;
        let mut images = Vec::new();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.generate_once(prompt).await {
                Ok(Some(image)) => images.push(image),
                Ok(None) => {
                    tracing::warn!(attempt, attempts, "Gemini response contained no image");
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "Gemini request failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if images.is_empty() => Err(e),
            _ => Ok(images),
        }
    }

    async fn generate_once(&self, prompt: &Prompt) -> Result<Option<GeneratedImage>, ProviderError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(prompt.as_str()))
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: Value = response.json().await.map_err(classify_request_error)?;
        extract_first_image(&body)
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, prompt: &Prompt) -> ProviderFuture {
        let provider = self.clone();
        let prompt = prompt.clone();
        Box::pin(async move { provider.generate_batch(&prompt).await })
    }
}

/// JSON body for one `generateContent` call.
pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseModalities": ["Text", "Image"]
        }
    })
}

/// Pull the first inline image out of a `generateContent` response.
///
/// A response without candidates or without image parts yields `None`;
/// an image part that cannot be decoded is a malformed response.
pub fn extract_first_image(body: &Value) -> Result<Option<GeneratedImage>, ProviderError> {
    let Some(parts) = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    else {
        return Ok(None);
    };

    let Some(inline) = parts.iter().find_map(|part| part.get("inlineData")) else {
        return Ok(None);
    };

    let data = inline
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Malformed("inlineData without data".into()))?;
    let mime_type = inline
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("image/png");

    let bytes = STANDARD
        .decode(data)
        .map_err(|e| ProviderError::Malformed(format!("invalid base64 image data: {e}")))?;

    Ok(Some(GeneratedImage::new(bytes, mime_type)))
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::Quota(format!("HTTP {status}: {body}"))
    } else {
        ProviderError::Transport(format!("HTTP {status}: {body}"))
    }
}

fn classify_request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_decode() {
        ProviderError::Malformed(err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}
