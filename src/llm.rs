//! Language-model access with exponential backoff retry logic.
//!
//! The pipeline only needs two capabilities from a model:
//! - [`Summarizer`]: condense article or abstract text
//! - [`Explainer`]: write an explainer or timeline about a topic
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for sending a prompt and getting text back
//! - [`AwfulAsk`]: adapts `awful_aj::api::ask` to [`AskAsync`]
//! - [`RetryAsk`]: decorator adding backoff retries to any [`AskAsync`]
//! - [`Llm`]: the production backend, or [`Llm::Unavailable`] when no model
//!   is configured
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::config::LlmConfig;
use crate::error::SummarizeError;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send a prompt to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
pub struct RetryAsk<T> {
    inner: T,
    /// Retries after the first attempt.
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let factor = 1u32.checked_shl((attempt - 1) as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// `awful_aj::api::ask` bound to a config and chat template.
#[derive(Debug)]
pub struct AwfulAsk {
    pub config: AwfulJadeConfig,
    pub template: ChatTemplate,
}

impl AskAsync for AwfulAsk {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "API call failed");
        }
        res
    }
}

/// Text shown in place of a summary that could not be produced.
pub fn summary_placeholder(error: &SummarizeError) -> String {
    format!("[Could not summarize content: {error}]")
}

/// Condenses text.
pub trait Summarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

/// Writes long-form pieces about a topic.
pub trait Explainer {
    async fn explain(&self, topic: &str, context: &str, params: &ExplainParams) -> Result<String, SummarizeError>;
}

/// Kind of generated piece.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainMode {
    #[default]
    Explainer,
    Timeline,
}

impl ExplainMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainMode::Explainer => "explainer",
            ExplainMode::Timeline => "timeline",
        }
    }

    /// Title prefix of the generated item.
    pub fn title_prefix(&self) -> &'static str {
        match self {
            ExplainMode::Explainer => "Tech Talker",
            ExplainMode::Timeline => "Tech Timeline",
        }
    }
}

/// Tone and length of a generated piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainParams {
    /// Playfulness on a 0–10 scale.
    pub engagement: u8,
    /// Target length, 200–800 words.
    pub length_words: u16,
    pub mode: ExplainMode,
}

impl Default for ExplainParams {
    fn default() -> Self {
        Self {
            engagement: 5,
            length_words: 500,
            mode: ExplainMode::Explainer,
        }
    }
}

impl ExplainParams {
    /// Build params, clamping out-of-range values.
    pub fn new(engagement: u8, length_words: u16, mode: ExplainMode) -> Self {
        Self {
            engagement: engagement.min(10),
            length_words: length_words.clamp(200, 800),
            mode,
        }
    }
}

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following text in 3-5 sentences. Keep it professional and informative.\n\n\
         Text:\n{text}\n\n\
         Instructions:\n\
         1. Focus on the main points and key information\n\
         2. Use clear and concise language\n\
         3. Maintain the original meaning\n\
         4. Include relevant technical terms and their simple explanations\n\
         5. Format the summary in markdown\n"
    )
}

pub fn explain_prompt(topic: &str, context: &str, params: &ExplainParams) -> String {
    let context = if context.trim().is_empty() {
        "No source material available."
    } else {
        context
    };
    let ExplainParams {
        engagement,
        length_words,
        mode,
    } = params;
    match mode {
        ExplainMode::Explainer => format!(
            "You are a knowledgeable tech news expert writing a detailed explainer about \"{topic}\" \
             based on the source material below.\n\n\
             Instructions:\n\
             1. Cover the major announcements, developments and key details.\n\
             2. Name the important companies and people and their roles.\n\
             3. Give enough background that the reader understands why the topic matters.\n\
             4. Explain technical terms simply.\n\
             5. Use a tone that is {engagement}/10 on a fun, playful scale.\n\
             6. Write about {length_words} words.\n\
             7. Respond in markdown with headings and bullet points.\n\
             8. Relate the topic to current trends in technology.\n\
             9. Link to the sources for further reading where available.\n\n\
             Source material:\n{context}\n"
        ),
        ExplainMode::Timeline => format!(
            "You are a tech historian. Using the source material below, write a clear timeline of \"{topic}\" with:\n\
             - Key historical events or milestones\n\
             - Recent updates or changes\n\
             - Reasonable predictions about where it is going\n\
             - Major achievements or products of each company mentioned\n\n\
             Format it in markdown with an approximate date and a short summary per event. \
             Use a tone that is {engagement}/10 on a fun, playful scale and write about {length_words} words. \
             Link to the sources for further reading where available.\n\n\
             Source material:\n{context}\n"
        ),
    }
}

/// Summarize `text` through any [`AskAsync`] backend.
pub async fn summarize_with<A>(backend: &A, text: &str, max_input_chars: usize) -> Result<String, SummarizeError>
where
    A: AskAsync<Response = String>,
{
    let text = text.trim();
    if text.is_empty() {
        return Err(SummarizeError::EmptyInput);
    }
    let prompt = summary_prompt(clip(text, max_input_chars));
    let out = backend
        .ask(&prompt)
        .await
        .map_err(|e| SummarizeError::Backend(e.to_string()))?;
    Ok(out.trim().to_string())
}

/// Write an explainer or timeline through any [`AskAsync`] backend.
pub async fn explain_with<A>(
    backend: &A,
    topic: &str,
    context: &str,
    params: &ExplainParams,
    max_input_chars: usize,
) -> Result<String, SummarizeError>
where
    A: AskAsync<Response = String>,
{
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(SummarizeError::EmptyInput);
    }
    let prompt = explain_prompt(topic, clip(context, max_input_chars), params);
    let out = backend
        .ask(&prompt)
        .await
        .map_err(|e| SummarizeError::Backend(e.to_string()))?;
    Ok(out.trim().to_string())
}

/// Production language-model backend.
#[derive(Debug)]
pub enum Llm {
    Awful {
        client: RetryAsk<AwfulAsk>,
        max_input_chars: usize,
    },
    /// No model configured; every call fails with [`SummarizeError::Unavailable`].
    Unavailable,
}

impl Llm {
    /// Load the `awful_aj` config and template.
    ///
    /// Any failure is logged and yields [`Llm::Unavailable`], so fetching and
    /// bookmarking keep working without a model.
    #[instrument(level = "info", skip_all, fields(template = %config.template))]
    pub async fn load(config: &LlmConfig) -> Self {
        if !config.enabled {
            info!("Language model disabled by configuration");
            return Llm::Unavailable;
        }
        match Self::load_awful(config).await {
            Ok(client) => {
                info!("Loaded language model backend");
                Llm::Awful {
                    client: RetryAsk::new(client, config.max_retries, config.base_delay()),
                    max_input_chars: config.max_input_chars,
                }
            }
            Err(e) => {
                warn!(error = %e, "Language model unavailable; summaries will show a placeholder");
                Llm::Unavailable
            }
        }
    }

    async fn load_awful(config: &LlmConfig) -> Result<AwfulAsk, Box<dyn Error>> {
        let template = template::load_template(&config.template).await?;
        let conf_file = config_dir()?.join("config.yaml");
        let config_path = conf_file
            .to_str()
            .ok_or("awful_aj config path is not valid UTF-8")?;
        let config = awful_aj::config::load_config(config_path)?;
        Ok(AwfulAsk { config, template })
    }
}

impl Summarizer for Llm {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        match self {
            Llm::Awful {
                client,
                max_input_chars,
            } => summarize_with(client, text, *max_input_chars).await,
            Llm::Unavailable => Err(SummarizeError::Unavailable),
        }
    }
}

impl Explainer for Llm {
    async fn explain(&self, topic: &str, context: &str, params: &ExplainParams) -> Result<String, SummarizeError> {
        match self {
            Llm::Awful {
                client,
                max_input_chars,
            } => explain_with(client, topic, context, params, *max_input_chars).await,
            Llm::Unavailable => Err(SummarizeError::Unavailable),
        }
    }
}
