//! Text-generation capability: "given a system instruction and a user
//! prompt, produce text".
//!
//! The orchestrator only ever talks to a [`TextGenerator`]. The stock
//! implementation, [`ProviderTextGenerator`], adapts any
//! [`Provider`] and optionally consumes its streaming API, concatenating
//! every fragment before handing the text back.

use async_trait::async_trait;
use std::sync::Arc;
use stepwise_core::error::ProviderError;
use stepwise_core::provider::{Provider, ProviderRequest, Usage};
use tracing::{debug, trace};

/// Text produced by one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Token accounting, when the backend reports it.
    pub usage: Option<Usage>,
    /// Model that actually answered.
    pub model: Option<String>,
}

impl Generation {
    /// A bare text generation without usage information.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            model: None,
        }
    }
}

/// Anything that can turn a system instruction and a user prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError>;
}

/// A [`TextGenerator`] backed by an LLM [`Provider`].
pub struct ProviderTextGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    stream: bool,
}

impl ProviderTextGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Consume the provider's chunk stream instead of a single completion.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, system: &str, user: &str) -> ProviderRequest {
        let mut request = ProviderRequest::instructed(&self.model, system, user);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.stream = self.stream;
        request
    }

    async fn generate_streamed(&self, request: ProviderRequest) -> Result<Generation, ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut text = String::new();
        let mut usage = None;
        let mut fragments = 0usize;

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content {
                text.push_str(&content);
                fragments += 1;
            }
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        trace!(fragments, chars = text.len(), "stream concatenated");
        Ok(Generation {
            text,
            usage,
            model: Some(self.model.clone()),
        })
    }
}

#[async_trait]
impl TextGenerator for ProviderTextGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError> {
        let request = self.request(system, user);
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            stream = self.stream,
            "text generation request"
        );

        if self.stream {
            return self.generate_streamed(request).await;
        }

        let response = self.provider.complete(request).await?;
        Ok(Generation {
            text: response.message.content,
            usage: response.usage,
            model: Some(response.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use stepwise_core::message::{Message, Role};
    use stepwise_core::provider::{ChunkReceiver, ProviderResponse, StreamChunk};

    /// Streams a fixed list of fragments and records the last request.
    struct FragmentProvider {
        fragments: Vec<&'static str>,
        last_request: Mutex<Option<ProviderRequest>>,
    }

    impl FragmentProvider {
        fn new(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Provider for FragmentProvider {
        fn name(&self) -> &str {
            "fragments"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            Ok(ProviderResponse {
                message: Message::assistant(self.fragments.concat()),
                usage: Some(Usage {
                    prompt_tokens: 12,
                    completion_tokens: 4,
                    total_tokens: 16,
                }),
                model: "served-model".into(),
            })
        }

        async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
            *self.last_request.lock().unwrap() = Some(request);
            let (tx, rx) = tokio::sync::mpsc::channel(16);
            for fragment in &self.fragments {
                let _ = tx
                    .send(Ok(StreamChunk {
                        content: Some(fragment.to_string()),
                        done: false,
                        usage: None,
                    }))
                    .await;
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: Some(Usage {
                        prompt_tokens: 3,
                        completion_tokens: 2,
                        total_tokens: 5,
                    }),
                }))
                .await;
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn complete_path_returns_message_and_usage() {
        let provider = Arc::new(FragmentProvider::new(vec!["{\"a\":", "1}"]));
        let generator = ProviderTextGenerator::new(provider.clone(), "m").with_max_tokens(256);

        let generation = generator.generate("sys", "user").await.unwrap();
        assert_eq!(generation.text, "{\"a\":1}");
        assert_eq!(generation.usage.unwrap().total_tokens, 16);
        assert_eq!(generation.model.as_deref(), Some("served-model"));

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "sys");
        assert_eq!(request.messages[1].content, "user");
        assert_eq!(request.max_tokens, Some(256));
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn streaming_concatenates_every_fragment() {
        let provider = Arc::new(FragmentProvider::new(vec![
            "Sure: {\"goal\": \"g\", ",
            "\"steps\": [",
            "]}",
        ]));
        let generator = ProviderTextGenerator::new(provider.clone(), "m").with_streaming(true);

        let generation = generator.generate("sys", "user").await.unwrap();
        assert_eq!(generation.text, "Sure: {\"goal\": \"g\", \"steps\": []}");
        assert_eq!(generation.usage.unwrap().total_tokens, 5);
        assert!(provider.last_request.lock().unwrap().as_ref().unwrap().stream);
    }

    #[tokio::test]
    async fn stream_error_propagates() {
        struct Broken;

        #[async_trait]
        impl Provider for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
                unreachable!()
            }
            async fn stream(&self, _: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
                let (tx, rx) = tokio::sync::mpsc::channel(2);
                let _ = tx
                    .send(Ok(StreamChunk {
                        content: Some("{\"partial\"".into()),
                        done: false,
                        usage: None,
                    }))
                    .await;
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted("reset".into())))
                    .await;
                Ok(rx)
            }
        }

        let generator = ProviderTextGenerator::new(Arc::new(Broken), "m").with_streaming(true);
        let err = generator.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
    }
}
