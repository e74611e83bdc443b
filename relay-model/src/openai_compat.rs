//! OpenAI-compatible provider: maps a [`ModelRequest`] onto a streamed
//! chat-completions call. Any vendor exposing the OpenAI wire format (or a
//! gateway in front of one) can sit behind this via the base URL.

use crate::params::GenerationParams;
use crate::{HistoryMessage, ModelProvider, ModelRequest, ModelStream};
use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use relay_core::Role;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument};

#[derive(Clone)]
pub struct OpenAiCompatProvider {
    client: Arc<Client<OpenAIConfig>>,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Arc::new(Client::with_config(config)),
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Arc::new(Client::with_config(config)),
        }
    }
}

/// Converts one stored history message into the wire format.
fn history_to_message(msg: &HistoryMessage) -> Result<ChatCompletionRequestMessage> {
    let message: ChatCompletionRequestMessage = match msg.role {
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(msg.content.clone())
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(msg.content.clone())
            .build()?
            .into(),
    };
    Ok(message)
}

fn build_messages(request: &ModelRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(request.history.len() + 1);
    for msg in &request.history {
        messages.push(history_to_message(msg)?);
    }
    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(request.content.clone())
            .build()?
            .into(),
    );
    Ok(messages)
}

fn apply_params(builder: &mut CreateChatCompletionRequestArgs, params: &GenerationParams) {
    if let Some(temperature) = params.get("temperature") {
        builder.temperature(temperature as f32);
    }
    if let Some(top_p) = params.get("top_p") {
        builder.top_p(top_p as f32);
    }
    if let Some(max_tokens) = params.get("max_tokens") {
        builder.max_tokens(max_tokens as u32);
    }
    // top_k has no counterpart on the OpenAI wire format; ignored here
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    #[instrument(skip(self, request), fields(model = %request.model, version = %request.version))]
    async fn open_stream(&self, request: ModelRequest) -> Result<ModelStream> {
        let messages = build_messages(&request)?;
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(request.version.clone()).messages(messages);
        apply_params(&mut builder, &request.params);
        let api_request = builder.build()?;

        let mut stream = self.client.chat().create_stream(api_request).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(chunk) => {
                        if let Some(choice) = chunk.choices.first() {
                            if let Some(content) = &choice.delta.content {
                                if tx.send(content.clone()).is_err() {
                                    debug!("Stream consumer gone, stopping generation");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // No error channel at this boundary: render the failure
                        error!(error = %e, "Model stream failed mid-generation");
                        let _ = tx.send(format!("Error: {}", e));
                        break;
                    }
                }
            }
        });

        Ok(ModelStream::from_channel(rx, task))
    }
}
