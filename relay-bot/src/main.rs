//! Relay bot binary: loads config, builds the store/provider/delivery stack,
//! and dispatches Telegram messages and callback queries to the orchestrator.

use anyhow::Result;
use relay_bot::{
    BotConfig, MarkdownExporter, Orchestrator, TelegramCallbackWrapper, TelegramMessageWrapper,
    TextExporter, TranscriptExporter,
};
use relay_core::{TelegramTransport, Transport};
use relay_delivery::DeliveryEngine;
use relay_model::{ModelProvider, OpenAiCompatProvider};
use relay_storage::ChatStore;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env()?;
    relay_core::init_tracing(&config.log_file)?;
    info!("🚀 Starting relay bot...");

    let bot = teloxide::Bot::new(config.bot_token.clone());
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));
    let engine = Arc::new(DeliveryEngine::new(transport.clone()));

    let store = ChatStore::new(&config.database_url).await?;

    let provider: Arc<dyn ModelProvider> = Arc::new(match &config.model_base_url {
        Some(base_url) => {
            OpenAiCompatProvider::with_base_url(config.model_api_key.clone(), base_url.clone())
        }
        None => OpenAiCompatProvider::new(config.model_api_key.clone()),
    });

    let exporters: Vec<Arc<dyn TranscriptExporter>> = vec![
        Arc::new(TextExporter::new(config.export_dir.clone())),
        Arc::new(MarkdownExporter::new(config.export_dir.clone())),
    ];

    let orchestrator = Arc::new(Orchestrator::new(
        transport, engine, store, provider, exporters, None,
    ));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![orchestrator])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Message endpoint: converts to the core shape and hands off to the
/// orchestrator in a spawned task so a long stream never blocks the update
/// loop.
async fn on_message(
    msg: teloxide::types::Message,
    orchestrator: Arc<Orchestrator>,
) -> ResponseResult<()> {
    let Some(incoming) = TelegramMessageWrapper(&msg).to_incoming() else {
        return Ok(());
    };

    info!(
        user_id = incoming.user_id,
        chat_id = incoming.chat.id,
        "Received message"
    );

    tokio::spawn(async move {
        let result = match incoming.text.strip_prefix('/') {
            Some(command) => {
                let command = command.to_string();
                orchestrator.handle_command(&incoming, &command).await
            }
            None => orchestrator.handle_text(&incoming).await,
        };
        if let Err(e) = result {
            error!(error = %e, user_id = incoming.user_id, "Message handler failed");
        }
    });

    Ok(())
}

/// Callback endpoint: same shape for menu taps.
async fn on_callback(
    query: teloxide::types::CallbackQuery,
    orchestrator: Arc<Orchestrator>,
) -> ResponseResult<()> {
    let Some(action) = TelegramCallbackWrapper(&query).to_action() else {
        return Ok(());
    };

    info!(
        user_id = action.user_id,
        data = %action.data,
        "Received callback"
    );

    tokio::spawn(async move {
        if let Err(e) = orchestrator.handle_callback(&action).await {
            error!(error = %e, user_id = action.user_id, "Callback handler failed");
        }
    });

    Ok(())
}
