//! Integration tests for the orchestrator state machine, driven through the
//! same entry points the dispatcher uses, against a recording transport, a
//! scripted provider, and an in-memory store.

mod common;

use common::{Op, RecordingTransport, ScriptedProvider};
use relay_bot::{Orchestrator, TextExporter, TranscriptExporter};
use relay_core::{CallbackAction, ChatRef, ContentKind, Incoming, Role};
use relay_delivery::DeliveryEngine;
use relay_storage::{ChatStore, NewMessage};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    transport: Arc<RecordingTransport>,
    provider: Arc<ScriptedProvider>,
    store: ChatStore,
    orchestrator: Orchestrator,
    _export_dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let transport = Arc::new(RecordingTransport::new());
    let engine =
        Arc::new(DeliveryEngine::new(transport.clone()).with_send_spacing(Duration::from_millis(0)));
    let store = ChatStore::new("sqlite::memory:").await.expect("store");
    let provider = Arc::new(ScriptedProvider::new());
    let export_dir = tempfile::tempdir().unwrap();
    let exporters: Vec<Arc<dyn TranscriptExporter>> =
        vec![Arc::new(TextExporter::new(export_dir.path()))];
    let orchestrator = Orchestrator::new(
        transport.clone(),
        engine,
        store.clone(),
        provider.clone(),
        exporters,
        None,
    );
    Fixture {
        transport,
        provider,
        store,
        orchestrator,
        _export_dir: export_dir,
    }
}

const USER: i64 = 1;

fn incoming(message_id: &str, text: &str) -> Incoming {
    Incoming {
        message_id: message_id.to_string(),
        user_id: USER,
        chat: ChatRef::new(500),
        text: text.to_string(),
    }
}

fn action(message_id: &str, data: &str) -> CallbackAction {
    CallbackAction {
        callback_id: "cb".to_string(),
        user_id: USER,
        chat: ChatRef::new(500),
        message_id: message_id.to_string(),
        data: data.to_string(),
    }
}

/// **Test: free text without a selected model is redirected to the model menu
/// and never reaches the provider.**
#[tokio::test]
async fn test_text_without_model_redirects() {
    let f = fixture().await;
    f.orchestrator.handle_text(&incoming("10", "hi")).await.unwrap();

    assert_eq!(f.provider.request_count(), 0);
    assert!(f
        .transport
        .menu_texts()
        .iter()
        .any(|t| t.contains("Please select a model first")));
}

/// **Test: free text with a model but no active chat is redirected to the
/// chat options menu.**
#[tokio::test]
async fn test_text_without_active_chat_redirects() {
    let f = fixture().await;
    f.store
        .update_user_model(USER, "deepseek", "deepseek-v3")
        .await
        .unwrap();

    f.orchestrator.handle_text(&incoming("10", "hi")).await.unwrap();

    assert_eq!(f.provider.request_count(), 0);
    assert!(f
        .transport
        .menu_texts()
        .iter()
        .any(|t| t.contains("start a new chat or select an existing one")));
}

/// **Test: the full flow (select a version, create a chat, send text) sends
/// a placeholder, streams into it, and persists both sides of the exchange.**
#[tokio::test]
async fn test_full_conversation_flow() {
    let f = fixture().await;

    f.orchestrator
        .handle_callback(&action("20", "select_version:deepseek:deepseek-v3"))
        .await
        .unwrap();
    f.orchestrator
        .handle_callback(&action("20", "new_chat"))
        .await
        .unwrap();

    f.provider.script(&["Hello ", "world"]);
    f.orchestrator
        .handle_text(&incoming("30", "hi there"))
        .await
        .unwrap();

    // placeholder replied to the user's message, then edited with the answer
    assert!(f.transport.ops().contains(&Op::Reply {
        reply_to: "30".to_string(),
        text: "🤔 Thinking...".to_string()
    }));
    assert_eq!(f.transport.edits_of("100"), vec!["Hello world"]);

    let request = f.provider.requests.lock().unwrap().pop().unwrap();
    assert_eq!(request.version, "deepseek-v3");
    assert_eq!(request.content, "hi there");
    assert!(request.history.is_empty());

    let chats = f.store.get_user_chats(USER).await.unwrap();
    let history = f.store.get_chat_history(chats[0].chat_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Hello world");
    assert_eq!(history[1].transport_message_id.as_deref(), Some("100"));
}

/// **Test: a 150-character title is rejected before any store mutation; a
/// valid retry succeeds and returns to the chat list.**
#[tokio::test]
async fn test_rename_title_cap() {
    let f = fixture().await;
    let chat_id = f
        .store
        .create_chat(USER, "Original", "deepseek", "deepseek-v3")
        .await
        .unwrap();

    f.orchestrator
        .handle_callback(&action("20", &format!("rename_chat:{}", chat_id)))
        .await
        .unwrap();

    let long_title = "x".repeat(150);
    f.orchestrator
        .handle_text(&incoming("21", &long_title))
        .await
        .unwrap();

    assert!(f
        .transport
        .sends()
        .iter()
        .any(|t| t.contains("Title too long")));
    let info = f.store.get_chat_info(chat_id).await.unwrap().unwrap();
    assert_eq!(info.title, "Original");

    f.orchestrator
        .handle_text(&incoming("22", "Fresh title"))
        .await
        .unwrap();
    let info = f.store.get_chat_info(chat_id).await.unwrap().unwrap();
    assert_eq!(info.title, "Fresh title");
    assert!(f
        .transport
        .menu_texts()
        .iter()
        .any(|t| t.contains("renamed successfully")));
}

/// **Test: parameter increments step by the configured amount, persist, and
/// clamp at the configured maximum.**
#[tokio::test]
async fn test_param_adjust_steps_and_clamps() {
    let f = fixture().await;
    f.store
        .update_user_model(USER, "gemini", "gemini-1.5-pro-002")
        .await
        .unwrap();

    f.orchestrator
        .handle_callback(&action("20", "inc_temperature"))
        .await
        .unwrap();
    let settings = f.store.get_user_settings(USER).await.unwrap();
    assert_eq!(settings.params.get("temperature"), Some(0.8));
    assert!(f
        .transport
        .answers()
        .iter()
        .any(|(text, _)| text.as_deref() == Some("Temperature updated to 0.8")));

    // 0.8 → 2.0 takes 12 steps; extra increments must not exceed the max
    for _ in 0..15 {
        f.orchestrator
            .handle_callback(&action("20", "inc_temperature"))
            .await
            .unwrap();
    }
    let settings = f.store.get_user_settings(USER).await.unwrap();
    assert_eq!(settings.params.get("temperature"), Some(2.0));
}

/// **Test: an unknown parameter name is answered as invalid.**
#[tokio::test]
async fn test_adjust_unknown_param_rejected() {
    let f = fixture().await;
    f.orchestrator
        .handle_callback(&action("20", "inc_presence_penalty"))
        .await
        .unwrap();
    assert!(f
        .transport
        .answers()
        .iter()
        .any(|(text, alert)| *alert && text.as_deref().unwrap_or("").contains("Invalid parameter")));
}

/// **Test: regenerating a media message whose file no longer exists surfaces
/// "file not found" and never calls the model.**
#[tokio::test]
async fn test_regenerate_missing_media_file() {
    let f = fixture().await;
    f.store
        .update_user_model(USER, "gemini", "gemini-1.5-pro-002")
        .await
        .unwrap();
    let chat_id = f
        .store
        .create_chat(USER, "t", "gemini", "gemini-1.5-pro-002")
        .await
        .unwrap();

    let mut photo = NewMessage::text(chat_id, Role::User, "what is this?");
    photo.kind = ContentKind::Image;
    photo.file_path = Some("temp/definitely_missing.jpg".to_string());
    photo.transport_message_id = Some("40".to_string());
    f.store.add_message(photo).await.unwrap();
    f.store
        .add_message(
            NewMessage::text(chat_id, Role::Assistant, "a cat").with_transport_id("41"),
        )
        .await
        .unwrap();

    f.orchestrator
        .handle_callback(&action("20", &format!("select_chat:{}", chat_id)))
        .await
        .unwrap();
    f.orchestrator
        .handle_callback(&action("41", "regenerate:41"))
        .await
        .unwrap();

    assert!(f
        .transport
        .answers()
        .iter()
        .any(|(text, alert)| *alert
            && text.as_deref() == Some("Original image file not found.")));
    assert_eq!(f.provider.request_count(), 0);
}

/// **Test: regeneration reuses the preceding user message, streams into the
/// same anchor, and excludes the regenerated response from history.**
#[tokio::test]
async fn test_regenerate_streams_into_same_anchor() {
    let f = fixture().await;
    f.store
        .update_user_model(USER, "deepseek", "deepseek-v3")
        .await
        .unwrap();
    let chat_id = f
        .store
        .create_chat(USER, "t", "deepseek", "deepseek-v3")
        .await
        .unwrap();
    f.store
        .add_message(NewMessage::text(chat_id, Role::User, "tell me a joke").with_transport_id("40"))
        .await
        .unwrap();
    f.store
        .add_message(NewMessage::text(chat_id, Role::Assistant, "old answer").with_transport_id("41"))
        .await
        .unwrap();

    f.orchestrator
        .handle_callback(&action("20", &format!("select_chat:{}", chat_id)))
        .await
        .unwrap();

    f.provider.script(&["a better joke"]);
    f.orchestrator
        .handle_callback(&action("41", "regenerate:41"))
        .await
        .unwrap();

    let edits = f.transport.edits_of("41");
    assert!(edits.contains(&"🔄 Regenerating response...".to_string()));
    assert_eq!(edits.last().unwrap(), "a better joke");

    let request = f.provider.requests.lock().unwrap().pop().unwrap();
    assert_eq!(request.content, "tell me a joke");
    assert_eq!(request.history.len(), 1);
    assert_eq!(request.history[0].content, "tell me a joke");

    let history = f.store.get_chat_history(chat_id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].content, "a better joke");
    assert_eq!(history[2].transport_message_id.as_deref(), Some("41"));
}

/// **Test: an undecodable callback payload is answered "Unknown action".**
#[tokio::test]
async fn test_unknown_callback_answers_alert() {
    let f = fixture().await;
    f.orchestrator
        .handle_callback(&action("20", "totally_bogus"))
        .await
        .unwrap();
    assert!(f
        .transport
        .answers()
        .iter()
        .any(|(text, alert)| *alert && text.as_deref() == Some("Unknown action")));
}

/// **Test: opening settings over a delivered response and navigating back
/// restores the prior rendering on the same anchor.**
#[tokio::test]
async fn test_settings_back_restores_response() {
    let f = fixture().await;
    f.orchestrator
        .handle_callback(&action("20", "select_version:deepseek:deepseek-v3"))
        .await
        .unwrap();
    f.orchestrator
        .handle_callback(&action("20", "new_chat"))
        .await
        .unwrap();

    f.provider.script(&["short answer"]);
    f.orchestrator
        .handle_text(&incoming("30", "question"))
        .await
        .unwrap();
    assert_eq!(f.transport.edits_of("100"), vec!["short answer"]);

    f.orchestrator
        .handle_callback(&action("100", "settings:advanced"))
        .await
        .unwrap();
    assert!(f
        .transport
        .menu_texts()
        .iter()
        .any(|t| t.contains("Advanced Settings")));

    f.orchestrator
        .handle_callback(&action("100", "back_to_message"))
        .await
        .unwrap();
    assert_eq!(
        f.transport.edits_of("100"),
        vec!["short answer", "short answer"]
    );
}

/// **Test: exporting a chat sends the transcript as a document and removes
/// the file afterwards.**
#[tokio::test]
async fn test_export_sends_document_and_cleans_up() {
    let f = fixture().await;
    let chat_id = f
        .store
        .create_chat(USER, "My Chat", "deepseek", "deepseek-v3")
        .await
        .unwrap();
    f.store
        .add_message(NewMessage::text(chat_id, Role::User, "hello"))
        .await
        .unwrap();

    f.orchestrator
        .handle_callback(&action("20", &format!("export_format:{}:txt", chat_id)))
        .await
        .unwrap();

    let document = f
        .transport
        .ops()
        .into_iter()
        .find_map(|op| match op {
            Op::Document { path, caption } => Some((path, caption)),
            _ => None,
        })
        .expect("document sent");
    assert!(document.1.contains("My Chat"));
    assert!(document.1.contains("Messages: 1"));
    // artifact deleted after dispatch
    assert!(!document.0.exists());
}
