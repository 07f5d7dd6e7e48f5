//! Helpers shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use stumble_core::{
    Bot, BoxedBot, CommandContext, CommandData, Extension, ExtensionManager, SendResult, User,
};

/// A bot that records every private message it sends.
#[derive(Default)]
pub struct RecordingBot {
    sent: Mutex<Vec<(u32, String)>>,
}

impl RecordingBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(u32, String)> {
        self.sent.lock().clone()
    }

    /// Texts sent, without sessions.
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    fn id(&self) -> &str {
        "recording"
    }

    async fn send_to_user(&self, session: u32, text: &str) -> SendResult<()> {
        self.sent.lock().push((session, text.to_string()));
        Ok(())
    }

    async fn send_to_channel(&self, _channel_id: u32, _text: &str) -> SendResult<()> {
        Ok(())
    }
}

/// Registers and starts `extensions` with the given settings.
pub async fn started(
    extensions: Vec<Extension>,
    settings: HashMap<String, Value>,
) -> Arc<ExtensionManager> {
    let manager = Arc::new(ExtensionManager::new(settings));
    manager.use_extensions(extensions).await.unwrap();
    manager.start_all().await;
    manager
}

pub fn context(
    manager: &Arc<ExtensionManager>,
    bot: &Arc<RecordingBot>,
    user: User,
    handle: &str,
    message: &str,
) -> Arc<CommandContext> {
    let bot: BoxedBot = bot.clone();
    Arc::new(CommandContext::new(
        CommandData::new(handle, user, message),
        bot,
        Arc::clone(manager),
    ))
}
