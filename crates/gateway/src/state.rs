use {
    std::{collections::HashSet, sync::Arc},
    tandem_chat::ChatService,
    tandem_models::ModelRegistry,
    tandem_storage::Storage,
};

/// Shared application state: the chat service plus the set of bearer
/// tokens carrying the admin role.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub admin_tokens: Arc<HashSet<String>>,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            admin_tokens: Arc::new(HashSet::new()),
        }
    }

    pub fn with_admin_tokens(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
        self.admin_tokens = Arc::new(tokens.into_iter().collect());
        self
    }

    pub fn storage(&self) -> &Storage {
        self.chat.storage()
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.chat.registry()
    }
}
