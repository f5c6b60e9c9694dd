#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use conversation_service::models::UserProfile;
use conversation_service::repository::memory::MemoryStore;
use conversation_service::services::conversation_service::ConversationService;
use conversation_service::services::message_service::MessageService;
use conversation_service::Config;

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub conversations: ConversationService,
    pub messages: MessageService,
}

pub fn setup() -> TestEnv {
    setup_with_config(Config::default())
}

pub fn setup_with_config(config: Config) -> TestEnv {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("conversation_service=debug")
        .try_init();
    let store = Arc::new(MemoryStore::new());
    let messages = MessageService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        config.clone(),
    );
    let conversations =
        ConversationService::new(store.clone(), store.clone(), messages.clone(), config);
    TestEnv {
        store,
        conversations,
        messages,
    }
}

pub fn seed_user(env: &TestEnv, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    env.store
        .seed_user(UserProfile {
            id,
            name: name.to_string(),
            email: Some(email),
            role: "customer".to_string(),
            avatar: None,
        })
        .expect("seed user");
    id
}

pub fn metadata() -> serde_json::Map<String, serde_json::Value> {
    serde_json::Map::new()
}
