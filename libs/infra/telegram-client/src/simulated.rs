// [libs/infra/telegram-client/src/simulated.rs]
//! In-memory `TelegramClient` used by pipeline tests and local
//! development without live Telegram credentials. Seeded with fixed
//! entities and message backlogs; `inject_flood_wait` lets a test force
//! the flood-wait path the Governor is expected to react to.

use crate::client::{DownloadChunk, DownloadRequest, ForwardRequest, HistoryPage, RemoteMessage, ResolvedEntity, SendRequest, TelegramClient};
use crate::errors::ClientError;
use async_trait::async_trait;
use parking_lot::Mutex;
use spectra_credentials::AccountHandle;
use spectra_domain_models::EntityKind;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Default)]
struct State {
    entities: HashMap<String, ResolvedEntity>,
    backlogs: HashMap<i64, Vec<RemoteMessage>>,
    topics: HashMap<i64, Vec<i64>>,
    forced_flood_wait: Option<Duration>,
    sent: Vec<SendRequest>,
    forwarded: Vec<ForwardRequest>,
    joined: Vec<i64>,
}

pub struct SimulatedTelegramClient {
    state: Mutex<State>,
}

impl SimulatedTelegramClient {
    pub fn new() -> Self {
        SimulatedTelegramClient { state: Mutex::new(State::default()) }
    }

    pub fn seed_entity(&self, reference: &str, entity: ResolvedEntity) {
        self.state.lock().entities.insert(reference.to_string(), entity);
    }

    pub fn seed_backlog(&self, entity_id: i64, messages: Vec<RemoteMessage>) {
        self.state.lock().backlogs.insert(entity_id, messages);
    }

    pub fn seed_topics(&self, entity_id: i64, topic_ids: Vec<i64>) {
        self.state.lock().topics.insert(entity_id, topic_ids);
    }

    /// Forces the next Telegram-facing call to return `FloodWait(delay)`
    /// exactly once, then clears itself.
    pub fn inject_flood_wait(&self, delay: Duration) {
        self.state.lock().forced_flood_wait = Some(delay);
    }

    pub fn sent_messages(&self) -> Vec<SendRequest> {
        self.state.lock().sent.clone()
    }

    pub fn forwarded_requests(&self) -> Vec<ForwardRequest> {
        self.state.lock().forwarded.clone()
    }

    fn take_forced_flood_wait(&self) -> Option<Duration> {
        self.state.lock().forced_flood_wait.take()
    }
}

impl Default for SimulatedTelegramClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelegramClient for SimulatedTelegramClient {
    async fn resolve_entity(&self, _account: &AccountHandle, reference: &str) -> Result<ResolvedEntity, ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        self.state.lock().entities.get(reference).cloned().ok_or(ClientError::EntityAccess)
    }

    async fn history_page(&self, _account: &AccountHandle, entity: &ResolvedEntity, page: HistoryPage) -> Result<Vec<RemoteMessage>, ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        let state = self.state.lock();
        let key = page.topic_id.unwrap_or(entity.entity_id);
        let Some(backlog) = state.backlogs.get(&key).or_else(|| state.backlogs.get(&entity.entity_id)) else { return Ok(Vec::new()) };
        let mut ordered: Vec<RemoteMessage> = backlog
            .iter()
            .filter(|m| page.after_message_id.map(|after| m.message_id > after).unwrap_or(true))
            .cloned()
            .collect();
        ordered.sort_by_key(|m| m.message_id);
        ordered.truncate(page.limit as usize);
        Ok(ordered)
    }

    async fn list_topics(&self, _account: &AccountHandle, entity: &ResolvedEntity) -> Result<Vec<i64>, ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        Ok(self.state.lock().topics.get(&entity.entity_id).cloned().unwrap_or_default())
    }

    async fn forward(&self, _account: &AccountHandle, request: ForwardRequest) -> Result<(), ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        self.state.lock().forwarded.push(request);
        Ok(())
    }

    async fn send(&self, _account: &AccountHandle, request: SendRequest) -> Result<(), ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        self.state.lock().sent.push(request);
        Ok(())
    }

    async fn download_chunk(&self, _account: &AccountHandle, _request: &DownloadRequest, _offset: u64) -> Result<DownloadChunk, ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        Ok(DownloadChunk { bytes: vec![0u8; 1024], is_final: true })
    }

    async fn join(&self, _account: &AccountHandle, entity: &ResolvedEntity) -> Result<(), ClientError> {
        if let Some(delay) = self.take_forced_flood_wait() {
            return Err(ClientError::FloodWait(delay));
        }
        self.state.lock().joined.push(entity.entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::MessageKind;

    fn account() -> AccountHandle {
        AccountHandle { account_id: 1, session_name: "acct-1".into() }
    }

    #[tokio::test]
    async fn resolves_seeded_entity() {
        let client = SimulatedTelegramClient::new();
        client.seed_entity("@channel", ResolvedEntity { entity_id: 42, access_hash: 7, title: "Channel".into(), kind: EntityKind::Channel });
        let resolved = client.resolve_entity(&account(), "@channel").await.unwrap();
        assert_eq!(resolved.entity_id, 42);
    }

    #[tokio::test]
    async fn unknown_reference_is_entity_access_error() {
        let client = SimulatedTelegramClient::new();
        assert!(matches!(client.resolve_entity(&account(), "@missing").await, Err(ClientError::EntityAccess)));
    }

    #[tokio::test]
    async fn injected_flood_wait_fires_once() {
        let client = SimulatedTelegramClient::new();
        client.seed_entity("@channel", ResolvedEntity { entity_id: 42, access_hash: 7, title: "Channel".into(), kind: EntityKind::Channel });
        client.inject_flood_wait(Duration::from_secs(30));

        assert!(matches!(client.resolve_entity(&account(), "@channel").await, Err(ClientError::FloodWait(_))));
        assert!(client.resolve_entity(&account(), "@channel").await.is_ok());
    }

    #[tokio::test]
    async fn history_page_respects_after_and_limit_ascending() {
        let client = SimulatedTelegramClient::new();
        let entity = ResolvedEntity { entity_id: 1, access_hash: 1, title: "C".into(), kind: EntityKind::Channel };
        client.seed_backlog(
            1,
            (1..=5)
                .rev()
                .map(|id| RemoteMessage { message_id: id, sender_id: None, kind: MessageKind::Text, date: chrono::Utc::now(), edit_date: None, text: None, reply_to: None, media: None, caption_entities: Vec::new() })
                .collect(),
        );
        let page = client.history_page(&account(), &entity, HistoryPage { after_message_id: Some(1), limit: 2, topic_id: None }).await.unwrap();
        assert_eq!(page.iter().map(|m| m.message_id).collect::<Vec<_>>(), vec![2, 3]);
    }
}
