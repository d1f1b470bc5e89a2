/// Messenger — the client's orchestrator. Owns the summary cache, the open
/// conversation's transcript, and the two polling loops that keep both in
/// step with the backend:
///
///   - summary loop: refreshes the conversation summaries at a fixed
///     interval for the lifetime of the messenger, feeding the unread dots;
///   - conversation loop: while a conversation is open, re-fetches its
///     transcript at a fixed interval and replaces it wholesale when the
///     message count changes, advancing the read marker.
///
/// Shared structures are replaced wholesale, never incrementally mutated by
/// concurrent writers. A generation counter scopes conversation polls so a
/// result fetched for a closed view is never applied.
use crate::api::{resolve_messages, BackendApi, Contact, GroupRecord};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::read_marker::{MarkerKind, ReadMarkerStore};
use crate::storage::StoragePort;
use crate::summary::{SummaryCache, SummaryEntry};
use crate::transcript::Transcript;
use crate::types::{DeliveryStatus, Message, PartnerId};
use crate::unread::is_unread;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Messenger {
    viewer_id: String,
    config: Config,
    api: Arc<BackendApi>,
    direct_markers: Arc<ReadMarkerStore>,
    group_markers: Arc<ReadMarkerStore>,
    state: Arc<SharedState>,
}

struct SharedState {
    summaries: RwLock<SummaryCache>,
    transcript: RwLock<Option<Transcript>>,
    /// Bumped on every open/close; conversation polls carry the generation
    /// they were spawned under and drop their result if it moved on.
    generation: AtomicU64,
    shutdown: AtomicBool,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

enum SendPayload {
    Text(String),
    Image(String),
}

impl Messenger {
    pub fn new(config: Config, storage: Arc<dyn StoragePort>) -> Result<Self> {
        let viewer_id = config
            .viewer_id
            .clone()
            .ok_or_else(|| ClientError::Config("viewer id is required".to_string()))?;

        let api = Arc::new(BackendApi::new(&config.backend_url, config.request_timeout)?);
        let direct_markers = Arc::new(ReadMarkerStore::load(
            storage.clone(),
            MarkerKind::Direct,
            &viewer_id,
        ));
        let group_markers =
            Arc::new(ReadMarkerStore::load(storage, MarkerKind::Group, &viewer_id));

        info!("Messenger created for viewer {}", viewer_id);

        Ok(Self {
            viewer_id,
            config,
            api,
            direct_markers,
            group_markers,
            state: Arc::new(SharedState {
                summaries: RwLock::new(SummaryCache::default()),
                transcript: RwLock::new(None),
                generation: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
                poll_handle: Mutex::new(None),
            }),
        })
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    // ─── Summary synchronization ─────────────────────────────────────────────

    /// Spawn the background summary loop. Runs until shutdown.
    pub fn start(&self) -> JoinHandle<()> {
        let messenger = self.clone();
        tokio::spawn(async move { messenger.run_summary_loop().await })
    }

    async fn run_summary_loop(&self) {
        let mut tick = interval(self.config.summary_poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            if self.state.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.refresh_summaries().await {
                // Stale-but-available: keep the previous cache
                debug!("Summary refresh failed, keeping stale cache: {}", e);
            }
        }
        debug!("Summary loop stopped");
    }

    /// Fetch the viewer's conversations and replace the summary cache
    /// wholesale. On failure the previous cache is left untouched.
    pub async fn refresh_summaries(&self) -> Result<()> {
        let chats = self.api.list_chats(&self.viewer_id).await?;
        let groups = self.api.list_groups(&self.viewer_id).await?;
        let cache = SummaryCache::rebuild(&self.viewer_id, &chats, &groups);
        *self.state.summaries.write().await = cache;
        Ok(())
    }

    pub async fn summary_of(&self, partner: &PartnerId) -> Option<SummaryEntry> {
        self.state.summaries.read().await.get(partner).cloned()
    }

    /// Partners whose last message the viewer has not read yet
    pub async fn unread_partners(&self) -> Vec<PartnerId> {
        let cache = self.state.summaries.read().await;
        cache
            .partners()
            .filter(|(partner, entry)| {
                is_unread(entry, self.read_marker(partner), &self.viewer_id)
            })
            .map(|(partner, _)| partner.clone())
            .collect()
    }

    pub fn read_marker(&self, partner: &PartnerId) -> Option<DateTime<Utc>> {
        match partner {
            PartnerId::Direct(id) => self.direct_markers.get(id),
            PartnerId::Group(id) => self.group_markers.get(id),
        }
    }

    fn advance_read_marker(&self, partner: &PartnerId) {
        match partner {
            PartnerId::Direct(id) => self.direct_markers.set(id, Utc::now()),
            PartnerId::Group(id) => self.group_markers.set(id, Utc::now()),
        }
    }

    // ─── Rosters ─────────────────────────────────────────────────────────────

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        self.api.list_friends(&self.viewer_id).await
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>> {
        self.api.list_groups(&self.viewer_id).await
    }

    // ─── Opening and closing conversations ───────────────────────────────────

    /// Open a direct conversation: fetch it, mark it read now, make it the
    /// active transcript and start polling it.
    pub async fn open_direct(&self, other_user_id: &str) -> Result<()> {
        let chat = self.api.open_chat(&self.viewer_id, other_user_id).await?;
        self.direct_markers.set(other_user_id, Utc::now());

        let partner = PartnerId::Direct(other_user_id.to_string());
        let messages = resolve_messages(&chat.messages, chat.updated_at.as_deref());
        let transcript = Transcript::new(partner.clone(), chat.id, messages);

        let generation = self.set_active_transcript(transcript).await;
        self.spawn_conversation_poll(partner, generation);
        if let Err(e) = self.refresh_summaries().await {
            debug!("Summary refresh after open failed: {}", e);
        }
        Ok(())
    }

    /// Open a group conversation. The backend has no per-group fetch, so
    /// the group list is scanned for the target.
    pub async fn open_group(&self, group_id: &str) -> Result<()> {
        let groups = self.api.list_groups(&self.viewer_id).await?;
        let group = groups
            .into_iter()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ClientError::Backend(format!("unknown group {}", group_id)))?;
        self.group_markers.set(group_id, Utc::now());

        let partner = PartnerId::Group(group.id.clone());
        let messages = resolve_messages(&group.messages, group.updated_at.as_deref());
        let mut transcript = Transcript::new(partner.clone(), group.id.clone(), messages);
        transcript.admin_locked =
            group.admin_mode && !group.admins.iter().any(|a| a.id() == self.viewer_id);

        let generation = self.set_active_transcript(transcript).await;
        self.spawn_conversation_poll(partner, generation);
        if let Err(e) = self.refresh_summaries().await {
            debug!("Summary refresh after open failed: {}", e);
        }
        Ok(())
    }

    /// Install a transcript as the active conversation and invalidate any
    /// in-flight poll for the previous one. Returns the new generation.
    pub async fn set_active_transcript(&self, transcript: Transcript) -> u64 {
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.transcript.write().await = Some(transcript);
        generation
    }

    /// Tear down the active conversation. In-flight poll results for it
    /// will not be applied.
    pub async fn close_conversation(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.state.poll_handle.lock().ok().and_then(|mut g| g.take()) {
            handle.abort();
        }
        *self.state.transcript.write().await = None;
    }

    pub async fn active_transcript(&self) -> Option<(PartnerId, Vec<Message>)> {
        self.state
            .transcript
            .read()
            .await
            .as_ref()
            .map(|t| (t.partner.clone(), t.messages().to_vec()))
    }

    // ─── Conversation polling ────────────────────────────────────────────────

    fn spawn_conversation_poll(&self, partner: PartnerId, generation: u64) {
        let messenger = self.clone();
        let handle = tokio::spawn(async move {
            messenger.run_conversation_poll(partner, generation).await;
        });
        if let Ok(mut guard) = self.state.poll_handle.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    async fn run_conversation_poll(&self, partner: PartnerId, generation: u64) {
        let mut tick = interval(self.config.conversation_poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            if self.state.shutdown.load(Ordering::SeqCst)
                || self.state.generation.load(Ordering::SeqCst) != generation
            {
                break;
            }
            match self.fetch_transcript(&partner).await {
                Ok(Some(server)) => {
                    self.apply_poll(&partner, generation, server).await;
                }
                Ok(None) => debug!("Conversation {} no longer listed", partner),
                // A failed poll just waits for the next tick
                Err(e) => debug!("Conversation poll failed for {}: {}", partner, e),
            }
        }
        debug!("Conversation loop for {} stopped", partner);
    }

    async fn fetch_transcript(&self, partner: &PartnerId) -> Result<Option<Vec<Message>>> {
        match partner {
            PartnerId::Direct(other) => {
                let chat = self.api.open_chat(&self.viewer_id, other).await?;
                Ok(Some(resolve_messages(
                    &chat.messages,
                    chat.updated_at.as_deref(),
                )))
            }
            PartnerId::Group(group_id) => {
                let groups = self.api.list_groups(&self.viewer_id).await?;
                Ok(groups.into_iter().find(|g| g.id == *group_id).map(|g| {
                    resolve_messages(&g.messages, g.updated_at.as_deref())
                }))
            }
        }
    }

    /// Apply one poll result to the active transcript. Drops the result if
    /// the conversation was closed or swapped since the poll started. When
    /// the server transcript replaces the local one, the read marker
    /// advances to now and the summaries refresh so unread dots clear.
    /// Returns whether the transcript changed.
    pub async fn apply_poll(
        &self,
        partner: &PartnerId,
        generation: u64,
        server: Vec<Message>,
    ) -> bool {
        {
            let mut guard = self.state.transcript.write().await;
            if self.state.generation.load(Ordering::SeqCst) != generation {
                debug!("Dropping stale poll result for {}", partner);
                return false;
            }
            let Some(transcript) = guard.as_mut() else {
                return false;
            };
            if &transcript.partner != partner {
                return false;
            }
            if !transcript.reconcile(server) {
                return false;
            }
        }

        self.advance_read_marker(partner);
        if let Err(e) = self.refresh_summaries().await {
            debug!("Summary refresh after reconcile failed: {}", e);
        }
        true
    }

    // ─── Optimistic composition ──────────────────────────────────────────────

    /// Send a text message to the open conversation. The optimistic entry
    /// appears in the transcript before the network request is issued; its
    /// delivery state resolves asynchronously.
    pub async fn send_message(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Ok(());
        }
        let local = Message::local(&self.viewer_id, content, None);
        let (partner, conversation_id) = self.append_to_active(local.clone()).await?;
        self.dispatch_send(
            partner,
            conversation_id,
            local,
            SendPayload::Text(content.to_string()),
        );
        Ok(())
    }

    /// Send an image to the open conversation. The bytes are encoded as a
    /// data URL up front so the optimistic entry is renderable immediately,
    /// regardless of upload latency.
    pub async fn send_image(&self, bytes: &[u8], mime: &str) -> Result<()> {
        let data_url = format!("data:{};base64,{}", mime, BASE64.encode(bytes));
        let local = Message::local(&self.viewer_id, "[Image]", Some(data_url.clone()));
        let (partner, conversation_id) = self.append_to_active(local.clone()).await?;
        self.dispatch_send(partner, conversation_id, local, SendPayload::Image(data_url));
        Ok(())
    }

    async fn append_to_active(&self, local: Message) -> Result<(PartnerId, String)> {
        let mut guard = self.state.transcript.write().await;
        let Some(transcript) = guard.as_mut() else {
            return Err(ClientError::Backend("no open conversation".to_string()));
        };
        if transcript.admin_locked {
            return Err(ClientError::Backend(
                "group is admin-only; message not sent".to_string(),
            ));
        }
        transcript.append_local(local);
        Ok((transcript.partner.clone(), transcript.conversation_id.clone()))
    }

    fn dispatch_send(
        &self,
        partner: PartnerId,
        conversation_id: String,
        local: Message,
        payload: SendPayload,
    ) {
        let messenger = self.clone();
        tokio::spawn(async move {
            let result = match (&partner, &payload) {
                (PartnerId::Direct(_), SendPayload::Text(content)) => {
                    messenger
                        .api
                        .send_chat_message(&conversation_id, &messenger.viewer_id, content)
                        .await
                }
                (PartnerId::Direct(_), SendPayload::Image(data_url)) => {
                    messenger
                        .api
                        .send_chat_image(&conversation_id, &messenger.viewer_id, data_url)
                        .await
                }
                (PartnerId::Group(group_id), SendPayload::Text(content)) => {
                    messenger
                        .api
                        .send_group_message(group_id, &messenger.viewer_id, content)
                        .await
                }
                (PartnerId::Group(group_id), SendPayload::Image(data_url)) => {
                    messenger
                        .api
                        .send_group_image(group_id, &messenger.viewer_id, data_url)
                        .await
                }
            };

            let status = match result {
                Ok(()) => DeliveryStatus::Confirmed,
                Err(e) => {
                    warn!("Send failed for {}: {}", partner, e);
                    DeliveryStatus::Failed
                }
            };

            let mut guard = messenger.state.transcript.write().await;
            if let Some(transcript) = guard.as_mut() {
                if transcript.partner == partner
                    && !transcript.mark_delivery(local.local_id, status)
                    && status == DeliveryStatus::Failed
                {
                    // The optimistic entry was superseded by a server
                    // transcript before the failure came back; resurface it
                    // so the failure stays visible.
                    let mut copy = local;
                    copy.delivery = DeliveryStatus::Failed;
                    transcript.append_local(copy);
                }
            }
        });
    }

    // ─── Shutdown ────────────────────────────────────────────────────────────

    pub async fn shutdown(&self) {
        self.state.shutdown.store(true, Ordering::SeqCst);
        self.close_conversation().await;
        info!("Messenger for {} shut down", self.viewer_id);
    }
}
