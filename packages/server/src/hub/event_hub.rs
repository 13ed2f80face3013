use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{EventType, SseEvent};
use engine::{CodeBuilder, WorkerPool};

use crate::config::HubConfig;
use crate::store::{Store, StoreError};

use super::room_hub::RoomHub;

/// Process-wide registry of room hubs, plus the aggregate cross-room
/// fan-out used for event-level guild leaderboards.
///
/// The hub owns the room hubs; each room hub only borrows the send end of
/// the guild update channel, so there is no cyclic ownership.
pub struct EventHub {
    rooms: RwLock<HashMap<Uuid, Arc<RoomHub>>>,
    event_listeners: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::Sender<SseEvent>>>>,
    guild_updates: mpsc::Sender<Uuid>,
    store: Arc<dyn Store>,
    builder: Arc<CodeBuilder>,
    pool: Arc<WorkerPool>,
    config: HubConfig,
}

/// Removes an event-level listener registration when its subscriber goes
/// away.
pub struct EventListenerGuard {
    hub: Arc<EventHub>,
    event_id: Uuid,
    listener_id: Uuid,
}

impl Drop for EventListenerGuard {
    fn drop(&mut self) {
        self.hub.remove_event_listener(self.event_id, self.listener_id);
    }
}

impl EventHub {
    /// Creates the hub and spawns the background guild leaderboard loop.
    pub fn new(
        store: Arc<dyn Store>,
        builder: Arc<CodeBuilder>,
        pool: Arc<WorkerPool>,
        config: HubConfig,
    ) -> Arc<Self> {
        let (guild_tx, guild_rx) = mpsc::channel(config.guild_update_capacity);

        let hub = Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            event_listeners: RwLock::new(HashMap::new()),
            guild_updates: guild_tx,
            store,
            builder,
            pool,
            config,
        });

        tokio::spawn(hub.clone().guild_loop(guild_rx));

        hub
    }

    /// Instantiates a room hub, registers it, and spawns its loop. The
    /// registry entry is pruned when the loop exits.
    pub fn create_room(self: &Arc<Self>, event_id: Uuid, room_id: Uuid) -> Arc<RoomHub> {
        let (room, events_rx) = RoomHub::new(
            event_id,
            room_id,
            self.store.clone(),
            self.builder.clone(),
            self.pool.clone(),
            self.guild_updates.clone(),
            &self.config,
        );

        self.rooms.write().unwrap().insert(room_id, room.clone());

        let registry = self.clone();
        let room_loop = room.clone();
        tokio::spawn(async move {
            room_loop.run(events_rx).await;
            registry.rooms.write().unwrap().remove(&room_id);
        });

        room
    }

    pub fn room(&self, room_id: Uuid) -> Option<Arc<RoomHub>> {
        self.rooms.read().unwrap().get(&room_id).cloned()
    }

    /// Registers hubs for every persisted room. Called once at startup so
    /// a restarted instance serves its rooms again.
    pub async fn restore_rooms(self: &Arc<Self>) -> Result<usize, StoreError> {
        let mut count = 0;
        for event in self.store.get_events(1000, 0).await? {
            for room in self.store.get_rooms_by_event(event.id).await? {
                self.create_room(event.id, room.id);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Registers a buffered delivery channel for an event-level listener
    /// (guild leaderboard spectator).
    pub fn subscribe_event(
        self: &Arc<Self>,
        event_id: Uuid,
        listener_id: Uuid,
    ) -> (mpsc::Receiver<SseEvent>, EventListenerGuard) {
        let (tx, rx) = mpsc::channel(self.config.listener_buffer);
        self.event_listeners
            .write()
            .unwrap()
            .entry(event_id)
            .or_default()
            .insert(listener_id, tx);
        (
            rx,
            EventListenerGuard {
                hub: self.clone(),
                event_id,
                listener_id,
            },
        )
    }

    pub fn remove_event_listener(&self, event_id: Uuid, listener_id: Uuid) {
        let mut listeners = self.event_listeners.write().unwrap();
        if let Some(map) = listeners.get_mut(&event_id) {
            map.remove(&listener_id);
            if map.is_empty() {
                listeners.remove(&event_id);
            }
        }
    }

    /// Asks the guild loop for a fresh leaderboard push. Non-blocking; a
    /// full channel means a refresh is already on its way.
    pub fn request_guild_refresh(&self, event_id: Uuid) {
        let _ = self.guild_updates.try_send(event_id);
    }

    /// Consumes guild update notifications for the process lifetime:
    /// fetches the current guild leaderboard and fans it out to every
    /// listener of that event.
    async fn guild_loop(self: Arc<Self>, mut updates: mpsc::Receiver<Uuid>) {
        info!("Guild leaderboard loop started");

        while let Some(event_id) = updates.recv().await {
            debug!(%event_id, "Guild leaderboard refresh requested");

            let fetch = tokio::time::timeout(
                self.config.query_timeout(),
                self.store.get_guild_leaderboard_by_event(event_id),
            )
            .await;

            let entries = match fetch {
                Ok(Ok(entries)) => entries,
                Ok(Err(err)) => {
                    error!(%event_id, error = %err, "Failed to get guild leaderboard for event");
                    continue;
                }
                Err(_) => {
                    error!(%event_id, "Guild leaderboard query timed out");
                    continue;
                }
            };

            let data = match serde_json::to_value(&entries) {
                Ok(data) => data,
                Err(err) => {
                    error!(%event_id, error = %err, "Failed to encode guild leaderboard");
                    continue;
                }
            };

            self.dispatch_to_event(event_id, SseEvent::new(EventType::GuildLeaderboardUpdated, data));
        }
    }

    fn dispatch_to_event(&self, event_id: Uuid, event: SseEvent) {
        let listeners: Vec<(Uuid, mpsc::Sender<SseEvent>)> = {
            let guard = self.event_listeners.read().unwrap();
            match guard.get(&event_id) {
                Some(map) => map.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => {
                    debug!(%event_id, "No event listeners for guild update");
                    return;
                }
            }
        };

        debug!(%event_id, listeners = listeners.len(), "Dispatching guild leaderboard update");

        for (listener_id, tx) in listeners {
            if tx.try_send(event.clone()).is_err() {
                warn!(
                    %event_id,
                    %listener_id,
                    "Failed to send guild update to listener, channel full or closed"
                );
            }
        }
    }
}
