use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use news_core::{DeliveryError, Listener, NewsEvent, PageOptions, SubscribeOptions, SubscriptionId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::AppState;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Pushes tracker events to one socket's outbound queue.
struct SocketListener {
    tx: mpsc::Sender<ServerMessage>,
}

#[async_trait]
impl Listener for SocketListener {
    async fn deliver(&self, event: &NewsEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(ServerMessage::News(event.clone()))
            .await
            .map_err(|_| DeliveryError("socket closed".into()))
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
    info!(connection, "client connected");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(state, tx);
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(connection, error = %err, "socket read failed");
                break;
            }
        }
    }

    session.close().await;
    writer.abort();
    info!(connection, "client disconnected");
}

/// Per-connection state: the subscriptions this socket owns.
struct Session {
    state: AppState,
    tx: mpsc::Sender<ServerMessage>,
    subscriptions: Vec<(String, SubscriptionId)>,
}

impl Session {
    fn new(state: AppState, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            state,
            tx,
            subscriptions: Vec::new(),
        }
    }

    async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(err) => self.reply(ServerMessage::error(format!("malformed message: {err}"))).await,
        }
    }

    async fn handle(&mut self, message: ClientMessage) {
        let reply = match message {
            ClientMessage::Subscribe {
                keyword,
                interval,
                display,
            } => self.subscribe(keyword, interval, display).await,
            ClientMessage::Unsubscribe {
                keyword,
                subscription_id,
            } => self.unsubscribe(keyword, subscription_id).await,
            ClientMessage::GetCachedNews { keyword } => {
                let news = self.state.registry.cache(&keyword).await;
                ServerMessage::CachedNews {
                    keyword,
                    count: news.len(),
                    news,
                }
            }
            ClientMessage::GetAllCache => ServerMessage::AllCache(self.state.registry.all_cache().await),
            ClientMessage::GetStatus => ServerMessage::Status(self.state.registry.status().await),
            ClientMessage::GetNewsPage {
                keyword,
                page,
                display,
                sort,
            } => {
                let options = PageOptions {
                    page_size: display,
                    sort,
                };
                match self.state.registry.page(&keyword, page, options).await {
                    Ok(result) => ServerMessage::NewsPage(result),
                    Err(err) => ServerMessage::error(err.to_string()),
                }
            }
        };
        self.reply(reply).await;
    }

    async fn subscribe(&mut self, keyword: String, interval: Option<String>, display: Option<u32>) -> ServerMessage {
        let listener: Arc<dyn Listener> = Arc::new(SocketListener { tx: self.tx.clone() });
        let options = SubscribeOptions {
            interval,
            page_size: display,
            sort: None,
        };
        match self.state.registry.subscribe(&keyword, listener, options).await {
            Ok(id) => {
                self.subscriptions.push((keyword.clone(), id));
                ServerMessage::Subscribed {
                    message: format!("subscribed to {keyword}"),
                    keyword,
                    subscription_id: id,
                }
            }
            Err(err) => ServerMessage::error(err.to_string()),
        }
    }

    /// Drops the named subscription, or every subscription of this socket for `keyword`.
    async fn unsubscribe(&mut self, keyword: String, id: Option<SubscriptionId>) -> ServerMessage {
        let (released, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.subscriptions)
            .into_iter()
            .partition(|(k, sub)| match id {
                Some(id) => *sub == id,
                None => *k == keyword,
            });
        self.subscriptions = kept;
        for (_, sub) in released {
            self.state.registry.unsubscribe(sub).await;
        }
        ServerMessage::Unsubscribed {
            message: format!("unsubscribed from {keyword}"),
            keyword,
        }
    }

    async fn reply(&self, message: ServerMessage) {
        if self.tx.send(message).await.is_err() {
            debug!("reply dropped, socket writer gone");
        }
    }

    async fn close(&mut self) {
        for (keyword, id) in self.subscriptions.drain(..) {
            debug!(keyword = %keyword, subscription = %id, "releasing subscription");
            self.state.registry.unsubscribe(id).await;
        }
    }
}
