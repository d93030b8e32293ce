//! Realtime client speaking Phoenix v1 JSON frames.
//!
//! One websocket carries every channel. A background task owns the socket,
//! sends heartbeats and routes inserts to subscribers by topic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::channel::{mpsc as events, oneshot};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use labmatch_common::backend::BackendError;
use labmatch_common::realtime::{InsertEvent, InsertFilter, RealtimeFeed, Subscription};

use crate::config::GatewayConfig;
use crate::error::GatewayError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// One Phoenix frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    /// Ref of the join that opened the channel this frame belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl Frame {
    fn new(topic: impl Into<String>, event: &str, payload: Value, reference: String) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_string(),
            payload,
            reference: Some(reference),
            join_ref: None,
        }
    }

    fn with_join_ref(mut self, join_ref: &str) -> Self {
        self.join_ref = Some(join_ref.to_string());
        self
    }
}

type JoinAck = oneshot::Sender<Result<(), String>>;

/// A joined channel. Close frames only apply to the join they name.
struct Route {
    join_ref: String,
    events: events::UnboundedSender<InsertEvent>,
}

/// State shared between the client, the socket task and subscription handles.
#[derive(Default)]
struct Shared {
    routes: DashMap<String, Route>,
    acks: DashMap<String, JoinAck>,
    next_ref: AtomicU64,
}

impl Shared {
    fn next_ref(&self) -> String {
        (self.next_ref.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Drop the route for `topic` if it still belongs to `join_ref`.
    fn remove_route(&self, topic: &str, join_ref: Option<&str>) -> bool {
        self.routes
            .remove_if(topic, |_, route| join_ref.map_or(true, |r| r == route.join_ref))
            .is_some()
    }

    /// Route one incoming frame. Returns the ref when the frame answers a
    /// heartbeat.
    fn dispatch(&self, text: &str) -> Option<String> {
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Unreadable realtime frame: {e}");
                return None;
            }
        };

        match frame.event.as_str() {
            "phx_reply" if frame.topic == "phoenix" => return frame.reference,
            "phx_reply" => {
                let reference = frame.reference.as_deref()?;
                if let Some((_, ack)) = self.acks.remove(reference) {
                    let status = frame.payload["status"].as_str().unwrap_or("error");
                    let result = if status == "ok" {
                        Ok(())
                    } else {
                        Err(frame.payload["response"].to_string())
                    };
                    let _ = ack.send(result);
                }
            }
            "postgres_changes" => {
                let data = &frame.payload["data"];
                if data["type"].as_str().is_some_and(|kind| kind != "INSERT") {
                    return None;
                }
                let event = InsertEvent {
                    table: data["table"].as_str().unwrap_or_default().to_string(),
                    record: data["record"].clone(),
                };
                match self.routes.get(&frame.topic) {
                    Some(route) => {
                        if route.events.unbounded_send(event).is_err() {
                            debug!("Subscriber for {} is gone", frame.topic);
                        }
                    }
                    None => debug!("Insert for unknown topic {}", frame.topic),
                }
            }
            "phx_error" | "phx_close" => {
                let join_ref = frame.join_ref.as_deref().or(frame.reference.as_deref());
                if self.remove_route(&frame.topic, join_ref) {
                    warn!("Channel {} closed by server ({})", frame.topic, frame.event);
                } else {
                    debug!("Stale {} for {} ignored", frame.event, frame.topic);
                }
            }
            other => debug!("Ignoring {other} on {}", frame.topic),
        }
        None
    }
}

struct Connection {
    outgoing: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// [`RealtimeFeed`] over the backend's realtime websocket.
///
/// Connects on the first subscribe and reconnects on a later subscribe if the
/// socket has dropped.
pub struct RealtimeClient {
    config: GatewayConfig,
    shared: Arc<Shared>,
    conn: Mutex<Option<Connection>>,
    heartbeat: Duration,
}

impl RealtimeClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
            conn: Mutex::new(None),
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    /// Heartbeat period. A heartbeat still unanswered at the next tick drops
    /// the socket.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Number of channels with a live subscriber.
    pub fn active_channels(&self) -> usize {
        self.shared.routes.len()
    }

    async fn outgoing(&self) -> Result<mpsc::UnboundedSender<Frame>, GatewayError> {
        let mut conn = self.conn.lock().await;
        if let Some(existing) = conn.as_ref() {
            if !existing.outgoing.is_closed() {
                return Ok(existing.outgoing.clone());
            }
            info!("Realtime socket dropped, reconnecting");
        }

        let url = self.config.realtime_url()?;
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        info!("Realtime socket connected to {}", self.config.base_url);

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(ws, rx, self.shared.clone(), self.heartbeat));
        *conn = Some(Connection {
            outgoing: tx.clone(),
            task,
        });
        Ok(tx)
    }

    pub async fn join(&self, channel: &str, filter: InsertFilter) -> Result<Subscription, GatewayError> {
        let topic = format!("realtime:{channel}");
        if self.shared.routes.contains_key(&topic) {
            return Err(GatewayError::Realtime(format!("already subscribed to {channel}")));
        }
        let outgoing = self.outgoing().await?;

        let (events_tx, events_rx) = events::unbounded();
        let reference = self.shared.next_ref();
        self.shared.routes.insert(
            topic.clone(),
            Route {
                join_ref: reference.clone(),
                events: events_tx,
            },
        );

        let (ack_tx, ack_rx) = oneshot::channel();
        self.shared.acks.insert(reference.clone(), ack_tx);

        let mut change = serde_json::to_value(&filter)?;
        change["event"] = json!("INSERT");
        let payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
            },
            "access_token": self.config.bearer(),
        });
        debug!("Joining {topic}");
        let join = Frame::new(topic.clone(), "phx_join", payload, reference.clone()).with_join_ref(&reference);

        let outcome = if outgoing.send(join).is_err() {
            Err("socket closed before join".to_string())
        } else {
            match tokio::time::timeout(JOIN_TIMEOUT, ack_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err("socket closed during join".to_string()),
                Err(_) => Err(format!("no reply within {JOIN_TIMEOUT:?}")),
            }
        };
        if let Err(reason) = outcome {
            self.shared.acks.remove(&reference);
            self.shared.remove_route(&topic, Some(reference.as_str()));
            return Err(GatewayError::Realtime(format!("join {channel} failed: {reason}")));
        }
        info!("Joined {topic}");

        let shared = self.shared.clone();
        let leave_topic = topic;
        let join_ref = reference;
        Ok(Subscription::new(channel, events_rx, move || {
            shared.remove_route(&leave_topic, Some(join_ref.as_str()));
            let leave = Frame::new(leave_topic.clone(), "phx_leave", json!({}), shared.next_ref())
                .with_join_ref(&join_ref);
            if outgoing.send(leave).is_err() {
                debug!("Socket already closed, skipping leave for {leave_topic}");
            }
        }))
    }
}

impl RealtimeFeed for RealtimeClient {
    async fn subscribe(&self, channel: &str, filter: InsertFilter) -> Result<Subscription, BackendError> {
        Ok(self.join(channel, filter).await?)
    }
}

async fn send_frame(
    sink: &mut futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>,
    frame: &Frame,
) -> Result<(), GatewayError> {
    let text = serde_json::to_string(frame)?;
    sink.send(WsMessage::Text(text.into())).await?;
    Ok(())
}

/// Own the socket until it closes or every sender is dropped.
async fn drive(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
    shared: Arc<Shared>,
    period: Duration,
) {
    let (mut sink, mut stream) = ws.split();
    let mut heartbeat = tokio::time::interval(period);
    heartbeat.tick().await;
    let mut awaiting: Option<String> = None;

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = send_frame(&mut sink, &frame).await {
                        warn!("Realtime send failed: {e}");
                        break;
                    }
                }
                None => {
                    debug!("Realtime client released, closing socket");
                    let _ = sink.close().await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(WsMessage::Text(text))) => {
                    let answered = shared.dispatch(text.as_str());
                    if answered.is_some() && answered == awaiting {
                        awaiting = None;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Realtime socket closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Realtime socket error: {e}");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if let Some(missed) = awaiting.take() {
                    warn!("Heartbeat {missed} unanswered, dropping realtime socket");
                    break;
                }
                let reference = shared.next_ref();
                let beat = Frame::new("phoenix", "heartbeat", json!({}), reference.clone());
                if let Err(e) = send_frame(&mut sink, &beat).await {
                    warn!("Heartbeat failed: {e}");
                    break;
                }
                awaiting = Some(reference);
            }
        }
    }

    // Dropping the senders ends every subscriber's event stream.
    shared.routes.clear();
    shared.acks.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_with_route(topic: &str, join_ref: &str) -> (Shared, events::UnboundedReceiver<InsertEvent>) {
        let shared = Shared::default();
        let (tx, rx) = events::unbounded();
        shared.routes.insert(
            topic.to_string(),
            Route {
                join_ref: join_ref.to_string(),
                events: tx,
            },
        );
        (shared, rx)
    }

    #[test]
    fn inserts_are_routed_by_topic() {
        let (shared, mut rx) = shared_with_route("realtime:project-p1", "1");
        shared.dispatch(
            &json!({
                "topic": "realtime:project-p1",
                "event": "postgres_changes",
                "payload": {"data": {"type": "INSERT", "table": "messages", "record": {"id": "m1"}}},
                "ref": null
            })
            .to_string(),
        );
        shared.dispatch(
            &json!({
                "topic": "realtime:project-p2",
                "event": "postgres_changes",
                "payload": {"data": {"type": "INSERT", "table": "messages", "record": {"id": "m2"}}},
                "ref": null
            })
            .to_string(),
        );

        let event = rx.try_next().unwrap().unwrap();
        assert_eq!(event.table, "messages");
        assert_eq!(event.record["id"], "m1");
        assert!(rx.try_next().is_err());
    }

    #[test]
    fn replies_resolve_pending_joins() {
        let shared = Shared::default();
        let (ok_tx, mut ok_rx) = oneshot::channel();
        let (err_tx, mut err_rx) = oneshot::channel();
        shared.acks.insert("1".into(), ok_tx);
        shared.acks.insert("2".into(), err_tx);

        shared.dispatch(r#"{"topic":"realtime:a","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#);
        shared.dispatch(r#"{"topic":"realtime:b","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"2"}"#);

        assert_eq!(ok_rx.try_recv().unwrap(), Some(Ok(())));
        let rejected = err_rx.try_recv().unwrap().unwrap();
        assert!(rejected.unwrap_err().contains("unauthorized"));
        assert!(shared.acks.is_empty());
    }

    #[test]
    fn server_close_drops_route() {
        let (shared, mut rx) = shared_with_route("realtime:project-p1", "4");
        shared.dispatch(r#"{"topic":"realtime:project-p1","event":"phx_close","payload":{},"ref":"4","join_ref":"4"}"#);
        assert!(shared.routes.is_empty());
        assert_eq!(rx.try_next().unwrap(), None);
    }

    #[test]
    fn close_for_an_earlier_join_keeps_the_current_route() {
        // Channel re-joined as ref 3 before the server closed the join from ref 1.
        let (shared, mut rx) = shared_with_route("realtime:project-p1", "3");
        shared.dispatch(r#"{"topic":"realtime:project-p1","event":"phx_close","payload":{},"ref":"1"}"#);
        shared.dispatch(r#"{"topic":"realtime:project-p1","event":"phx_error","payload":{},"ref":"2","join_ref":"1"}"#);

        assert_eq!(shared.routes.len(), 1);
        assert!(rx.try_next().is_err());

        assert!(!shared.remove_route("realtime:project-p1", Some("1")));
        assert!(shared.remove_route("realtime:project-p1", Some("3")));
    }

    #[test]
    fn heartbeat_replies_are_reported() {
        let shared = Shared::default();
        let answered = shared.dispatch(r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"7"}"#);
        assert_eq!(answered.as_deref(), Some("7"));

        let (ack_tx, _ack_rx) = oneshot::channel();
        shared.acks.insert("8".into(), ack_tx);
        let answered = shared.dispatch(r#"{"topic":"realtime:a","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"8"}"#);
        assert_eq!(answered, None);
        assert!(shared.acks.is_empty());
    }

    #[test]
    fn refs_increase() {
        let shared = Shared::default();
        assert_eq!(shared.next_ref(), "1");
        assert_eq!(shared.next_ref(), "2");
    }
}
