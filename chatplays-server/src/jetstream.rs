//! chatplays-server/src/jetstream.rs
//!
//! Reads chat records off the Jetstream firehose and feeds them to the
//! pipeline. Reconnects with a jittered back-off whenever the socket drops.

use std::sync::Arc;
use std::time::Duration;
use futures_util::StreamExt;
use rand::Rng;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use chatplays_core::platforms::firehose::{self, CHAT_COLLECTION};
use chatplays_core::{ChatPlaysService, Error};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const RECONNECT_JITTER_MS: u64 = 2_000;

type JetstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct JetstreamConsumer {
    url: Url,
    service: Arc<ChatPlaysService>,
}

impl JetstreamConsumer {
    pub fn new(endpoint: &str, service: Arc<ChatPlaysService>) -> Result<Self, Error> {
        Ok(Self {
            url: subscribe_url(endpoint)?,
            service,
        })
    }

    /// Runs until the server closes the stream cleanly.
    pub async fn start_loop(&self) -> Result<(), Error> {
        loop {
            let mut ws = match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => ws,
                Err(e) => {
                    error!("[Jetstream] connect error: {}", e);
                    sleep(backoff()).await;
                    continue;
                }
            };
            info!("[Jetstream] connected → {}", self.url);

            match self.run_read_loop(&mut ws).await {
                Ok(()) => {
                    info!("[Jetstream] websocket closed gracefully.");
                    return Ok(());
                }
                Err(e) => {
                    warn!("[Jetstream] loop error: {}", e);
                    let _ = ws.close(None).await;
                    sleep(backoff()).await;
                }
            }
        }
    }

    async fn run_read_loop(&self, ws: &mut JetstreamSocket) -> Result<(), Error> {
        while let Some(msg_res) = ws.next().await {
            let msg = msg_res.map_err(|e| Error::WebSocket(e.to_string()))?;

            if msg.is_close() {
                return Ok(());
            }
            let Message::Text(txt) = msg else { continue };
            self.handle_text(&txt);
        }
        Err(Error::WebSocket("stream ended without a close frame".into()))
    }

    /// Malformed frames are skipped, not fatal.
    fn handle_text(&self, txt: &str) {
        let event: serde_json::Value = match serde_json::from_str(txt) {
            Ok(v) => v,
            Err(e) => {
                debug!("[Jetstream] bad json: {}", e);
                return;
            }
        };
        match firehose::from_jetstream(&event) {
            Some(record) => {
                trace!("[Jetstream] chat from {}: {:?}", record.participant_id, record.text);
                self.service.ingest(record);
            }
            None => trace!("[Jetstream] skipped event kind={:?}", event.get("kind")),
        }
    }
}

/// `endpoint` with the chat collection as the only wanted collection.
pub fn subscribe_url(endpoint: &str) -> Result<Url, Error> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("invalid Jetstream URL '{}': {}", endpoint, e)))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(Error::Config(format!("Jetstream URL must be ws:// or wss://, got '{}'", endpoint)));
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "wantedCollections")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("wantedCollections", CHAT_COLLECTION);
    Ok(url)
}

fn backoff() -> Duration {
    RECONNECT_BACKOFF + Duration::from_millis(rand::rng().random_range(0..RECONNECT_JITTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatplays_core::models::{Button, QueueStatus};
    use chatplays_core::PipelineConfig;
    use chatplays_core::test_utils::helpers::*;
    use futures_util::SinkExt;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[test]
    fn subscribe_url_sets_the_collection() {
        let url = subscribe_url("wss://jetstream.example/subscribe?compress=false").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://jetstream.example/subscribe?compress=false&wantedCollections=place.stream.chat.message"
        );

        let url = subscribe_url("ws://localhost:6008/subscribe?wantedCollections=app.bsky.feed.post").unwrap();
        assert_eq!(url.query(), Some("wantedCollections=place.stream.chat.message"));

        assert!(subscribe_url("https://jetstream.example/subscribe").is_err());
        assert!(subscribe_url("not a url").is_err());
    }

    #[test]
    fn backoff_stays_in_range() {
        for _ in 0..50 {
            let d = backoff();
            assert!(d >= RECONNECT_BACKOFF);
            assert!(d < RECONNECT_BACKOFF + Duration::from_millis(RECONNECT_JITTER_MS));
        }
    }

    fn chat_event(author: &str, streamer: &str, text: &str) -> String {
        json!({
            "did": author,
            "kind": "commit",
            "commit": {
                "operation": "create",
                "collection": CHAT_COLLECTION,
                "record": { "text": text, "streamer": streamer }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn feeds_chat_frames_into_the_pipeline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = vec![
            chat_event("did:plc:one", "did:plc:streamer", "up"),
            "{not json".to_string(),
            chat_event("did:plc:two", "did:plc:elsewhere", "down"),
            json!({"did": "did:plc:one", "kind": "identity"}).to_string(),
            chat_event("did:plc:two", "did:plc:streamer", "a"),
        ];

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            ws.close(None).await.unwrap();
        });

        let config = PipelineConfig {
            streamer: Some("did:plc:streamer".into()),
            ..Default::default()
        };
        let p = test_pipeline(config, RecordingExecutor::new(), ScriptedResolver::new());
        let consumer = JetstreamConsumer::new(&format!("ws://{}/subscribe", addr), p.service.clone()).unwrap();
        consumer.start_loop().await.unwrap();

        let snapshot = p.service.snapshot();
        let texts: Vec<&str> = snapshot.chat.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["up", "a"]);
        assert!(snapshot.queue.iter().all(|i| i.status != QueueStatus::Error));

        tokio::time::sleep(Duration::from_millis(600)).await;
        let pressed: Vec<Vec<Button>> = p.executor.dispatches().into_iter().map(|d| d.buttons).collect();
        assert_eq!(pressed, vec![vec![Button::Up], vec![Button::A]]);
    }
}
