//! chatplays-server/src/overlay.rs
//!
//! HTTP side of the overlay:
//!   GET /            bundled overlay page
//!   GET /api/state   current snapshot
//!   GET /api/events  server-sent events, one `snapshot` per change,
//!                    starting with the current state

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::{
    Json, Router,
    extract::State,
    response::{Html, sse::{Event, KeepAlive, Sse}},
    routing::get,
};
use futures_util::{Stream, StreamExt, stream};
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use chatplays_core::models::OverlaySnapshot;
use chatplays_core::{ChatPlaysService, Error};

const OVERLAY_PAGE: &str = include_str!("../assets/overlay.html");
const SNAPSHOT_EVENT: &str = "snapshot";
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const LISTENER_BUFFER: usize = 32;

pub fn router(service: Arc<ChatPlaysService>) -> Router {
    Router::new()
        .route("/", get(overlay_page))
        .route("/api/state", get(current_state))
        .route("/api/events", get(snapshot_events))
        .with_state(service)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn serve(addr: SocketAddr, service: Arc<ChatPlaysService>) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("Overlay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn overlay_page() -> Html<&'static str> {
    Html(OVERLAY_PAGE)
}

async fn current_state(State(service): State<Arc<ChatPlaysService>>) -> Json<OverlaySnapshot> {
    Json(service.snapshot())
}

async fn snapshot_events(
    State(service): State<Arc<ChatPlaysService>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let (id, initial, rx) = service.subscribe(Some(LISTENER_BUFFER));
    debug!("overlay listener {} connected", id);

    let updates = ReceiverStream::new(rx).map(|snapshot| snapshot_event(&snapshot));
    let events = stream::once(async move { snapshot_event(&initial) }).chain(updates);

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keepalive"))
}

fn snapshot_event(snapshot: &OverlaySnapshot) -> Result<Event, Infallible> {
    Ok(Event::default()
        .event(SNAPSHOT_EVENT)
        .json_data(snapshot)
        .unwrap_or_else(|_| Event::default().event(SNAPSHOT_EVENT).data("{}")))
}
