use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod context;
mod jetstream;
mod overlay;

use config::Args;
use context::ServerContext;
use jetstream::JetstreamConsumer;

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("chatplays=info".parse()?);
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;
    let args = Args::parse();
    info!(
        "chatplays starting. streamer={}, executor={:?}, overlay={}",
        args.streamer, args.executor, args.overlay_addr
    );

    let ctx = ServerContext::new(args)?;

    let overlay_addr = ctx.args.overlay_addr;
    let overlay_service = ctx.service.clone();
    let overlay = tokio::spawn(async move {
        if let Err(e) = overlay::serve(overlay_addr, overlay_service).await {
            error!("Overlay server error: {}", e);
        }
    });

    let consumer = JetstreamConsumer::new(&ctx.args.jetstream_url, ctx.service.clone())?;
    let firehose = tokio::spawn(async move {
        if let Err(e) = consumer.start_loop().await {
            error!("Jetstream consumer error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, shutting down."),
        _ = firehose => info!("Jetstream stream ended, shutting down."),
    }
    overlay.abort();
    Ok(())
}
