use clap::Parser;
use gfs_chunkserver::context::ChunkServerContext;
use gfs_chunkserver::http::router;
use std::path::PathBuf;
use tracing::info;

/// GFS-style chunk payload server: heartbeat loop, simulated clock, and the
/// two-phase stage/commit HTTP surface.
#[derive(Parser, Debug)]
struct Args {
    /// Port this chunkserver listens on.
    self_port: u16,

    /// Comma-separated ports of every master in the cluster.
    #[arg(value_delimiter = ',')]
    master_ports: Vec<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let db_path = PathBuf::from(format!("chunk_{}.db", args.self_port));

    let ctx = ChunkServerContext::new(args.self_port, args.master_ports, db_path)
        .await
        .expect("failed to open chunk store");

    ctx.spawn_background_tasks();

    let addr = format!("0.0.0.0:{}", args.self_port);
    info!(addr, "gfs-chunkserver listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, router(ctx)).await.expect("server error");
}
