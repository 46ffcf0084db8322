use clap::Parser;
use gfs_master::context::MasterContext;
use gfs_master::http::router;
use std::path::PathBuf;
use tracing::info;

/// GFS-style metadata master: bully election, liveness, leases, and the
/// client-facing HTTP surface.
#[derive(Parser, Debug)]
struct Args {
    /// Port this master listens on.
    self_port: u16,

    /// Comma-separated ports of every peer master in the cluster.
    #[arg(value_delimiter = ',')]
    peer_ports: Vec<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let db_path = PathBuf::from(format!("master_{}.db", args.self_port));

    let ctx = MasterContext::new(args.self_port, args.peer_ports, db_path)
        .await
        .expect("failed to open metadata store");

    ctx.spawn_background_tasks();

    let addr = format!("0.0.0.0:{}", args.self_port);
    info!(addr, "gfs-master listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, router(ctx))
        .await
        .expect("server error");
}
