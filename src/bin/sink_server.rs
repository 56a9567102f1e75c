use anyhow::Result;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Local target for the load generator: accepts connections and discards whatever arrives.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sink_server=debug,info")
        .init();

    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(1234);

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Sink server listening on port {}", port);

    loop {
        let (socket, peer) = listener.accept().await?;
        debug!("Accepted {}", peer);
        tokio::spawn(async move {
            match drain(socket).await {
                Ok(bytes) => debug!("{} closed after {} bytes", peer, bytes),
                Err(e) => warn!("Error reading from {}: {}", peer, e),
            }
        });
    }
}

async fn drain(mut socket: TcpStream) -> std::io::Result<u64> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
    }
}
