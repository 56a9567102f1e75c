use socket2::TcpKeepalive;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::WorkerError;
use crate::config::TargetConfig;

pub(super) async fn connect(target: &TargetConfig) -> Result<TcpStream, WorkerError> {
    let stream = TcpStream::connect(target.addr.as_str())
        .await
        .map_err(|source| WorkerError::Connect {
            addr: target.addr.clone(),
            source,
        })?;

    if let Err(e) = configure(&stream, target) {
        debug!("Could not tune socket to {}: {}", target.addr, e);
    }

    Ok(stream)
}

fn configure(stream: &TcpStream, target: &TargetConfig) -> std::io::Result<()> {
    if target.keepalive_secs > 0 {
        let sock_ref = socket2::SockRef::from(stream);

        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(target.keepalive_secs))
            .with_interval(Duration::from_secs(10));

        sock_ref.set_tcp_keepalive(&keepalive)?;
    }

    // bursts are flushed explicitly, Nagle would only delay them
    stream.set_nodelay(target.nodelay)?;

    Ok(())
}
