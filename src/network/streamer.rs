//! Real-time streamer
//!
//! Owns the TCP connection to the streaming server, performs the source
//! handshake and delivers encoded audio at playback speed.

use socket2::{SockRef, TcpKeepalive};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::icecast::{source_request, SourceCredentials};
use super::pacing::{Clock, RateLimiter};
use crate::config::StreamServerConfig;
use crate::error::ConnectionError;

/// How a paced send ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Complete { bytes: usize },
    Cancelled { bytes: usize },
}

/// Opens source connections to one streaming server
pub struct Streamer {
    config: StreamServerConfig,
    clock: Arc<dyn Clock>,
}

impl Streamer {
    pub fn new(config: StreamServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &StreamServerConfig {
        &self.config
    }

    pub fn credentials(&self) -> SourceCredentials {
        SourceCredentials::new(&self.config.source_user, &self.config.password)
    }

    /// Connect and start a source session on `mount_path`
    pub async fn connect(&self, mount_path: &str) -> Result<StreamConnection, ConnectionError> {
        StreamConnection::open(
            &self.config.host,
            self.config.port,
            mount_path,
            &self.credentials(),
            ConnectionOptions {
                connect_timeout: self.config.connect_timeout(),
                write_timeout: self.config.write_timeout(),
                chunk_size: self.config.chunk_size,
            },
            self.clock.clone(),
        )
        .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub chunk_size: usize,
}

/// One live source session.
///
/// The socket is shut down by [`close`](Self::close); dropping the
/// connection closes it as well.
pub struct StreamConnection {
    stream: Option<TcpStream>,
    peer: String,
    mount_path: String,
    options: ConnectionOptions,
    clock: Arc<dyn Clock>,
    bytes_sent: u64,
}

impl StreamConnection {
    pub async fn open(
        host: &str,
        port: u16,
        mount_path: &str,
        credentials: &SourceCredentials,
        options: ConnectionOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConnectionError> {
        let peer = format!("{host}:{port}");
        let request = source_request(mount_path, credentials)?;

        let mut stream = match tokio::time::timeout(options.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectionError::ConnectFailed {
                    addr: peer,
                    source,
                })
            }
            Err(_) => return Err(ConnectionError::ConnectTimeout(peer)),
        };

        if let Err(e) = configure_socket(&stream) {
            tracing::warn!(%peer, "Failed to tune socket: {}", e);
        }

        match tokio::time::timeout(options.write_timeout, stream.write_all(request.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ConnectionError::HandshakeFailed(e.to_string())),
            Err(_) => return Err(ConnectionError::WriteTimeout(options.write_timeout)),
        }

        tracing::info!(%peer, mount = mount_path, "Source connection established");
        Ok(Self {
            stream: Some(stream),
            peer,
            mount_path: mount_path.to_string(),
            options,
            clock,
            bytes_sent: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Deliver `payload` in chunks, paced to `bitrate` bits per second.
    ///
    /// Returns once the whole payload has been written and its playback
    /// time has elapsed, or as soon as `cancel` fires.
    pub async fn send_paced(
        &mut self,
        payload: &[u8],
        bitrate: u32,
        cancel: &CancellationToken,
    ) -> Result<Delivery, ConnectionError> {
        if bitrate == 0 {
            return Err(ConnectionError::ZeroBitrate);
        }
        let chunk_size = self.options.chunk_size.max(1);
        let write_timeout = self.options.write_timeout;
        let clock = self.clock.clone();
        let stream = self.stream.as_mut().ok_or(ConnectionError::Closed)?;

        let mut limiter = RateLimiter::new(bitrate, clock.now());
        let mut sent = 0usize;

        for chunk in payload.chunks(chunk_size) {
            if cancel.is_cancelled() {
                self.bytes_sent += sent as u64;
                return Ok(Delivery::Cancelled { bytes: sent });
            }

            match tokio::time::timeout(write_timeout, stream.write_all(chunk)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.bytes_sent += sent as u64;
                    return Err(ConnectionError::SendFailed(e));
                }
                Err(_) => {
                    self.bytes_sent += sent as u64;
                    return Err(ConnectionError::WriteTimeout(write_timeout));
                }
            }
            sent += chunk.len();

            let deadline = limiter.consume(chunk.len());
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.bytes_sent += sent as u64;
                    return Ok(Delivery::Cancelled { bytes: sent });
                }
                _ = clock.sleep_until(deadline) => {}
            }
        }

        self.bytes_sent += sent as u64;
        Ok(Delivery::Complete { bytes: sent })
    }

    /// Shut the socket down. Later calls do nothing.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(peer = %self.peer, "Shutdown after error: {}", e);
            }
            tracing::info!(
                peer = %self.peer,
                mount = %self.mount_path,
                bytes = self.bytes_sent,
                "Source connection closed"
            );
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(peer = %self.peer, "Source connection dropped without close");
        }
    }
}

fn configure_socket(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let sock = SockRef::from(stream);
    sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(30)))?;
    Ok(())
}
