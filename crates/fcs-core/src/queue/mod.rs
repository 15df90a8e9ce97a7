// fcs-gateway is a federated corpus search gateway.
// Copyright (C) 2024 fcs-gateway contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Job queue client: length-prefixed JSON frames over TCP and a
//! `publish -> reply handle` abstraction over them. The dispatcher never
//! talks to a transport directly, only to [`JobQueue`].

pub mod job;

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;

use self::job::{ConcReply, Job};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

const MAX_BODY_SIZE_BYTES: usize = 64 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("got an IO error")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to worker: connection timeout")]
    ConnectionTimeout,

    #[error("failed to get reply for job: request timeout")]
    RequestTimeout,

    #[error("the body size ({body_size}) is larger than the maximum allowed ({max_size})")]
    BodyTooLarge { body_size: usize, max_size: usize },

    #[error("failed to encode or decode a frame body")]
    Codec(#[from] serde_json::Error),

    #[error("reply channel closed before a reply arrived")]
    ChannelClosed,

    #[error("no workers configured")]
    NoWorkers,
}

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Header {
    body_size: u64,
}

/// Client side of one framed connection.
pub struct Connection<Req, Res> {
    stream: TcpStream,
    marker: PhantomData<(Req, Res)>,
}

impl<Req, Res> Connection<Req, Res>
where
    Req: Serialize,
    Res: DeserializeOwned,
{
    pub async fn create(server: impl ToSocketAddrs) -> Result<Self> {
        Self::create_with_timeout(server, Duration::from_secs(30)).await
    }

    pub async fn create_with_timeout(
        server: impl ToSocketAddrs,
        timeout: Duration,
    ) -> Result<Self> {
        match tokio::time::timeout(timeout, TcpStream::connect(server)).await {
            Ok(stream) => {
                let stream = stream?;
                stream.set_nodelay(true)?;
                Ok(Connection {
                    stream,
                    marker: PhantomData,
                })
            }
            Err(_) => Err(Error::ConnectionTimeout),
        }
    }

    async fn send_without_timeout(&mut self, request: &Req) -> Result<Res> {
        let bytes = serde_json::to_vec(request)?;
        write_frame(&mut self.stream, &bytes).await?;

        let buf = read_frame(&mut self.stream).await?;
        Ok(serde_json::from_slice(&buf)?)
    }

    pub async fn send_with_timeout(&mut self, request: &Req, timeout: Duration) -> Result<Res> {
        match tokio::time::timeout(timeout, self.send_without_timeout(request)).await {
            Ok(res) => res,
            Err(_) => {
                self.stream.shutdown().await?;
                Err(Error::RequestTimeout)
            }
        }
    }
}

async fn write_frame(stream: &mut TcpStream, body: &[u8]) -> Result<()> {
    let header = Header {
        body_size: body.len() as u64,
    };
    stream.write_all(bytemuck::bytes_of(&header)).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut header_buf = [0; std::mem::size_of::<Header>()];
    stream.read_exact(&mut header_buf).await?;
    let header: Header = bytemuck::pod_read_unaligned(&header_buf);

    let body_size = header.body_size as usize;
    if body_size > MAX_BODY_SIZE_BYTES {
        return Err(Error::BodyTooLarge {
            body_size,
            max_size: MAX_BODY_SIZE_BYTES,
        });
    }

    let mut buf = vec![0; body_size];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Listening side of the frame protocol. The gateway itself never binds
/// one; workers do, and so do the transport tests.
pub struct Server<Req, Res> {
    listener: TcpListener,
    marker: PhantomData<(Req, Res)>,
}

impl<Req, Res> Server<Req, Res>
where
    Req: DeserializeOwned,
    Res: Serialize,
{
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Server {
            listener,
            marker: PhantomData,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> Result<ServerConnection<Req, Res>> {
        let (stream, client) = self.listener.accept().await?;
        tracing::debug!(?client, "accepted connection");
        Ok(ServerConnection {
            stream,
            marker: PhantomData,
        })
    }
}

pub struct ServerConnection<Req, Res> {
    stream: TcpStream,
    marker: PhantomData<(Req, Res)>,
}

impl<Req, Res> ServerConnection<Req, Res>
where
    Req: DeserializeOwned,
    Res: Serialize,
{
    pub async fn request(&mut self) -> Result<Req> {
        let buf = read_frame(&mut self.stream).await?;
        Ok(serde_json::from_slice(&buf)?)
    }

    pub async fn respond(&mut self, response: &Res) -> Result<()> {
        let bytes = serde_json::to_vec(response)?;
        write_frame(&mut self.stream, &bytes).await
    }
}

/// One-shot handle for a published job's reply.
pub struct ReplyHandle {
    rx: oneshot::Receiver<Result<ConcReply>>,
}

impl ReplyHandle {
    pub async fn recv(self) -> Result<ConcReply> {
        self.rx.await.map_err(|_| Error::ChannelClosed)?
    }

    #[cfg(test)]
    pub(crate) fn ready(reply: Result<ConcReply>) -> Self {
        let (tx, rx) = oneshot::channel();
        tx.send(reply).ok();
        ReplyHandle { rx }
    }
}

/// The queue seam of the dispatcher. Publishing must not wait for the
/// reply: a request publishes all of its jobs before awaiting any handle,
/// so workers run them in parallel.
pub trait JobQueue: Send + Sync {
    fn publish(&self, job: Job) -> impl std::future::Future<Output = Result<ReplyHandle>> + Send;
}

/// Fans jobs out over a fixed pool of worker addresses, round-robin. Each
/// publish spawns the exchange on its own task and hands back the receiver
/// half immediately.
pub struct TcpQueue {
    workers: Vec<SocketAddr>,
    cursor: AtomicUsize,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl TcpQueue {
    pub fn new(
        workers: Vec<SocketAddr>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        TcpQueue {
            workers,
            cursor: AtomicUsize::new(0),
            connect_timeout,
            request_timeout,
        }
    }
}

impl JobQueue for TcpQueue {
    async fn publish(&self, job: Job) -> Result<ReplyHandle> {
        if self.workers.is_empty() {
            return Err(Error::NoWorkers);
        }
        let next = self.cursor.fetch_add(1, Ordering::Relaxed);
        let addr = self.workers[next % self.workers.len()];
        let connect_timeout = self.connect_timeout;
        let request_timeout = self.request_timeout;

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let res = async {
                let mut conn: Connection<Job, ConcReply> =
                    Connection::create_with_timeout(addr, connect_timeout).await?;
                conn.send_with_timeout(&job, request_timeout).await
            }
            .await;
            if tx.send(res).is_err() {
                tracing::debug!(worker = %addr, "job reply dropped, request gone");
            }
        });

        Ok(ReplyHandle { rx })
    }
}
