use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// What a transport delivers onto its consumer's event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// One full text line received from a peer (terminator stripped).
    Line(String),
    /// A peer's read loop ended: remote close, I/O error, or local close.
    PeerClosed,
}

/// Handle to one transport endpoint: a listening hub (host) or a single
/// outbound connection (joiner).
///
/// The handle owns every socket behind it; consumers only ever see
/// [`send`](NetHandle::send), [`close`](NetHandle::close), and the
/// [`NetEvent`]s arriving on the queue given at construction.
#[derive(Clone)]
pub struct NetHandle {
    inner: Arc<Endpoint>,
}

struct Endpoint {
    local_addr: SocketAddr,
    /// Listening endpoints relay received lines to every other peer.
    relay: bool,
    peers: DashMap<u64, PeerSender>,
    next_peer_id: AtomicU64,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Write side of one peer, detached from its writer task.
struct PeerSender {
    tx: mpsc::UnboundedSender<String>,
}

/// Start a listening endpoint on `port` (0 picks an ephemeral port).
///
/// Every accepted peer gets a dedicated read loop and writer task. Received
/// lines are relayed verbatim to every *other* accepted peer and delivered
/// to `events`; with two or more peers the endpoint acts as a plain
/// broadcast hub, though a match only ever uses one.
pub fn listen_and_serve(
    port: u16,
    events: mpsc::UnboundedSender<NetEvent>,
) -> io::Result<NetHandle> {
    let listener = bind_listener(port)?;
    let local_addr = listener.local_addr()?;
    let handle = NetHandle::new(local_addr, true);

    let inner = handle.inner.clone();
    let mut shutdown = handle.inner.shutdown.subscribe();
    tokio::spawn(async move {
        info!(%local_addr, "listening for a peer");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!(%peer_addr, "peer accepted");
                        spawn_peer(&inner, stream, events.clone());
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed; no longer listening");
                        break;
                    }
                },
            }
        }
    });

    Ok(handle)
}

/// Open one outbound connection to `host:port`.
///
/// The connection gets a read loop and writer task like an accepted peer,
/// but received lines are never relayed anywhere.
pub async fn connect(
    host: &str,
    port: u16,
    events: mpsc::UnboundedSender<NetEvent>,
) -> io::Result<NetHandle> {
    let stream = TcpStream::connect((host, port)).await?;
    let local_addr = stream.local_addr()?;
    let handle = NetHandle::new(local_addr, false);
    spawn_peer(&handle.inner, stream, events);
    Ok(handle)
}

impl NetHandle {
    fn new(local_addr: SocketAddr, relay: bool) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Endpoint {
                local_addr,
                relay,
                peers: DashMap::new(),
                next_peer_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Queue one line (terminator appended by the writer) to every live peer.
    ///
    /// Returns `false` once the handle is closed, or (for an outbound
    /// endpoint) once its connection is gone. A listening endpoint reports
    /// `true` even with no peer accepted yet; the line simply reaches
    /// nobody. Never panics on a remote disconnect: a peer whose writer is
    /// gone is dropped from the relay set instead.
    pub fn send(&self, line: &str) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        let mut delivered = false;
        self.inner.peers.retain(|_, peer| {
            let ok = peer.tx.send(line.to_string()).is_ok();
            delivered |= ok;
            ok
        });

        self.inner.relay || delivered
    }

    /// Release every socket owned by this handle. Idempotent.
    ///
    /// Unblocks the accept loop and every read loop via the shutdown
    /// channel; writer tasks end when their queues are dropped here.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.shutdown.send(true);
        self.inner.peers.clear();
        info!(local_addr = %self.inner.local_addr, "transport closed");
    }

    /// Whether the handle is open and at least one peer is attached.
    pub fn is_connected(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire) && !self.inner.peers.is_empty()
    }

    /// The actual bound (listener) or local (outbound) socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        // Last handle gone: make sure the loops wind down with it.
        let _ = self.shutdown.send(true);
    }
}

fn bind_listener(port: u16) -> io::Result<TcpListener> {
    let std_listener = std::net::TcpListener::bind(("0.0.0.0", port))?;
    std_listener.set_nonblocking(true)?;
    TcpListener::from_std(std_listener)
}

/// Register one peer and start its writer task and read loop.
fn spawn_peer(inner: &Arc<Endpoint>, stream: TcpStream, events: mpsc::UnboundedSender<NetEvent>) {
    if inner.closed.load(Ordering::Acquire) {
        // Raced with close(); the stream is dropped unregistered.
        return;
    }
    let peer_id = inner.next_peer_id.fetch_add(1, Ordering::Relaxed);
    let (read_half, write_half) = stream.into_split();

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(write_loop(peer_id, write_half, rx));
    inner.peers.insert(peer_id, PeerSender { tx });

    let inner = inner.clone();
    tokio::spawn(read_loop(inner, peer_id, read_half, events));
}

/// Drain queued lines onto the socket until the queue or the socket dies.
async fn write_loop(
    peer_id: u64,
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = rx.recv().await {
        let framed = format!("{line}\n");
        if let Err(err) = write_half.write_all(framed.as_bytes()).await {
            debug!(peer_id, error = %err, "write failed; dropping peer writer");
            break;
        }
    }
}

/// Deliver whole lines from one peer until the peer or the endpoint closes.
///
/// On a listening endpoint each line is first relayed to every other peer,
/// then handed to the consumer. Any exit path removes only this peer from
/// the registry and reports a single [`NetEvent::PeerClosed`].
async fn read_loop(
    inner: Arc<Endpoint>,
    peer_id: u64,
    read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<NetEvent>,
) {
    let mut lines = BufReader::new(read_half).lines();
    let mut shutdown = inner.shutdown.subscribe();

    // A close() that landed before the subscription is already visible in
    // the watch value and would otherwise never wake `changed()`.
    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => {
                    if inner.relay {
                        relay_to_others(&inner, peer_id, &line);
                    }
                    if events.send(NetEvent::Line(line)).is_err() {
                        // Consumer is gone; nothing left to deliver to.
                        break;
                    }
                }
                Ok(None) => {
                    debug!(peer_id, "peer closed the connection");
                    break;
                }
                Err(err) => {
                    warn!(peer_id, error = %err, "read failed; dropping peer");
                    break;
                }
            },
        }
    }

    inner.peers.remove(&peer_id);
    let _ = events.send(NetEvent::PeerClosed);
}

fn relay_to_others(inner: &Endpoint, from_peer: u64, line: &str) {
    inner.peers.retain(|id, peer| {
        if *id == from_peer {
            return true;
        }
        peer.tx.send(line.to_string()).is_ok()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn expect_line(rx: &mut mpsc::UnboundedReceiver<NetEvent>) -> String {
        loop {
            match timeout(WAIT, rx.recv()).await.expect("timed out") {
                Some(NetEvent::Line(line)) => return line,
                Some(NetEvent::PeerClosed) => panic!("peer closed while expecting a line"),
                None => panic!("event channel closed"),
            }
        }
    }

    async fn expect_peer_closed(rx: &mut mpsc::UnboundedReceiver<NetEvent>) {
        loop {
            match timeout(WAIT, rx.recv()).await.expect("timed out") {
                Some(NetEvent::PeerClosed) => return,
                Some(NetEvent::Line(_)) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn host_and_joiner_exchange_lines_both_ways() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let host = listen_and_serve(0, host_tx).expect("bind");
        let port = host.local_addr().port();

        let (joiner_tx, mut joiner_rx) = mpsc::unbounded_channel();
        let joiner = connect("127.0.0.1", port, joiner_tx).await.expect("connect");

        assert!(joiner.send("JOIN_REQUEST:player_name=Blue"));
        assert_eq!(
            expect_line(&mut host_rx).await,
            "JOIN_REQUEST:player_name=Blue"
        );

        assert!(host.send("JOIN_ACCEPTED:host_name=Red"));
        assert_eq!(
            expect_line(&mut joiner_rx).await,
            "JOIN_ACCEPTED:host_name=Red"
        );

        host.close();
        joiner.close();
    }

    #[tokio::test]
    async fn hub_relays_a_line_to_every_other_peer() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let host = listen_and_serve(0, host_tx).expect("bind");
        let port = host.local_addr().port();

        // Peers are confirmed one at a time (a line from each observed on
        // the host side) so the relay set is settled and the second peer's
        // first incoming line is exactly the one under test.
        let (first_tx, _first_rx) = mpsc::unbounded_channel();
        let first = connect("127.0.0.1", port, first_tx).await.expect("connect");
        assert!(first.send("PLAYER_QUIT:player=JOINER"));
        expect_line(&mut host_rx).await;

        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        let second = connect("127.0.0.1", port, second_tx).await.expect("connect");
        assert!(second.send("PLAYER_QUIT:player=JOINER"));
        expect_line(&mut host_rx).await;

        assert!(first.send("COUNTDOWN:seconds_remaining=2"));
        assert_eq!(
            expect_line(&mut host_rx).await,
            "COUNTDOWN:seconds_remaining=2"
        );
        assert_eq!(
            expect_line(&mut second_rx).await,
            "COUNTDOWN:seconds_remaining=2"
        );

        host.close();
        first.close();
        second.close();
    }

    #[tokio::test]
    async fn closing_the_host_releases_every_peer_and_fails_sends() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let host = listen_and_serve(0, host_tx).expect("bind");
        let port = host.local_addr().port();

        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let first = connect("127.0.0.1", port, first_tx).await.expect("connect");
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        let second = connect("127.0.0.1", port, second_tx).await.expect("connect");

        // Both joiners observe their connection going away.
        host.close();
        expect_peer_closed(&mut first_rx).await;
        expect_peer_closed(&mut second_rx).await;

        assert!(!host.send("GAME_START:round=1"));
        // Close is idempotent.
        host.close();

        first.close();
        second.close();
    }

    #[tokio::test]
    async fn joiner_send_fails_after_its_connection_is_gone() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let host = listen_and_serve(0, host_tx).expect("bind");
        let port = host.local_addr().port();

        let (joiner_tx, mut joiner_rx) = mpsc::unbounded_channel();
        let joiner = connect("127.0.0.1", port, joiner_tx).await.expect("connect");
        assert!(joiner.is_connected());

        host.close();
        expect_peer_closed(&mut joiner_rx).await;

        assert!(!joiner.is_connected());
        assert!(!joiner.send("PLAYER_CHOICE:player=JOINER,move=ROCK"));
        joiner.close();
    }

    #[tokio::test]
    async fn connect_to_a_dead_port_is_a_plain_error() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let host = listen_and_serve(0, host_tx).expect("bind");
        let port = host.local_addr().port();
        host.close();

        // Give the listener task a moment to wind down and free the port.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (joiner_tx, _joiner_rx) = mpsc::unbounded_channel();
        let result = connect("127.0.0.1", port, joiner_tx).await;
        assert!(result.is_err());
    }
}
