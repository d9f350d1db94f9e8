use std::collections::hash_map::{Entry, HashMap};
use std::io::{self, prelude::*};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::backoff::{ExponentialBackoff, Retry};
use super::comm::Communicator;
use super::util;

const RETRY_WAIT: Duration = Duration::from_millis(50);
const RETRY_MAX_WAIT: Duration = Duration::from_millis(2000);
const CONNECT_ATTEMPTS: usize = 40;

/// Addresses for a group of `size` ranks on the loopback interface, rank `r`
/// listening on `base_port + r`. Fails if the last port would exceed 65535.
///
pub fn loopback_peers(base_port: u16, size: usize) -> io::Result<Vec<SocketAddr>> {
    (0..size)
        .map(|r| {
            u16::try_from(r)
                .ok()
                .and_then(|r| base_port.checked_add(r))
                .map(|port| SocketAddr::from(([127, 0, 0, 1], port)))
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{} ranks do not fit above port {}", size, base_port),
                    )
                })
        })
        .collect()
}

/// A communicator over TCP sockets. Every rank listens on its own address
/// from the peer list. Outgoing messages are handed to a sender thread,
/// which keeps one connection per peer and writes length-prefixed frames;
/// the receiving side acknowledges each frame with its length. Incoming
/// frames from all connections are funneled into a single inbox.
///
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    send_sink: Option<Sender<(usize, Vec<u8>)>>,
    recv_src: Receiver<Vec<u8>>,
    send_thread: Option<thread::JoinHandle<()>>,
}

impl TcpCommunicator {
    /// Bind this rank's listening socket and start the listener and sender
    /// threads. Peers need not be listening yet; connections are made
    /// lazily and retried with exponential backoff.
    ///
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> io::Result<Self> {
        let listener = TcpListener::bind(peers[rank])?;
        info!("rank {} listening on {}", rank, peers[rank]);

        let (recv_sink, recv_src) = crossbeam_channel::unbounded();
        let (send_sink, send_src) = crossbeam_channel::unbounded();
        let num_peers = peers.len();

        Self::start_listener(listener, recv_sink);
        let send_thread = Self::start_serial_sender(peers, send_src);

        Ok(Self {
            rank,
            num_peers,
            send_sink: Some(send_sink),
            recv_src,
            send_thread: Some(send_thread),
        })
    }

    fn start_serial_sender(
        peers: Vec<SocketAddr>,
        send_src: Receiver<(usize, Vec<u8>)>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (rank, message) in send_src {
                let addr = peers[rank];
                let client = match table.entry(rank) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(slot) => match Self::connect_with_retry(addr) {
                        Ok(stream) => slot.insert(stream),
                        Err(e) => panic!("could not connect to {}: {}", addr, e),
                    },
                };
                if let Err(e) = Self::send_acknowledged(client, &message) {
                    error!("failed to send {} bytes to {}: {}", message.len(), addr, e);
                    panic!("connection to {} failed", addr)
                }
            }
        })
    }

    fn send_acknowledged(client: &mut TcpStream, message: &[u8]) -> io::Result<()> {
        util::write_frame(client, message)?;
        let ack = util::read_usize(client)?;

        if ack != message.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("sent {} bytes but receiver acknowledged {}", message.len(), ack),
            ));
        }
        Ok(())
    }

    fn start_listener(listener: TcpListener, recv_sink: Sender<Vec<u8>>) {
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => Self::handle_connection(stream, recv_sink.clone()),
                    Err(e) => warn!("failed to accept connection: {}", e),
                }
            }
        });
    }

    fn handle_connection(mut stream: TcpStream, recv_sink: Sender<Vec<u8>>) {
        let remote = stream.peer_addr().ok();
        debug!("receiving connection from {:?}", remote);

        thread::spawn(move || loop {
            let result = util::read_frame(&mut stream).and_then(|bytes| {
                let size = bytes.len();
                recv_sink
                    .send(bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))?;
                stream.write_all(&size.to_le_bytes())
            });
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("connection from {:?} closed", remote);
                    break;
                }
                Err(e) => {
                    error!("connection from {:?} failed: {}", remote, e);
                    break;
                }
            }
        });
    }

    fn connect_with_retry(addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = ExponentialBackoff::new(RETRY_WAIT, RETRY_MAX_WAIT, 2)
            .take(CONNECT_ATTEMPTS)
            .retry(
                || TcpStream::connect(addr),
                |e, delay| {
                    debug!("connect to {} failed ({}), retrying in {:?}", addr, e, delay);
                    thread::sleep(delay)
                },
            )?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        let sent = self
            .send_sink
            .as_ref()
            .map(|sink| sink.send((rank, message)).is_ok())
            .unwrap_or(false);

        if !sent {
            panic!("rank {}: the sender thread has stopped", self.rank)
        }
    }

    fn recv(&self) -> Vec<u8> {
        match self.recv_src.recv() {
            Ok(message) => message,
            Err(_) => panic!("rank {}: the listener has stopped", self.rank),
        }
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take();

        if let Some(handle) = self.send_thread.take() {
            if handle.join().is_err() {
                error!("rank {}: the sender thread panicked", self.rank)
            }
        }
    }
}
