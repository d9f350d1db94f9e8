use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::comm::Communicator;
use super::util;
use crate::error::Error;

/// The kind of collective operation a message belongs to.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Broadcast,
    Reduce,
    AllToAll,
}

/// Identifies the collective operation a message belongs to. Every rank
/// numbers its collective calls in the same order, so the epoch names one
/// call and messages from consecutive collectives never mix.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub kind: Kind,
    pub epoch: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    source: usize,
    tag: Tag,
    payload: Vec<u8>,
}

/// A handle to a group of processes, layered over an injected
/// [`Communicator`]. Messages are framed in tagged envelopes and encoded with
/// MessagePack. Envelopes which arrive before they are needed are held in a
/// pending buffer, so peers may run ahead by any number of collectives.
///
/// Every collective must be called by all ranks of the group, in the same
/// order.
///
pub struct Controller {
    comm: Box<dyn Communicator + Send>,
    pending: Vec<Envelope>,
    epoch: u64,
}

impl Controller {
    pub fn new<C: Communicator + Send + 'static>(comm: C) -> Self {
        Self {
            comm: Box::new(comm),
            pending: Vec::new(),
            epoch: 0,
        }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Block until every rank has entered the barrier.
    ///
    pub fn barrier(&mut self) -> Result<(), Error> {
        self.all_reduce((), |(), ()| ())
    }

    /// Binomial tree broadcast from rank 0. The value must be `Some` on rank
    /// 0, and is ignored elsewhere.
    ///
    pub fn broadcast<T>(&mut self, value: Option<T>) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
    {
        let tag = self.next_tag(Kind::Broadcast);
        let r = self.rank();
        let p = self.size();

        let (value, bytes) = if r == 0 {
            let value = value.ok_or_else(|| {
                Error::ProtocolMismatch("broadcast root was not given a value".to_string())
            })?;
            let bytes = rmp_serde::to_vec(&value)?;
            (Some(value), bytes)
        } else {
            let parent = r & (r - 1);
            (None, self.recv_bytes(parent, tag)?)
        };

        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send_bytes(r + one, tag, bytes.clone())?
            }
        }
        match value {
            Some(value) => Ok(value),
            None => Ok(rmp_serde::from_slice(&bytes)?),
        }
    }

    /// Binomial tree reduce to rank 0, with a commutative and associative
    /// operator. All ranks return `None` except for the root.
    ///
    pub fn reduce<T, F>(&mut self, value: T, f: F) -> Result<Option<T>, Error>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(T, T) -> T,
    {
        let tag = self.next_tag(Kind::Reduce);
        let r = self.rank();
        let p = self.size();
        let mut value = value;

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    let other = rmp_serde::from_slice(&self.recv_bytes(r + one, tag)?)?;
                    value = f(value, other)
                }
            } else {
                self.send_bytes(r - one, tag, rmp_serde::to_vec(&value)?)?;
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Reduce followed by broadcast; every rank returns the reduced value.
    ///
    pub fn all_reduce<T, F>(&mut self, value: T, f: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(T, T) -> T,
    {
        let reduced = self.reduce(value, f)?;
        self.broadcast(reduced)
    }

    /// Personalized all-to-all exchange. `outgoing` has one entry per rank;
    /// entry `r` is delivered to rank `r`. Returns the entries received,
    /// indexed by source rank (this rank's own entry is passed through).
    /// Every pair of ranks exchanges a message, even if it carries an empty
    /// batch.
    ///
    pub fn all_to_all<T>(&mut self, outgoing: Vec<T>) -> Result<Vec<T>, Error>
    where
        T: Serialize + DeserializeOwned,
    {
        assert_eq!(outgoing.len(), self.size(), "all_to_all needs one entry per rank");

        let tag = self.next_tag(Kind::AllToAll);
        let rank = self.rank();
        let mut own = None;

        for (peer, value) in outgoing.into_iter().enumerate() {
            if peer == rank {
                own = Some(value)
            } else {
                self.send_bytes(peer, tag, rmp_serde::to_vec(&value)?)?
            }
        }
        let mut incoming = Vec::with_capacity(self.size());

        for peer in 0..self.size() {
            if peer == rank {
                incoming.push(own.take().ok_or_else(|| {
                    Error::ProtocolMismatch("missing own all_to_all entry".to_string())
                })?)
            } else {
                incoming.push(rmp_serde::from_slice(&self.recv_bytes(peer, tag)?)?)
            }
        }
        Ok(incoming)
    }

    fn next_tag(&mut self, kind: Kind) -> Tag {
        self.epoch += 1;
        Tag { kind, epoch: self.epoch }
    }

    fn send_bytes(&self, rank: usize, tag: Tag, payload: Vec<u8>) -> Result<(), Error> {
        let envelope = Envelope { source: self.rank(), tag, payload };
        trace!("rank {} -> {}: {:?} ({} bytes)", self.rank(), rank, tag, envelope.payload.len());
        self.comm.send(rank, rmp_serde::to_vec(&envelope)?);
        Ok(())
    }

    /// Return the payload of the envelope from `source` with the given tag,
    /// receiving (and holding onto) other envelopes until it arrives.
    ///
    fn recv_bytes(&mut self, source: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        if let Some(n) = self.pending.iter().position(|e| e.source == source && e.tag == tag) {
            return Ok(self.pending.remove(n).payload);
        }
        loop {
            let envelope: Envelope = rmp_serde::from_slice(&self.comm.recv())?;

            if envelope.source >= self.size() || envelope.source == self.rank() {
                return Err(Error::UnexpectedPeer(envelope.source));
            }
            if envelope.tag.epoch < tag.epoch || (envelope.tag.epoch == tag.epoch && envelope.tag.kind != tag.kind) {
                return Err(Error::ProtocolMismatch(format!(
                    "rank {} waiting for {:?} got {:?} from rank {}",
                    self.rank(), tag, envelope.tag, envelope.source
                )));
            }
            if envelope.source == source && envelope.tag == tag {
                return Ok(envelope.payload);
            }
            debug!("rank {}: holding {:?} from rank {}", self.rank(), envelope.tag, envelope.source);
            self.pending.push(envelope)
        }
    }
}
