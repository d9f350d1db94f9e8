use crossbeam_channel::{unbounded, Receiver, Sender};

use super::comm::Communicator;

/// An in-process communicator, for a group of ranks running as threads of
/// one program. Each rank has an unbounded inbox; `send` pushes onto the
/// peer's inbox and never blocks.
///
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Vec<u8>>>,
    inbox: Receiver<Vec<u8>>,
}

impl ChannelCommunicator {
    /// Create a fully connected group of `size` communicators. Element `r`
    /// of the returned vector has rank `r`, and is meant to be moved into the
    /// thread which plays that rank.
    ///
    pub fn group(size: usize) -> Vec<Self> {
        let (sinks, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();

        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelCommunicator {
                rank,
                peers: sinks.clone(),
                inbox,
            })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        if self.peers[rank].send(message).is_err() {
            panic!("rank {}: peer {} has hung up", self.rank, rank)
        }
    }

    fn recv(&self) -> Vec<u8> {
        match self.inbox.recv() {
            Ok(message) => message,
            Err(_) => panic!("rank {}: all peers have hung up", self.rank),
        }
    }
}

#[cfg(test)]
mod test {

    use super::ChannelCommunicator;
    use crate::message::comm::Communicator;

    #[test]
    fn messages_arrive_at_the_addressed_rank() {
        let group = ChannelCommunicator::group(3);
        group[0].send(2, vec![7]);
        group[1].send(2, vec![8]);
        group[2].send(0, vec![9]);
        assert_eq!(group[2].recv(), vec![7]);
        assert_eq!(group[2].recv(), vec![8]);
        assert_eq!(group[0].recv(), vec![9]);
        assert!(group.iter().enumerate().all(|(r, c)| c.rank() == r && c.size() == 3));
    }
}
