/// Interface for a group of processes that can exchange raw messages. The
/// underlying transport can be in-process channels, TCP, or a higher level
/// abstraction like MPI. Framing, tagging and collectives are layered on top
/// of this by the [`Controller`](super::controller::Controller).
///
/// Transport failures are fatal: implementations panic rather than return
/// errors from `send` or `recv`.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator, including this one.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, rank: usize, message: Vec<u8>);

    /// Must be implemented to receive a message from any of the peers. This
    /// method is allowed to block until a message is ready to be received.
    fn recv(&self) -> Vec<u8>;
}
