use meshroom_core::{IceCandidate, SessionDescription};
use tokio::sync::oneshot;

/// Work items for a single peer's worker, processed strictly in arrival order.
#[derive(Debug)]
pub enum PeerCommand {
    CreateOffer,
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
    /// Answered once every command queued before it has been handled.
    Barrier(oneshot::Sender<()>),
    /// Releases the session and stops the worker.
    Shutdown,
}
