//! Directory of remote participants currently connected to the session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use voicectl_core::ParticipantIdentity;

/// Connected participants in join order.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    peers: Arc<watch::Sender<Vec<ParticipantIdentity>>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        let (peers, _) = watch::channel(Vec::new());
        Self {
            peers: Arc::new(peers),
        }
    }

    /// Record a join. Rejoining keeps the original position.
    pub fn join(&self, identity: ParticipantIdentity) {
        self.peers.send_if_modified(|peers| {
            if peers.contains(&identity) {
                false
            } else {
                peers.push(identity);
                true
            }
        });
    }

    pub fn leave(&self, identity: &ParticipantIdentity) {
        self.peers.send_if_modified(|peers| {
            let before = peers.len();
            peers.retain(|p| p != identity);
            peers.len() != before
        });
    }

    /// Forget every participant.
    pub fn clear(&self) {
        self.peers.send_if_modified(|peers| {
            let changed = !peers.is_empty();
            peers.clear();
            changed
        });
    }

    /// Earliest-joined participant still connected.
    pub fn first(&self) -> Option<ParticipantIdentity> {
        self.peers.borrow().first().cloned()
    }

    pub fn contains(&self, identity: &ParticipantIdentity) -> bool {
        self.peers.borrow().contains(identity)
    }

    pub fn snapshot(&self) -> Vec<ParticipantIdentity> {
        self.peers.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.peers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.borrow().is_empty()
    }

    /// Wait until a participant matching `predicate` is connected and return it.
    pub async fn wait_for<F>(&self, within: Duration, predicate: F) -> Option<ParticipantIdentity>
    where
        F: Fn(&ParticipantIdentity) -> bool,
    {
        let mut rx = self.peers.subscribe();
        let found = tokio::time::timeout(within, async {
            match rx.wait_for(|peers| peers.iter().any(&predicate)).await {
                Ok(peers) => peers.iter().find(|&p| predicate(p)).cloned(),
                Err(_) => None,
            }
        })
        .await;
        found.ok().flatten()
    }
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_is_earliest_joined() {
        let directory = PeerDirectory::new();
        directory.join("board-a".into());
        directory.join("board-b".into());
        directory.join("board-a".into());

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.first(), Some("board-a".into()));

        directory.leave(&"board-a".into());
        assert_eq!(directory.first(), Some("board-b".into()));
        assert!(!directory.contains(&"board-a".into()));
    }

    #[test]
    fn test_clear_forgets_everyone() {
        let directory = PeerDirectory::new();
        directory.join("board-a".into());
        directory.join("board-b".into());

        directory.clear();
        assert!(directory.is_empty());
        assert_eq!(directory.first(), None);
    }

    #[tokio::test]
    async fn test_wait_for_sees_later_join() {
        let directory = PeerDirectory::new();
        let writer = directory.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.join("esp32-board".into());
        });

        let board = ParticipantIdentity::new("esp32-board");
        let found = directory
            .wait_for(Duration::from_secs(5), |p| *p == board)
            .await;
        assert_eq!(found, Some(board));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let directory = PeerDirectory::new();
        let found = directory.wait_for(Duration::from_secs(1), |_| true).await;
        assert!(found.is_none());
    }
}
