//! Overlay Module Tests
//!
//! Runs real nodes on loopback UDP sockets.
//!
//! ## Test Scopes
//! - **Requests**: ping and value fetch between two nodes, timeouts against silent addresses.
//! - **Bootstrap & Announce**: joining through a starting node and landing in its peer index.
//! - **Lifecycle**: behaviour after the shutdown token fires.

#[cfg(test)]
mod tests {
    use crate::overlay::peers::{PeerIndex, PeerIndexView};
    use crate::overlay::service::{
        AnnounceHandle, DhtNode, MAX_VALUE_SIZE, Overlay, OverlayConfig, OverlayError,
    };
    use crate::overlay::types::{AnnounceStats, Contact, DhtMessage, NodeId, PeerRecord};
    use crate::storage::key::Key;
    use crate::storage::memory::{Item, KeyedStore};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct TestNode {
        node: DhtNode,
        store: Arc<KeyedStore>,
        peers: Arc<PeerIndex>,
        shutdown: CancellationToken,
    }

    async fn start_node(bootstrap_nodes: Vec<SocketAddr>) -> TestNode {
        let store = Arc::new(KeyedStore::new());
        let peers = Arc::new(PeerIndex::new());
        let shutdown = CancellationToken::new();
        let config = OverlayConfig {
            bootstrap_nodes,
            request_timeout: Duration::from_millis(500),
            k: 8,
        };

        let node = DhtNode::bind(
            "127.0.0.1:0".parse().unwrap(),
            config,
            store.clone(),
            peers.clone(),
            shutdown.clone(),
        )
        .await
        .expect("Failed to bind overlay node");
        node.start();

        TestNode {
            node,
            store,
            peers,
            shutdown,
        }
    }

    /// A bound socket that never answers.
    async fn silent_addr() -> (tokio::net::UdpSocket, SocketAddr) {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    // ============================================================
    // REQUEST TESTS
    // ============================================================

    #[tokio::test]
    async fn test_ping_returns_remote_id() {
        let a = start_node(vec![]).await;
        let b = start_node(vec![]).await;

        let id = a.node.ping(b.node.local_addr()).await.unwrap();

        assert_eq!(id, b.node.id());
        // Both sides learn about each other.
        assert_eq!(a.node.nodes().len(), 1);
        assert_eq!(b.node.nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_reads_remote_store() {
        let a = start_node(vec![]).await;
        let b = start_node(vec![]).await;
        let key = Key::encode("alpha").unwrap();
        b.store.put(key, Item::new("v1")).unwrap();

        let peer = PeerRecord {
            addr: b.node.local_addr(),
        };

        let value = a.node.fetch(peer, key).await.unwrap();
        assert_eq!(value, Some(b"v1".to_vec()));

        let missing = a.node.fetch(peer, Key::encode("beta").unwrap()).await.unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_largest_value_fits_one_datagram() {
        let reply = DhtMessage::Value {
            tx: u64::MAX,
            from: NodeId::random(),
            value: Some(vec![b'x'; MAX_VALUE_SIZE]),
        };

        assert_eq!(bincode::serialized_size(&reply).unwrap(), 65_507);
    }

    #[tokio::test]
    async fn test_fetch_of_largest_accepted_value() {
        let a = start_node(vec![]).await;
        let b = start_node(vec![]).await;
        let key = Key::encode("large").unwrap();
        let value = "x".repeat(MAX_VALUE_SIZE);
        b.store.put(key, Item::new(value.clone())).unwrap();

        let fetched = a
            .node
            .fetch(
                PeerRecord {
                    addr: b.node.local_addr(),
                },
                key,
            )
            .await
            .unwrap();

        assert_eq!(fetched, Some(value.into_bytes()));
    }

    #[tokio::test]
    async fn test_fetch_times_out_against_silent_peer() {
        let a = start_node(vec![]).await;
        let (_socket, addr) = silent_addr().await;

        let result = a
            .node
            .fetch(PeerRecord { addr }, Key::encode("alpha").unwrap())
            .await;

        assert!(matches!(result, Err(OverlayError::Timeout(t)) if t == addr));
    }

    // ============================================================
    // BOOTSTRAP & ANNOUNCE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_bootstrap_without_starting_nodes_is_a_no_op() {
        let a = start_node(vec![]).await;

        let stats = a.node.bootstrap().await.unwrap();
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.responded, 0);
    }

    #[tokio::test]
    async fn test_bootstrap_fails_when_nobody_answers() {
        let (_socket, addr) = silent_addr().await;
        let a = start_node(vec![addr]).await;

        let result = a.node.bootstrap().await;
        assert!(matches!(
            result,
            Err(OverlayError::BootstrapFailed { attempted: 1 })
        ));
    }

    #[tokio::test]
    async fn test_announce_lands_in_remote_peer_index() {
        let b = start_node(vec![]).await;
        let a = start_node(vec![b.node.local_addr()]).await;

        let stats = a.node.bootstrap().await.unwrap();
        assert_eq!(stats.responded, 1);

        let key = Key::encode("alpha").unwrap();
        let handle = a.node.announce(key, a.node.local_port()).unwrap();
        let stats = handle.wait().await.unwrap();

        assert_eq!(stats.announced, 1);
        assert_eq!(
            b.peers.peers_for(&key),
            vec![PeerRecord {
                addr: a.node.local_addr()
            }]
        );
        assert!(a.peers.peers_for(&key).is_empty());
    }

    #[tokio::test]
    async fn test_announce_without_contacts_completes_immediately() {
        let a = start_node(vec![]).await;

        let handle = a.node.announce(Key::encode("alone").unwrap(), 1).unwrap();
        assert_eq!(handle.wait().await.unwrap(), AnnounceStats::default());
    }

    #[tokio::test]
    async fn test_announce_drops_unresponsive_contacts() {
        let a = start_node(vec![]).await;
        let (_socket, silent) = silent_addr().await;
        a.node.routing().insert(Contact {
            id: NodeId::random(),
            addr: silent,
        });

        let handle = a.node.announce(Key::encode("beta").unwrap(), 1).unwrap();
        let stats = handle.wait().await.unwrap();

        assert_eq!(stats, AnnounceStats::default());
        assert!(a.node.routing().is_empty());
    }

    #[tokio::test]
    async fn test_status_mentions_peer_index_entries() {
        let b = start_node(vec![]).await;
        let a = start_node(vec![b.node.local_addr()]).await;
        a.node.bootstrap().await.unwrap();

        let key = Key::encode("visible").unwrap();
        a.node.announce(key, a.node.local_port()).unwrap().wait().await.unwrap();

        let status = b.node.status();
        assert!(status.contains(&b.node.id().to_string()));
        assert!(status.contains("peer index: 1 keys, 1 peers"));
        assert!(status.contains("visible ->"));
    }

    // ============================================================
    // LIFECYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_announce_refused_after_shutdown() {
        let a = start_node(vec![]).await;
        a.shutdown.cancel();

        let result = a.node.announce(Key::encode("late").unwrap(), 1);
        assert!(matches!(result, Err(OverlayError::Closed)));
    }

    #[tokio::test]
    async fn test_requests_fail_after_shutdown() {
        let a = start_node(vec![]).await;
        let b = start_node(vec![]).await;
        a.shutdown.cancel();

        let result = a.node.ping(b.node.local_addr()).await;
        assert!(matches!(result, Err(OverlayError::Closed)));
    }

    #[tokio::test]
    async fn test_dropped_announce_sender_reports_abandoned() {
        let (done, handle) = AnnounceHandle::channel();
        drop(done);

        assert!(matches!(handle.wait().await, Err(OverlayError::Abandoned)));
    }
}
