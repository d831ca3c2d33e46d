//! # Resource Cache Under Contention
//!
//! The cache runs on the real in-memory adapter here, so every created
//! session and reply channel shows up in the broker's own counters.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use mq_broker::InMemoryBroker;
    use mq_bridge::domain::CacheConfig;
    use mq_bridge::{Credential, InMemoryBrokerAdapter, ResourceCache, StaticDirectory};

    use crate::integration::fixtures::{broker, cache, ENDPOINT};

    fn opened(broker: &InMemoryBroker) -> u64 {
        broker.stats().connections_opened.load(Ordering::Relaxed)
    }

    fn channels(broker: &InMemoryBroker) -> u64 {
        broker.stats().temporary_queues_created.load(Ordering::Relaxed)
    }

    #[tokio::test]
    async fn test_repeated_acquisition_returns_same_resources() {
        let broker = broker();
        let cache = cache(&broker);
        let alice = Credential::new("alice", "secret");

        let first = cache.acquire_connection(&alice).await.unwrap();
        let second = cache.acquire_connection(&alice).await.unwrap();
        assert!(first.same_session(&second));

        let channel = cache.acquire_reply_channel(&first, &alice).await.unwrap();
        let again = cache.acquire_reply_channel(&second, &alice).await.unwrap();
        assert_eq!(channel, again);

        assert_eq!(opened(&broker), 1);
        assert_eq!(channels(&broker), 1);
    }

    #[tokio::test]
    async fn test_distinct_credentials_get_distinct_channels() {
        let broker = broker();
        broker.set_allow_anonymous(true);
        let cache = cache(&broker);

        let credentials = [
            Credential::new("alice", "secret"),
            Credential::new("bob", "hunter2"),
            // Same identity, different secret: a different key
            Credential::new("alice", "other"),
        ];

        let mut seen = Vec::new();
        for credential in &credentials {
            let (_, channel) = cache.acquire(credential).await.unwrap();
            assert!(!seen.contains(&channel), "channel reused for {:?}", credential);
            seen.push(channel);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(opened(&broker), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_acquisition_creates_once() {
        let broker = broker();
        let cache = cache(&broker);
        let alice = Credential::new("alice", "secret");

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let alice = alice.clone();
                tokio::spawn(async move { cache.acquire(&alice).await.unwrap() })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        let (handle, channel) = &results[0];
        for (h, c) in &results {
            assert!(h.same_session(handle));
            assert_eq!(c, channel);
        }
        assert_eq!(opened(&broker), 1);
        assert_eq!(channels(&broker), 1);
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.connections_created, 1);
        assert_eq!(snapshot.channels_created, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_many_credentials_in_parallel() {
        let broker = InMemoryBroker::new();
        for i in 0..8 {
            broker.add_user(format!("user-{}", i), format!("pw-{}", i));
        }
        let cache = cache(&broker);

        let tasks: Vec<_> = (0..64)
            .map(|n| {
                let cache = Arc::clone(&cache);
                let credential = Credential::new(format!("user-{}", n % 8), format!("pw-{}", n % 8));
                tokio::spawn(async move { cache.acquire(&credential).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.len(), 8);
        assert_eq!(opened(&broker), 8);
        assert_eq!(channels(&broker), 8);
    }

    #[tokio::test]
    async fn test_rejected_credential_retried_after_fix() {
        let broker = InMemoryBroker::new();
        let cache = cache(&broker);
        let carol = Credential::new("carol", "pw");

        assert!(cache.acquire(&carol).await.is_err());
        broker.add_user("carol", "pw");
        assert!(cache.acquire(&carol).await.is_ok());
        assert_eq!(cache.snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_invalidate_then_acquire_opens_new_session() {
        let broker = broker();
        let cache = cache(&broker);
        let alice = Credential::new("alice", "secret");

        let (old_handle, old_channel) = cache.acquire(&alice).await.unwrap();
        assert!(cache.invalidate(&alice).await);
        assert!(!old_handle.is_open());
        assert!(!broker.has_queue(old_channel.as_str()));

        let (new_handle, new_channel) = cache.acquire(&alice).await.unwrap();
        assert!(!new_handle.same_session(&old_handle));
        assert_ne!(new_channel, old_channel);
        assert_eq!(opened(&broker), 2);
    }

    #[tokio::test]
    async fn test_idle_entries_evicted_by_cleanup_task() {
        let broker = broker();
        let config = CacheConfig {
            idle_ttl: Some(Duration::from_millis(50)),
            ..CacheConfig::default()
        };
        let cache = Arc::new(ResourceCache::with_config(
            Arc::new(StaticDirectory::new(ENDPOINT)),
            Arc::new(InMemoryBrokerAdapter::new(broker.clone())),
            &config,
        ));
        let alice = Credential::new("alice", "secret");
        let bob = Credential::new("bob", "hunter2");

        let (alice_handle, _) = cache.acquire(&alice).await.unwrap();
        let cleanup = tokio::spawn(mq_bridge::cache::cleanup_task(
            Arc::clone(&cache),
            Duration::from_millis(20),
        ));

        // Keep bob busy while alice goes idle
        for _ in 0..10 {
            cache.acquire(&bob).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cleanup.abort();

        assert!(!cache.contains(&alice));
        assert!(!alice_handle.is_open());
        assert!(cache.contains(&bob));
        assert!(cache.snapshot().evictions >= 1);
    }

    #[tokio::test]
    async fn test_close_all_closes_every_session() {
        let broker = broker();
        let cache = cache(&broker);
        let (a, _) = cache.acquire(&Credential::new("alice", "secret")).await.unwrap();
        let (b, _) = cache.acquire(&Credential::new("bob", "hunter2")).await.unwrap();

        cache.close_all().await;
        assert!(cache.is_empty());
        assert!(!a.is_open());
        assert!(!b.is_open());
    }
}
