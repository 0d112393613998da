//! Single shared database connection with time based expiry.
//!
//! The manager keeps at most one live session. It is created lazily and
//! replaced when it reports closed or outlives the configured TTL. Access is
//! serialized through an async mutex, so a caller holding the returned guard
//! has exclusive use of the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use serde::Serialize;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::executor::Row;

/// An open database session.
#[async_trait]
pub trait SpatialSession: Send {
    /// Whether the session can no longer be used.
    fn is_closed(&self) -> bool;

    /// Marks the session unusable; the manager replaces it on next use.
    fn mark_closed(&mut self);

    /// Runs `sql` and returns every row.
    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>>;

    /// Ends the current unit of work so the session is idle again.
    async fn commit(&mut self) -> AppResult<()>;
}

/// Opens new sessions on demand.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    type Session: SpatialSession + 'static;

    async fn provision(&self) -> AppResult<Self::Session>;
}

/// Decides when a session is too old to keep.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    ttl: Duration,
}

impl ExpiryPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// A session expires once strictly more than `ttl` has elapsed.
    pub fn is_expired(&self, created_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(created_at) > self.ttl
    }
}

/// A session together with its bookkeeping.
pub struct ManagedConnection<S> {
    session: S,
    created_at: Instant,
    generation: u64,
}

impl<S: SpatialSession> ManagedConnection<S> {
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Identity of the session: increases by one with every (re)creation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Point in time view of the managed connection, for health reporting.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ConnectionStatus {
    /// Whether a session is currently held.
    pub open: bool,
    /// A query currently holds the session.
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,
}

pub struct ConnectionManager<P: Provisioner> {
    provisioner: P,
    policy: ExpiryPolicy,
    slot: Mutex<Option<ManagedConnection<P::Session>>>,
    generations: AtomicU64,
}

impl<P: Provisioner> ConnectionManager<P> {
    pub fn new(provisioner: P, policy: ExpiryPolicy) -> Self {
        Self {
            provisioner,
            policy,
            slot: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// Returns the shared connection, creating or replacing it as needed.
    ///
    /// The guard holds the connection lock until dropped. A failed creation
    /// leaves the slot empty, so the next call tries again.
    pub async fn get_connection(&self) -> AppResult<MappedMutexGuard<'_, ManagedConnection<P::Session>>> {
        let mut slot = self.slot.lock().await;

        let reason = match slot.as_ref() {
            None => Some("absent"),
            Some(conn) if conn.session.is_closed() => Some("closed"),
            Some(conn) if self.policy.is_expired(conn.created_at, Instant::now()) => Some("expired"),
            Some(_) => None,
        };

        if let Some(reason) = reason {
            if let Some(old) = slot.take() {
                tracing::info!(generation = old.generation, reason, "Dropping PostGIS connection");
            }

            let session = self.provisioner.provision().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to PostGIS");
                e
            })?;
            let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
            *slot = Some(ManagedConnection {
                session,
                created_at: Instant::now(),
                generation,
            });
            tracing::info!(generation, reason, "New PostGIS connection established");
        }

        MutexGuard::try_map(slot, |slot| slot.as_mut())
            .map_err(|_| AppError::DatabaseConnection("connection slot is empty".into()))
    }

    /// Reports the current connection without opening one or waiting on a
    /// running query.
    pub fn status(&self) -> ConnectionStatus {
        match self.slot.try_lock() {
            Ok(slot) => match slot.as_ref() {
                Some(conn) => ConnectionStatus {
                    open: !conn.session.is_closed(),
                    busy: false,
                    generation: Some(conn.generation),
                    age_secs: Some(conn.created_at.elapsed().as_secs()),
                },
                None => ConnectionStatus::default(),
            },
            Err(_) => ConnectionStatus {
                open: true,
                busy: true,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct FakeSession {
        closed: bool,
    }

    #[async_trait]
    impl SpatialSession for FakeSession {
        fn is_closed(&self) -> bool {
            self.closed
        }

        fn mark_closed(&mut self) {
            self.closed = true;
        }

        async fn fetch_all(&mut self, _sql: &str) -> AppResult<Vec<Row>> {
            Ok(vec![])
        }

        async fn commit(&mut self) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeProvisioner {
        created: Arc<AtomicUsize>,
        fail: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Provisioner for FakeProvisioner {
        type Session = FakeSession;

        async fn provision(&self) -> AppResult<FakeSession> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::DatabaseConnection("instance unreachable".into()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession { closed: false })
        }
    }

    fn manager(provisioner: FakeProvisioner) -> ConnectionManager<FakeProvisioner> {
        ConnectionManager::new(provisioner, ExpiryPolicy::new(Duration::from_secs(3540)))
    }

    async fn generation(manager: &ConnectionManager<FakeProvisioner>) -> u64 {
        manager.get_connection().await.unwrap().generation()
    }

    #[test]
    fn test_expiry_policy_boundary() {
        let policy = ExpiryPolicy::new(Duration::from_secs(3540));
        let created = Instant::now();
        assert!(!policy.is_expired(created, created));
        assert!(!policy.is_expired(created, created + Duration::from_secs(3540)));
        assert!(policy.is_expired(created, created + Duration::from_secs(3541)));
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let provisioner = FakeProvisioner::default();
        let manager = manager(provisioner.clone());
        assert_eq!(provisioner.created.load(Ordering::SeqCst), 0);
        assert!(!manager.status().open);

        assert_eq!(generation(&manager).await, 1);
        assert_eq!(provisioner.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_handle_within_ttl() {
        let provisioner = FakeProvisioner::default();
        let manager = manager(provisioner.clone());

        let first = generation(&manager).await;
        tokio::time::advance(Duration::from_secs(3539)).await;
        let second = generation(&manager).await;

        assert_eq!(first, second);
        assert_eq!(provisioner.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_handle_after_ttl() {
        let provisioner = FakeProvisioner::default();
        let manager = manager(provisioner.clone());

        let first = generation(&manager).await;
        tokio::time::advance(Duration::from_secs(3541)).await;
        let second = generation(&manager).await;

        assert_ne!(first, second);
        assert_eq!(provisioner.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_session_is_replaced() {
        let provisioner = FakeProvisioner::default();
        let manager = manager(provisioner.clone());

        {
            let mut conn = manager.get_connection().await.unwrap();
            conn.session_mut().mark_closed();
        }

        assert_eq!(generation(&manager).await, 2);
        assert_eq!(provisioner.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_creation_is_not_cached() {
        let provisioner = FakeProvisioner::default();
        let manager = manager(provisioner.clone());

        provisioner.fail.store(true, Ordering::SeqCst);
        let err = manager.get_connection().await.err().unwrap();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
        assert!(!manager.status().open);

        provisioner.fail.store(false, Ordering::SeqCst);
        assert_eq!(generation(&manager).await, 1);
    }

    #[tokio::test]
    async fn test_status_reports_busy_while_guard_held() {
        let manager = manager(FakeProvisioner::default());
        let guard = manager.get_connection().await.unwrap();
        assert!(manager.status().busy);
        drop(guard);

        let status = manager.status();
        assert!(status.open);
        assert!(!status.busy);
        assert_eq!(status.generation, Some(1));
    }
}
