//! Vellum Test Utilities
//!
//! Shared test infrastructure for the Vellum workspace:
//! - A scripted coordination store that counts calls, can hold fetches
//!   behind a gate, and replays scripted failures or responses
//! - Proptest generators for keys and schemas
//! - Schema fixtures
//! - Assertions for Vellum-specific error shapes

pub use vellum_core::{
    ArtifactVersion, CoordinationError, FieldDefinition, IndexSchema, KeyScope, RefreshConfig,
    SimilarityConfig, Snapshot, SnapshotKey, VellumError, VellumResult, Versioned, UNVERSIONED,
};
pub use vellum_storage::{CoordinationResult, CoordinationStore, InMemoryCoordinationStore};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

// ============================================================================
// SCRIPTED STORE
// ============================================================================

/// Coordination store double with call counting, a fetch gate, and scripted
/// responses layered over an [`InMemoryCoordinationStore`].
///
/// Scripted failures take precedence over scripted responses; both are
/// consumed one per fetch. With nothing scripted the fetch reads the inner
/// store.
pub struct ScriptedStore<A> {
    inner: InMemoryCoordinationStore<A>,
    fetch_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
    failures: Mutex<VecDeque<CoordinationError>>,
    responses: Mutex<VecDeque<Versioned<A>>>,
}

impl<A: Send + Sync + 'static> Default for ScriptedStore<A> {
    fn default() -> Self {
        Self {
            inner: InMemoryCoordinationStore::new(),
            fetch_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            failures: Mutex::new(VecDeque::new()),
            responses: Mutex::new(VecDeque::new()),
        }
    }
}

impl<A: Send + Sync + 'static> ScriptedStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing in-memory store.
    pub fn inner(&self) -> &InMemoryCoordinationStore<A> {
        &self.inner
    }

    /// Set the stored artifact for `key` to an exact version.
    pub async fn set(&self, key: &SnapshotKey, version: ArtifactVersion, artifact: A) {
        self.inner.insert_at(key.clone(), version, Arc::new(artifact)).await;
    }

    pub fn set_available(&self, available: bool) {
        self.inner.set_available(available);
    }

    /// Number of `fetch_latest` calls so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `current_version` calls so far.
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Hold every subsequent fetch until [`open_gate`](Self::open_gate).
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Release every held fetch.
    pub fn open_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    /// Fail the next fetch with `error`.
    pub async fn fail_next(&self, error: CoordinationError) {
        self.failures.lock().await.push_back(error);
    }

    /// Answer the next fetch with `version` regardless of the inner store.
    pub async fn respond_next(&self, version: ArtifactVersion, artifact: A) {
        self.responses
            .lock()
            .await
            .push_back(Versioned::new(version, Arc::new(artifact)));
    }

    /// Wait until at least `n` fetches have started, up to `within`.
    pub async fn wait_for_fetch_calls(&self, n: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while self.fetch_calls() < n {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }

    async fn wait_at_gate(&self) {
        if !self.gated.load(Ordering::SeqCst) {
            return;
        }
        let mut notified = std::pin::pin!(self.gate.notified());
        notified.as_mut().enable();
        if self.gated.load(Ordering::SeqCst) {
            notified.await;
        }
    }
}

#[async_trait]
impl<A: Send + Sync + 'static> CoordinationStore<A> for ScriptedStore<A> {
    async fn fetch_latest(
        &self,
        key: &SnapshotKey,
        min_version: ArtifactVersion,
    ) -> CoordinationResult<Versioned<A>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_at_gate().await;

        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        if let Some(response) = self.responses.lock().await.pop_front() {
            return Ok(response);
        }
        self.inner.fetch_latest(key, min_version).await
    }

    async fn current_version(
        &self,
        key: &SnapshotKey,
    ) -> CoordinationResult<Option<ArtifactVersion>> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.current_version(key).await
    }

    async fn publish(
        &self,
        key: &SnapshotKey,
        artifact: Arc<A>,
        expected_version: Option<ArtifactVersion>,
    ) -> CoordinationResult<ArtifactVersion> {
        self.inner.publish(key, artifact, expected_version).await
    }

    async fn health_check(&self) -> CoordinationResult<()> {
        self.inner.health_check().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Vellum types.

    use super::*;
    use proptest::prelude::*;

    /// A valid key name.
    pub fn arb_key_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,23}"
    }

    pub fn arb_scope() -> impl Strategy<Value = KeyScope> {
        prop_oneof![Just(KeyScope::Core), Just(KeyScope::Collection)]
    }

    pub fn arb_key() -> impl Strategy<Value = SnapshotKey> {
        (arb_scope(), arb_key_name()).prop_filter_map("valid key", |(scope, name)| {
            SnapshotKey::new(scope, name).ok()
        })
    }

    /// A version demand, including the "no obligation" range.
    pub fn arb_min_version() -> impl Strategy<Value = ArtifactVersion> {
        prop_oneof![Just(UNVERSIONED), Just(0), 1..500i32]
    }

    pub fn arb_field_type() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("string".to_string()),
            Just("text_general".to_string()),
            Just("pint".to_string()),
            Just("plong".to_string()),
            Just("pdate".to_string()),
            Just("boolean".to_string()),
        ]
    }

    pub fn arb_field(name: String) -> impl Strategy<Value = FieldDefinition> {
        (arb_field_type(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            move |(field_type, indexed, stored, required, multi_valued)| FieldDefinition {
                name: name.clone(),
                field_type,
                indexed,
                stored,
                required,
                multi_valued,
            },
        )
    }

    /// A schema that passes validation: unique field names with `id` as the
    /// unique key.
    pub fn arb_valid_schema() -> impl Strategy<Value = IndexSchema> {
        (
            arb_key_name(),
            prop::collection::btree_set("[a-z][a-z0-9_]{0,15}", 0..8),
            prop_oneof![Just(1.5f32), Just(1.6f32), Just(1.7f32)],
            any::<bool>(),
        )
            .prop_map(|(name, extra, format_version, managed)| {
                let mut schema = IndexSchema::new(name, "id")
                    .with_format_version(format_version)
                    .with_field(FieldDefinition::new("id", "string").required());
                for field in extra.into_iter().filter(|f| f != "id") {
                    schema = schema.with_field(FieldDefinition::new(field, "text_general"));
                }
                schema.managed = managed;
                schema
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Common schemas and keys.

    use super::*;

    /// Managed schema named `name` with an `id` unique key and a title field.
    pub fn schema_fixture(name: &str) -> IndexSchema {
        IndexSchema::new(name, "id")
            .with_field(FieldDefinition::new("id", "string").required())
            .with_field(FieldDefinition::new("title", "text_general"))
            .with_field(FieldDefinition::new("tags", "string").multi_valued())
    }

    /// Schema that is not coordination-managed.
    pub fn unmanaged_schema(name: &str) -> IndexSchema {
        schema_fixture(name).unmanaged()
    }

    pub fn books_schema() -> IndexSchema {
        schema_fixture("books").with_similarity(
            SimilarityConfig::new("solr.BM25SimilarityFactory")
                .with_param("k1", 1.2)
                .with_param("b", 0.75),
        )
    }

    /// `collections/<name>`. Panics on an invalid name.
    pub fn collection_key(name: &str) -> SnapshotKey {
        match SnapshotKey::collection(name) {
            Ok(key) => key,
            Err(e) => panic!("invalid fixture key {name}: {e}"),
        }
    }

    /// `cores/<name>`. Panics on an invalid name.
    pub fn core_key(name: &str) -> SnapshotKey {
        match SnapshotKey::core(name) {
            Ok(key) => key,
            Err(e) => panic!("invalid fixture key {name}: {e}"),
        }
    }

    /// Refresh config with a short fetch timeout for tests.
    pub fn fast_config() -> RefreshConfig {
        RefreshConfig::default().with_fetch_timeout(Duration::from_millis(500))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Vellum result shapes.

    use super::*;

    pub fn assert_version(result: &VellumResult<ArtifactVersion>, expected: ArtifactVersion) {
        match result {
            Ok(v) => assert_eq!(*v, expected, "unexpected version"),
            Err(e) => panic!("expected version {expected}, got error: {e}"),
        }
    }

    /// Assert a refresh failure that still reports `last_known`.
    pub fn assert_refresh_unavailable<T: std::fmt::Debug>(
        result: &VellumResult<T>,
        last_known: ArtifactVersion,
    ) {
        match result {
            Err(VellumError::RefreshUnavailable {
                last_known_version, ..
            }) => assert_eq!(*last_known_version, last_known, "unexpected last known version"),
            other => panic!("expected RefreshUnavailable, got {other:?}"),
        }
    }

    pub fn assert_timeout<T: std::fmt::Debug>(result: &VellumResult<T>) {
        assert!(
            matches!(
                result.as_ref().err().and_then(VellumError::coordination),
                Some(CoordinationError::Timeout { .. })
            ),
            "expected timeout, got {result:?}"
        );
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &VellumResult<T>) {
        assert!(
            matches!(
                result,
                Err(VellumError::Coordination(CoordinationError::NotFound { .. }))
            ),
            "expected NotFound, got {result:?}"
        );
    }
}
