//! In-process graph backend.
//!
//! Transactions are serialized: [`MemoryStore::begin`] takes an owned lock on
//! the graph and works on a copy, which replaces the shared state only on
//! commit. Every transaction call is counted per [`Operation`], and any
//! operation can be made to fail, so callers can assert exactly which
//! storage calls a request made.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use provgraph_core::{
    EntityRecord, EntityTypeDescriptor, IndexKind, Properties, ProvenanceRecord, RecordSchema,
    RelationshipRecord, RelationshipTypeDescriptor, SourceKey,
};
use provgraph_filter::Predicate;

use crate::client::GraphError;
use crate::store::{Endpoint, GraphStore, GraphTxn, SOURCE_LABEL};

/// A countable storage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Begin,
    Commit,
    Rollback,
    UpsertSource,
    Create,
    FindOne,
    CreateRelationship,
    Run,
    RunRelationships,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Begin,
        Operation::Commit,
        Operation::Rollback,
        Operation::UpsertSource,
        Operation::Create,
        Operation::FindOne,
        Operation::CreateRelationship,
        Operation::Run,
        Operation::RunRelationships,
        Operation::Delete,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn bit(self) -> u32 {
        1 << self.index()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Begin => "begin",
            Operation::Commit => "commit",
            Operation::Rollback => "rollback",
            Operation::UpsertSource => "upsert_source",
            Operation::Create => "create",
            Operation::FindOne => "find_one",
            Operation::CreateRelationship => "create_relationship",
            Operation::Run => "run",
            Operation::RunRelationships => "run_relationships",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    entities: BTreeMap<String, Vec<EntityRecord>>,
    relationships: Vec<RelationshipRecord>,
    sources: BTreeMap<SourceKey, ProvenanceRecord>,
}

#[derive(Debug, Default)]
struct Instrumentation {
    calls: [AtomicUsize; 10],
    faults: AtomicU32,
}

impl Instrumentation {
    fn record(&self, op: Operation) -> Result<(), GraphError> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        if self.faults.load(Ordering::SeqCst) & op.bit() != 0 {
            return Err(GraphError::Backend(format!("injected {} failure", op.as_str())));
        }
        Ok(())
    }
}

/// Shared in-memory graph. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<GraphState>>,
    instruments: Arc<Instrumentation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: Operation) -> usize {
        self.instruments.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Calls that touched stored data (everything but transaction control).
    pub fn data_calls(&self) -> usize {
        Operation::ALL
            .iter()
            .filter(|op| !matches!(op, Operation::Begin | Operation::Commit | Operation::Rollback))
            .map(|op| self.calls(*op))
            .sum()
    }

    /// Make every later call of `op` fail with a backend error.
    pub fn fail_on(&self, op: Operation) {
        self.instruments.faults.fetch_or(op.bit(), Ordering::SeqCst);
    }

    pub fn clear_faults(&self) {
        self.instruments.faults.store(0, Ordering::SeqCst);
    }

    /// Committed entities of one type.
    pub async fn entities(&self, type_name: &str) -> Vec<EntityRecord> {
        let state = self.state.lock().await;
        state.entities.get(type_name).cloned().unwrap_or_default()
    }

    /// Committed relationships of every type.
    pub async fn relationships(&self) -> Vec<RelationshipRecord> {
        self.state.lock().await.relationships.clone()
    }

    /// Committed source nodes.
    pub async fn sources(&self) -> Vec<ProvenanceRecord> {
        self.state.lock().await.sources.values().cloned().collect()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn GraphTxn>, GraphError> {
        self.instruments.record(Operation::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTxn {
            guard,
            working,
            instruments: self.instruments.clone(),
        }))
    }
}

pub struct MemoryTxn {
    guard: OwnedMutexGuard<GraphState>,
    working: GraphState,
    instruments: Arc<Instrumentation>,
}

impl MemoryTxn {
    fn find(&self, type_name: &str, field: &str, value: &str) -> Option<&EntityRecord> {
        self.working
            .entities
            .get(type_name)?
            .iter()
            .find(|e| e.key_value(field).as_deref() == Some(value))
    }

    /// Primary and unique fields must not repeat within a type.
    fn check_unique(
        &self,
        descriptor: &EntityTypeDescriptor,
        properties: &Properties,
    ) -> Result<(), GraphError> {
        let candidate = EntityRecord::new(descriptor.name(), properties.clone());
        for field in descriptor.fields() {
            if !matches!(field.index, IndexKind::Primary | IndexKind::Unique) {
                continue;
            }
            let Some(value) = candidate.key_value(field.name) else {
                continue;
            };
            if self.find(descriptor.name(), field.name, &value).is_some() {
                return Err(GraphError::Conflict {
                    label: descriptor.name().to_string(),
                    field: field.name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GraphTxn for MemoryTxn {
    async fn upsert_source(&mut self, source: &ProvenanceRecord) -> Result<SourceKey, GraphError> {
        self.instruments.record(Operation::UpsertSource)?;
        let key = source.key();
        self.working
            .sources
            .entry(key.clone())
            .and_modify(|existing| {
                existing.confidence = source.confidence;
                existing.timestamp = source.timestamp;
            })
            .or_insert_with(|| source.clone());
        Ok(key)
    }

    async fn create(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        properties: &Properties,
        sources: &[SourceKey],
    ) -> Result<EntityRecord, GraphError> {
        self.instruments.record(Operation::Create)?;
        self.check_unique(descriptor, properties)?;
        if let Some(missing) = sources.iter().find(|k| !self.working.sources.contains_key(*k)) {
            return Err(GraphError::NotFound {
                label: SOURCE_LABEL.into(),
                field: "key".into(),
                value: missing.0.clone(),
            });
        }

        let mut record = EntityRecord::new(descriptor.name(), properties.clone());
        record.sources = sources.iter().map(|k| k.0.clone()).collect();
        self.working
            .entities
            .entry(descriptor.name().to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn find_one(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        field: &str,
        value: &str,
    ) -> Result<Option<EntityRecord>, GraphError> {
        self.instruments.record(Operation::FindOne)?;
        Ok(self.find(descriptor.name(), field, value).cloned())
    }

    async fn create_relationship(
        &mut self,
        descriptor: &RelationshipTypeDescriptor,
        from: Endpoint<'_>,
        to: Endpoint<'_>,
        properties: &Properties,
        sources: &[SourceKey],
    ) -> Result<RelationshipRecord, GraphError> {
        self.instruments.record(Operation::CreateRelationship)?;
        for end in [&from, &to] {
            if self.find(end.descriptor.name(), end.key_field, end.id).is_none() {
                return Err(GraphError::NotFound {
                    label: end.descriptor.name().to_string(),
                    field: end.key_field.to_string(),
                    value: end.id.to_string(),
                });
            }
        }

        let record = RelationshipRecord {
            id: uuid::Uuid::new_v4().to_string(),
            relationship_type: descriptor.name().to_string(),
            from: from.to_ref(),
            to: to.to_ref(),
            properties: properties.clone(),
            sources: sources.iter().map(|k| k.0.clone()).collect(),
            created_at: chrono::Utc::now(),
        };
        self.working.relationships.push(record.clone());
        Ok(record)
    }

    async fn run(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, GraphError> {
        self.instruments.record(Operation::Run)?;
        Ok(self
            .working
            .entities
            .get(descriptor.name())
            .map(|records| {
                records
                    .iter()
                    .filter(|r| predicate.map_or(true, |p| p.matches(&r.properties)))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn run_relationships(
        &mut self,
        descriptor: &RelationshipTypeDescriptor,
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<RelationshipRecord>, GraphError> {
        self.instruments.record(Operation::RunRelationships)?;
        Ok(self
            .working
            .relationships
            .iter()
            .filter(|r| r.relationship_type == descriptor.type_name())
            .filter(|r| predicate.map_or(true, |p| p.matches(&r.properties)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        field: &str,
        value: &str,
    ) -> Result<bool, GraphError> {
        self.instruments.record(Operation::Delete)?;
        let Some(records) = self.working.entities.get_mut(descriptor.name()) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|e| e.key_value(field).as_deref() != Some(value));
        let deleted = records.len() != before;

        if deleted {
            let touches = |end: &provgraph_core::EntityRef| {
                end.entity_type == descriptor.name() && end.key_field == field && end.id == value
            };
            self.working
                .relationships
                .retain(|r| !touches(&r.from) && !touches(&r.to));
        }
        Ok(deleted)
    }

    async fn commit(self: Box<Self>) -> Result<(), GraphError> {
        self.instruments.record(Operation::Commit)?;
        let MemoryTxn {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), GraphError> {
        self.instruments.record(Operation::Rollback)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provgraph_core::{catalog, SourceKind};
    use provgraph_filter::{compile, CompileOptions};
    use serde_json::json;

    fn props(v: serde_json::Value) -> Properties {
        v.as_object().cloned().unwrap()
    }

    fn source() -> ProvenanceRecord {
        ProvenanceRecord::new(SourceKind::Ldap, "cn=alice")
    }

    async fn seed(store: &MemoryStore, email: &str, title: &str) {
        let person = catalog::person();
        let mut txn = store.begin().await.unwrap();
        let key = txn.upsert_source(&source()).await.unwrap();
        txn.create(
            &person,
            &props(json!({"email": email, "name": "X", "title": title})),
            &[key],
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn commit_publishes_and_rollback_discards() {
        let store = MemoryStore::new();
        seed(&store, "alice@co.com", "Engineer").await;
        assert_eq!(store.entities("Person").await.len(), 1);
        assert_eq!(store.sources().await.len(), 1);

        let person = catalog::person();
        let mut txn = store.begin().await.unwrap();
        txn.create(&person, &props(json!({"email": "bob@co.com", "name": "B"})), &[])
            .await
            .unwrap();
        txn.rollback().await.unwrap();
        assert_eq!(store.entities("Person").await.len(), 1);
        assert_eq!(store.calls(Operation::Commit), 1);
        assert_eq!(store.calls(Operation::Rollback), 1);
    }

    #[tokio::test]
    async fn primary_keys_are_unique() {
        let store = MemoryStore::new();
        seed(&store, "alice@co.com", "Engineer").await;
        let mut txn = store.begin().await.unwrap();
        let err = txn
            .create(
                &catalog::person(),
                &props(json!({"email": "alice@co.com", "name": "Again"})),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Conflict { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn run_filters_and_limits() {
        let store = MemoryStore::new();
        seed(&store, "alice@co.com", "Engineer").await;
        seed(&store, "bob@co.com", "Engineer").await;
        seed(&store, "carol@co.com", "Manager").await;

        let person = catalog::person();
        let engineers = compile("title == 'Engineer'", &person, &CompileOptions::default()).unwrap();
        let mut txn = store.begin().await.unwrap();
        assert_eq!(txn.run(&person, Some(&engineers), 10).await.unwrap().len(), 2);
        assert_eq!(txn.run(&person, Some(&engineers), 1).await.unwrap().len(), 1);
        assert_eq!(txn.run(&person, None, 10).await.unwrap().len(), 3);
        txn.rollback().await.unwrap();
        assert_eq!(store.calls(Operation::Run), 3);
    }

    #[tokio::test]
    async fn relationships_need_both_endpoints() {
        let store = MemoryStore::new();
        seed(&store, "alice@co.com", "Engineer").await;
        let person = catalog::person();
        let team = catalog::team();
        let manages = catalog::manages();

        let mut txn = store.begin().await.unwrap();
        let err = txn
            .create_relationship(
                &manages,
                Endpoint::new(&person, "email", "alice@co.com"),
                Endpoint::new(&team, "name", "Platform"),
                &Properties::new(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound { ref label, .. } if label == "Team"));
        txn.rollback().await.unwrap();
        assert!(store.relationships().await.is_empty());
    }

    #[tokio::test]
    async fn delete_detaches_relationships() {
        let store = MemoryStore::new();
        seed(&store, "alice@co.com", "Engineer").await;
        seed(&store, "bob@co.com", "Manager").await;
        let person = catalog::person();
        let manages = catalog::manages();

        let mut txn = store.begin().await.unwrap();
        txn.create_relationship(
            &manages,
            Endpoint::new(&person, "email", "bob@co.com"),
            Endpoint::new(&person, "email", "alice@co.com"),
            &Properties::new(),
            &[],
        )
        .await
        .unwrap();
        assert!(txn.delete(&person, "email", "alice@co.com").await.unwrap());
        assert!(!txn.delete(&person, "email", "alice@co.com").await.unwrap());
        txn.commit().await.unwrap();

        assert_eq!(store.entities("Person").await.len(), 1);
        assert!(store.relationships().await.is_empty());
    }

    #[tokio::test]
    async fn injected_faults_fail_and_are_counted() {
        let store = MemoryStore::new();
        store.fail_on(Operation::Create);
        let mut txn = store.begin().await.unwrap();
        let key = txn.upsert_source(&source()).await.unwrap();
        let err = txn
            .create(
                &catalog::person(),
                &props(json!({"email": "a@co.com", "name": "A"})),
                &[key],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Backend(_)));
        txn.rollback().await.unwrap();
        assert_eq!(store.calls(Operation::Create), 1);
        assert_eq!(store.data_calls(), 2);

        store.clear_faults();
        seed(&store, "a@co.com", "Engineer").await;
        assert_eq!(store.entities("Person").await.len(), 1);
    }
}
