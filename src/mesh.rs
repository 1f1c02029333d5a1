//! The mesh collaborator surface (spec.md §6.3, §1 "OUT OF SCOPE: an
//! optional messaging/cluster surface"). This module is trait-only: it
//! documents the shape a messaging/cluster runtime would need to expose to
//! sit alongside the Operator, per spec.md §9's "model as a single
//! trait/interface and explicit capability errors, not inheritance"
//! guidance for the embedded-cluster/remote-client/leaf-relay split. No
//! concrete client (e.g. a NATS/JetStream binding) is vendored — the
//! teacher pack contains no messaging-stack teacher to ground one against,
//! and inventing one would not be grounded in anything in the corpus
//! (see DESIGN.md).

use crate::error::{OperatorError, Result};
use std::time::Duration;

/// Headers attached to a published or received message.
pub type Headers = Vec<(String, String)>;

/// The result of handling an inbound message: an optional reply payload,
/// any headers to attach to it, and an optional subject to reply on.
pub struct HandlerResponse {
    pub response: Option<Vec<u8>>,
    pub headers: Headers,
    pub reply_to: Option<String>,
}

pub type MessageHandler = dyn Fn(&[u8], &Headers) -> HandlerResponse + Send + Sync;

/// Volatile publish/request/subscribe messaging (spec.md §6.3).
pub trait Messaging: Send + Sync {
    fn publish(&self, subject: &str, payload: &[u8], headers: &Headers) -> Result<()>;

    fn request(&self, subject: &str, payload: &[u8], timeout: Duration) -> Result<Vec<u8>>;

    fn batch_publish(&self, subject: &str, payloads: &[Vec<u8>]) -> Result<()>;

    /// Fan-out: every subscriber gets every message. `queue_group`
    /// distributes messages across subscribers sharing the same group
    /// name instead.
    fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
        handler: Box<MessageHandler>,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
    pub max_age: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct PullOptions {
    pub batch: usize,
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

/// A persistent, replayable stream of messages (spec.md §6.3).
pub trait Stream: Send + Sync {
    fn info(&self) -> Result<StreamConfig>;

    /// `expected_stream` enforces the publish lands in the stream the
    /// caller believes it's targeting; `dedup_id`, if set, drops a
    /// republish of the same logical message.
    fn publish(&self, subject: &str, payload: &[u8], expected_stream: Option<&str>, dedup_id: Option<&str>) -> Result<u64>;

    /// A durable (named) consumer's cursor survives disconnects; an
    /// ephemeral one exists only while the subscription is open.
    fn consume_durable(&self, consumer_name: &str, push: bool) -> Result<Box<dyn Consumer>>;

    fn consume_ephemeral(&self, push: bool) -> Result<Box<dyn Consumer>>;
}

pub trait Consumer: Send + Sync {
    fn pull(&self, options: PullOptions) -> Result<Vec<(u64, Vec<u8>)>>;

    fn ack(&self, sequence: u64) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct KvBucketConfig {
    pub bucket: String,
    pub description: Option<String>,
    pub ttl: Option<Duration>,
    pub max_value_size: Option<u64>,
    pub max_bytes: Option<u64>,
    pub replicas: Option<u8>,
}

/// A revisioned key-value bucket (spec.md §6.3).
pub trait KvBucket: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<u64>;

    /// Compare-and-swap on `expected_revision`.
    fn update(&self, key: &str, value: &[u8], expected_revision: u64) -> Result<u64>;

    fn get(&self, key: &str) -> Result<(Vec<u8>, u64)>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Unlike `delete`, removes the key's revision history entirely.
    fn purge(&self, key: &str) -> Result<()>;

    fn list_keys(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct ObjectBucketConfig {
    pub bucket: String,
    pub description: Option<String>,
    pub ttl: Option<Duration>,
    pub max_bytes: Option<u64>,
    pub replicas: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub digest: String,
}

pub trait ObjectBucket: Send + Sync {
    fn put(&self, name: &str, data: &[u8]) -> Result<ObjectInfo>;

    fn get(&self, name: &str) -> Result<Vec<u8>>;

    fn copy(&self, name: &str, destination: &str) -> Result<ObjectInfo>;

    fn list_objects(&self) -> Result<Vec<ObjectInfo>>;

    fn object_exists(&self, name: &str) -> Result<bool>;

    fn get_object_info(&self, name: &str) -> Result<ObjectInfo>;
}

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
}

/// Cancellation token passed to blocking lock acquisition; `DistributedLock`
/// implementations poll it between backoff retries (spec.md §5
/// "Cancellation... The mesh collaborator exposes context-based
/// cancellation").
pub trait CancellationToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A lease-based distributed lock backed by a `KvBucket` (spec.md §6.3).
/// `try_lock` returns a closure that releases the lock by deleting the
/// sentinel at the revision it was acquired with, so a stale caller's
/// release can never clobber a newer lock holder.
pub trait DistributedLock: Send + Sync {
    fn try_lock(&self, bucket: &str, key: &str) -> Result<Box<dyn FnOnce() -> Result<()> + Send>>;

    fn lock(
        &self,
        cancel: &dyn CancellationToken,
        bucket: &str,
        key: &str,
        backoff: Backoff,
    ) -> Result<Box<dyn FnOnce() -> Result<()> + Send>>;

    fn force_unlock(&self, bucket: &str, key: &str) -> Result<()>;

    fn is_locked(&self, bucket: &str, key: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct LeaderChangeEvent {
    pub stream: String,
    pub leader: String,
    pub my_name: String,
}

/// The single interface shared by an embedded cluster node, a remote
/// client, and a leaf relay (spec.md §6.3, §9). Leaf nodes implement every
/// method but reject the management subset with
/// `OperatorError::OperationNotPermitted` (spec.md §6.3, §7).
pub trait Mesh: Messaging + Send + Sync {
    fn create_or_update_stream(&self, config: StreamConfig) -> Result<Box<dyn Stream>>;

    fn delete_stream(&self, name: &str) -> Result<()>;

    fn create_key_value_store(&self, config: KvBucketConfig) -> Result<Box<dyn KvBucket>>;

    fn delete_key_value_store(&self, bucket: &str) -> Result<()>;

    fn create_object_store(&self, config: ObjectBucketConfig) -> Result<Box<dyn ObjectBucket>>;

    fn delete_object_store(&self, bucket: &str) -> Result<()>;

    fn distributed_lock(&self) -> &dyn DistributedLock;

    /// Subject that emits a `LeaderChangeEvent` whenever cluster leadership
    /// changes. `None` for a mesh implementation that doesn't track
    /// leadership (e.g. a standalone leaf relay).
    fn leader_change_subject(&self) -> Option<&str>;

    /// `true` for a leaf relay, which accepts messaging but rejects the
    /// management methods above.
    fn is_leaf(&self) -> bool {
        false
    }
}

/// Helper leaf implementations can delegate management methods to.
pub fn management_not_permitted<T>() -> Result<T> {
    Err(OperatorError::OperationNotPermitted)
}
