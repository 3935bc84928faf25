/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{LockRequest, LockResponse};
use crate::server::resolver::LockResolver;

/// How long a lane worker waits for the next request before it retires and
/// removes its lane from the registry.
const LANE_IDLE: Duration = Duration::from_secs(1);

/// Where a resolved response is written: the originating connection's
/// outbound channel.
pub(crate) type ResponseSink = mpsc::UnboundedSender<LockResponse>;

/// A blocking lock request together with its way back to the client.
pub(crate) struct Envelope {
    pub(crate) request: LockRequest,
    pub(crate) replier: ResponseSink,
}

type LaneRegistry = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>>;

/// Serialization lanes for blocking `lock` requests: per key, one queue and
/// one worker draining it, so contending acquisitions for a key are resolved
/// strictly in arrival order while different keys proceed independently.
/// Lanes are created on first use and retire after [`LANE_IDLE`] without
/// traffic; memory stays proportional to contention, not key cardinality.
pub(crate) struct Pipeline {
    resolver: Arc<dyn LockResolver>,
    lanes: LaneRegistry,
}

impl Pipeline {
    pub(crate) fn new(resolver: Arc<dyn LockResolver>) -> Self {
        Self {
            resolver,
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn enqueue(&self, envelope: Envelope) {
        // A requester that already holds the lock must not queue behind the
        // waiters it would deadlock with; its re-acquire resolves at once.
        if self.resolver.is_held_by(&envelope.request) {
            let resolver = self.resolver.clone();
            tokio::spawn(async move {
                let response = resolver.resolve(&envelope.request).await;
                if envelope.replier.send(response).is_err() {
                    warn!("client channel closed, response dropped");
                }
            });
            return;
        }
        submit(&self.lanes, &self.resolver, envelope);
    }
}

/// Read-write specialization: one lane family per key for read-lock requests
/// and another for write-lock requests, so a write release can batch-admit
/// queued readers while a read release admits a single writer.
pub(crate) struct RwPipeline {
    resolver: Arc<dyn LockResolver>,
    read_lanes: LaneRegistry,
    write_lanes: LaneRegistry,
}

impl RwPipeline {
    pub(crate) fn new(resolver: Arc<dyn LockResolver>) -> Self {
        Self {
            resolver,
            read_lanes: Arc::new(Mutex::new(HashMap::new())),
            write_lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn enqueue(&self, envelope: Envelope) {
        let lanes = if envelope.request.read_lock {
            &self.read_lanes
        } else {
            &self.write_lanes
        };
        submit(lanes, &self.resolver, envelope);
    }
}

/// Hands the envelope to the key's lane, creating the lane and its worker on
/// first use. The registry lock covers the probe and the send so a retiring
/// worker cannot drop a lane between them.
fn submit(lanes: &LaneRegistry, resolver: &Arc<dyn LockResolver>, envelope: Envelope) {
    let key = envelope.request.key.clone();
    let mut registry = lanes.lock();
    if let Some(sender) = registry.get(&key).cloned() {
        match sender.send(envelope) {
            Ok(()) => return,
            // The worker retired between the probe and the send; rebuild.
            Err(mpsc::error::SendError(returned)) => {
                registry.remove(&key);
                let (sender, receiver) = mpsc::unbounded_channel();
                let _ = sender.send(returned);
                registry.insert(key.clone(), sender);
                tokio::spawn(drain_lane(lanes.clone(), resolver.clone(), key, receiver));
                return;
            }
        }
    }
    let (sender, receiver) = mpsc::unbounded_channel();
    let _ = sender.send(envelope);
    registry.insert(key.clone(), sender);
    tokio::spawn(drain_lane(lanes.clone(), resolver.clone(), key, receiver));
}

async fn drain_lane(
    lanes: LaneRegistry,
    resolver: Arc<dyn LockResolver>,
    key: String,
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
) {
    debug!("lane worker for [{key}] starts");
    loop {
        let envelope = match tokio::time::timeout(LANE_IDLE, receiver.recv()).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                // Every sender is gone; the registry no longer points here.
                lanes.lock().remove(&key);
                break;
            }
            Err(_) => {
                // Idle. Retire unless a request snuck in; removal and the
                // last-chance probe happen under the registry lock so no
                // enqueue can land in a lane without a worker.
                let pending = {
                    let mut registry = lanes.lock();
                    match receiver.try_recv() {
                        Ok(envelope) => Some(envelope),
                        Err(_) => {
                            registry.remove(&key);
                            None
                        }
                    }
                };
                match pending {
                    Some(envelope) => envelope,
                    None => break,
                }
            }
        };
        let response = resolver.resolve(&envelope.request).await;
        if envelope.replier.send(response).is_err() {
            warn!("client channel closed, response for [{key}] dropped");
        }
    }
    debug!("lane worker for [{key}] retires");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LockType;
    use crate::server::resolver::{ReentrantLockResolver, SimpleLockResolver};

    fn lock_request(key: &str, thread: &str, identity: i64) -> LockRequest {
        LockRequest {
            key: key.to_string(),
            application: "test-app".to_string(),
            thread: thread.to_string(),
            lock_type: LockType::Simple,
            is_lock: true,
            try_lock: false,
            time: 0,
            read_lock: false,
            identity,
        }
    }

    fn unlock_request(key: &str, thread: &str, identity: i64) -> LockRequest {
        LockRequest {
            is_lock: false,
            ..lock_request(key, thread, identity)
        }
    }

    #[tokio::test]
    async fn grants_follow_enqueue_order() {
        let resolver: Arc<dyn LockResolver> = Arc::new(SimpleLockResolver::new());
        let pipeline = Pipeline::new(resolver.clone());
        let (replies, mut responses) = mpsc::unbounded_channel();

        for identity in 1..=3 {
            pipeline.enqueue(Envelope {
                request: lock_request("f", &format!("t{identity}"), identity),
                replier: replies.clone(),
            });
        }
        let first = responses.recv().await.unwrap();
        assert_eq!(first.identity, 1);

        // Each release lets exactly the next enqueued waiter through.
        resolver.resolve_unlock(&unlock_request("f", "t1", 10));
        assert_eq!(responses.recv().await.unwrap().identity, 2);
        resolver.resolve_unlock(&unlock_request("f", "t2", 11));
        assert_eq!(responses.recv().await.unwrap().identity, 3);
    }

    #[tokio::test]
    async fn lane_retires_when_idle_and_comes_back() {
        let resolver: Arc<dyn LockResolver> = Arc::new(SimpleLockResolver::new());
        let pipeline = Pipeline::new(resolver.clone());
        let (replies, mut responses) = mpsc::unbounded_channel();

        pipeline.enqueue(Envelope {
            request: lock_request("k", "t1", 1),
            replier: replies.clone(),
        });
        assert!(responses.recv().await.unwrap().success);
        resolver.resolve_unlock(&unlock_request("k", "t1", 2));

        // Outlive the idle grace so the worker retires, then use it again.
        tokio::time::sleep(LANE_IDLE + Duration::from_millis(200)).await;
        assert!(pipeline.lanes.lock().is_empty());

        pipeline.enqueue(Envelope {
            request: lock_request("k", "t2", 3),
            replier: replies.clone(),
        });
        assert!(responses.recv().await.unwrap().success);
    }

    #[tokio::test]
    async fn reentrant_holder_bypasses_the_queue() {
        let reentrant = Arc::new(ReentrantLockResolver::new());
        let resolver: Arc<dyn LockResolver> = reentrant.clone();
        let pipeline = Pipeline::new(resolver.clone());
        let (replies, mut responses) = mpsc::unbounded_channel();

        let owner = LockRequest {
            lock_type: LockType::Reentrant,
            ..lock_request("r", "t1", 1)
        };
        pipeline.enqueue(Envelope {
            request: owner.clone(),
            replier: replies.clone(),
        });
        assert!(responses.recv().await.unwrap().success);

        // A contender parks in the lane.
        pipeline.enqueue(Envelope {
            request: LockRequest {
                lock_type: LockType::Reentrant,
                ..lock_request("r", "t2", 2)
            },
            replier: replies.clone(),
        });

        // The owner's re-acquire must not sit behind the parked contender.
        pipeline.enqueue(Envelope {
            request: LockRequest {
                identity: 3,
                ..owner
            },
            replier: replies.clone(),
        });
        let response = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.identity, 3);
        assert!(response.success);
        assert_eq!(reentrant.depth("r"), 2);
    }
}
