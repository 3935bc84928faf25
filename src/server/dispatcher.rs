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
use std::sync::Arc;

use tracing::warn;

use crate::protocol::{LockRequest, LockType};
use crate::server::pipeline::{Envelope, Pipeline, ResponseSink, RwPipeline};
use crate::server::resolver::{
    LockResolver, ReadWriteLockResolver, ReentrantLockResolver, SimpleLockResolver,
    TimeoutLockResolver,
};

/// Inbound router. Unlocks and try-locks are resolved immediately on spawned
/// workers; blocking locks serialize through the per-key pipeline of their
/// flavor so FIFO fairness holds per key while different keys proceed in
/// parallel.
pub struct Dispatcher {
    simple: Arc<SimpleLockResolver>,
    timeout: Arc<TimeoutLockResolver>,
    reentrant: Arc<ReentrantLockResolver>,
    read_write: Arc<ReadWriteLockResolver>,
    simple_pipeline: Pipeline,
    timeout_pipeline: Pipeline,
    reentrant_pipeline: Pipeline,
    read_write_pipeline: RwPipeline,
}

impl Dispatcher {
    /// Must be created inside a Tokio runtime; the timeout resolver starts
    /// its reaper task on construction.
    pub fn new() -> Self {
        let simple = Arc::new(SimpleLockResolver::new());
        let timeout = Arc::new(TimeoutLockResolver::new());
        let reentrant = Arc::new(ReentrantLockResolver::new());
        let read_write = Arc::new(ReadWriteLockResolver::new());
        Self {
            simple_pipeline: Pipeline::new(simple.clone()),
            timeout_pipeline: Pipeline::new(timeout.clone()),
            reentrant_pipeline: Pipeline::new(reentrant.clone()),
            read_write_pipeline: RwPipeline::new(read_write.clone()),
            simple,
            timeout,
            reentrant,
            read_write,
        }
    }

    pub(crate) fn dispatch(&self, request: LockRequest, replier: ResponseSink) {
        if Self::resolves_immediately(&request) {
            let resolver = self.resolver_for(request.lock_type);
            tokio::spawn(async move {
                let response = resolver.resolve(&request).await;
                if replier.send(response).is_err() {
                    warn!("client channel closed, response dropped");
                }
            });
            return;
        }
        let envelope = Envelope { request, replier };
        match envelope.request.lock_type {
            LockType::Simple => self.simple_pipeline.enqueue(envelope),
            LockType::Timeout => self.timeout_pipeline.enqueue(envelope),
            LockType::Reentrant => self.reentrant_pipeline.enqueue(envelope),
            LockType::ReadWrite => self.read_write_pipeline.enqueue(envelope),
        }
    }

    /// Unlocks and try-locks never wait on other requests and are answered
    /// straight away.
    fn resolves_immediately(request: &LockRequest) -> bool {
        !request.is_lock || request.try_lock
    }

    fn resolver_for(&self, lock_type: LockType) -> Arc<dyn LockResolver> {
        match lock_type {
            LockType::Simple => self.simple.clone(),
            LockType::Timeout => self.timeout.clone(),
            LockType::Reentrant => self.reentrant.clone(),
            LockType::ReadWrite => self.read_write.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn request(
        key: &str,
        thread: &str,
        lock_type: LockType,
        is_lock: bool,
        try_lock: bool,
        identity: i64,
    ) -> LockRequest {
        LockRequest {
            key: key.to_string(),
            application: "test-app".to_string(),
            thread: thread.to_string(),
            lock_type,
            is_lock,
            try_lock,
            time: 500,
            read_lock: false,
            identity,
        }
    }

    #[tokio::test]
    async fn try_lock_is_answered_while_a_waiter_queues() {
        let dispatcher = Dispatcher::new();
        let (replies, mut responses) = mpsc::unbounded_channel();

        dispatcher.dispatch(
            request("k", "t1", LockType::Simple, true, false, 1),
            replies.clone(),
        );
        assert!(responses.recv().await.unwrap().success);

        // A blocking contender parks; the try-lock is answered regardless.
        dispatcher.dispatch(
            request("k", "t2", LockType::Simple, true, false, 2),
            replies.clone(),
        );
        dispatcher.dispatch(
            request("k", "t3", LockType::Simple, true, true, 3),
            replies.clone(),
        );
        let denied = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(denied.identity, 3);
        assert!(!denied.success);

        dispatcher.dispatch(
            request("k", "t1", LockType::Simple, false, false, 4),
            replies.clone(),
        );
        let mut remaining = Vec::new();
        for _ in 0..2 {
            remaining.push(responses.recv().await.unwrap());
        }
        assert!(remaining.iter().any(|r| r.identity == 2 && r.success));
        assert!(remaining.iter().any(|r| r.identity == 4 && r.success));
    }

    #[tokio::test]
    async fn each_flavor_routes_to_its_own_table() {
        let dispatcher = Dispatcher::new();
        let (replies, mut responses) = mpsc::unbounded_channel();

        // The same key is independent across flavors.
        for (lock_type, identity) in [
            (LockType::Simple, 1),
            (LockType::Timeout, 2),
            (LockType::Reentrant, 3),
            (LockType::ReadWrite, 4),
        ] {
            dispatcher.dispatch(request("shared", "t1", lock_type, true, true, identity), replies.clone());
        }
        for _ in 0..4 {
            assert!(responses.recv().await.unwrap().success);
        }
    }
}
