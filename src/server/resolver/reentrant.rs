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

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::protocol::{LockRequest, LockResponse, LOCKED_ALREADY};
use crate::server::handoff::{await_permission, grant_one_waiter, WaitQueue};
use crate::server::resolver::LockResolver;

/// === ReentrantLockResolver (exclusive, same-owner re-acquire) ===
///
/// The stored holder request is the owner fingerprint: a request from the
/// same `(application, thread)` pair re-acquires by bumping the depth counter
/// and replacing the fingerprint. Releases must balance acquisitions before
/// the key is handed to the next waiter.
pub struct ReentrantLockResolver {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    holders: HashMap<String, LockRequest>,
    counts: HashMap<String, u32>,
    waiters: HashMap<String, WaitQueue>,
}

impl ReentrantLockResolver {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Test hook: current re-acquisition depth for `key`.
    #[cfg(test)]
    pub(crate) fn depth(&self, key: &str) -> u32 {
        self.tables.lock().counts.get(key).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn holds(&self, key: &str) -> bool {
        self.tables.lock().holders.contains_key(key)
    }
}

impl Default for ReentrantLockResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockResolver for ReentrantLockResolver {
    fn resolve_try_lock(&self, request: &LockRequest) -> LockResponse {
        let depth = {
            let mut tables = self.tables.lock();
            match tables.holders.get(&request.key) {
                None => {
                    tables.holders.insert(request.key.clone(), request.clone());
                    tables.counts.insert(request.key.clone(), 1);
                    1
                }
                Some(holder) if holder.same_owner(request) => {
                    tables.holders.insert(request.key.clone(), request.clone());
                    let count = tables.counts.entry(request.key.clone()).or_insert(0);
                    *count += 1;
                    *count
                }
                Some(_) => return LockResponse::denied(request, LOCKED_ALREADY),
            }
        };
        info!(
            "{} acquires ReentrantLock successfully, current lock count: {depth}.",
            request.owner_label()
        );
        LockResponse::granted(request)
    }

    async fn resolve_lock(&self, request: &LockRequest) -> LockResponse {
        let permits = {
            let mut tables = self.tables.lock();
            match tables.holders.get(&request.key) {
                None => {
                    tables.holders.insert(request.key.clone(), request.clone());
                    tables.counts.insert(request.key.clone(), 1);
                    drop(tables);
                    info!(
                        "{} acquires ReentrantLock successfully, current lock count: 1.",
                        request.owner_label()
                    );
                    return LockResponse::granted(request);
                }
                Some(holder) if holder.same_owner(request) => {
                    tables.holders.insert(request.key.clone(), request.clone());
                    let count = tables.counts.entry(request.key.clone()).or_insert(0);
                    *count += 1;
                    let depth = *count;
                    drop(tables);
                    info!(
                        "{} acquires ReentrantLock successfully, current lock count: {depth}.",
                        request.owner_label()
                    );
                    return LockResponse::granted(request);
                }
                Some(_) => tables
                    .waiters
                    .entry(request.key.clone())
                    .or_insert_with(WaitQueue::new)
                    .arrive(request.identity),
            }
        };
        await_permission(&permits).await;
        {
            let mut tables = self.tables.lock();
            tables.holders.insert(request.key.clone(), request.clone());
            tables.counts.insert(request.key.clone(), 1);
        }
        info!(
            "{} acquires ReentrantLock successfully, current lock count: 1.",
            request.owner_label()
        );
        LockResponse::granted(request)
    }

    fn resolve_unlock(&self, request: &LockRequest) -> LockResponse {
        let remaining = {
            let mut tables = self.tables.lock();
            match tables.counts.get_mut(&request.key) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    Some(*count)
                }
                Some(_) => {
                    tables.counts.remove(&request.key);
                    tables.holders.remove(&request.key);
                    grant_one_waiter(&mut tables.waiters, &request.key);
                    Some(0)
                }
                // Not held at all; releasing is benign.
                None => None,
            }
        };
        match remaining {
            Some(0) => info!(
                "{} releases ReentrantLock completely.",
                request.owner_label()
            ),
            Some(depth) => info!(
                "{} releases ReentrantLock successfully, current lock count: {depth}.",
                request.owner_label()
            ),
            None => {}
        }
        LockResponse::granted(request)
    }

    fn is_held_by(&self, request: &LockRequest) -> bool {
        self.tables
            .lock()
            .holders
            .get(&request.key)
            .map(|holder| holder.same_owner(request))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LockType;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(key: &str, thread: &str, is_lock: bool, try_lock: bool, identity: i64) -> LockRequest {
        LockRequest {
            key: key.to_string(),
            application: "test-app".to_string(),
            thread: thread.to_string(),
            lock_type: LockType::Reentrant,
            is_lock,
            try_lock,
            time: 0,
            read_lock: false,
            identity,
        }
    }

    #[tokio::test]
    async fn same_owner_stacks_acquisitions() {
        let resolver = ReentrantLockResolver::new();
        assert!(resolver
            .resolve_try_lock(&request("r", "t1", true, true, 20))
            .success);
        assert!(resolver
            .resolve_lock(&request("r", "t1", true, false, 21))
            .await
            .success);
        assert!(resolver
            .resolve_lock(&request("r", "t1", true, false, 22))
            .await
            .success);
        assert_eq!(resolver.depth("r"), 3);

        // A different caller is refused outright.
        let denied = resolver.resolve_try_lock(&request("r", "t2", true, true, 23));
        assert!(!denied.success);
        assert_eq!(denied.cause, LOCKED_ALREADY);
    }

    #[tokio::test]
    async fn unlocks_balance_before_the_key_frees() {
        let resolver = ReentrantLockResolver::new();
        for identity in 0..3 {
            assert!(resolver
                .resolve_lock(&request("r", "t1", true, false, identity))
                .await
                .success);
        }
        for identity in 3..5 {
            assert!(resolver
                .resolve_unlock(&request("r", "t1", false, false, identity))
                .success);
            assert!(resolver.holds("r"));
        }
        assert!(resolver
            .resolve_unlock(&request("r", "t1", false, false, 5))
            .success);
        assert!(!resolver.holds("r"));
        assert_eq!(resolver.depth("r"), 0);

        assert!(resolver
            .resolve_try_lock(&request("r", "t2", true, true, 6))
            .success);
    }

    #[tokio::test]
    async fn contender_waits_for_the_full_release() {
        let resolver = Arc::new(ReentrantLockResolver::new());
        assert!(resolver
            .resolve_lock(&request("r", "t1", true, false, 1))
            .await
            .success);
        assert!(resolver
            .resolve_lock(&request("r", "t1", true, false, 2))
            .await
            .success);

        let contender = resolver.clone();
        let waiter = tokio::spawn(async move {
            contender
                .resolve_lock(&request("r", "t2", true, false, 3))
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        resolver.resolve_unlock(&request("r", "t1", false, false, 4));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        resolver.resolve_unlock(&request("r", "t1", false, false, 5));
        let granted = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(granted.success);
        assert_eq!(resolver.depth("r"), 1);
    }

    #[tokio::test]
    async fn held_by_probe_identifies_the_owner() {
        let resolver = ReentrantLockResolver::new();
        assert!(resolver
            .resolve_try_lock(&request("r", "t1", true, true, 1))
            .success);
        assert!(resolver.is_held_by(&request("r", "t1", true, false, 2)));
        assert!(!resolver.is_held_by(&request("r", "t2", true, false, 3)));
        assert!(!resolver.is_held_by(&request("other", "t1", true, false, 4)));
    }
}
