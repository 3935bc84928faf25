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
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::protocol::{LockRequest, LockResponse, LOCKED_ALREADY, LOCK_EXPIRED};
use crate::server::handoff::{await_permission, grant_one_waiter, WaitQueue};
use crate::server::reaper::{DelayQueue, DelayedLock};
use crate::server::resolver::LockResolver;

/// === TimeoutLockResolver (exclusive, per-acquisition expiration) ===
///
/// Same lifecycle as the simple flavor, with every successful acquisition
/// scheduled on a delay queue. A dedicated reaper task evicts holders whose
/// deadline passed and admits the next waiter exactly like an unlock would.
pub struct TimeoutLockResolver {
    state: Arc<TimeoutState>,
    reaper: JoinHandle<()>,
}

struct TimeoutState {
    tables: Mutex<Tables>,
    delays: DelayQueue,
}

#[derive(Default)]
struct Tables {
    holders: HashMap<String, LockRequest>,
    waiters: HashMap<String, WaitQueue>,
}

impl TimeoutLockResolver {
    /// Must be created inside a Tokio runtime; the reaper task starts
    /// immediately and runs for the resolver's lifetime.
    pub fn new() -> Self {
        let state = Arc::new(TimeoutState {
            tables: Mutex::new(Tables::default()),
            delays: DelayQueue::new(),
        });
        let reaper = tokio::spawn(reap_expired(state.clone()));
        Self { state, reaper }
    }

    /// Test hook: whether any holder entry exists for `key`.
    #[cfg(test)]
    pub(crate) fn holds(&self, key: &str) -> bool {
        self.state.tables.lock().holders.contains_key(key)
    }
}

impl Default for TimeoutLockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutLockResolver {
    fn drop(&mut self) {
        self.reaper.abort();
    }
}

impl TimeoutState {
    /// Installs the holder and schedules its eviction.
    fn install(&self, tables: &mut Tables, request: &LockRequest) {
        tables.holders.insert(request.key.clone(), request.clone());
        let lease = Duration::from_millis(request.time.max(0) as u64);
        self.delays.push(DelayedLock {
            deadline: Instant::now() + lease,
            key: request.key.clone(),
            identity: request.identity,
        });
    }

    /// Evicts `lock` if the holder is still the acquisition the record was
    /// created for; a mismatch means the lock was released in time and the
    /// record is stale.
    fn expire(&self, lock: DelayedLock) {
        let evicted = {
            let mut tables = self.tables.lock();
            match tables.holders.get(&lock.key) {
                Some(holder) if holder.identity == lock.identity => {
                    tables.holders.remove(&lock.key);
                    grant_one_waiter(&mut tables.waiters, &lock.key);
                    true
                }
                _ => false,
            }
        };
        if evicted {
            info!("reaper removes expired TimeoutLock [{}].", lock.key);
        }
    }
}

async fn reap_expired(state: Arc<TimeoutState>) {
    loop {
        match state.delays.next_deadline() {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline.into()) => {
                        for lock in state.delays.pop_expired(Instant::now()) {
                            state.expire(lock);
                        }
                    }
                    // A push may have introduced an earlier deadline.
                    _ = state.delays.changed() => {}
                }
            }
            None => state.delays.changed().await,
        }
    }
}

#[async_trait]
impl LockResolver for TimeoutLockResolver {
    fn resolve_try_lock(&self, request: &LockRequest) -> LockResponse {
        {
            let mut tables = self.state.tables.lock();
            if tables.holders.contains_key(&request.key) {
                return LockResponse::denied(request, LOCKED_ALREADY);
            }
            self.state.install(&mut tables, request);
        }
        info!("{} acquires TimeoutLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }

    async fn resolve_lock(&self, request: &LockRequest) -> LockResponse {
        let permits = {
            let mut tables = self.state.tables.lock();
            if !tables.holders.contains_key(&request.key) {
                self.state.install(&mut tables, request);
                drop(tables);
                info!("{} acquires TimeoutLock successfully.", request.owner_label());
                return LockResponse::granted(request);
            }
            tables
                .waiters
                .entry(request.key.clone())
                .or_insert_with(WaitQueue::new)
                .arrive(request.identity)
        };
        await_permission(&permits).await;
        {
            let mut tables = self.state.tables.lock();
            self.state.install(&mut tables, request);
        }
        info!("{} acquires TimeoutLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }

    fn resolve_unlock(&self, request: &LockRequest) -> LockResponse {
        let expired = {
            let mut tables = self.state.tables.lock();
            match tables.holders.get(&request.key) {
                Some(holder) if holder.same_owner(request) => {
                    tables.holders.remove(&request.key);
                    grant_one_waiter(&mut tables.waiters, &request.key);
                    false
                }
                // Reaped already, or reaped and re-acquired by someone else.
                // Nothing is held on the caller's behalf either way.
                _ => true,
            }
        };
        if expired {
            info!(
                "{} releases TimeoutLock which has expired already.",
                request.owner_label()
            );
            LockResponse::answering(request, true, LOCK_EXPIRED)
        } else {
            info!("{} releases TimeoutLock successfully.", request.owner_label());
            LockResponse::granted(request)
        }
    }
}
