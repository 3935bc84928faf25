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

use crate::protocol::{
    LockRequest, LockResponse, READ_LOCKED_WRITE_FAILS, WRITE_LOCKED_READ_FAILS,
    WRITE_LOCKED_WRITE_FAILS,
};
use crate::server::handoff::{
    await_permission, grant_all_waiters, grant_one_waiter, WaitQueue,
};
use crate::server::resolver::LockResolver;

/// === ReadWriteLockResolver (inclusive reads, exclusive writes) ===
///
/// Reads share a key through a live-reader count; writes own the holder slot
/// exclusively. A write holder may additionally take the read side (the
/// downgrade window); releasing the write lock then leaves it with
/// read-only access while other readers are admitted and writers stay out.
/// Reads never upgrade to writes.
///
/// Releasing a write lock admits every queued reader at once; releasing the
/// last read lock admits exactly one writer. Both wait populations keep
/// their own queue family so the two admission policies stay independent.
pub struct ReadWriteLockResolver {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    holders: HashMap<String, LockRequest>,
    read_holders: HashMap<String, u32>,
    write_waiters: HashMap<String, WaitQueue>,
    read_waiters: HashMap<String, WaitQueue>,
}

impl Tables {
    /// 写锁降级检查: the read request comes from the write holder itself.
    fn can_downgrade(&self, request: &LockRequest) -> bool {
        self.holders
            .get(&request.key)
            .map(|holder| holder.same_owner(request))
            .unwrap_or(false)
    }

    fn bump_readers(&mut self, key: &str) -> u32 {
        let count = self.read_holders.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

impl ReadWriteLockResolver {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Test hook: current live-reader count for `key`.
    #[cfg(test)]
    pub(crate) fn readers(&self, key: &str) -> u32 {
        self.tables.lock().read_holders.get(key).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn write_held(&self, key: &str) -> bool {
        self.tables.lock().holders.contains_key(key)
    }

    fn resolve_read_try_lock(&self, request: &LockRequest) -> LockResponse {
        let (count, downgraded) = {
            let mut tables = self.tables.lock();
            if tables.holders.contains_key(&request.key) {
                if !tables.can_downgrade(request) {
                    return LockResponse::denied(request, WRITE_LOCKED_READ_FAILS);
                }
                let count = tables.bump_readers(&request.key);
                (count, true)
            } else {
                (tables.bump_readers(&request.key), false)
            }
        };
        if downgraded {
            info!(
                "{} acquires ReadLock successfully, current WriteLock downgrades to ReadLock.",
                request.owner_label()
            );
        } else {
            info!(
                "{} acquires ReadLock successfully, current ReadLock number: [{count}].",
                request.owner_label()
            );
        }
        LockResponse::granted(request)
    }

    fn resolve_write_try_lock(&self, request: &LockRequest) -> LockResponse {
        {
            let mut tables = self.tables.lock();
            if tables.read_holders.contains_key(&request.key) {
                return LockResponse::denied(request, READ_LOCKED_WRITE_FAILS);
            }
            if tables.holders.contains_key(&request.key) {
                return LockResponse::denied(request, WRITE_LOCKED_WRITE_FAILS);
            }
            tables.holders.insert(request.key.clone(), request.clone());
        }
        info!("{} acquires WriteLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }

    async fn resolve_read_lock(&self, request: &LockRequest) -> LockResponse {
        let permits = {
            let mut tables = self.tables.lock();
            if !tables.holders.contains_key(&request.key) || tables.can_downgrade(request) {
                let downgraded = tables.holders.contains_key(&request.key);
                let count = tables.bump_readers(&request.key);
                drop(tables);
                if downgraded {
                    info!(
                        "{} acquires ReadLock successfully, current WriteLock downgrades to ReadLock.",
                        request.owner_label()
                    );
                } else {
                    info!(
                        "{} acquires ReadLock successfully, current ReadLock number: [{count}].",
                        request.owner_label()
                    );
                }
                return LockResponse::granted(request);
            }
            // A foreign write holder exists; wait until it releases.
            tables
                .read_waiters
                .entry(request.key.clone())
                .or_insert_with(WaitQueue::new)
                .arrive(request.identity)
        };
        await_permission(&permits).await;
        let count = {
            let mut tables = self.tables.lock();
            tables.bump_readers(&request.key)
        };
        info!(
            "{} acquires ReadLock successfully, current ReadLock number: [{count}].",
            request.owner_label()
        );
        LockResponse::granted(request)
    }

    async fn resolve_write_lock(&self, request: &LockRequest) -> LockResponse {
        let permits = {
            let mut tables = self.tables.lock();
            if !tables.read_holders.contains_key(&request.key)
                && !tables.holders.contains_key(&request.key)
            {
                tables.holders.insert(request.key.clone(), request.clone());
                drop(tables);
                info!("{} acquires WriteLock successfully.", request.owner_label());
                return LockResponse::granted(request);
            }
            tables
                .write_waiters
                .entry(request.key.clone())
                .or_insert_with(WaitQueue::new)
                .arrive(request.identity)
        };
        await_permission(&permits).await;
        {
            let mut tables = self.tables.lock();
            tables.holders.insert(request.key.clone(), request.clone());
        }
        info!("{} acquires WriteLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }

    fn resolve_read_unlock(&self, request: &LockRequest) -> LockResponse {
        let remaining = {
            let mut tables = self.tables.lock();
            match tables.read_holders.get_mut(&request.key) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    Some(*count)
                }
                Some(_) => {
                    // Last reader out; exactly one writer may proceed.
                    tables.read_holders.remove(&request.key);
                    grant_one_waiter(&mut tables.write_waiters, &request.key);
                    Some(0)
                }
                None => None,
            }
        };
        match remaining {
            Some(0) => info!("{} releases ReadLock completely.", request.owner_label()),
            Some(count) => info!(
                "{} releases ReadLock successfully, current ReadLock number: [{count}].",
                request.owner_label()
            ),
            None => {}
        }
        LockResponse::granted(request)
    }

    fn resolve_write_unlock(&self, request: &LockRequest) -> LockResponse {
        let admitted_readers = {
            let mut tables = self.tables.lock();
            tables.holders.remove(&request.key);
            // Queued readers win over the next writer and are admitted as a
            // batch; only when none wait does a single writer proceed.
            let admitted = grant_all_waiters(&mut tables.read_waiters, &request.key);
            if admitted == 0 {
                grant_one_waiter(&mut tables.write_waiters, &request.key);
            }
            admitted
        };
        info!(
            "{} releases WriteLock successfully, admitting [{admitted_readers}] queued readers.",
            request.owner_label()
        );
        LockResponse::granted(request)
    }
}

impl Default for ReadWriteLockResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockResolver for ReadWriteLockResolver {
    fn resolve_try_lock(&self, request: &LockRequest) -> LockResponse {
        if request.read_lock {
            self.resolve_read_try_lock(request)
        } else {
            self.resolve_write_try_lock(request)
        }
    }

    async fn resolve_lock(&self, request: &LockRequest) -> LockResponse {
        if request.read_lock {
            self.resolve_read_lock(request).await
        } else {
            self.resolve_write_lock(request).await
        }
    }

    fn resolve_unlock(&self, request: &LockRequest) -> LockResponse {
        if request.read_lock {
            self.resolve_read_unlock(request)
        } else {
            self.resolve_write_unlock(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LockType;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(
        key: &str,
        thread: &str,
        is_lock: bool,
        try_lock: bool,
        read_lock: bool,
        identity: i64,
    ) -> LockRequest {
        LockRequest {
            key: key.to_string(),
            application: "test-app".to_string(),
            thread: thread.to_string(),
            lock_type: LockType::ReadWrite,
            is_lock,
            try_lock,
            time: 0,
            read_lock,
            identity,
        }
    }

    #[tokio::test]
    async fn readers_share_writers_exclude() {
        let resolver = ReadWriteLockResolver::new();
        assert!(resolver
            .resolve_try_lock(&request("rw", "t1", true, true, true, 1))
            .success);
        assert!(resolver
            .resolve_try_lock(&request("rw", "t2", true, true, true, 2))
            .success);
        assert_eq!(resolver.readers("rw"), 2);

        let denied = resolver.resolve_try_lock(&request("rw", "t3", true, true, false, 3));
        assert!(!denied.success);
        assert_eq!(denied.cause, READ_LOCKED_WRITE_FAILS);
    }

    #[tokio::test]
    async fn write_holder_excludes_both_sides() {
        let resolver = ReadWriteLockResolver::new();
        assert!(resolver
            .resolve_try_lock(&request("rw", "t1", true, true, false, 1))
            .success);

        let read = resolver.resolve_try_lock(&request("rw", "t2", true, true, true, 2));
        assert!(!read.success);
        assert_eq!(read.cause, WRITE_LOCKED_READ_FAILS);

        let write = resolver.resolve_try_lock(&request("rw", "t2", true, true, false, 3));
        assert!(!write.success);
        assert_eq!(write.cause, WRITE_LOCKED_WRITE_FAILS);
    }

    #[tokio::test]
    async fn write_holder_downgrades_to_read() {
        let resolver = Arc::new(ReadWriteLockResolver::new());
        assert!(resolver
            .resolve_try_lock(&request("rw", "t1", true, true, false, 1))
            .success);
        // Same owner takes the read side while still holding the write side.
        assert!(resolver
            .resolve_try_lock(&request("rw", "t1", true, true, true, 2))
            .success);
        assert_eq!(resolver.readers("rw"), 1);
        assert!(resolver.write_held("rw"));

        assert!(resolver
            .resolve_unlock(&request("rw", "t1", false, false, false, 3))
            .success);
        assert!(!resolver.write_held("rw"));

        // Writers stay out while the downgraded read is live; readers enter.
        let blocked = resolver.resolve_try_lock(&request("rw", "t2", true, true, false, 4));
        assert!(!blocked.success);
        assert!(resolver
            .resolve_try_lock(&request("rw", "t3", true, true, true, 5))
            .success);
        assert_eq!(resolver.readers("rw"), 2);

        assert!(resolver
            .resolve_unlock(&request("rw", "t1", false, false, true, 6))
            .success);
        assert!(resolver
            .resolve_unlock(&request("rw", "t3", false, false, true, 7))
            .success);
        assert!(resolver
            .resolve_try_lock(&request("rw", "t2", true, true, false, 8))
            .success);
    }

    #[tokio::test]
    async fn write_release_admits_all_queued_readers_before_writers() {
        let resolver = Arc::new(ReadWriteLockResolver::new());
        assert!(resolver
            .resolve_try_lock(&request("rw", "w1", true, true, false, 1))
            .success);

        let mut readers = Vec::new();
        for (index, thread) in ["r1", "r2", "r3"].iter().enumerate() {
            let contender = resolver.clone();
            let read = request("rw", thread, true, false, true, 10 + index as i64);
            readers.push(tokio::spawn(async move {
                contender.resolve_lock(&read).await
            }));
        }
        let writer = {
            let contender = resolver.clone();
            tokio::spawn(async move {
                contender
                    .resolve_lock(&request("rw", "w2", true, false, false, 20))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!writer.is_finished());

        resolver.resolve_unlock(&request("rw", "w1", false, false, false, 2));
        for reader in readers {
            let granted = tokio::time::timeout(Duration::from_secs(1), reader)
                .await
                .unwrap()
                .unwrap();
            assert!(granted.success);
        }
        assert_eq!(resolver.readers("rw"), 3);
        // The writer keeps waiting behind the admitted readers.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!writer.is_finished());

        for identity in 30..33 {
            resolver.resolve_unlock(&request("rw", "r1", false, false, true, identity));
        }
        let granted = tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .unwrap()
            .unwrap();
        assert!(granted.success);
        assert!(resolver.write_held("rw"));
    }

    #[tokio::test]
    async fn read_unlock_of_a_free_key_is_benign() {
        let resolver = ReadWriteLockResolver::new();
        assert!(resolver
            .resolve_unlock(&request("rw", "t1", false, false, true, 1))
            .success);
    }
}
