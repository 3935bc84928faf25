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

/// === SimpleLockResolver (exclusive, non-reentrant, no expiration) ===
///
/// The holder table is the lock: whoever installs an entry for a key owns it
/// until a matching unlock removes the entry and hands the key to the
/// earliest waiter.
pub struct SimpleLockResolver {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    holders: HashMap<String, LockRequest>,
    waiters: HashMap<String, WaitQueue>,
}

impl SimpleLockResolver {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Test hook: whether any holder entry exists for `key`.
    #[cfg(test)]
    pub(crate) fn holds(&self, key: &str) -> bool {
        self.tables.lock().holders.contains_key(key)
    }
}

impl Default for SimpleLockResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockResolver for SimpleLockResolver {
    fn resolve_try_lock(&self, request: &LockRequest) -> LockResponse {
        {
            let mut tables = self.tables.lock();
            if tables.holders.contains_key(&request.key) {
                return LockResponse::denied(request, LOCKED_ALREADY);
            }
            tables.holders.insert(request.key.clone(), request.clone());
        }
        info!("{} acquires SimpleLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }

    async fn resolve_lock(&self, request: &LockRequest) -> LockResponse {
        let permits = {
            let mut tables = self.tables.lock();
            if !tables.holders.contains_key(&request.key) {
                tables.holders.insert(request.key.clone(), request.clone());
                drop(tables);
                info!("{} acquires SimpleLock successfully.", request.owner_label());
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
            let mut tables = self.tables.lock();
            tables.holders.insert(request.key.clone(), request.clone());
        }
        info!("{} acquires SimpleLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }

    fn resolve_unlock(&self, request: &LockRequest) -> LockResponse {
        {
            let mut tables = self.tables.lock();
            tables.holders.remove(&request.key);
            grant_one_waiter(&mut tables.waiters, &request.key);
        }
        info!("{} releases SimpleLock successfully.", request.owner_label());
        LockResponse::granted(request)
    }
}
