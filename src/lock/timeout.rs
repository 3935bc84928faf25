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
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::lock::{GuardState, LockContext, EMPTY_LOCK_KEY, LOCKING_ALREADY, LOCKING_FAIL, UNLOCKING_ALREADY};
use crate::protocol::LockType;

/// === TimeoutLock (exclusive, expires server-side) ===
///
/// The acquisition carries a lease; once it elapses the server reaps the
/// lock whether or not the holder ever unlocks. A late unlock is benign and
/// reports the expiration.
pub struct TimeoutLock {
    context: LockContext,
    key: String,
    state: Mutex<GuardState>,
}

/// Lease used by the no-argument `lock`/`try_lock` variants.
const DEFAULT_LEASE: Duration = Duration::from_secs(1);

impl TimeoutLock {
    pub(crate) fn new(context: LockContext, key: String) -> Self {
        Self {
            context,
            key,
            state: Mutex::new(GuardState::new()),
        }
    }

    pub async fn try_lock(&self) -> bool {
        self.try_lock_with(DEFAULT_LEASE).await
    }

    pub async fn lock(&self) -> bool {
        self.lock_with(DEFAULT_LEASE).await
    }

    /// Non-blocking attempt with an explicit lease.
    pub async fn try_lock_with(&self, lease: Duration) -> bool {
        self.acquire(true, lease).await
    }

    /// Blocking acquisition with an explicit lease.
    pub async fn lock_with(&self, lease: Duration) -> bool {
        self.acquire(false, lease).await
    }

    async fn acquire(&self, try_lock: bool, lease: Duration) -> bool {
        if self.key.is_empty() {
            info!("{EMPTY_LOCK_KEY}");
            return false;
        }
        if !self.state.lock().can_lock {
            info!("{LOCKING_ALREADY}");
            return false;
        }
        let request = self.context.request(
            &self.key,
            LockType::Timeout,
            true,
            try_lock,
            lease.as_millis() as i64,
            false,
        );
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().acquired();
        } else if !response.cause.is_empty() {
            info!("locking [{}] fails: {}", self.key, response.cause);
        }
        response.success
    }

    /// Releases the lock. Succeeds even when the lease already expired; the
    /// cause distinguishes that case for callers who care.
    pub async fn unlock(&self) -> bool {
        {
            let state = self.state.lock();
            if !state.success {
                info!("{LOCKING_FAIL}");
                return false;
            }
            if !state.can_unlock {
                info!("{UNLOCKING_ALREADY}");
                return false;
            }
        }
        let request = self
            .context
            .request(&self.key, LockType::Timeout, false, false, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            if !response.cause.is_empty() {
                info!("unlocking [{}]: {}", self.key, response.cause);
            }
            self.state.lock().released();
        }
        response.success
    }
}
