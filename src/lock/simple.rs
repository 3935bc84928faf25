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
use parking_lot::Mutex;
use tracing::info;

use crate::lock::{GuardState, LockContext, EMPTY_LOCK_KEY, LOCKING_ALREADY, LOCKING_FAIL, UNLOCKING_ALREADY};
use crate::protocol::LockType;

/// === SimpleLock (exclusive, non-reentrant) ===
///
/// One acquisition per handle: lock it, do the work, unlock it.
pub struct SimpleLock {
    context: LockContext,
    key: String,
    state: Mutex<GuardState>,
}

impl SimpleLock {
    pub(crate) fn new(context: LockContext, key: String) -> Self {
        Self {
            context,
            key,
            state: Mutex::new(GuardState::new()),
        }
    }

    /// Non-blocking acquisition attempt.
    pub async fn try_lock(&self) -> bool {
        self.acquire(true).await
    }

    /// Blocking acquisition; waits its turn in the server's per-key queue.
    pub async fn lock(&self) -> bool {
        self.acquire(false).await
    }

    async fn acquire(&self, try_lock: bool) -> bool {
        if self.key.is_empty() {
            info!("{EMPTY_LOCK_KEY}");
            return false;
        }
        if !self.state.lock().can_lock {
            info!("{LOCKING_ALREADY}");
            return false;
        }
        let request = self
            .context
            .request(&self.key, LockType::Simple, true, try_lock, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().acquired();
        } else if !response.cause.is_empty() {
            info!("locking [{}] fails: {}", self.key, response.cause);
        }
        response.success
    }

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
            .request(&self.key, LockType::Simple, false, false, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().released();
        }
        response.success
    }
}
