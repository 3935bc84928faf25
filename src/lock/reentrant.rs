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

use crate::lock::{LockContext, EMPTY_LOCK_KEY, LOCKING_FAIL, UNLOCKING_ALREADY};
use crate::protocol::LockType;

/// === ReentrantLock (exclusive, stackable by the same caller) ===
///
/// The handle may lock repeatedly; releases must balance acquisitions
/// before the key frees server-side. The depth counter lives here so a
/// drained handle refuses further unlocks locally.
pub struct ReentrantLock {
    context: LockContext,
    key: String,
    state: Mutex<ReentrantState>,
}

struct ReentrantState {
    success: bool,
    count: u32,
}

impl ReentrantLock {
    pub(crate) fn new(context: LockContext, key: String) -> Self {
        Self {
            context,
            key,
            state: Mutex::new(ReentrantState {
                success: false,
                count: 0,
            }),
        }
    }

    pub async fn try_lock(&self) -> bool {
        self.acquire(true).await
    }

    pub async fn lock(&self) -> bool {
        self.acquire(false).await
    }

    /// Current local re-acquisition depth.
    pub fn hold_count(&self) -> u32 {
        self.state.lock().count
    }

    async fn acquire(&self, try_lock: bool) -> bool {
        if self.key.is_empty() {
            info!("{EMPTY_LOCK_KEY}");
            return false;
        }
        let request = self
            .context
            .request(&self.key, LockType::Reentrant, true, try_lock, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            let mut state = self.state.lock();
            state.success = true;
            state.count += 1;
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
            if state.count == 0 {
                info!("{UNLOCKING_ALREADY}");
                return false;
            }
        }
        let request = self
            .context
            .request(&self.key, LockType::Reentrant, false, false, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            let mut state = self.state.lock();
            state.count = state.count.saturating_sub(1);
        }
        response.success
    }
}
