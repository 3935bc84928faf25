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

/// === ReadWriteLock (inclusive reads, exclusive writes) ===
///
/// Hands out a read half and a write half over the same key. Both halves
/// carry the same caller labels, which is what lets a write holder take the
/// read side and downgrade: release the write half while keeping the read
/// half and the key ends up shared instead of free.
pub struct ReadWriteLock {
    context: LockContext,
    key: String,
}

impl ReadWriteLock {
    pub(crate) fn new(context: LockContext, key: String) -> Self {
        Self { context, key }
    }

    /// The read side of this lock.
    pub fn read_lock(&self) -> ReadLock {
        ReadLock {
            context: self.context.clone(),
            key: self.key.clone(),
            state: Mutex::new(GuardState::new()),
        }
    }

    /// The write side of this lock.
    pub fn write_lock(&self) -> WriteLock {
        WriteLock {
            context: self.context.clone(),
            key: self.key.clone(),
            state: Mutex::new(GuardState::new()),
        }
    }
}

pub struct ReadLock {
    context: LockContext,
    key: String,
    state: Mutex<GuardState>,
}

impl ReadLock {
    pub async fn try_lock(&self) -> bool {
        self.acquire(true).await
    }

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
            .request(&self.key, LockType::ReadWrite, true, try_lock, 0, true);
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().acquired();
        } else if !response.cause.is_empty() {
            info!("read locking [{}] fails: {}", self.key, response.cause);
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
            .request(&self.key, LockType::ReadWrite, false, false, 0, true);
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().released();
        }
        response.success
    }
}

pub struct WriteLock {
    context: LockContext,
    key: String,
    state: Mutex<GuardState>,
}

impl WriteLock {
    pub async fn try_lock(&self) -> bool {
        self.acquire(true).await
    }

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
            .request(&self.key, LockType::ReadWrite, true, try_lock, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().acquired();
        } else if !response.cause.is_empty() {
            info!("write locking [{}] fails: {}", self.key, response.cause);
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
            .request(&self.key, LockType::ReadWrite, false, false, 0, false);
        let response = self.context.pool.send(request).await;
        if response.success {
            self.state.lock().released();
        }
        response.success
    }
}
