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
mod read_write;
mod reentrant;
mod simple;
mod timeout;

pub use read_write::{ReadLock, ReadWriteLock, WriteLock};
pub use reentrant::ReentrantLock;
pub use simple::SimpleLock;
pub use timeout::TimeoutLock;

use std::sync::Arc;

use crate::client::connection::ConnectionPool;
use crate::client::identity::IdentityGenerator;
use crate::protocol::{LockRequest, LockType};

// ================ Local request errors ================

pub(crate) const EMPTY_LOCK_KEY: &str = "Lock key should not be null or empty, reset lock key.";

pub(crate) const LOCKING_ALREADY: &str = "Locking succeeds already, lock cancels.";

pub(crate) const LOCKING_FAIL: &str = "Locking fails before, unlock cancels.";

pub(crate) const UNLOCKING_ALREADY: &str = "Unlocking succeeds already, unlock cancels.";

/// What a lock handle needs from its client: the transport, the identity
/// source and the caller labels stamped on every request.
#[derive(Clone)]
pub(crate) struct LockContext {
    pub(crate) pool: Arc<ConnectionPool>,
    pub(crate) identities: Arc<IdentityGenerator>,
    pub(crate) application: String,
    pub(crate) thread: String,
}

impl LockContext {
    pub(crate) fn request(
        &self,
        key: &str,
        lock_type: LockType,
        is_lock: bool,
        try_lock: bool,
        time: i64,
        read_lock: bool,
    ) -> LockRequest {
        LockRequest {
            key: key.to_string(),
            application: self.application.clone(),
            thread: self.thread.clone(),
            lock_type,
            is_lock,
            try_lock,
            time,
            read_lock,
            identity: self.identities.generate(),
        }
    }
}

/// 锁的本地状态: a handle refuses obviously wrong sequences locally, without
/// a round-trip. `can_lock` falls once an acquisition succeeds, `can_unlock`
/// rises with it and falls again after the release.
pub(crate) struct GuardState {
    pub(crate) success: bool,
    pub(crate) can_lock: bool,
    pub(crate) can_unlock: bool,
}

impl GuardState {
    pub(crate) fn new() -> Self {
        Self {
            success: false,
            can_lock: true,
            can_unlock: false,
        }
    }

    pub(crate) fn acquired(&mut self) {
        self.success = true;
        self.can_lock = false;
        self.can_unlock = true;
    }

    pub(crate) fn released(&mut self) {
        self.can_unlock = false;
    }
}
