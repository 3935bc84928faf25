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
mod codec;

pub use codec::*;

use serde::{Deserialize, Serialize};

use crate::errors::EasyLockError;

// ================ Response causes ================

pub const SUCCEED: &str = "";

pub const LOCKED_ALREADY: &str = "Lock has been locked already.";

pub const LOCK_EXPIRED: &str = "Lock has expired already.";

pub const WRITE_LOCKED_READ_FAILS: &str = "Locked by a write lock, read locking fails.";

pub const WRITE_LOCKED_WRITE_FAILS: &str = "Locked by a write lock, write locking fails.";

pub const READ_LOCKED_WRITE_FAILS: &str = "Locked by a read lock, write locking fails.";

pub const LOCK_CANCELLED: &str = "Connection to server fails, lock request cancelled";

pub const UNLOCK_CANCELLED: &str = "Connection to server fails, unlock request cancelled";

/// Lock flavors arbitrated by the server. The discriminants are the wire
/// representation and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LockType {
    Simple = 1,
    Timeout = 2,
    Reentrant = 4,
    ReadWrite = 8,
}

impl From<LockType> for u8 {
    fn from(lock_type: LockType) -> Self {
        lock_type as u8
    }
}

impl TryFrom<u8> for LockType {
    type Error = EasyLockError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LockType::Simple),
            2 => Ok(LockType::Timeout),
            4 => Ok(LockType::Reentrant),
            8 => Ok(LockType::ReadWrite),
            other => Err(EasyLockError::UnknownLockType(other)),
        }
    }
}

impl std::fmt::Display for LockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LockType::Simple => "SimpleLock",
            LockType::Timeout => "TimeoutLock",
            LockType::Reentrant => "ReentrantLock",
            LockType::ReadWrite => "ReadWriteLock",
        };
        f.write_str(name)
    }
}

/// A lock or unlock request. Field order is the wire order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    /// Lock name; never empty on the wire
    pub key: String,
    /// Originating client application label
    pub application: String,
    /// Originating caller label
    pub thread: String,
    pub lock_type: LockType,
    /// true = acquire, false = release
    pub is_lock: bool,
    /// Non-blocking attempt; meaningful only when `is_lock`
    pub try_lock: bool,
    /// Expiration in milliseconds; meaningful only for timeout acquisitions
    pub time: i64,
    /// Read side of a read-write lock
    pub read_lock: bool,
    /// Client-unique sequence number; the response correlation token
    pub identity: i64,
}

impl LockRequest {
    /// Whether both requests were issued by the same caller.
    pub fn same_owner(&self, other: &LockRequest) -> bool {
        self.application == other.application && self.thread == other.thread
    }

    /// `[application] - [thread]`, the owner pair as it appears in log lines.
    pub fn owner_label(&self) -> String {
        format!("[{}] - [{}]", self.application, self.thread)
    }
}

/// Acknowledgement of a [`LockRequest`], correlated by `identity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResponse {
    pub key: String,
    pub identity: i64,
    pub success: bool,
    pub cause: String,
    pub is_lock_response: bool,
}

impl LockResponse {
    pub fn new(key: &str, identity: i64, success: bool, cause: &str, is_lock_response: bool) -> Self {
        Self {
            key: key.to_string(),
            identity,
            success,
            cause: cause.to_string(),
            is_lock_response,
        }
    }

    /// Successful answer to `request`.
    pub fn granted(request: &LockRequest) -> Self {
        Self::answering(request, true, SUCCEED)
    }

    /// Failed answer to `request` with the given cause.
    pub fn denied(request: &LockRequest, cause: &str) -> Self {
        Self::answering(request, false, cause)
    }

    pub fn answering(request: &LockRequest, success: bool, cause: &str) -> Self {
        Self::new(
            &request.key,
            request.identity,
            success,
            cause,
            !request.is_lock,
        )
    }

    /// Failure fabricated at the client when a request cannot reach the server.
    pub fn cancelled(key: &str, identity: i64, is_lock: bool) -> Self {
        let cause = if is_lock { LOCK_CANCELLED } else { UNLOCK_CANCELLED };
        Self::new(key, identity, false, cause, !is_lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_type_wire_values() {
        assert_eq!(u8::from(LockType::Simple), 1);
        assert_eq!(u8::from(LockType::Timeout), 2);
        assert_eq!(u8::from(LockType::Reentrant), 4);
        assert_eq!(u8::from(LockType::ReadWrite), 8);
        assert!(LockType::try_from(3).is_err());
    }

    #[test]
    fn responses_invert_the_ack_class() {
        let request = LockRequest {
            key: "orders".to_string(),
            application: "app".to_string(),
            thread: "main".to_string(),
            lock_type: LockType::Simple,
            is_lock: true,
            try_lock: false,
            time: 0,
            read_lock: false,
            identity: 7,
        };
        let response = LockResponse::granted(&request);
        assert_eq!(response.identity, 7);
        assert!(response.success);
        assert_eq!(response.cause, SUCCEED);
        assert!(!response.is_lock_response);

        let release = LockRequest {
            is_lock: false,
            ..request
        };
        assert!(LockResponse::granted(&release).is_lock_response);
    }

    #[test]
    fn cancelled_response_names_the_request_class() {
        let lock = LockResponse::cancelled("k", 9, true);
        assert!(!lock.success);
        assert!(lock.cause.starts_with("Connection to server fails"));
        let unlock = LockResponse::cancelled("k", 10, false);
        assert_eq!(unlock.cause, UNLOCK_CANCELLED);
    }

    #[test]
    fn same_owner_compares_application_and_thread() {
        let mine = LockRequest {
            key: "k".to_string(),
            application: "app".to_string(),
            thread: "t1".to_string(),
            lock_type: LockType::ReadWrite,
            is_lock: true,
            try_lock: false,
            time: 0,
            read_lock: true,
            identity: 1,
        };
        let same = LockRequest {
            identity: 2,
            read_lock: false,
            ..mine.clone()
        };
        let other = LockRequest {
            thread: "t2".to_string(),
            ..mine.clone()
        };
        assert!(mine.same_owner(&same));
        assert!(!mine.same_owner(&other));
    }
}
