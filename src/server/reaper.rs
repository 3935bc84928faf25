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
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// One scheduled expiration: the acquisition that must be evicted at
/// `deadline` unless the key changed hands first. The identity pins the
/// record to the exact acquisition, so a record for a lock that was released
/// (and possibly re-acquired) turns stale instead of evicting the new holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DelayedLock {
    pub(crate) deadline: Instant,
    pub(crate) key: String,
    pub(crate) identity: i64,
}

impl Ord for DelayedLock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.identity.cmp(&other.identity))
    }
}

impl PartialOrd for DelayedLock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Deadline-ordered queue feeding the expiration reaper. A min-heap replaces
/// per-lock timers: the reaper sleeps until the earliest deadline and is
/// nudged through `wake` whenever a push may have moved it forward.
pub(crate) struct DelayQueue {
    heap: Mutex<BinaryHeap<Reverse<DelayedLock>>>,
    wake: Notify,
}

impl DelayQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            wake: Notify::new(),
        }
    }

    pub(crate) fn push(&self, lock: DelayedLock) {
        self.heap.lock().push(Reverse(lock));
        self.wake.notify_one();
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.lock().peek().map(|entry| entry.0.deadline)
    }

    /// Pops every record whose deadline has passed, earliest first.
    pub(crate) fn pop_expired(&self, now: Instant) -> Vec<DelayedLock> {
        let mut heap = self.heap.lock();
        let mut expired = Vec::new();
        while let Some(entry) = heap.peek() {
            if entry.0.deadline > now {
                break;
            }
            if let Some(Reverse(lock)) = heap.pop() {
                expired.push(lock);
            }
        }
        expired
    }

    /// Parks until another push lands.
    pub(crate) async fn changed(&self) {
        self.wake.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(key: &str, identity: i64, deadline: Instant) -> DelayedLock {
        DelayedLock {
            deadline,
            key: key.to_string(),
            identity,
        }
    }

    #[test]
    fn pops_expired_in_deadline_order() {
        let queue = DelayQueue::new();
        let now = Instant::now();
        queue.push(record("b", 2, now + Duration::from_millis(20)));
        queue.push(record("a", 1, now + Duration::from_millis(10)));
        queue.push(record("c", 3, now + Duration::from_secs(60)));

        let expired = queue.pop_expired(now + Duration::from_millis(30));
        assert_eq!(
            expired.iter().map(|lock| lock.key.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn nothing_expires_before_its_deadline() {
        let queue = DelayQueue::new();
        let now = Instant::now();
        queue.push(record("a", 1, now + Duration::from_secs(5)));
        assert!(queue.pop_expired(now).is_empty());
    }

    #[tokio::test]
    async fn push_wakes_a_parked_reaper() {
        let queue = std::sync::Arc::new(DelayQueue::new());
        let parked = queue.clone();
        let waiter = tokio::spawn(async move { parked.changed().await });
        queue.push(record("a", 1, Instant::now()));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
