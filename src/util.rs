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
use std::hash::{Hash, Hasher};
use std::thread;

/// Label of the calling thread, used as the `thread` field of requests.
/// Named threads keep their name; unnamed ones get a stable numeric label.
pub fn thread_label() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("thread-{}", thread_id_to_u64()),
    }
}

// Helper function to get the thread ID
pub fn thread_id_to_u64() -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_thread_keeps_its_name() {
        let handle = thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(thread_label)
            .unwrap();
        assert_eq!(handle.join().unwrap(), "worker-7");
    }

    #[test]
    fn label_is_stable_within_a_thread() {
        assert_eq!(thread_label(), thread_label());
    }
}
