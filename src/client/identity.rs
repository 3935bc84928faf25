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
use std::sync::atomic::{AtomicI64, Ordering};

/// Identity source of one client: a monotonically increasing counter. Every
/// outgoing request takes a fresh value, the sole token correlating it with
/// its response.
pub struct IdentityGenerator {
    count: AtomicI64,
}

impl IdentityGenerator {
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    pub fn generate(&self) -> i64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn identities_start_at_one_and_increase() {
        let generator = IdentityGenerator::new();
        assert_eq!(generator.generate(), 1);
        assert_eq!(generator.generate(), 2);
        assert_eq!(generator.generate(), 3);
    }

    #[test]
    fn identities_stay_unique_across_threads() {
        let generator = Arc::new(IdentityGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = generator.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| generator.generate()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for identity in handle.join().unwrap() {
                assert!(seen.insert(identity), "identity {identity} issued twice");
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}
