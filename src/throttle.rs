//! Per-client rate limiting.
//!
//! [`MemoryThrottler`] counts requests per identity in fixed windows. An
//! identity that goes over its allowance is banned for a while; the
//! [`BanHandler`] hears about it once, when the ban starts.
//!
//! Idle identities are swept out at most once per window, so the table only
//! holds clients seen in the current window or still serving a ban.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receives ban notifications.
pub trait BanHandler: Sync {
    fn ban(&self, identity: &str, ban_seconds: u64);
}

/// Logs bans as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBan;

impl BanHandler for LogBan {
    fn ban(&self, identity: &str, ban_seconds: u64) {
        log::warn!("User rate limit exceeded. IP: {identity} Expires: {ban_seconds}");
    }
}

/// Decides whether a client has used up its allowance.
pub trait Throttler: Sync {
    /// Count one request for `identity`. Returns `true` when the request
    /// must be refused; `on_exceeded` is told when a new ban begins.
    fn is_exceeded(&self, identity: &str, on_exceeded: &dyn BanHandler) -> bool;
}

/// Limits for [`MemoryThrottler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottlePolicy {
    pub allowed_requests: u32,
    pub window: Duration,
    pub ban_time: Duration,
    pub whitelist: Vec<String>,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            allowed_requests: 700,
            window: Duration::from_secs(3 * 60),
            ban_time: Duration::from_secs(60 * 60),
            whitelist: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    window_start: Instant,
    count: u32,
    banned_until: Option<Instant>,
}

impl Entry {
    fn fresh(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            banned_until: None,
        }
    }

    /// Neither banned nor inside its counting window.
    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        match self.banned_until {
            Some(until) => now >= until,
            None => now.saturating_duration_since(self.window_start) >= window,
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, Entry>,
    swept_at: Option<Instant>,
}

impl Table {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .swept_at
            .is_some_and(|at| now.saturating_duration_since(at) < window)
        {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_idle(now, window));
        self.swept_at = Some(now);
        log::trace!("throttler sweep dropped {} idle clients", before - self.entries.len());
    }
}

/// In-process fixed-window throttler.
#[derive(Debug, Default)]
pub struct MemoryThrottler {
    policy: ThrottlePolicy,
    table: Mutex<Table>,
}

impl MemoryThrottler {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            table: Mutex::new(Table::default()),
        }
    }

    /// [`Throttler::is_exceeded`] with an explicit clock.
    pub fn is_exceeded_at(&self, identity: &str, on_exceeded: &dyn BanHandler, now: Instant) -> bool {
        if self.policy.whitelist.iter().any(|w| w == identity) {
            return false;
        }

        let mut table = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Throttler state lock poisoned, continuing with recovered data");
                poisoned.into_inner()
            }
        };
        table.sweep(now, self.policy.window);
        let entry = table
            .entries
            .entry(identity.to_string())
            .or_insert_with(|| Entry::fresh(now));

        match entry.banned_until {
            Some(until) if now < until => return true,
            Some(_) => *entry = Entry::fresh(now),
            None => {}
        }
        if now.saturating_duration_since(entry.window_start) >= self.policy.window {
            *entry = Entry::fresh(now);
        }

        entry.count += 1;
        if entry.count > self.policy.allowed_requests {
            entry.banned_until = Some(now + self.policy.ban_time);
            drop(table);
            on_exceeded.ban(identity, self.policy.ban_time.as_secs());
            return true;
        }
        false
    }
}

impl Throttler for MemoryThrottler {
    fn is_exceeded(&self, identity: &str, on_exceeded: &dyn BanHandler) -> bool {
        self.is_exceeded_at(identity, on_exceeded, Instant::now())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Records every ban it is told about.
    #[derive(Default)]
    pub struct RecordingBan {
        pub bans: Mutex<Vec<(String, u64)>>,
    }

    impl BanHandler for RecordingBan {
        fn ban(&self, identity: &str, ban_seconds: u64) {
            self.bans
                .lock()
                .unwrap()
                .push((identity.to_string(), ban_seconds));
        }
    }

    fn throttler(allowed: u32) -> MemoryThrottler {
        MemoryThrottler::new(ThrottlePolicy {
            allowed_requests: allowed,
            window: Duration::from_secs(60),
            ban_time: Duration::from_secs(600),
            whitelist: vec!["10.0.0.1".into()],
        })
    }

    #[test]
    fn allows_up_to_the_limit() {
        let t = throttler(3);
        let ban = RecordingBan::default();
        let now = Instant::now();
        for _ in 0..3 {
            assert!(!t.is_exceeded_at("1.2.3.4", &ban, now));
        }
        assert!(t.is_exceeded_at("1.2.3.4", &ban, now));
        assert_eq!(*ban.bans.lock().unwrap(), vec![("1.2.3.4".to_string(), 600)]);
    }

    #[test]
    fn ban_handler_called_once_per_ban() {
        let t = throttler(1);
        let ban = RecordingBan::default();
        let now = Instant::now();
        t.is_exceeded_at("a", &ban, now);
        for i in 0..5 {
            assert!(t.is_exceeded_at("a", &ban, now + Duration::from_secs(i)));
        }
        assert_eq!(ban.bans.lock().unwrap().len(), 1);
    }

    #[test]
    fn ban_expires() {
        let t = throttler(1);
        let ban = RecordingBan::default();
        let now = Instant::now();
        t.is_exceeded_at("a", &ban, now);
        assert!(t.is_exceeded_at("a", &ban, now));
        assert!(!t.is_exceeded_at("a", &ban, now + Duration::from_secs(601)));
    }

    #[test]
    fn window_resets_count() {
        let t = throttler(2);
        let ban = RecordingBan::default();
        let now = Instant::now();
        assert!(!t.is_exceeded_at("a", &ban, now));
        assert!(!t.is_exceeded_at("a", &ban, now));
        assert!(!t.is_exceeded_at("a", &ban, now + Duration::from_secs(61)));
        assert!(ban.bans.lock().unwrap().is_empty());
    }

    #[test]
    fn identities_are_independent_and_whitelist_is_exempt() {
        let t = throttler(1);
        let ban = RecordingBan::default();
        let now = Instant::now();
        assert!(!t.is_exceeded_at("a", &ban, now));
        assert!(!t.is_exceeded_at("b", &ban, now));
        for _ in 0..10 {
            assert!(!t.is_exceeded_at("10.0.0.1", &ban, now));
        }
    }

    fn tracked(t: &MemoryThrottler) -> usize {
        t.table.lock().unwrap().entries.len()
    }

    #[test]
    fn idle_clients_are_swept() {
        let t = throttler(1);
        let ban = RecordingBan::default();
        let now = Instant::now();
        for i in 0..50 {
            t.is_exceeded_at(&format!("198.51.100.{i}"), &ban, now);
        }
        t.is_exceeded_at("banned", &ban, now);
        t.is_exceeded_at("banned", &ban, now);
        assert_eq!(tracked(&t), 51);

        // One window later only the ban and the new caller remain
        let later = now + Duration::from_secs(61);
        assert!(!t.is_exceeded_at("late", &ban, later));
        assert_eq!(tracked(&t), 2);
        assert!(t.is_exceeded_at("banned", &ban, later));

        // Once the ban has run out it goes too
        let expired = now + Duration::from_secs(700);
        assert!(!t.is_exceeded_at("late", &ban, expired));
        assert_eq!(tracked(&t), 1);
    }

    #[test]
    fn sweep_runs_at_most_once_per_window() {
        let t = throttler(5);
        let ban = RecordingBan::default();
        let now = Instant::now();
        t.is_exceeded_at("a", &ban, now);
        t.is_exceeded_at("b", &ban, now + Duration::from_secs(30));
        t.is_exceeded_at("c", &ban, now + Duration::from_secs(61));
        assert_eq!(tracked(&t), 2, "a swept, b still counting");

        // b went idle at 90s but the next sweep is not due until 121s
        t.is_exceeded_at("c", &ban, now + Duration::from_secs(100));
        assert_eq!(tracked(&t), 2);
        t.is_exceeded_at("c", &ban, now + Duration::from_secs(121));
        assert_eq!(tracked(&t), 1);
    }

    #[test]
    fn default_policy_values() {
        let policy = ThrottlePolicy::default();
        assert_eq!(policy.allowed_requests, 700);
        assert_eq!(policy.window, Duration::from_secs(180));
        assert_eq!(policy.ban_time, Duration::from_secs(3600));
    }
}
