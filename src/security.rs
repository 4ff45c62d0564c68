//! Brute-force protection for the admin surface.
//!
//! Counters live in memory only. A reboot clears them.

use crate::clock::elapsed;

pub const MAX_FAILED_ATTEMPTS: u8 = 5;
/// 5 minutes
pub const LOCKOUT_DURATION_MS: u32 = 300_000;
pub const MIN_REQUEST_INTERVAL_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    pub max_failures: u8,
    pub lockout_ms: u32,
    pub min_interval_ms: u32,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            max_failures: MAX_FAILED_ATTEMPTS,
            lockout_ms: LOCKOUT_DURATION_MS,
            min_interval_ms: MIN_REQUEST_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    LockedOut,
    RateLimited,
    BadCredentials,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecuritySession {
    pub failed_attempts: u8,
    pub lockout_start: Option<u32>,
    pub last_request: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SecurityGate {
    policy: GatePolicy,
    session: SecuritySession,
}

impl SecurityGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            policy,
            session: SecuritySession::default(),
        }
    }

    pub fn session(&self) -> &SecuritySession {
        &self.session
    }

    /// `false` when the previous accepted request was less than the minimum
    /// interval ago. Accepted requests move the window.
    pub fn check_rate(&mut self, now: u32) -> bool {
        if let Some(last) = self.session.last_request {
            if elapsed(now, last) < self.policy.min_interval_ms {
                return false;
            }
        }
        self.session.last_request = Some(now);
        true
    }

    /// `false` while a lockout is running. An expired lockout is cleared
    /// together with the failure count.
    pub fn check_lockout(&mut self, now: u32) -> bool {
        let Some(start) = self.session.lockout_start else {
            return true;
        };
        if elapsed(now, start) < self.policy.lockout_ms {
            return false;
        }
        log::info!("Admin lockout expired");
        self.session.lockout_start = None;
        self.session.failed_attempts = 0;
        true
    }

    pub fn record_failure(&mut self, now: u32) {
        self.session.failed_attempts = self.session.failed_attempts.saturating_add(1);
        if self.session.failed_attempts == self.policy.max_failures {
            log::warn!(
                "{} failed admin logins, locking out for {}s",
                self.session.failed_attempts,
                self.policy.lockout_ms / 1000
            );
            self.session.lockout_start = Some(now);
        }
    }

    pub fn record_success(&mut self) {
        self.session.failed_attempts = 0;
        self.session.lockout_start = None;
    }

    /// Lockout, then rate limit, then credentials. `credentials_ok` is not
    /// called unless the first two pass.
    pub fn authorize(&mut self, now: u32, credentials_ok: impl FnOnce() -> bool) -> Decision {
        if !self.check_lockout(now) {
            return Decision::LockedOut;
        }
        if !self.check_rate(now) {
            return Decision::RateLimited;
        }
        if !credentials_ok() {
            self.record_failure(now);
            return Decision::BadCredentials;
        }
        self.record_success();
        Decision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_after_five_failures() {
        let mut gate = SecurityGate::default();
        let start = 1_000;
        for i in 0..5u32 {
            assert!(gate.check_lockout(start + i));
            gate.record_failure(start + i);
        }
        let locked_at = start + 4;
        assert_eq!(gate.session().lockout_start, Some(locked_at));

        assert!(!gate.check_lockout(locked_at));
        assert!(!gate.check_lockout(locked_at + LOCKOUT_DURATION_MS - 1));
        assert!(gate.check_lockout(locked_at + LOCKOUT_DURATION_MS));
        assert_eq!(gate.session(), &SecuritySession::default());
    }

    #[test]
    fn four_failures_do_not_lock() {
        let mut gate = SecurityGate::default();
        for _ in 0..4 {
            gate.record_failure(10);
        }
        assert!(gate.check_lockout(11));
        gate.record_success();
        assert_eq!(gate.session().failed_attempts, 0);
    }

    #[test]
    fn lockout_expiry_across_wrap() {
        let mut gate = SecurityGate::default();
        let t = u32::MAX - 1000;
        for _ in 0..5 {
            gate.record_failure(t);
        }
        assert!(!gate.check_lockout(t.wrapping_add(LOCKOUT_DURATION_MS - 1)));
        assert!(gate.check_lockout(t.wrapping_add(LOCKOUT_DURATION_MS)));
    }

    #[test]
    fn rate_limit_spacing() {
        let mut gate = SecurityGate::default();
        assert!(gate.check_rate(5_000));
        assert!(!gate.check_rate(5_099));
        assert!(gate.check_rate(5_100));
        assert!(gate.check_rate(5_200));
    }

    #[test]
    fn rejected_request_does_not_move_the_window() {
        let mut gate = SecurityGate::default();
        assert!(gate.check_rate(0));
        assert!(!gate.check_rate(60));
        assert!(gate.check_rate(100));
    }

    #[test]
    fn locked_out_client_never_reaches_credentials() {
        let mut gate = SecurityGate::default();
        let mut now = 10_000;
        for _ in 0..5 {
            assert_eq!(gate.authorize(now, || false), Decision::BadCredentials);
            now += 200;
        }

        let mut checked = false;
        let decision = gate.authorize(now, || {
            checked = true;
            true
        });
        assert_eq!(decision, Decision::LockedOut);
        assert!(!checked);
    }

    #[test]
    fn rate_limit_comes_before_credentials() {
        let mut gate = SecurityGate::default();
        assert_eq!(gate.authorize(0, || true), Decision::Allowed);
        let mut checked = false;
        assert_eq!(
            gate.authorize(50, || {
                checked = true;
                false
            }),
            Decision::RateLimited
        );
        assert!(!checked);
        assert_eq!(gate.session().failed_attempts, 0);
    }

    #[test]
    fn success_clears_failures() {
        let mut gate = SecurityGate::default();
        assert_eq!(gate.authorize(0, || false), Decision::BadCredentials);
        assert_eq!(gate.authorize(200, || false), Decision::BadCredentials);
        assert_eq!(gate.authorize(400, || true), Decision::Allowed);
        assert_eq!(gate.session().failed_attempts, 0);
    }
}
