// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message id and timestamp issuer.

use chrono::{DateTime, Duration, Utc};
use courier_core::MessageId;

/// Issues `msg-<n>` ids from a counter and wall-clock timestamps that never
/// go backwards, so history order and timestamp order always agree.
#[derive(Debug, Default)]
pub struct MessageClock {
    issued: u64,
    last: Option<DateTime<Utc>>,
}

impl MessageClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> (MessageId, DateTime<Utc>) {
        self.issue_at(Utc::now())
    }

    fn issue_at(&mut self, now: DateTime<Utc>) -> (MessageId, DateTime<Utc>) {
        self.issued += 1;
        let timestamp = match self.last {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(timestamp);
        (MessageId(format!("msg-{}", self.issued)), timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let mut clock = MessageClock::new();
        let (a, _) = clock.issue();
        let (b, _) = clock.issue();
        assert_eq!(a.0, "msg-1");
        assert_eq!(b.0, "msg-2");
    }

    #[test]
    fn timestamps_strictly_increase_when_wall_clock_stalls() {
        let mut clock = MessageClock::new();
        let now = Utc::now();
        let (_, t1) = clock.issue_at(now);
        let (_, t2) = clock.issue_at(now);
        let (_, t3) = clock.issue_at(now - Duration::seconds(10));
        assert_eq!(t1, now);
        assert!(t2 > t1);
        assert!(t3 > t2);
    }

    #[test]
    fn timestamps_follow_wall_clock_when_it_advances() {
        let mut clock = MessageClock::new();
        let now = Utc::now();
        clock.issue_at(now);
        let later = now + Duration::seconds(1);
        let (_, t) = clock.issue_at(later);
        assert_eq!(t, later);
    }
}
