//! Liveness probing of a connection.
//!
//! [`HealthMonitor`] performs no I/O. The connection actor asks it for the next
//! deadline, sleeps until then, and acts on the returned [`HealthAction`].

use std::time::Duration;

use tokio::time::Instant;

use crate::config::HealthCheckConfig;

/// What the actor must do after a health timer fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum HealthAction {
    /// Nothing is due yet.
    Idle,
    /// Send a probe carrying this token.
    SendProbe(u64),
    /// The outstanding probe was not acknowledged within the timeout.
    Failed(Duration),
}

#[derive(Clone, Copy, Debug)]
struct Probe {
    token: u64,
    deadline: Instant,
}

#[derive(Debug)]
struct Schedule {
    period: Duration,
    timeout: Duration,
    next_probe: Instant,
    outstanding: Option<Probe>,
}

/// Periodic ping/ack state machine.
///
/// At most one probe is outstanding at a time. An acknowledgement carrying any
/// other token is ignored.
#[derive(Debug)]
pub(super) struct HealthMonitor {
    schedule: Option<Schedule>,
    next_token: u64,
}

impl HealthMonitor {
    /// Build a monitor whose first probe is due one period after `now`.
    pub(super) fn new(config: HealthCheckConfig, now: Instant) -> Self {
        let schedule = match (config.period_value(), config.timeout_value()) {
            (Some(period), Some(timeout)) => Some(Schedule {
                period,
                timeout,
                next_probe: now + period,
                outstanding: None,
            }),
            _ => None,
        };
        Self {
            schedule,
            next_token: 1,
        }
    }

    /// Instant at which [`on_timer`](Self::on_timer) must next be called.
    ///
    /// `None` for an inert monitor.
    pub(super) fn next_deadline(&self) -> Option<Instant> {
        self.schedule.as_ref().map(|schedule| {
            schedule
                .outstanding
                .map_or(schedule.next_probe, |probe| probe.deadline)
        })
    }

    pub(super) fn on_timer(&mut self, now: Instant) -> HealthAction {
        let Some(schedule) = self.schedule.as_mut() else {
            return HealthAction::Idle;
        };
        if let Some(probe) = schedule.outstanding {
            return if now >= probe.deadline {
                HealthAction::Failed(schedule.timeout)
            } else {
                HealthAction::Idle
            };
        }
        if now < schedule.next_probe {
            return HealthAction::Idle;
        }
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);
        schedule.outstanding = Some(Probe {
            token,
            deadline: now + schedule.timeout,
        });
        HealthAction::SendProbe(token)
    }

    /// Record an acknowledgement. Returns `false` when the token is stale.
    pub(super) fn on_ack(&mut self, token: u64, now: Instant) -> bool {
        let Some(schedule) = self.schedule.as_mut() else {
            return false;
        };
        match schedule.outstanding {
            Some(probe) if probe.token == token => {
                schedule.outstanding = None;
                schedule.next_probe = now + schedule.period;
                true
            }
            _ => false,
        }
    }
}
