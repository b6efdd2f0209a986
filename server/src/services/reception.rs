//! Decides whether the public booking form accepts reservations.
//!
//! The production-wide status and the per-performance flag share one
//! evaluation path. The only difference is which performances' deadlines are
//! consulted: all of them, or exactly one.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Performance, Production, ReceptionConfig, ReceptionEndMode, ReceptionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectiveReceptionStatus {
    Open,
    BeforeStart,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReception {
    pub performance_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub open: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceptionSnapshot {
    pub production_id: Uuid,
    pub status: EffectiveReceptionStatus,
    pub performances: Vec<PerformanceReception>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReceptionEvaluator {
    timezone: Tz,
}

impl ReceptionEvaluator {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Booking deadline for one performance, or `None` when the production
    /// closes manually.
    pub fn deadline(
        &self,
        reception: &ReceptionConfig,
        performance: &Performance,
    ) -> Option<DateTime<Utc>> {
        match reception.end_mode? {
            ReceptionEndMode::Manual => None,
            ReceptionEndMode::PerformanceStart => Some(performance.start_time),
            ReceptionEndMode::BeforePerformance => Some(
                Duration::try_minutes(reception.end_minutes)
                    .and_then(|offset| performance.start_time.checked_sub_signed(offset))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
            ReceptionEndMode::DayBefore => Some(self.local_midnight(performance.start_time)),
        }
    }

    /// Start of the performance's calendar day in the theater's time zone.
    fn local_midnight(&self, start_time: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = start_time
            .with_timezone(&self.timezone)
            .date_naive()
            .and_time(chrono::NaiveTime::MIN);
        self.timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            // Midnight skipped by a DST jump; treat the wall-clock value as UTC.
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }

    /// Evaluates the window for the whole production (`performance = None`)
    /// or for a single performance.
    pub fn evaluate(
        &self,
        production: &Production,
        performance: Option<&Performance>,
        now: DateTime<Utc>,
    ) -> EffectiveReceptionStatus {
        let reception = &production.reception;

        if let Some(start) = reception.start {
            if now < start {
                return EffectiveReceptionStatus::BeforeStart;
            }
        }

        let manual_end_passed = reception.end.is_some_and(|end| now > end);

        let closed = match reception.end_mode {
            None | Some(ReceptionEndMode::Manual) => manual_end_passed,
            Some(_) => {
                let scope: &[Performance] = match performance {
                    Some(single) => std::slice::from_ref(single),
                    None => &production.performances,
                };
                if scope.is_empty() {
                    manual_end_passed
                } else {
                    scope.iter().all(|p| {
                        self.deadline(reception, p)
                            .is_some_and(|deadline| now >= deadline)
                    })
                }
            }
        };

        if closed {
            return EffectiveReceptionStatus::Closed;
        }

        if reception.start.is_some() || reception.status == ReceptionStatus::Open {
            EffectiveReceptionStatus::Open
        } else {
            EffectiveReceptionStatus::Closed
        }
    }

    pub fn effective_status(
        &self,
        production: &Production,
        now: DateTime<Utc>,
    ) -> EffectiveReceptionStatus {
        self.evaluate(production, None, now)
    }

    pub fn performance_open(
        &self,
        production: &Production,
        performance: &Performance,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(production, Some(performance), now) == EffectiveReceptionStatus::Open
    }

    pub fn snapshot(&self, production: &Production, now: DateTime<Utc>) -> ReceptionSnapshot {
        let mut performances: Vec<PerformanceReception> = production
            .performances
            .iter()
            .map(|performance| PerformanceReception {
                performance_id: performance.id,
                start_time: performance.start_time,
                deadline: self.deadline(&production.reception, performance),
                open: self.performance_open(production, performance, now),
            })
            .collect();
        performances.sort_by_key(|p| p.start_time);

        ReceptionSnapshot {
            production_id: production.id,
            status: self.effective_status(production, now),
            performances,
        }
    }
}
