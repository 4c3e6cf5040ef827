//! When scheduled broadcasts fire.

use chrono::{DateTime, Days, FixedOffset, NaiveTime, Offset, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Every `minutes`, measured from the end of the previous run
    Interval { minutes: u32 },
    /// Once a day at a wall-clock time in a fixed UTC offset
    Daily {
        hour: u32,
        minute: u32,
        #[serde(default = "default_offset")]
        utc_offset_hours: i32,
    },
}

fn default_offset() -> i32 {
    1
}

impl Default for Schedule {
    /// 09:00 West Africa Time
    fn default() -> Self {
        Schedule::Daily {
            hour: 9,
            minute: 0,
            utc_offset_hours: default_offset(),
        }
    }
}

impl Schedule {
    /// First fire strictly after `now`
    pub fn next_fire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Interval { minutes } => {
                now + chrono::Duration::minutes(i64::from(minutes.max(1)))
            }
            Schedule::Daily {
                hour,
                minute,
                utc_offset_hours,
            } => {
                let offset = FixedOffset::east_opt(utc_offset_hours.clamp(-23, 23) * 3600)
                    .unwrap_or_else(|| Utc.fix());
                let at = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)
                    .unwrap_or(NaiveTime::MIN);
                let local = now.with_timezone(&offset);
                let today = local.date_naive().and_time(at);
                let naive = if today > local.naive_local() {
                    Some(today)
                } else {
                    today.checked_add_days(Days::new(1))
                };
                naive
                    .and_then(|n| n.and_local_timezone(offset).single())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| now + chrono::Duration::days(1))
            }
        }
    }

    /// How long to sleep from `now` until the next fire
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_fire(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn describe(&self) -> String {
        match *self {
            Schedule::Interval { minutes } => format!("every {minutes} min"),
            Schedule::Daily {
                hour,
                minute,
                utc_offset_hours,
            } => format!("daily at {hour:02}:{minute:02} UTC{utc_offset_hours:+}"),
        }
    }
}
