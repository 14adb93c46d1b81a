use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{Category, InteractionRecord, Sentiment};

pub const DEMO_DAYS: i64 = 7;
pub const MIN_PER_DAY: usize = 2;
pub const MAX_PER_DAY: usize = 8;
pub const FIRST_HOUR: u32 = 8;
pub const LAST_HOUR: u32 = 23;

/// Synthetic placeholder records for an empty dashboard. Output is never persisted here.
#[derive(Debug, Clone, Copy)]
pub struct DemoGenerator {
    offset: FixedOffset,
}

impl DemoGenerator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn generate(&self) -> Vec<InteractionRecord> {
        self.generate_at(Utc::now(), &mut rand::thread_rng())
    }

    /// Records for the seven calendar days ending on `now`'s day (in the report offset).
    pub fn generate_at<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Vec<InteractionRecord> {
        let today = now.with_timezone(&self.offset).date_naive();
        let mut records = Vec::new();

        for days_back in (0..DEMO_DAYS).rev() {
            let day = today - Duration::days(days_back);
            let per_day = rng.gen_range(MIN_PER_DAY..=MAX_PER_DAY);

            for index in 0..per_day {
                let category = *Category::TOPICS.choose(rng).unwrap_or(&Category::General);
                let sentiment = *Sentiment::ALL.choose(rng).unwrap_or(&Sentiment::Neutral);
                let hour = rng.gen_range(FIRST_HOUR..=LAST_HOUR);
                let minute = rng.gen_range(0..60);

                let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
                    continue;
                };
                let Some(local) = self.offset.from_local_datetime(&day.and_time(time)).single() else {
                    continue;
                };

                records.push(InteractionRecord {
                    user_message: format!("Message de démonstration {}", index + 1),
                    category,
                    sentiment,
                    timestamp: local.with_timezone(&Utc),
                });
            }
        }

        records
    }
}
