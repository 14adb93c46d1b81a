use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::metrics::AGGREGATION_TIME_SECONDS;
use crate::types::{
    Category, ChartPoint, DashboardView, DataOrigin, InsightsSummary, InteractionRecord, Sentiment, SourceState,
    TimelinePoint,
};

const TRENDING_LIMIT: usize = 3;
const MONTHS_FR: [&str; 12] = [
    "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.", "nov.", "déc.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelinePolicy {
    /// One bucket per calendar day that has records.
    Sparse,
    /// Every day from `start` through today, zero-filled.
    GapFilled { start: NaiveDate },
}

/// Insertion-ordered counter; ties keep whichever key was seen first.
struct Tally<K> {
    entries: Vec<(K, usize)>,
}

impl<K: PartialEq> Tally<K> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn add(&mut self, key: K) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((key, 1)),
        }
    }

    fn count_keys(keys: impl IntoIterator<Item = K>) -> Self {
        let mut tally = Self::new();
        for key in keys {
            tally.add(key);
        }
        tally
    }

    fn leader(&self) -> Option<&K> {
        let mut ranked: Vec<&(K, usize)> = self.entries.iter().collect();
        // stable: equal counts keep insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.first().copied().map(|(key, _)| key)
    }
}

pub fn category_label(key: &str) -> String {
    match key {
        "evenements-culturels" => "événements culturels",
        "programmes-jeunesse" => "programmes jeunesse",
        "documents" => "documents",
        "plaintes" => "plaintes",
        "informations" => "informations",
        "service" => "service",
        "actualites" => "actualités",
        "questions" => "questions",
        "general" => "général",
        other => other,
    }
    .to_string()
}

pub fn sentiment_label(key: &str) -> String {
    match key {
        "positive" => "positif",
        "negative" => "négatif",
        "neutral" => "neutre",
        other => other,
    }
    .to_string()
}

fn day_label(day: NaiveDate) -> String {
    format!("{} {}", day.day(), MONTHS_FR[day.month0() as usize])
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    offset: FixedOffset,
    timeline_policy: TimelinePolicy,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Utc.fix(), TimelinePolicy::Sparse)
    }
}

impl Aggregator {
    pub fn new(offset: FixedOffset, timeline_policy: TimelinePolicy) -> Self {
        Self {
            offset,
            timeline_policy,
        }
    }

    pub fn summarize(&self, records: &[InteractionRecord]) -> InsightsSummary {
        if records.is_empty() {
            return InsightsSummary::default();
        }

        let categories = Tally::count_keys(records.iter().map(|record| record.category));
        let sentiments = Tally::count_keys(records.iter().map(|record| record.sentiment));
        let hours = Tally::count_keys(records.iter().map(|record| self.local_hour(record.timestamp)));

        let most_popular = categories.leader().copied().unwrap_or(Category::General);
        let dominant = sentiments.leader().copied().unwrap_or(Sentiment::Neutral);
        let peak = hours.leader().copied().unwrap_or(12);

        InsightsSummary {
            total_interactions: records.len(),
            most_popular_category: most_popular.as_str().replace('-', " "),
            dominant_sentiment: dominant.as_str().to_string(),
            peak_hour: format!("{peak}:00"),
            trending_topics: categories
                .entries
                .iter()
                .take(TRENDING_LIMIT)
                .map(|(category, _)| category.as_str().to_string())
                .collect(),
        }
    }

    pub fn category_breakdown(&self, records: &[InteractionRecord]) -> Vec<ChartPoint> {
        Tally::count_keys(records.iter().map(|record| record.category))
            .entries
            .into_iter()
            .map(|(category, value)| ChartPoint {
                name: category_label(category.as_str()),
                value,
            })
            .collect()
    }

    pub fn sentiment_breakdown(&self, records: &[InteractionRecord]) -> Vec<ChartPoint> {
        Tally::count_keys(records.iter().map(|record| record.sentiment))
            .entries
            .into_iter()
            .map(|(sentiment, value)| ChartPoint {
                name: sentiment_label(sentiment.as_str()),
                value,
            })
            .collect()
    }

    pub fn timeline(&self, records: &[InteractionRecord]) -> Vec<TimelinePoint> {
        self.timeline_at(records, Utc::now())
    }

    /// `now` only bounds the gap-filled window; sparse timelines ignore it.
    pub fn timeline_at(&self, records: &[InteractionRecord], now: DateTime<Utc>) -> Vec<TimelinePoint> {
        let mut days = Tally::count_keys(records.iter().map(|record| self.local_day(record.timestamp)));

        match self.timeline_policy {
            TimelinePolicy::Sparse => {
                days.entries.sort_by_key(|(day, _)| *day);
                days.entries
                    .into_iter()
                    .map(|(day, interactions)| TimelinePoint {
                        date: day_label(day),
                        interactions,
                        full_date: day,
                    })
                    .collect()
            }
            TimelinePolicy::GapFilled { start } => {
                let today = self.local_day(now);
                let mut points = Vec::new();
                let mut current = start;
                while current <= today {
                    let interactions = days
                        .entries
                        .iter()
                        .find(|(day, _)| *day == current)
                        .map(|(_, count)| *count)
                        .unwrap_or(0);
                    points.push(TimelinePoint {
                        date: day_label(current),
                        interactions,
                        full_date: current,
                    });
                    current += Duration::days(1);
                }
                points
            }
        }
    }

    pub fn build_view(
        &self,
        origin: DataOrigin,
        state: SourceState,
        notice: Option<String>,
        records: &[InteractionRecord],
    ) -> DashboardView {
        let start = Instant::now();
        let view = DashboardView {
            origin,
            state,
            notice,
            insights: self.summarize(records),
            categories: self.category_breakdown(records),
            sentiments: self.sentiment_breakdown(records),
            timeline: self.timeline(records),
        };
        AGGREGATION_TIME_SECONDS
            .with_label_values(&[origin.as_str()])
            .observe(start.elapsed().as_secs_f64());
        view
    }

    fn local_hour(&self, timestamp: DateTime<Utc>) -> u32 {
        timestamp.with_timezone(&self.offset).hour()
    }

    fn local_day(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }
}
