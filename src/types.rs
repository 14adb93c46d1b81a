use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "evenements-culturels")]
    EvenementsCulturels,
    #[serde(rename = "programmes-jeunesse")]
    ProgrammesJeunesse,
    #[serde(rename = "documents")]
    Documents,
    #[serde(rename = "plaintes")]
    Plaintes,
    #[serde(rename = "informations")]
    Informations,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "actualites")]
    Actualites,
    #[serde(rename = "questions")]
    Questions,
    #[serde(rename = "general", other)]
    General,
}

impl Category {
    /// Every category except `General`, in the order the demo generator draws from.
    pub const TOPICS: [Category; 8] = [
        Category::EvenementsCulturels,
        Category::ProgrammesJeunesse,
        Category::Documents,
        Category::Plaintes,
        Category::Informations,
        Category::Service,
        Category::Actualites,
        Category::Questions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EvenementsCulturels => "evenements-culturels",
            Self::ProgrammesJeunesse => "programmes-jeunesse",
            Self::Documents => "documents",
            Self::Plaintes => "plaintes",
            Self::Informations => "informations",
            Self::Service => "service",
            Self::Actualites => "actualites",
            Self::Questions => "questions",
            Self::General => "general",
        }
    }

    /// Lenient parse used for untyped sources; anything unrecognised is `General`.
    pub fn from_key(key: &str) -> Self {
        let key = key.trim().to_ascii_lowercase();
        Self::TOPICS
            .into_iter()
            .find(|category| category.as_str() == key)
            .unwrap_or(Self::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[serde(other)]
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub user_message: String,
    pub category: Category,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRow {
    pub user_id: String,
    pub user_message: String,
    pub category: Category,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
}

impl BackendRow {
    pub fn new(user_id: &str, record: &InteractionRecord) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_message: record.user_message.clone(),
            category: record.category,
            sentiment: record.sentiment,
            timestamp: record.timestamp,
        }
    }
}

impl From<BackendRow> for InteractionRecord {
    fn from(row: BackendRow) -> Self {
        Self {
            user_message: row.user_message,
            category: row.category,
            sentiment: row.sentiment,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSummary {
    pub total_interactions: usize,
    pub most_popular_category: String,
    #[serde(rename = "averageSentiment")]
    pub dominant_sentiment: String,
    #[serde(rename = "peakHours")]
    pub peak_hour: String,
    pub trending_topics: Vec<String>,
}

impl Default for InsightsSummary {
    fn default() -> Self {
        Self {
            total_interactions: 0,
            most_popular_category: String::new(),
            dominant_sentiment: Sentiment::Neutral.as_str().to_string(),
            peak_hour: String::new(),
            trending_topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub date: String,
    pub interactions: usize,
    pub full_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    External,
    Backend,
    Cache,
    Demo,
}

impl DataOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Backend => "backend",
            Self::Cache => "cache",
            Self::Demo => "demo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    NoUser,
    UserNoData,
    UserWithData,
    ExternalDataAvailable,
    ExternalDataError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub origin: DataOrigin,
    pub state: SourceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub insights: InsightsSummary,
    pub categories: Vec<ChartPoint>,
    pub sentiments: Vec<ChartPoint>,
    pub timeline: Vec<TimelinePoint>,
}
