use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 9;
/// Ratio at or above which a score record is labelled as passed.
pub const PASS_RATIO: f64 = 0.6;

/// Generate a short lowercase base-36 token used for user and score identifiers.
pub fn random_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// HSK proficiency level, restricted to the four levels the tutor covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HskLevel(u8);

impl HskLevel {
    pub const ALL: [HskLevel; 4] = [HskLevel(1), HskLevel(2), HskLevel(3), HskLevel(4)];

    pub fn new(value: u8) -> Option<Self> {
        (1..=4).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 % 4 + 1)
    }

    pub fn previous(self) -> Self {
        Self((self.0 + 2) % 4 + 1)
    }
}

impl Default for HskLevel {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for HskLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("HSK level must be between 1 and 4, got {value}"))
    }
}

impl From<HskLevel> for u8 {
    fn from(level: HskLevel) -> Self {
        level.0
    }
}

impl fmt::Display for HskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lesson category offered on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    #[serde(rename = "Mendengar")]
    Listening,
    #[serde(rename = "Membaca")]
    Reading,
    #[serde(rename = "Menulis")]
    Writing,
    #[serde(rename = "Percakapan")]
    Conversation,
}

impl MaterialType {
    pub const ALL: [MaterialType; 4] = [
        Self::Listening,
        Self::Reading,
        Self::Writing,
        Self::Conversation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Listening => "Mendengar",
            Self::Reading => "Membaca",
            Self::Writing => "Menulis",
            Self::Conversation => "Percakapan",
        }
    }
}

/// Quiz flavour: short practice or the longer simulated exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuizMode {
    #[serde(rename = "Latihan")]
    Practice,
    #[serde(rename = "Simulasi")]
    Exam,
}

impl QuizMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Practice => "Latihan",
            Self::Exam => "Simulasi",
        }
    }

    /// Number of questions requested from the content provider for this mode.
    pub fn question_count(self) -> usize {
        match self {
            Self::Practice => 5,
            Self::Exam => 10,
        }
    }
}

/// The signed-in learner and their score history, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub scores: Vec<ScoreRecord>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: random_id(),
            name: name.into(),
            email: email.into(),
            scores: Vec::new(),
        }
    }
}

/// Outcome of one completed quiz. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredScoreRecord")]
pub struct ScoreRecord {
    pub id: String,
    pub level: HskLevel,
    #[serde(rename = "type")]
    pub mode: QuizMode,
    pub score: u32,
    pub total: u32,
    /// Creation instant in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Wire shape of a [`ScoreRecord`], checked before it becomes one.
#[derive(Deserialize)]
struct StoredScoreRecord {
    id: String,
    level: HskLevel,
    #[serde(rename = "type")]
    mode: QuizMode,
    score: u32,
    total: u32,
    timestamp: i64,
}

impl TryFrom<StoredScoreRecord> for ScoreRecord {
    type Error = String;

    fn try_from(stored: StoredScoreRecord) -> Result<Self, Self::Error> {
        if stored.score > stored.total {
            return Err(format!(
                "score record {} has score {} above total {}",
                stored.id, stored.score, stored.total
            ));
        }
        Ok(Self {
            id: stored.id,
            level: stored.level,
            mode: stored.mode,
            score: stored.score,
            total: stored.total,
            timestamp: stored.timestamp,
        })
    }
}

impl ScoreRecord {
    pub fn new(level: HskLevel, mode: QuizMode, score: u32, total: u32, timestamp: i64) -> Self {
        debug_assert!(score <= total, "score {score} exceeds total {total}");
        Self {
            id: random_id(),
            level,
            mode,
            score: score.min(total),
            total,
            timestamp,
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.score) / f64::from(self.total)
        }
    }

    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.total)
    }

    pub fn is_passing(&self) -> bool {
        self.ratio() >= PASS_RATIO
    }

    pub fn pass_label(&self) -> &'static str {
        if self.is_passing() { "LULUS" } else { "REMIDI" }
    }
}

/// Rounded `(score / total) * 100`, zero when there were no questions.
pub fn percentage(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(score) / f64::from(total) * 100.0).round() as u32
}

/// Lesson body produced by the content provider. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    pub title: String,
    pub pinyin: String,
    pub translation: String,
    pub content: String,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_answer: usize,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl QuizQuestion {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer
    }
}
