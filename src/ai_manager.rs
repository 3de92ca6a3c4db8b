use std::{
    sync::{Arc, mpsc::Sender},
    thread,
    time::Duration,
};

use crate::{
    config::AppConfig,
    log_util,
    models::{HskLevel, LessonContent, MaterialType, QuizMode, QuizQuestion},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::runtime::Runtime;

/// Gemini `responseSchema` for a lesson.
fn lesson_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "judul materi dalam Hanzi" },
            "pinyin": { "type": "STRING", "description": "pinyin dari judul" },
            "translation": { "type": "STRING", "description": "arti judul dalam Bahasa Indonesia" },
            "content": { "type": "STRING", "description": "isi materi lengkap dengan Hanzi, Pinyin, dan Arti" },
            "tips": {
                "type": "ARRAY",
                "description": "tips belajar singkat dari tutor",
                "items": { "type": "STRING" }
            }
        },
        "required": ["title", "pinyin", "translation", "content", "tips"]
    })
}

/// Gemini `responseSchema` for a list of quiz questions.
fn quiz_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "question": { "type": "STRING", "description": "soal dalam Hanzi" },
                "options": {
                    "type": "ARRAY",
                    "description": "pilihan jawaban",
                    "items": { "type": "STRING" }
                },
                "correctAnswer": { "type": "INTEGER", "description": "indeks pilihan yang benar, dimulai dari 0" },
                "explanation": { "type": "STRING", "description": "penjelasan jawaban dalam Bahasa Indonesia" },
                "pinyin": { "type": "STRING" },
                "translation": { "type": "STRING" }
            },
            "required": ["id", "question", "options", "correctAnswer", "explanation"]
        }
    })
}

/// Structured content that did not match the requested shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("response is not valid {expected} JSON: {detail}")]
    Malformed {
        expected: &'static str,
        detail: String,
    },
    #[error("field `{0}` is blank")]
    BlankField(String),
    #[error("question {question} has {count} option(s); at least 2 are required")]
    TooFewOptions { question: usize, count: usize },
    #[error("question {question} marks option {index} correct but only has {len} option(s)")]
    AnswerOutOfRange {
        question: usize,
        index: usize,
        len: usize,
    },
}

/// Failure to obtain usable lesson or quiz content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Gemini API key missing. Set gemini_api_key in config or GEMINI_API_KEY.")]
    NotConfigured,
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("failed to reach the content provider: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content provider returned {status} with body: {body}")]
    Status { status: StatusCode, body: String },
    #[error("content provider response did not include any generated text")]
    MissingContent,
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error("failed to start background runtime: {0}")]
    Runtime(String),
}

/// Boundary to whatever generates lessons and quizzes.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn fetch_lesson(
        &self,
        level: HskLevel,
        material: MaterialType,
    ) -> Result<LessonContent, ContentError>;

    /// The returned list may be shorter or longer than `count`, or empty.
    async fn fetch_quiz_questions(
        &self,
        level: HskLevel,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, ContentError>;
}

impl std::fmt::Debug for dyn ContentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentProvider")
    }
}

/// Gemini `generateContent` client with structured JSON output.
#[derive(Debug, Clone)]
pub struct AiManager {
    client: Client,
    api_key: String,
    api_base: String,
    model_name: String,
    system_prompt: String,
    timeout: Duration,
}

impl AiManager {
    pub fn new(
        api_key: impl Into<String>,
        model_name: impl Into<String>,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ContentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: AppConfig::default().api_base,
            model_name: model_name.into(),
            system_prompt: system_prompt.into(),
            timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ContentError> {
        let api_key = config
            .resolved_api_key()
            .ok_or(ContentError::NotConfigured)?;
        Ok(Self::new(
            api_key,
            config.gemini_model.as_str(),
            config.system_prompt(),
            config.request_timeout(),
        )?
        .with_api_base(config.api_base.as_str()))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn request_payload(&self, prompt: &str, schema: Value) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": self.system_prompt.as_str() }]
            },
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        })
    }

    async fn generate_json(&self, prompt: &str, schema: Value) -> Result<String, ContentError> {
        let payload = self.request_payload(prompt, schema);
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.api_base, self.model_name
        );
        log_util::log_debug(&format!(
            "AiManager: invoking {} with model {}",
            endpoint, self.model_name
        ));

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        log_util::log_debug(&format!("AiManager: Gemini status {}", response.status()));

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<failed to read body: {}>", err));
            log_util::log_warn(&format!("AiManager: Gemini error body: {}", body));
            return Err(ContentError::Status { status, body });
        }

        let response_value: Value = response.json().await.map_err(|err| self.classify(err))?;
        let text = extract_candidate_text(&response_value).ok_or(ContentError::MissingContent)?;
        log_util::log_debug(&format!(
            "AiManager: extracted {} bytes of generated JSON",
            text.len()
        ));
        Ok(text)
    }

    fn classify(&self, err: reqwest::Error) -> ContentError {
        if err.is_timeout() {
            ContentError::TimedOut(self.timeout)
        } else {
            ContentError::Http(err)
        }
    }
}

#[async_trait]
impl ContentProvider for AiManager {
    async fn fetch_lesson(
        &self,
        level: HskLevel,
        material: MaterialType,
    ) -> Result<LessonContent, ContentError> {
        let text = self
            .generate_json(&lesson_prompt(level, material), lesson_schema())
            .await?;
        let lesson = decode_lesson(&text)?;
        log_util::log_debug(&format!("AiManager: lesson '{}' decoded", lesson.title));
        Ok(lesson)
    }

    async fn fetch_quiz_questions(
        &self,
        level: HskLevel,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, ContentError> {
        let text = self
            .generate_json(&quiz_prompt(level, count), quiz_schema())
            .await?;
        let questions = decode_quiz(&text)?;
        log_util::log_debug(&format!(
            "AiManager: decoded {} of {} requested question(s)",
            questions.len(),
            count
        ));
        Ok(questions)
    }
}

fn lesson_prompt(level: HskLevel, material: MaterialType) -> String {
    format!(
        "Buatkan materi pembelajaran Bahasa Mandarin untuk HSK level {} dengan fokus pada kategori {}.",
        level,
        material.label()
    )
}

fn quiz_prompt(level: HskLevel, count: usize) -> String {
    format!(
        "Buatkan {} soal pilihan ganda untuk latihan HSK level {}. Sertakan Hanzi, Pinyin, dan terjemahan.",
        count, level
    )
}

/// Strictly decode a generated lesson.
pub fn decode_lesson(text: &str) -> Result<LessonContent, SchemaViolation> {
    let lesson: LessonContent =
        serde_json::from_str(text).map_err(|err| SchemaViolation::Malformed {
            expected: "lesson",
            detail: err.to_string(),
        })?;
    for (field, value) in [("title", &lesson.title), ("content", &lesson.content)] {
        if value.trim().is_empty() {
            return Err(SchemaViolation::BlankField(field.to_string()));
        }
    }
    Ok(lesson)
}

/// Strictly decode a generated question list. An empty list is valid here.
pub fn decode_quiz(text: &str) -> Result<Vec<QuizQuestion>, SchemaViolation> {
    let mut questions: Vec<QuizQuestion> =
        serde_json::from_str(text).map_err(|err| SchemaViolation::Malformed {
            expected: "quiz",
            detail: err.to_string(),
        })?;

    for (position, question) in questions.iter_mut().enumerate() {
        let number = position + 1;
        if question.question.trim().is_empty() {
            return Err(SchemaViolation::BlankField(format!(
                "question[{}].question",
                position
            )));
        }
        let len = question.options.len();
        if len < 2 {
            return Err(SchemaViolation::TooFewOptions {
                question: number,
                count: len,
            });
        }
        if question.correct_answer >= len {
            return Err(SchemaViolation::AnswerOutOfRange {
                question: number,
                index: question.correct_answer,
                len,
            });
        }
        if question.id.trim().is_empty() {
            question.id = format!("q{}", number);
        }
    }
    Ok(questions)
}

fn extract_candidate_text(value: &Value) -> Option<String> {
    let candidates = value.get("candidates")?.as_array()?;
    let first_candidate = candidates.first()?;
    let parts = first_candidate.get("content")?.get("parts")?.as_array()?;
    let mut buffer = String::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            buffer.push_str(text);
        }
    }
    if buffer.trim().is_empty() {
        None
    } else {
        Some(buffer)
    }
}

/// What a view asked the content provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRequest {
    Lesson {
        level: HskLevel,
        material: MaterialType,
    },
    Quiz {
        level: HskLevel,
        mode: QuizMode,
    },
}

#[derive(Debug)]
pub enum FetchedContent {
    Lesson(LessonContent),
    Quiz(Vec<QuizQuestion>),
}

/// Background result tagged with the request id it answers.
#[derive(Debug)]
pub struct FetchMessage {
    pub request_id: u64,
    pub result: Result<FetchedContent, ContentError>,
}

/// Run `request` on a worker thread with its own Tokio runtime and post the result to `sender`.
pub fn spawn_fetch(
    provider: Arc<dyn ContentProvider>,
    request: ContentRequest,
    request_id: u64,
    sender: Sender<FetchMessage>,
) {
    thread::spawn(move || {
        log_util::log_debug(&format!(
            "AiManager: background request #{} started: {:?}",
            request_id, request
        ));
        let runtime = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = sender.send(FetchMessage {
                    request_id,
                    result: Err(ContentError::Runtime(err.to_string())),
                });
                return;
            }
        };

        let result = runtime.block_on(run_request(provider.as_ref(), request));
        drop(runtime);

        let _ = sender.send(FetchMessage { request_id, result });
    });
}

pub async fn run_request(
    provider: &dyn ContentProvider,
    request: ContentRequest,
) -> Result<FetchedContent, ContentError> {
    match request {
        ContentRequest::Lesson { level, material } => provider
            .fetch_lesson(level, material)
            .await
            .map(FetchedContent::Lesson),
        ContentRequest::Quiz { level, mode } => provider
            .fetch_quiz_questions(level, mode.question_count())
            .await
            .map(FetchedContent::Quiz),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{fs, path::Path, sync::Mutex};

    pub(crate) fn fixture(filename: &str) -> String {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("test_fixtures")
            .join(filename);
        fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("failed to read {}: {}", path.display(), err))
    }

    /// Provider returning canned content and recording what it was asked for.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) questions: Vec<QuizQuestion>,
        pub(crate) lesson: Option<LessonContent>,
        pub(crate) requested_counts: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ContentProvider for FakeProvider {
        async fn fetch_lesson(
            &self,
            _level: HskLevel,
            _material: MaterialType,
        ) -> Result<LessonContent, ContentError> {
            self.lesson.clone().ok_or(ContentError::MissingContent)
        }

        async fn fetch_quiz_questions(
            &self,
            _level: HskLevel,
            count: usize,
        ) -> Result<Vec<QuizQuestion>, ContentError> {
            if let Ok(mut counts) = self.requested_counts.lock() {
                counts.push(count);
            }
            Ok(self.questions.iter().take(count).cloned().collect())
        }
    }

    #[test]
    fn schemas_require_the_decoded_fields() {
        let lesson = lesson_schema();
        assert_eq!(lesson["type"], "OBJECT");
        assert_eq!(lesson["required"].as_array().map(Vec::len), Some(5));

        let quiz = quiz_schema();
        assert_eq!(quiz["type"], "ARRAY");
        assert_eq!(quiz["items"]["properties"]["correctAnswer"]["type"], "INTEGER");
        assert!(!quiz["items"]["required"].is_null());
    }

    #[test]
    fn decodes_lesson_fixture() {
        let lesson = decode_lesson(&fixture("lesson_response.json")).unwrap();
        assert_eq!(lesson.title, "你好");
        assert_eq!(lesson.pinyin, "nǐ hǎo");
        assert_eq!(lesson.tips.len(), 3);
    }

    #[test]
    fn lesson_missing_tips_is_rejected() {
        let err = decode_lesson(
            r#"{"title":"你好","pinyin":"nǐ hǎo","translation":"halo","content":"..."}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::Malformed { expected: "lesson", .. }));
    }

    #[test]
    fn lesson_with_blank_title_is_rejected() {
        let err = decode_lesson(
            r#"{"title":"  ","pinyin":"","translation":"","content":"isi","tips":[]}"#,
        )
        .unwrap_err();
        assert_eq!(err, SchemaViolation::BlankField("title".to_string()));
    }

    #[test]
    fn decodes_quiz_fixture_with_optional_fields() {
        let questions = decode_quiz(&fixture("quiz_response.json")).unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0].correct_answer, 1);
        assert_eq!(questions[0].pinyin.as_deref(), Some("xièxie"));
        assert!(questions[4].translation.is_none());
    }

    #[test]
    fn quiz_answer_index_out_of_range_is_rejected() {
        let err = decode_quiz(
            r#"[{"id":"1","question":"猫","options":["kucing","anjing"],"correctAnswer":2,"explanation":"猫 = kucing"}]"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::AnswerOutOfRange {
                question: 1,
                index: 2,
                len: 2
            }
        );
    }

    #[test]
    fn quiz_negative_answer_index_is_malformed() {
        let err = decode_quiz(
            r#"[{"id":"1","question":"猫","options":["kucing","anjing"],"correctAnswer":-1,"explanation":"x"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::Malformed { expected: "quiz", .. }));
    }

    #[test]
    fn quiz_with_single_option_is_rejected() {
        let err = decode_quiz(
            r#"[{"id":"1","question":"猫","options":["kucing"],"correctAnswer":0,"explanation":"x"}]"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::TooFewOptions {
                question: 1,
                count: 1
            }
        );
    }

    #[test]
    fn empty_quiz_list_decodes_and_blank_ids_are_filled() {
        assert!(decode_quiz("[]").unwrap().is_empty());

        let questions = decode_quiz(
            r#"[{"id":"","question":"狗","options":["kucing","anjing"],"correctAnswer":1,"explanation":"狗 = anjing"}]"#,
        )
        .unwrap();
        assert_eq!(questions[0].id, "q1");
    }

    #[test]
    fn extracts_text_from_gemini_envelope() {
        let envelope: Value = serde_json::from_str(&fixture("gemini_envelope.json")).unwrap();
        let text = extract_candidate_text(&envelope).unwrap();
        let lesson = decode_lesson(&text).unwrap();
        assert_eq!(lesson.translation, "halo");
    }

    #[test]
    fn envelope_without_candidates_has_no_text() {
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(extract_candidate_text(&blocked).is_none());
    }

    #[test]
    fn payload_carries_persona_and_schema() {
        let manager = AiManager::new(
            "key",
            "gemini-test",
            "Anda adalah tutor",
            Duration::from_secs(5),
        )
        .unwrap();
        let payload = manager.request_payload(
            &quiz_prompt(HskLevel::new(3).unwrap(), 10),
            quiz_schema(),
        );

        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            "Anda adalah tutor"
        );
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(payload["generationConfig"]["responseSchema"]["type"], "ARRAY");
        let prompt = payload["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("10 soal"));
        assert!(prompt.contains("HSK level 3"));
    }

    #[test]
    fn lesson_prompt_names_the_indonesian_category() {
        let prompt = lesson_prompt(HskLevel::new(2).unwrap(), MaterialType::Conversation);
        assert!(prompt.contains("HSK level 2"));
        assert!(prompt.contains("Percakapan"));
    }

    #[tokio::test]
    async fn quiz_request_asks_for_mode_question_count() {
        let provider = FakeProvider::default();

        run_request(
            &provider,
            ContentRequest::Quiz {
                level: HskLevel::default(),
                mode: QuizMode::Exam,
            },
        )
        .await
        .unwrap();
        run_request(
            &provider,
            ContentRequest::Quiz {
                level: HskLevel::default(),
                mode: QuizMode::Practice,
            },
        )
        .await
        .unwrap();

        assert_eq!(*provider.requested_counts.lock().unwrap(), vec![10, 5]);
    }
}
