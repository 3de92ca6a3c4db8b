mod ai_manager;
mod config;
mod log_util;
mod models;
mod output_manager;
mod quiz_runner;
mod score_summary;
mod session_manager;
mod ui_renderer;
mod view_managers;
mod view_router;

use ai_manager::{AiManager, ContentProvider, ContentRequest, FetchMessage, FetchedContent};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dotenvy::dotenv;
use log_util::{log_debug, log_warn};
use models::{HskLevel, MaterialType, QuizMode};
use ratatui::{DefaultTerminal, Frame};
use session_manager::{MemoryUserStore, SessionManager, SqliteUserStore, UserStore};
use std::{
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender, TryRecvError},
    },
    time::Duration,
};
use ui_renderer::UiRenderer;
use view_managers::{
    DashboardManager, DashboardState, LessonManager, LessonScreen, LoginForm, LoginManager,
    ProfileManager, ProfileState, QuizManager, QuizScreen,
};
use view_router::{Route, ViewRouter};

pub(crate) const LOADING_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];

fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;
    let terminal = ratatui::init();
    let result = App::new().run(terminal);
    ratatui::restore();
    result
}

/// The main application which holds the state and logic of the application.
#[derive(Debug)]
pub struct App {
    /// Is the application running?
    pub(crate) running: bool,
    /// Which screen is shown and what it was opened with.
    pub(crate) router: ViewRouter,
    /// Signed-in user and the persistent store behind it.
    pub(crate) session: SessionManager,
    /// Lesson and quiz generator; `None` when no API key is configured.
    provider: Option<Arc<dyn ContentProvider>>,
    /// Shuffle answer options when a quiz arrives.
    pub(crate) shuffle_quiz_options: bool,
    /// Ring the terminal bell on answer reveal.
    pub(crate) feedback_bell: bool,
    /// Any error encountered that should be surfaced in the status panel.
    pub(crate) error: Option<String>,
    /// Latest informational status message.
    pub(crate) status: Option<String>,
    /// Spinner frame index for the active loading indicator.
    pub(crate) loading_frame: usize,
    /// Id handed to the next background fetch.
    next_request_id: u64,
    /// The only request id whose result may still be applied.
    pub(crate) active_request: Option<u64>,
    fetch_sender: Sender<FetchMessage>,
    fetch_receiver: Receiver<FetchMessage>,
    pub(crate) login_form: LoginForm,
    pub(crate) dashboard: DashboardState,
    pub(crate) lesson: LessonScreen,
    pub(crate) quiz: QuizScreen,
    pub(crate) profile: ProfileState,
}

impl App {
    /// Construct a new instance of [`App`] from configuration and the persisted session.
    pub fn new() -> Self {
        let mut aggregated_error: Option<String> = None;

        if let Err(err) = config::initialize() {
            Self::push_error(
                &mut aggregated_error,
                format!("Configuration load failed: {}", err),
            );
        }
        let config = config::current();

        let store: Box<dyn UserStore> = match SqliteUserStore::open(&config.storage_path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                Self::push_error(
                    &mut aggregated_error,
                    format!("Storage unavailable, progress will not be saved: {}", err),
                );
                log_warn(&format!("App: falling back to in-memory store: {}", err));
                Box::new(MemoryUserStore::new())
            }
        };

        let provider: Option<Arc<dyn ContentProvider>> = match AiManager::from_config(&config) {
            Ok(manager) => {
                log_debug(&format!("App: using model {}", manager.model_name()));
                Some(Arc::new(manager))
            }
            Err(err) => {
                Self::push_error(&mut aggregated_error, format!("AI unavailable: {}", err));
                None
            }
        };

        let mut app = Self::with_parts(SessionManager::new(store), provider);
        app.shuffle_quiz_options = config.shuffle_quiz_options;
        app.feedback_bell = config.feedback_bell;
        app.error = aggregated_error;
        app.restore_session();
        app
    }

    pub(crate) fn with_parts(
        session: SessionManager,
        provider: Option<Arc<dyn ContentProvider>>,
    ) -> Self {
        let (fetch_sender, fetch_receiver) = mpsc::channel();
        let router = ViewRouter::initial(session.is_signed_in());
        Self {
            running: false,
            router,
            session,
            provider,
            shuffle_quiz_options: false,
            feedback_bell: false,
            error: None,
            status: None,
            loading_frame: 0,
            next_request_id: 1,
            active_request: None,
            fetch_sender,
            fetch_receiver,
            login_form: LoginForm::default(),
            dashboard: DashboardState::default(),
            lesson: LessonScreen::Idle,
            quiz: QuizScreen::Idle,
            profile: ProfileState::default(),
        }
    }

    fn restore_session(&mut self) {
        match self.session.restore() {
            Ok(true) => log_debug("App: restored persisted session"),
            Ok(false) => log_debug("App: no persisted session"),
            Err(err) => Self::push_error(
                &mut self.error,
                format!("Saved session could not be read, please sign in again: {}", err),
            ),
        }
        self.router = ViewRouter::initial(self.session.is_signed_in());
    }

    /// Run the application's main loop.
    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.running = true;
        let tick_rate = Duration::from_millis(120);
        while self.running {
            self.poll_fetch_messages();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events(tick_rate)?;
        }
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        UiRenderer::new(self).render(frame);
    }

    /// Reads the crossterm events and updates the state of [`App`].
    fn handle_crossterm_events(&mut self, tick_rate: Duration) -> Result<()> {
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key),
                Event::Mouse(_) => {}
                Event::Resize(_, _) => {}
                _ => {}
            }
            self.poll_fetch_messages();
        } else {
            self.on_tick();
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.is_loading() {
            self.loading_frame = (self.loading_frame + 1) % LOADING_FRAMES.len();
        }
        self.poll_fetch_messages();
    }

    pub(crate) fn is_loading(&self) -> bool {
        matches!(self.lesson, LessonScreen::Loading) || matches!(self.quiz, QuizScreen::Loading)
    }

    /// Handles the key events and updates the state of [`App`].
    pub(crate) fn on_key_event(&mut self, key: KeyEvent) {
        if key.modifiers == KeyModifiers::CONTROL
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            self.quit();
            return;
        }

        match self.router.current() {
            Route::Login => LoginManager::new(self).handle_key(key),
            Route::Dashboard => DashboardManager::new(self).handle_key(key),
            Route::Lesson { .. } => LessonManager::new(self).handle_key(key),
            Route::Quiz { .. } => QuizManager::new(self).handle_key(key),
            Route::Profile => ProfileManager::new(self).handle_key(key),
        }
    }

    /// Move to `target`, dropping any fetch that belonged to the screen being left.
    pub(crate) fn navigate(&mut self, target: Route) -> bool {
        let from = self.router.current();
        match self.router.navigate(target, self.session.is_signed_in()) {
            Ok(_) => {
                if from != target {
                    if let Some(request_id) = self.active_request.take() {
                        log_debug(&format!(
                            "App: left {} with request #{} outstanding; its result will be discarded",
                            from.name(),
                            request_id
                        ));
                    }
                    self.lesson = LessonScreen::Idle;
                    self.quiz = QuizScreen::Idle;
                }
                log_debug(&format!("App: {} -> {}", from.name(), target.name()));
                true
            }
            Err(err) => {
                log_warn(&format!("App: rejected navigation: {}", err));
                Self::push_error(&mut self.error, err.to_string());
                false
            }
        }
    }

    pub(crate) fn go_home(&mut self) {
        self.navigate(Route::Dashboard);
    }

    pub(crate) fn open_profile(&mut self) {
        if self.navigate(Route::Profile) {
            self.profile = ProfileState::default();
        }
    }

    pub(crate) fn open_lesson(&mut self, level: HskLevel, material: MaterialType) {
        if self.navigate(Route::Lesson { level, material }) {
            self.begin_fetch(ContentRequest::Lesson { level, material });
        }
    }

    pub(crate) fn open_quiz(&mut self, level: HskLevel, mode: QuizMode) {
        if self.navigate(Route::Quiz { level, mode }) {
            self.begin_fetch(ContentRequest::Quiz { level, mode });
        }
    }

    /// Re-request content for the current lesson or quiz screen.
    pub(crate) fn retry_fetch(&mut self) {
        match self.router.current() {
            Route::Lesson { level, material } => {
                self.begin_fetch(ContentRequest::Lesson { level, material })
            }
            Route::Quiz { level, mode } => self.begin_fetch(ContentRequest::Quiz { level, mode }),
            _ => {}
        }
    }

    fn begin_fetch(&mut self, request: ContentRequest) {
        match request {
            ContentRequest::Lesson { .. } => self.lesson = LessonScreen::Loading,
            ContentRequest::Quiz { .. } => self.quiz = QuizScreen::Loading,
        }

        let Some(provider) = self.provider.clone() else {
            self.active_request = None;
            let message = "AI unavailable. Configure gemini_api_key or GEMINI_API_KEY.".to_string();
            log_debug("App: content provider unavailable; aborting fetch");
            self.fail_fetch(request, message);
            return;
        };

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.active_request = Some(request_id);
        self.loading_frame = 0;
        log_debug(&format!(
            "App: starting request #{} for {:?}",
            request_id, request
        ));
        ai_manager::spawn_fetch(provider, request, request_id, self.fetch_sender.clone());
    }

    fn fail_fetch(&mut self, request: ContentRequest, message: String) {
        match request {
            ContentRequest::Lesson { .. } => LessonManager::new(self).show_error(message),
            ContentRequest::Quiz { .. } => QuizManager::new(self).show_error(message),
        }
    }

    fn poll_fetch_messages(&mut self) {
        loop {
            match self.fetch_receiver.try_recv() {
                Ok(message) => self.apply_fetch_message(message),
                Err(TryRecvError::Empty) => break,
                // Unreachable while `fetch_sender` is alive.
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub(crate) fn apply_fetch_message(&mut self, message: FetchMessage) {
        if self.active_request != Some(message.request_id) {
            log_debug(&format!(
                "App: discarding stale result for request #{}",
                message.request_id
            ));
            return;
        }
        self.active_request = None;

        match (self.router.current(), message.result) {
            (Route::Lesson { .. }, Ok(FetchedContent::Lesson(content))) => {
                LessonManager::new(self).show_content(content)
            }
            (Route::Quiz { .. }, Ok(FetchedContent::Quiz(questions))) => {
                QuizManager::new(self).start(questions)
            }
            (Route::Lesson { .. }, Err(err)) => {
                log_warn(&format!("App: lesson generation failed: {}", err));
                LessonManager::new(self).show_error(err.to_string())
            }
            (Route::Quiz { .. }, Err(err)) => {
                log_warn(&format!("App: quiz generation failed: {}", err));
                QuizManager::new(self).show_error(err.to_string())
            }
            (route, _) => log_debug(&format!(
                "App: result for request #{} does not match {} screen",
                message.request_id,
                route.name()
            )),
        }
    }

    /// Set running to false to quit the application.
    pub(crate) fn quit(&mut self) {
        self.running = false;
    }

    /// Append a message to an optional error slot.
    pub(crate) fn push_error(slot: &mut Option<String>, message: String) {
        if let Some(existing) = slot {
            existing.push_str(" | ");
            existing.push_str(&message);
        } else {
            *slot = Some(message);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        ai_manager::{ContentError, tests::FakeProvider},
        models::LessonContent,
        quiz_runner::{QuizPhase, tests::question},
        score_summary::ScoreSummary,
    };
    use crossterm::event::KeyEventState;

    pub(crate) fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    pub(crate) fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.on_key_event(key(KeyCode::Char(ch)));
        }
    }

    pub(crate) fn app_with(store: &MemoryUserStore, provider: Option<FakeProvider>) -> App {
        let provider = provider.map(|p| Arc::new(p) as Arc<dyn ContentProvider>);
        let mut app = App::with_parts(SessionManager::new(Box::new(store.clone())), provider);
        app.restore_session();
        app
    }

    /// Block until the background fetch posts its result, then apply it.
    pub(crate) fn wait_for_fetch(app: &mut App) {
        let message = app
            .fetch_receiver
            .recv_timeout(Duration::from_secs(10))
            .expect("background fetch did not finish");
        app.apply_fetch_message(message);
    }

    fn level(value: u8) -> HskLevel {
        HskLevel::new(value).unwrap()
    }

    fn login(app: &mut App, name: &str, email: &str) {
        type_text(app, name);
        app.on_key_event(key(KeyCode::Tab));
        type_text(app, email);
        app.on_key_event(key(KeyCode::Enter));
    }

    #[test]
    fn practice_quiz_end_to_end_updates_profile() {
        let store = MemoryUserStore::new();
        let correct = [1, 0, 2, 3, 1];
        let provider = FakeProvider {
            questions: correct
                .iter()
                .enumerate()
                .map(|(i, c)| question(&format!("q{i}"), *c))
                .collect(),
            ..FakeProvider::default()
        };
        let mut app = app_with(&store, Some(provider));
        assert_eq!(app.router.current(), Route::Login);

        login(&mut app, "Ana", "ana@x.com");
        assert_eq!(app.router.current(), Route::Dashboard);

        app.open_quiz(level(2), QuizMode::Practice);
        assert!(matches!(app.quiz, QuizScreen::Loading));
        wait_for_fetch(&mut app);

        for choice in correct {
            app.on_key_event(key(KeyCode::Char(char::from(b'1' + choice as u8))));
            app.on_key_event(key(KeyCode::Enter));
            app.on_key_event(key(KeyCode::Enter));
        }

        let QuizScreen::Active { runner, .. } = &app.quiz else {
            panic!("quiz should still be on screen");
        };
        assert_eq!(runner.phase(), QuizPhase::Finished { score: 5, total: 5 });

        app.on_key_event(key(KeyCode::Enter));
        assert_eq!(app.router.current(), Route::Dashboard);

        let user = app.session.user().unwrap();
        let summary = ScoreSummary::from_records(&user.scores);
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.average_percentage, 100);
        assert_eq!(user.scores[0].level, level(2));
        assert_eq!(user.scores[0].mode, QuizMode::Practice);
        assert_eq!(store.load().unwrap().unwrap().scores.len(), 1);
    }

    #[test]
    fn empty_quiz_result_shows_error_instead_of_question() {
        let store = MemoryUserStore::new();
        let mut app = app_with(&store, Some(FakeProvider::default()));
        login(&mut app, "Ana", "ana@x.com");

        app.open_quiz(level(1), QuizMode::Exam);
        wait_for_fetch(&mut app);

        let QuizScreen::Failed(message) = &app.quiz else {
            panic!("expected failed quiz screen, got {:?}", app.quiz);
        };
        assert!(message.contains("no quiz questions"));
    }

    #[test]
    fn stale_results_are_discarded_after_leaving_the_screen() {
        let store = MemoryUserStore::new();
        let mut app = app_with(&store, None);
        login(&mut app, "Ana", "ana@x.com");
        app.active_request = Some(1);
        app.router.navigate(
            Route::Quiz {
                level: level(1),
                mode: QuizMode::Practice,
            },
            true,
        )
        .unwrap();
        app.quiz = QuizScreen::Loading;

        app.go_home();
        assert!(app.active_request.is_none());
        app.router.navigate(
            Route::Quiz {
                level: level(1),
                mode: QuizMode::Practice,
            },
            true,
        )
        .unwrap();
        app.quiz = QuizScreen::Loading;
        app.active_request = Some(2);

        app.apply_fetch_message(FetchMessage {
            request_id: 1,
            result: Ok(FetchedContent::Quiz(vec![question("old", 0)])),
        });
        assert!(matches!(app.quiz, QuizScreen::Loading));
        assert_eq!(app.active_request, Some(2));

        app.apply_fetch_message(FetchMessage {
            request_id: 2,
            result: Ok(FetchedContent::Quiz(vec![question("new", 0)])),
        });
        let QuizScreen::Active { runner, .. } = &app.quiz else {
            panic!("expected active quiz");
        };
        assert_eq!(runner.current_question().unwrap().id, "new");
    }

    #[test]
    fn lesson_failure_offers_retry() {
        let store = MemoryUserStore::new();
        let mut app = app_with(&store, Some(FakeProvider::default()));
        login(&mut app, "Ana", "ana@x.com");

        app.open_lesson(level(3), MaterialType::Writing);
        wait_for_fetch(&mut app);
        assert!(matches!(app.lesson, LessonScreen::Failed(_)));

        app.apply_fetch_message(FetchMessage {
            request_id: 99,
            result: Err(ContentError::MissingContent),
        });
        assert!(matches!(app.lesson, LessonScreen::Failed(_)));

        app.on_key_event(key(KeyCode::Char('r')));
        assert!(matches!(app.lesson, LessonScreen::Loading));
        let request_id = app.active_request.unwrap();
        app.apply_fetch_message(FetchMessage {
            request_id,
            result: Ok(FetchedContent::Lesson(LessonContent {
                title: "你好".to_string(),
                pinyin: "nǐ hǎo".to_string(),
                translation: "halo".to_string(),
                content: "isi".to_string(),
                tips: vec!["latihan".to_string()],
            })),
        });
        assert!(matches!(app.lesson, LessonScreen::Ready { .. }));
        wait_for_fetch(&mut app);
    }

    #[test]
    fn missing_provider_fails_fast() {
        let store = MemoryUserStore::new();
        let mut app = app_with(&store, None);
        login(&mut app, "Ana", "ana@x.com");

        app.open_lesson(level(1), MaterialType::Reading);

        assert!(app.active_request.is_none());
        assert!(matches!(app.lesson, LessonScreen::Failed(_)));
    }

    #[test]
    fn restored_session_starts_on_dashboard_and_logout_returns_to_login() {
        let store = MemoryUserStore::new();
        {
            let mut app = app_with(&store, None);
            login(&mut app, "Ana", "ana@x.com");
        }

        let mut app = app_with(&store, None);
        assert_eq!(app.router.current(), Route::Dashboard);

        app.open_profile();
        app.on_key_event(key(KeyCode::Char('x')));
        assert_eq!(app.router.current(), Route::Login);
        assert!(store.raw().is_none());

        let app = app_with(&store, None);
        assert_eq!(app.router.current(), Route::Login);
    }

    #[test]
    fn ctrl_c_quits_from_any_screen() {
        let mut app = app_with(&MemoryUserStore::new(), None);
        app.running = true;
        app.on_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!app.running);
    }
}
