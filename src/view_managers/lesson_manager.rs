use crate::{App, log_util::log_debug, models::LessonContent};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What the lesson screen currently shows.
#[derive(Debug, Clone, Default)]
pub(crate) enum LessonScreen {
    #[default]
    Idle,
    Loading,
    Ready {
        content: LessonContent,
        scroll: u16,
    },
    Failed(String),
}

pub(crate) struct LessonManager<'a> {
    app: &'a mut App,
}

impl<'a> LessonManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('h')) => {
                self.app.go_home()
            }
            (KeyModifiers::NONE, KeyCode::Char('p')) => self.app.open_profile(),
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.scroll_by(1),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.scroll_by(-1),
            (KeyModifiers::NONE, KeyCode::PageDown) => self.scroll_by(10),
            (KeyModifiers::NONE, KeyCode::PageUp) => self.scroll_by(-10),
            (KeyModifiers::NONE, KeyCode::Char('r')) => {
                if matches!(self.app.lesson, LessonScreen::Failed(_)) {
                    log_debug("LessonManager: retrying lesson generation");
                    self.app.retry_fetch();
                }
            }
            _ => {}
        }
    }

    pub(crate) fn show_content(&mut self, content: LessonContent) {
        log_debug(&format!("LessonManager: lesson ready: {}", content.title));
        self.app.lesson = LessonScreen::Ready { content, scroll: 0 };
    }

    pub(crate) fn show_error(&mut self, message: String) {
        self.app.lesson = LessonScreen::Failed(message);
    }

    fn scroll_by(&mut self, delta: i32) {
        if let LessonScreen::Ready { scroll, .. } = &mut self.app.lesson {
            *scroll = (i32::from(*scroll) + delta).clamp(0, i32::from(u16::MAX)) as u16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ai_manager::tests::FakeProvider,
        models::{HskLevel, MaterialType},
        session_manager::MemoryUserStore,
        tests::{app_with, key, wait_for_fetch},
        view_router::Route,
    };

    fn sample_lesson() -> LessonContent {
        LessonContent {
            title: "数字".to_string(),
            pinyin: "shùzì".to_string(),
            translation: "angka".to_string(),
            content: "一 二 三".to_string(),
            tips: vec!["Hafalkan nada.".to_string()],
        }
    }

    fn lesson_app(lesson: Option<LessonContent>) -> App {
        let provider = FakeProvider {
            lesson,
            ..FakeProvider::default()
        };
        let mut app = app_with(&MemoryUserStore::new(), Some(provider));
        app.session.login("Ana", "ana@x.com").unwrap();
        app.navigate(Route::Dashboard);
        app.open_lesson(HskLevel::new(3).unwrap(), MaterialType::Listening);
        app
    }

    #[test]
    fn fetched_lesson_is_shown_and_scrollable() {
        let mut app = lesson_app(Some(sample_lesson()));
        assert!(matches!(app.lesson, LessonScreen::Loading));
        wait_for_fetch(&mut app);

        app.on_key_event(key(KeyCode::Down));
        app.on_key_event(key(KeyCode::Down));
        app.on_key_event(key(KeyCode::Up));
        let LessonScreen::Ready { content, scroll } = &app.lesson else {
            panic!("lesson should be ready, got {:?}", app.lesson);
        };
        assert_eq!(content.title, "数字");
        assert_eq!(*scroll, 1);

        app.on_key_event(key(KeyCode::Up));
        app.on_key_event(key(KeyCode::Up));
        assert!(matches!(app.lesson, LessonScreen::Ready { scroll: 0, .. }));
    }

    #[test]
    fn back_returns_to_dashboard_and_resets_screen() {
        let mut app = lesson_app(Some(sample_lesson()));
        app.on_key_event(key(KeyCode::Char('b')));

        assert_eq!(app.router.current(), Route::Dashboard);
        assert!(matches!(app.lesson, LessonScreen::Idle));
        assert!(app.active_request.is_none());
        // The worker still finishes; its result must not resurrect the lesson.
        wait_for_fetch(&mut app);
        assert!(matches!(app.lesson, LessonScreen::Idle));
    }

    #[test]
    fn retry_is_ignored_unless_failed() {
        let mut app = lesson_app(Some(sample_lesson()));
        let first = app.active_request;
        app.on_key_event(key(KeyCode::Char('r')));
        assert_eq!(app.active_request, first);
        wait_for_fetch(&mut app);
    }
}
