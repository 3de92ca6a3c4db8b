use crate::{
    App,
    log_util::{log_debug, log_warn},
    models::QuizQuestion,
    quiz_runner::{self, AnswerFeedback, QuizError, QuizPhase, QuizRunner},
    view_router::Route,
};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io::{self, Write};

/// What the quiz screen currently shows.
#[derive(Debug, Clone, Default)]
pub(crate) enum QuizScreen {
    #[default]
    Idle,
    Loading,
    Active {
        runner: QuizRunner,
        /// Result of the last reveal, cleared when the next question starts.
        feedback: Option<AnswerFeedback>,
    },
    Failed(String),
}

impl QuizScreen {
    /// Label for the primary action on the current question.
    pub(crate) fn action_label(&self) -> Option<&'static str> {
        let QuizScreen::Active { runner, .. } = self else {
            return None;
        };
        match runner.phase() {
            QuizPhase::Active {
                revealed: false, ..
            } => Some("Cek Jawaban"),
            QuizPhase::Active { index, .. } if index + 1 < runner.total() => Some("Lanjut"),
            QuizPhase::Active { .. } => Some("Lihat Hasil"),
            QuizPhase::Finished { .. } => Some("Simpan & Kembali"),
        }
    }
}

pub(crate) struct QuizManager<'a> {
    app: &'a mut App,
}

impl<'a> QuizManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('h')) => {
                self.app.go_home()
            }
            (KeyModifiers::NONE, KeyCode::Char('p')) => self.app.open_profile(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => {
                if matches!(self.app.quiz, QuizScreen::Failed(_)) {
                    log_debug("QuizManager: retrying quiz generation");
                    self.app.retry_fetch();
                }
            }
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.move_selection(true),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.move_selection(false),
            (KeyModifiers::NONE, KeyCode::Char(ch @ '1'..='9')) => {
                let option = ch as usize - '1' as usize;
                self.select(option);
            }
            (KeyModifiers::NONE, KeyCode::Enter | KeyCode::Char(' ')) => self.primary_action(),
            _ => {}
        }
    }

    /// Turn freshly generated questions into a running quiz.
    pub(crate) fn start(&mut self, mut questions: Vec<QuizQuestion>) {
        let Route::Quiz { level, mode } = self.app.router.current() else {
            return;
        };
        if self.app.shuffle_quiz_options {
            quiz_runner::shuffle_options(&mut questions, &mut rand::rng());
        }
        match QuizRunner::new(level, mode, questions) {
            Ok(runner) => {
                log_debug(&format!(
                    "QuizManager: {} HSK {} started with {} question(s)",
                    mode.label(),
                    level,
                    runner.total()
                ));
                self.app.quiz = QuizScreen::Active {
                    runner,
                    feedback: None,
                };
            }
            Err(err) => {
                log_debug(&format!("QuizManager: cannot start quiz: {}", err));
                self.show_error(err.to_string());
            }
        }
    }

    pub(crate) fn show_error(&mut self, message: String) {
        self.app.quiz = QuizScreen::Failed(message);
    }

    fn move_selection(&mut self, forward: bool) {
        let QuizScreen::Active { runner, .. } = &self.app.quiz else {
            return;
        };
        let QuizPhase::Active { selected, .. } = runner.phase() else {
            return;
        };
        let Some(len) = runner.current_question().map(|q| q.options.len()) else {
            return;
        };
        let target = match selected {
            None => 0,
            Some(current) if forward => (current + 1) % len,
            Some(0) => len - 1,
            Some(current) => current - 1,
        };
        self.select(target);
    }

    fn select(&mut self, option: usize) {
        let QuizScreen::Active { runner, .. } = &mut self.app.quiz else {
            return;
        };
        // Selection is frozen after reveal.
        if let Err(err) = runner.select_option(option) {
            log_debug(&format!("QuizManager: selection ignored: {}", err));
        }
    }

    fn primary_action(&mut self) {
        let QuizScreen::Active { runner, feedback } = &mut self.app.quiz else {
            return;
        };
        match runner.phase() {
            QuizPhase::Active {
                revealed: false, ..
            } => match runner.reveal() {
                Ok(result) => {
                    *feedback = Some(result);
                    self.app.status = None;
                    if result.correct && self.app.feedback_bell {
                        ring_bell();
                    }
                }
                Err(QuizError::NoSelection) => {
                    self.app.status = Some("Pilih salah satu jawaban terlebih dahulu.".to_string());
                }
                Err(err) => log_debug(&format!("QuizManager: reveal rejected: {}", err)),
            },
            QuizPhase::Active { .. } => match runner.advance() {
                Ok(phase) => {
                    *feedback = None;
                    if let QuizPhase::Finished { score, total } = phase {
                        log_debug(&format!("QuizManager: finished {}/{}", score, total));
                    }
                }
                Err(err) => log_debug(&format!("QuizManager: advance rejected: {}", err)),
            },
            QuizPhase::Finished { .. } => self.commit(),
        }
    }

    fn commit(&mut self) {
        let QuizScreen::Active { runner, feedback } = std::mem::take(&mut self.app.quiz) else {
            return;
        };
        match runner.commit(Utc::now().timestamp_millis()) {
            Ok(record) => {
                if let Err(err) = self.app.session.record_score(record) {
                    log_warn(&format!("QuizManager: failed to save score: {}", err));
                    App::push_error(
                        &mut self.app.error,
                        format!("Score could not be saved: {}", err),
                    );
                }
                self.app.go_home();
            }
            Err(runner) => self.app.quiz = QuizScreen::Active { runner, feedback },
        }
    }
}

fn ring_bell() {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}
