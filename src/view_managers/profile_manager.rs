use crate::{App, log_util::log_warn, score_summary::ScoreSummary, view_router::Route};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ProfileState {
    /// Highlighted row in the score history.
    pub(crate) selected: usize,
}

pub(crate) struct ProfileManager<'a> {
    app: &'a mut App,
}

impl<'a> ProfileManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    /// Aggregate of the signed-in user's history.
    pub(crate) fn summary(app: &App) -> ScoreSummary {
        app.session
            .user()
            .map(|user| ScoreSummary::from_records(&user.scores))
            .unwrap_or_default()
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('h')) => {
                self.app.go_home()
            }
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.select_previous(),
            (KeyModifiers::NONE, KeyCode::Char('x') | KeyCode::Char('o')) => self.logout(),
            (KeyModifiers::NONE, KeyCode::Char('q')) => self.app.quit(),
            _ => {}
        }
    }

    fn history_len(&self) -> usize {
        self.app.session.user().map_or(0, |user| user.scores.len())
    }

    fn select_next(&mut self) {
        let len = self.history_len();
        if len > 0 {
            self.app.profile.selected = (self.app.profile.selected + 1).min(len - 1);
        }
    }

    fn select_previous(&mut self) {
        self.app.profile.selected = self.app.profile.selected.saturating_sub(1);
    }

    fn logout(&mut self) {
        if let Err(err) = self.app.session.logout() {
            log_warn(&format!("ProfileManager: failed to clear session: {}", err));
            App::push_error(
                &mut self.app.error,
                format!("Saved session could not be removed: {}", err),
            );
        }
        self.app.profile = ProfileState::default();
        self.app.dashboard = Default::default();
        self.app.navigate(Route::Login);
    }
}
