use crate::{
    App,
    log_util::{log_debug, log_warn},
    session_manager::SessionError,
    view_router::Route,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum LoginField {
    #[default]
    Name,
    Email,
}

impl LoginField {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Name => "Nama Lengkap",
            Self::Email => "Email",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Self::Name => Self::Email,
            Self::Email => Self::Name,
        }
    }
}

/// Text entered on the login screen.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoginForm {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) focus: LoginField,
    pub(crate) status: Option<String>,
}

impl LoginForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Name => &mut self.name,
            LoginField::Email => &mut self.email,
        }
    }

    pub(crate) fn value(&self, field: LoginField) -> &str {
        match field {
            LoginField::Name => &self.name,
            LoginField::Email => &self.email,
        }
    }
}

pub(crate) struct LoginManager<'a> {
    app: &'a mut App,
}

impl<'a> LoginManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Esc) => self.app.quit(),
            (_, KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down) => {
                let form = &mut self.app.login_form;
                form.focus = form.focus.toggled();
            }
            (KeyModifiers::NONE, KeyCode::Enter) => {
                let form = &self.app.login_form;
                if form.focus == LoginField::Name && form.email.trim().is_empty() {
                    self.app.login_form.focus = LoginField::Email;
                } else {
                    self.submit();
                }
            }
            (KeyModifiers::NONE, KeyCode::Backspace) => {
                self.app.login_form.focused_mut().pop();
            }
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => {
                self.app.login_form.focused_mut().push(ch);
                self.app.login_form.status = None;
            }
            _ => {}
        }
    }

    fn submit(&mut self) {
        let name = self.app.login_form.name.clone();
        let email = self.app.login_form.email.clone();
        match self.app.session.login(&name, &email) {
            Ok(user) => {
                log_debug(&format!("LoginManager: signed in as {}", user.email));
                self.app.login_form = LoginForm::default();
                self.app.navigate(Route::Dashboard);
            }
            Err(SessionError::Storage(err)) => {
                // The session is live in memory even though it was not persisted.
                log_warn(&format!("LoginManager: session not persisted: {}", err));
                App::push_error(
                    &mut self.app.error,
                    format!("Progress will not be saved: {}", err),
                );
                self.app.login_form = LoginForm::default();
                self.app.navigate(Route::Dashboard);
            }
            Err(err) => {
                self.app.login_form.status = Some(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session_manager::MemoryUserStore,
        tests::{app_with, key, type_text},
    };

    #[test]
    fn blank_name_keeps_user_on_login() {
        let store = MemoryUserStore::new();
        let mut app = app_with(&store, None);

        app.on_key_event(key(KeyCode::Tab));
        type_text(&mut app, "ana@x.com");
        app.on_key_event(key(KeyCode::Enter));

        assert_eq!(app.router.current(), Route::Login);
        assert!(app.login_form.status.is_some());
        assert!(store.raw().is_none());
    }

    #[test]
    fn enter_on_name_moves_to_email_first() {
        let mut app = app_with(&MemoryUserStore::new(), None);
        type_text(&mut app, "Ana");
        app.on_key_event(key(KeyCode::Enter));
        assert_eq!(app.login_form.focus, LoginField::Email);
        assert_eq!(app.router.current(), Route::Login);
    }

    #[test]
    fn backspace_edits_focused_field() {
        let mut app = app_with(&MemoryUserStore::new(), None);
        type_text(&mut app, "Anaa");
        app.on_key_event(key(KeyCode::Backspace));
        assert_eq!(app.login_form.name, "Ana");
        assert!(app.login_form.email.is_empty());
    }

    #[test]
    fn successful_login_persists_and_opens_dashboard() {
        let store = MemoryUserStore::new();
        let mut app = app_with(&store, None);

        type_text(&mut app, "  Budi ");
        app.on_key_event(key(KeyCode::Tab));
        type_text(&mut app, "budi@contoh.id");
        app.on_key_event(key(KeyCode::Enter));

        assert_eq!(app.router.current(), Route::Dashboard);
        assert_eq!(app.session.user().unwrap().name, "Budi");
        assert!(store.raw().unwrap().contains("budi@contoh.id"));
        assert!(app.login_form.name.is_empty());
    }

    #[test]
    fn escape_quits_from_login() {
        let mut app = app_with(&MemoryUserStore::new(), None);
        app.running = true;
        app.on_key_event(key(KeyCode::Esc));
        assert!(!app.running);
    }
}
