use crate::models::{HskLevel, MaterialType, QuizMode};
use thiserror::Error;

/// Screens of the app together with the selection each one was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Lesson {
        level: HskLevel,
        material: MaterialType,
    },
    Quiz {
        level: HskLevel,
        mode: QuizMode,
    },
    Profile,
}

impl Route {
    pub fn name(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Dashboard => "dashboard",
            Self::Lesson { .. } => "lesson",
            Self::Quiz { .. } => "quiz",
            Self::Profile => "profile",
        }
    }

    /// Whether the bottom navigation bar is shown on this screen.
    pub fn shows_nav_bar(self) -> bool {
        !matches!(self, Self::Login)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("{0} requires a signed-in user")]
    NotSignedIn(&'static str),
    #[error("login is only reachable after logout")]
    StillSignedIn,
    #[error("cannot navigate from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct ViewRouter {
    current: Route,
}

impl ViewRouter {
    /// Start on the dashboard when a session was restored, otherwise on login.
    pub fn initial(signed_in: bool) -> Self {
        Self {
            current: if signed_in {
                Route::Dashboard
            } else {
                Route::Login
            },
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    pub fn navigate(&mut self, target: Route, signed_in: bool) -> Result<Route, RouteError> {
        match target {
            Route::Login if signed_in => return Err(RouteError::StillSignedIn),
            Route::Login => {}
            other if !signed_in => return Err(RouteError::NotSignedIn(other.name())),
            _ => {}
        }

        if target != self.current && !Self::is_allowed(self.current, target) {
            return Err(RouteError::InvalidTransition {
                from: self.current.name(),
                to: target.name(),
            });
        }

        self.current = target;
        Ok(target)
    }

    fn is_allowed(from: Route, to: Route) -> bool {
        match (from, to) {
            (Route::Login, Route::Dashboard) => true,
            (Route::Dashboard, Route::Lesson { .. } | Route::Quiz { .. } | Route::Profile) => {
                true
            }
            (Route::Lesson { .. } | Route::Quiz { .. } | Route::Profile, Route::Dashboard) => {
                true
            }
            // Bottom navigation bar.
            (Route::Lesson { .. } | Route::Quiz { .. }, Route::Profile) => true,
            (Route::Profile, Route::Login) => true,
            _ => false,
        }
    }
}
