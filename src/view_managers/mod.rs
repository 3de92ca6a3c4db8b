pub mod dashboard_manager;
pub mod lesson_manager;
pub mod login_manager;
pub mod profile_manager;
pub mod quiz_manager;

pub(crate) use dashboard_manager::{DashboardItem, DashboardManager, DashboardState};
pub(crate) use lesson_manager::{LessonManager, LessonScreen};
pub(crate) use login_manager::{LoginField, LoginForm, LoginManager};
pub(crate) use profile_manager::{ProfileManager, ProfileState};
pub(crate) use quiz_manager::{QuizManager, QuizScreen};
