use crate::{
    App,
    models::{HskLevel, MaterialType, QuizMode},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// One selectable entry on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DashboardItem {
    /// Reading material for a level card.
    Lesson(HskLevel),
    Quiz {
        level: HskLevel,
        mode: QuizMode,
    },
    /// Quick-access category row; always opens a level 1 lesson.
    Category(MaterialType),
    Profile,
}

impl DashboardItem {
    /// Per-level actions followed by the category shortcuts and the profile entry.
    pub(crate) fn all() -> Vec<Self> {
        let mut items = Vec::new();
        for level in HskLevel::ALL {
            items.push(Self::Lesson(level));
            items.push(Self::Quiz {
                level,
                mode: QuizMode::Practice,
            });
            items.push(Self::Quiz {
                level,
                mode: QuizMode::Exam,
            });
        }
        items.extend(MaterialType::ALL.into_iter().map(Self::Category));
        items.push(Self::Profile);
        items
    }

    pub(crate) fn label(self) -> String {
        match self {
            Self::Lesson(_) => "Materi".to_string(),
            Self::Quiz {
                mode: QuizMode::Practice,
                ..
            } => "Latihan".to_string(),
            Self::Quiz {
                mode: QuizMode::Exam,
                ..
            } => "Simulasi Ujian".to_string(),
            Self::Category(material) => format!("Kategori: {}", material.label()),
            Self::Profile => "Profil Saya".to_string(),
        }
    }

    /// Level card this item belongs to, `None` for shortcuts outside the cards.
    pub(crate) fn level_group(self) -> Option<HskLevel> {
        match self {
            Self::Lesson(level) | Self::Quiz { level, .. } => Some(level),
            Self::Category(_) | Self::Profile => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DashboardState {
    pub(crate) items: Vec<DashboardItem>,
    pub(crate) selected: usize,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            items: DashboardItem::all(),
            selected: 0,
        }
    }
}

impl DashboardState {
    pub(crate) fn selected_item(&self) -> Option<DashboardItem> {
        self.items.get(self.selected).copied()
    }
}

pub(crate) struct DashboardManager<'a> {
    app: &'a mut App,
}

impl<'a> DashboardManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.select_previous(),
            (KeyModifiers::NONE, KeyCode::Right | KeyCode::Char('l')) => self.jump_group(true),
            (KeyModifiers::NONE, KeyCode::Left) => self.jump_group(false),
            (KeyModifiers::NONE, KeyCode::Enter) => self.activate(),
            (KeyModifiers::NONE, KeyCode::Char('p')) => self.app.open_profile(),
            (KeyModifiers::NONE, KeyCode::Char('q') | KeyCode::Esc) => self.app.quit(),
            _ => {}
        }
    }

    fn select_next(&mut self) {
        let state = &mut self.app.dashboard;
        state.selected = (state.selected + 1) % state.items.len();
    }

    fn select_previous(&mut self) {
        let state = &mut self.app.dashboard;
        if state.selected == 0 {
            state.selected = state.items.len() - 1;
        } else {
            state.selected -= 1;
        }
    }

    /// Move to the first item of the next or previous level card.
    fn jump_group(&mut self, forward: bool) {
        let state = &mut self.app.dashboard;
        let current = state.selected_item().and_then(DashboardItem::level_group);
        let target = match current {
            Some(level) if forward => level.next(),
            Some(level) => level.previous(),
            None if forward => HskLevel::default(),
            None => HskLevel::ALL[HskLevel::ALL.len() - 1],
        };
        if let Some(index) = state
            .items
            .iter()
            .position(|item| item.level_group() == Some(target))
        {
            state.selected = index;
        }
    }

    fn activate(&mut self) {
        match self.app.dashboard.selected_item() {
            Some(DashboardItem::Lesson(level)) => self.app.open_lesson(level, MaterialType::Reading),
            Some(DashboardItem::Category(material)) => {
                self.app.open_lesson(HskLevel::default(), material)
            }
            Some(DashboardItem::Quiz { level, mode }) => self.app.open_quiz(level, mode),
            Some(DashboardItem::Profile) => self.app.open_profile(),
            None => {}
        }
    }
}
