use crate::{
    App, LOADING_FRAMES, config,
    models::{LessonContent, QuizQuestion, ScoreRecord},
    quiz_runner::{self, AnswerFeedback, QuizPhase, QuizRunner},
    view_managers::{
        DashboardItem, LessonScreen, LoginField, ProfileManager, QuizScreen,
    },
    view_router::Route,
};
use chrono::{DateTime, Local};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};

pub(crate) struct UiRenderer<'a> {
    app: &'a App,
}

/// Areas shared by every screen.
struct Chrome {
    header: Rect,
    body: Rect,
    status: Rect,
    nav: Option<Rect>,
}

impl<'a> UiRenderer<'a> {
    pub(crate) fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub(crate) fn render(&self, frame: &mut Frame) {
        let route = self.app.router.current();
        let chrome = Self::chrome(frame, route.shows_nav_bar());
        match route {
            Route::Login => self.render_login(frame, &chrome),
            Route::Dashboard => self.render_dashboard(frame, &chrome),
            Route::Lesson { level, material } => {
                let title = format!("{} HSK {}", material.label(), level);
                self.render_lesson(frame, &chrome, &title)
            }
            Route::Quiz { level, mode } => {
                let title = format!("{} Level {}", mode.label(), level);
                self.render_quiz(frame, &chrome, &title)
            }
            Route::Profile => self.render_profile(frame, &chrome),
        }
        if let Some(nav) = chrome.nav {
            self.render_nav_bar(frame, nav, route);
        }
    }

    fn chrome(frame: &Frame, with_nav: bool) -> Chrome {
        let mut constraints = vec![
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(4),
        ];
        if with_nav {
            constraints.push(Constraint::Length(3));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(frame.area());
        Chrome {
            header: layout[0],
            body: layout[1],
            status: layout[2],
            nav: layout.get(3).copied(),
        }
    }

    fn render_header(frame: &mut Frame, area: Rect, title: &str, text: String) {
        let header_title = Line::from(title.to_string()).bold().blue().centered();
        frame.render_widget(
            Paragraph::new(text)
                .block(Block::bordered().title(header_title))
                .centered(),
            area,
        );
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, hints: &[&str]) {
        let mut status_lines = Vec::new();
        if let Some(error) = &self.app.error {
            status_lines.push(format!("Error: {}", error));
        }
        if let Some(status) = &self.app.status {
            status_lines.push(status.clone());
        }
        status_lines.extend(hints.iter().map(|hint| hint.to_string()));

        frame.render_widget(
            Paragraph::new(status_lines.join("\n"))
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(Line::from("Status"))),
            area,
        );
    }

    fn render_nav_bar(&self, frame: &mut Frame, area: Rect, route: Route) {
        let tab = |label: &'static str, active: bool| {
            if active {
                Span::styled(
                    label,
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD | Modifier::REVERSED),
                )
            } else {
                Span::raw(label)
            }
        };
        let line = Line::from(vec![
            tab(" [h] Beranda ", route != Route::Profile),
            Span::raw("   "),
            tab(" [p] Profil ", route == Route::Profile),
        ])
        .centered();
        frame.render_widget(Paragraph::new(line).block(Block::bordered()), area);
    }

    fn loading_text(&self, message: &str) -> String {
        let symbol = LOADING_FRAMES[self.app.loading_frame % LOADING_FRAMES.len()];
        format!("{} {}", symbol, message)
    }

    fn render_login(&self, frame: &mut Frame, chrome: &Chrome) {
        let tutor_name = config::current().tutor_name;
        Self::render_header(
            frame,
            chrome.header,
            "Mandarin Master",
            format!("Belajar HSK 1-4 bersama Laoshi {}", tutor_name),
        );

        let form = &self.app.login_form;
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(1),
            ])
            .split(chrome.body);

        for (field, area) in [LoginField::Name, LoginField::Email]
            .into_iter()
            .zip(sections.iter())
        {
            let focused = form.focus == field;
            let mut text = form.value(field).to_string();
            if focused {
                text.push('_');
            }
            let block = Block::bordered().title(Line::from(field.label()));
            let block = if focused {
                block.border_style(Style::default().fg(Color::Yellow))
            } else {
                block
            };
            frame.render_widget(Paragraph::new(text).block(block), *area);
        }

        if let Some(message) = &form.status {
            frame.render_widget(
                Paragraph::new(message.as_str())
                    .red()
                    .wrap(Wrap { trim: true }),
                sections[2],
            );
        }

        self.render_status(
            frame,
            chrome.status,
            &["Tab pindah kolom. Enter untuk Masuk Sekarang. Esc atau Ctrl-C untuk keluar."],
        );
    }

    fn render_dashboard(&self, frame: &mut Frame, chrome: &Chrome) {
        let name = self
            .app
            .session
            .user()
            .map(|user| user.name.as_str())
            .unwrap_or_default();
        Self::render_header(
            frame,
            chrome.header,
            &format!("Selamat datang, {}", name),
            "Pilih level HSK atau kategori untuk mulai belajar.".to_string(),
        );

        let items: Vec<ListItem> = self
            .app
            .dashboard
            .items
            .iter()
            .map(|item| ListItem::new(Self::dashboard_line(*item)))
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(self.app.dashboard.selected));

        frame.render_stateful_widget(
            List::new(items)
                .block(Block::bordered().title(Line::from("Menu Belajar")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            chrome.body,
            &mut list_state,
        );

        self.render_status(
            frame,
            chrome.status,
            &[
                "↑/↓ pilih, ←/→ pindah level, Enter buka.",
                "p untuk Profil. q, Esc, atau Ctrl-C untuk keluar.",
            ],
        );
    }

    fn dashboard_line(item: DashboardItem) -> String {
        match item {
            DashboardItem::Lesson(level) | DashboardItem::Quiz { level, .. } => {
                format!("HSK {} • {}", level, item.label())
            }
            DashboardItem::Category(_) => format!("{} (HSK 1)", item.label()),
            DashboardItem::Profile => item.label(),
        }
    }

    fn render_lesson(&self, frame: &mut Frame, chrome: &Chrome, title: &str) {
        match &self.app.lesson {
            LessonScreen::Ready { content, scroll } => {
                Self::render_header(
                    frame,
                    chrome.header,
                    title,
                    format!("{} • {} • {}", content.title, content.pinyin, content.translation),
                );
                self.render_lesson_body(frame, chrome.body, content, *scroll);
            }
            LessonScreen::Failed(message) => {
                Self::render_header(frame, chrome.header, title, "Materi gagal dimuat.".into());
                Self::render_failure(frame, chrome.body, "Materi", message);
            }
            LessonScreen::Loading | LessonScreen::Idle => {
                Self::render_header(frame, chrome.header, title, String::new());
                frame.render_widget(
                    Paragraph::new(self.loading_text("Laoshi sedang menyiapkan materi..."))
                        .block(Block::bordered().title(Line::from("Materi"))),
                    chrome.body,
                );
            }
        }

        let hints: &[&str] = if matches!(self.app.lesson, LessonScreen::Failed(_)) {
            &["r coba lagi. Esc atau b kembali ke Beranda."]
        } else {
            &["↑/↓ atau PgUp/PgDn menggulir. Esc atau b kembali ke Beranda."]
        };
        self.render_status(frame, chrome.status, hints);
    }

    fn render_lesson_body(&self, frame: &mut Frame, area: Rect, content: &LessonContent, scroll: u16) {
        let tip_height = (content.tips.len() as u16).saturating_add(3).min(area.height / 2);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(tip_height)])
            .split(area);

        let mut lines = vec![
            Line::from(content.title.clone()).bold(),
            Line::from(format!("{} • {}", content.pinyin, content.translation)).italic(),
            Line::from(""),
        ];
        lines.extend(content.content.lines().map(|line| Line::from(line.to_string())));
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0))
                .block(Block::bordered().title(Line::from("Materi"))),
            sections[0],
        );

        let tutor_name = config::current().tutor_name;
        let short_name = tutor_name.split_whitespace().next().unwrap_or_default();
        let mut tip_lines: Vec<String> = content
            .tips
            .iter()
            .enumerate()
            .map(|(index, tip)| format!("{}. {}", index + 1, tip))
            .collect();
        tip_lines.push("Terus semangat belajar, kamu pasti bisa!".to_string());
        frame.render_widget(
            Paragraph::new(tip_lines.join("\n"))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from(format!("Tips dari Tutor {}", short_name)))),
            sections[1],
        );
    }

    fn render_failure(frame: &mut Frame, area: Rect, title: &str, message: &str) {
        let text = format!(
            "Maaf, terjadi kesalahan saat menghubungi Laoshi.\n\n{}\n\nTekan r untuk mencoba lagi.",
            message
        );
        frame.render_widget(
            Paragraph::new(text)
                .red()
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from(title.to_string()))),
            area,
        );
    }

    fn render_quiz(&self, frame: &mut Frame, chrome: &Chrome, title: &str) {
        let mut hints = Vec::new();
        let finished = matches!(&self.app.quiz, QuizScreen::Active { runner, .. } if runner.is_finished());
        hints.push(if finished {
            "Esc atau b kembali ke Beranda tanpa menyimpan."
        } else {
            "Esc atau b kembali ke Beranda (progres tidak disimpan)."
        });
        match &self.app.quiz {
            QuizScreen::Active { runner, feedback } => match runner.phase() {
                QuizPhase::Active {
                    index,
                    selected,
                    revealed,
                } => {
                    Self::render_header(
                        frame,
                        chrome.header,
                        title,
                        format!(
                            "Soal {} dari {} • Benar {}",
                            index + 1,
                            runner.total(),
                            runner.correct_count()
                        ),
                    );
                    if let Some(question) = runner.current_question() {
                        self.render_question(frame, chrome.body, runner, question, selected, *feedback);
                    }
                    if !revealed {
                        hints.insert(0, "↑/↓ atau 1-9 pilih jawaban.");
                    }
                }
                QuizPhase::Finished { score, total } => {
                    Self::render_header(frame, chrome.header, title, "Hasil Tes".to_string());
                    Self::render_result(frame, chrome.body, runner, score, total);
                }
            },
            QuizScreen::Failed(message) => {
                Self::render_header(frame, chrome.header, title, "Soal gagal dimuat.".into());
                Self::render_failure(frame, chrome.body, "Kuis", message);
                hints.insert(0, "r coba lagi.");
            }
            QuizScreen::Loading | QuizScreen::Idle => {
                Self::render_header(frame, chrome.header, title, String::new());
                frame.render_widget(
                    Paragraph::new(self.loading_text("Laoshi sedang menyusun soal..."))
                        .block(Block::bordered().title(Line::from("Kuis"))),
                    chrome.body,
                );
            }
        }

        let action_hint = self
            .app
            .quiz
            .action_label()
            .map(|label| format!("Enter: {}", label));
        if let Some(hint) = &action_hint {
            hints.insert(0, hint.as_str());
        }
        self.render_status(frame, chrome.status, &hints);
    }

    fn render_question(
        &self,
        frame: &mut Frame,
        area: Rect,
        runner: &QuizRunner,
        question: &QuizQuestion,
        selected: Option<usize>,
        feedback: Option<AnswerFeedback>,
    ) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(6),
                Constraint::Min(4),
                Constraint::Length(if feedback.is_some() { 5 } else { 0 }),
            ])
            .split(area);

        let (position, total) = match runner.phase() {
            QuizPhase::Active { index, .. } => (index + 1, runner.total()),
            QuizPhase::Finished { .. } => (runner.total(), runner.total()),
        };
        frame.render_widget(
            Gauge::default()
                .block(Block::bordered().title(Line::from("Progres")))
                .gauge_style(Style::default().fg(Color::Red))
                .ratio(position as f64 / total.max(1) as f64)
                .label(format!("{} / {}", position, total)),
            sections[0],
        );

        let pinyin = question
            .pinyin
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("Tuliskan hanzi yang sesuai");
        let mut lines = vec![
            Line::from(pinyin.to_string()).italic(),
            Line::from(question.question.clone()).bold(),
        ];
        if let Some(translation) = question.translation.as_deref() {
            lines.push(Line::from(format!("\"{}\"", translation)).dim());
        }
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(Line::from("Pertanyaan"))),
            sections[1],
        );

        let items: Vec<ListItem> = question
            .options
            .iter()
            .enumerate()
            .map(|(index, option)| {
                let marker = match feedback {
                    Some(result) if index == result.correct_answer => "[✓]",
                    Some(_) if selected == Some(index) => "[✗]",
                    _ => "[ ]",
                };
                let text = format!("{} {}. {}", marker, index + 1, option);
                let style = match feedback {
                    Some(result) if index == result.correct_answer => Style::default().green(),
                    Some(_) if selected == Some(index) => Style::default().red(),
                    _ => Style::default(),
                };
                ListItem::new(text).style(style)
            })
            .collect();
        let mut list_state = ListState::default();
        list_state.select(selected);
        frame.render_stateful_widget(
            List::new(items)
                .block(Block::bordered().title(Line::from("Pilihan Jawaban")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::BOLD)),
            sections[2],
            &mut list_state,
        );

        if let Some(result) = feedback {
            let (banner, color) = if result.correct {
                ("Benar! Hebat sekali.", Color::Green)
            } else {
                ("Kurang tepat, jangan menyerah.", Color::Red)
            };
            frame.render_widget(
                Paragraph::new(question.explanation.clone())
                    .wrap(Wrap { trim: true })
                    .block(
                        Block::bordered()
                            .title(Line::from(banner).bold())
                            .border_style(Style::default().fg(color)),
                    ),
                sections[3],
            );
        }
    }

    fn render_result(frame: &mut Frame, area: Rect, runner: &QuizRunner, score: u32, total: u32) {
        let percentage = crate::models::percentage(score, total);
        let text = vec![
            Line::from(format!("{}%", percentage)).bold().centered(),
            Line::from(format!("{} dari {} soal benar", score, total)).centered(),
            Line::from(""),
            Line::from(quiz_runner::tutor_message(percentage)).italic().centered(),
            Line::from(""),
            Line::from(format!(
                "{} HSK {} selesai. Tekan Enter untuk Simpan & Kembali.",
                runner.mode().label(),
                runner.level()
            ))
            .centered(),
        ];
        frame.render_widget(
            Paragraph::new(text)
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(Line::from("Hasil"))),
            area,
        );
    }

    fn render_profile(&self, frame: &mut Frame, chrome: &Chrome) {
        let user = self.app.session.user();
        let (name, email) = user
            .map(|user| (user.name.as_str(), user.email.as_str()))
            .unwrap_or_default();
        Self::render_header(frame, chrome.header, name, email.to_string());

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(3)])
            .split(chrome.body);

        let summary = ProfileManager::summary(self.app);
        frame.render_widget(
            Paragraph::new(format!(
                "Tes Selesai: {}\nRata-rata: {}%",
                summary.completed_count, summary.average_percentage
            ))
            .block(Block::bordered().title(Line::from("Statistik"))),
            sections[0],
        );

        let scores = user.map(|user| user.scores.as_slice()).unwrap_or_default();
        let items: Vec<ListItem> = if scores.is_empty() {
            vec![ListItem::new("Belum ada riwayat tes.")]
        } else {
            scores.iter().map(Self::history_item).collect()
        };
        let mut list_state = ListState::default();
        if !scores.is_empty() {
            list_state.select(Some(self.app.profile.selected.min(scores.len() - 1)));
        }
        frame.render_stateful_widget(
            List::new(items)
                .block(Block::bordered().title(Line::from("Riwayat Tes")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            sections[1],
            &mut list_state,
        );

        self.render_status(
            frame,
            chrome.status,
            &["↑/↓ gulir riwayat. x untuk Keluar (logout). Esc atau b kembali ke Beranda."],
        );
    }

    fn history_item(record: &ScoreRecord) -> ListItem<'static> {
        let date = DateTime::from_timestamp_millis(record.timestamp)
            .map(|utc| utc.with_timezone(&Local).format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| "-".to_string());
        let label = record.pass_label();
        let label_style = if record.is_passing() {
            Style::default().green().bold()
        } else {
            Style::default().red().bold()
        };
        ListItem::new(Line::from(vec![
            Span::raw(format!(
                "{:<8} HSK {} • {} • {:>2} / {:<2} ({:>3}%) ",
                record.mode.label(),
                record.level,
                date,
                record.score,
                record.total,
                record.percentage()
            )),
            Span::styled(label, label_style),
        ]))
    }
}
