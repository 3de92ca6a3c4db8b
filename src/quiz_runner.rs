use crate::models::{HskLevel, QuizMode, QuizQuestion, ScoreRecord};
use rand::{Rng, seq::SliceRandom};
use thiserror::Error;

/// Rejected quiz transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("the content provider returned no quiz questions")]
    Empty,
    #[error("option {index} does not exist (question has {len} options)")]
    OptionOutOfRange { index: usize, len: usize },
    #[error("the answer has already been revealed")]
    AlreadyRevealed,
    #[error("no option has been selected yet")]
    NoSelection,
    #[error("the answer has not been revealed yet")]
    NotRevealed,
    #[error("the quiz is already finished")]
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Active {
        index: usize,
        selected: Option<usize>,
        revealed: bool,
    },
    Finished {
        score: u32,
        total: u32,
    },
}

/// Correctness signal emitted when an answer is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_answer: usize,
}

/// Steps once through a fixed list of questions and produces a single score record.
#[derive(Debug, Clone)]
pub struct QuizRunner {
    level: HskLevel,
    mode: QuizMode,
    questions: Vec<QuizQuestion>,
    phase: QuizPhase,
    correct_count: u32,
}

impl QuizRunner {
    pub fn new(
        level: HskLevel,
        mode: QuizMode,
        questions: Vec<QuizQuestion>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        Ok(Self {
            level,
            mode,
            questions,
            phase: QuizPhase::Active {
                index: 0,
                selected: None,
                revealed: false,
            },
            correct_count: 0,
        })
    }

    pub fn level(&self) -> HskLevel {
        self.level
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, QuizPhase::Finished { .. })
    }

    /// The question being answered, or `None` once finished.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            QuizPhase::Active { index, .. } => self.questions.get(index),
            QuizPhase::Finished { .. } => None,
        }
    }

    pub fn select_option(&mut self, option: usize) -> Result<(), QuizError> {
        let QuizPhase::Active {
            index,
            selected,
            revealed,
        } = &mut self.phase
        else {
            return Err(QuizError::Finished);
        };
        if *revealed {
            return Err(QuizError::AlreadyRevealed);
        }
        let len = self.questions[*index].options.len();
        if option >= len {
            return Err(QuizError::OptionOutOfRange { index: option, len });
        }
        *selected = Some(option);
        Ok(())
    }

    /// Reveal the correct answer. The running score is not touched until [`Self::advance`].
    pub fn reveal(&mut self) -> Result<AnswerFeedback, QuizError> {
        let QuizPhase::Active {
            index,
            selected,
            revealed,
        } = &mut self.phase
        else {
            return Err(QuizError::Finished);
        };
        if *revealed {
            return Err(QuizError::AlreadyRevealed);
        }
        let Some(choice) = *selected else {
            return Err(QuizError::NoSelection);
        };
        *revealed = true;
        let question = &self.questions[*index];
        Ok(AnswerFeedback {
            correct: question.is_correct(choice),
            correct_answer: question.correct_answer,
        })
    }

    /// Score the revealed answer and move to the next question or the finished state.
    pub fn advance(&mut self) -> Result<QuizPhase, QuizError> {
        let QuizPhase::Active {
            index,
            selected,
            revealed,
        } = self.phase
        else {
            return Err(QuizError::Finished);
        };
        if !revealed {
            return Err(QuizError::NotRevealed);
        }

        if selected.is_some_and(|choice| self.questions[index].is_correct(choice)) {
            self.correct_count += 1;
        }

        self.phase = if index + 1 < self.questions.len() {
            QuizPhase::Active {
                index: index + 1,
                selected: None,
                revealed: false,
            }
        } else {
            QuizPhase::Finished {
                score: self.correct_count,
                total: self.questions.len() as u32,
            }
        };
        Ok(self.phase)
    }

    /// Consume a finished runner into its score record; an unfinished runner is handed back.
    pub fn commit(self, timestamp_ms: i64) -> Result<ScoreRecord, Self> {
        match self.phase {
            QuizPhase::Finished { score, total } => Ok(ScoreRecord::new(
                self.level,
                self.mode,
                score,
                total,
                timestamp_ms,
            )),
            QuizPhase::Active { .. } => Err(self),
        }
    }
}

/// Shuffle the options of every question, remapping `correct_answer` to follow its option.
pub fn shuffle_options<R: Rng + ?Sized>(questions: &mut [QuizQuestion], rng: &mut R) {
    for question in questions {
        let mut order: Vec<usize> = (0..question.options.len()).collect();
        order.shuffle(rng);
        let previous = std::mem::take(&mut question.options);
        question.correct_answer = order
            .iter()
            .position(|&original| original == question.correct_answer)
            .unwrap_or(question.correct_answer);
        question.options = order.into_iter().map(|i| previous[i].clone()).collect();
    }
}

/// Closing message shown on the result screen.
pub fn tutor_message(percentage: u32) -> &'static str {
    if percentage >= 80 {
        "Luar biasa! Pertahankan prestasimu."
    } else if percentage >= 60 {
        "Kerja bagus, sedikit lagi kamu akan mahir."
    } else {
        "Tetap semangat! Coba pelajari lagi materinya."
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    pub(crate) fn question(id: &str, correct_answer: usize) -> QuizQuestion {
        QuizQuestion {
            id: id.to_string(),
            question: format!("你好 {id}"),
            options: vec![
                "halo".to_string(),
                "terima kasih".to_string(),
                "selamat tinggal".to_string(),
                "maaf".to_string(),
            ],
            correct_answer,
            explanation: "你好 berarti halo.".to_string(),
            pinyin: Some("nǐ hǎo".to_string()),
            translation: None,
        }
    }

    fn runner(correct_answers: &[usize]) -> QuizRunner {
        let questions = correct_answers
            .iter()
            .enumerate()
            .map(|(i, correct)| question(&format!("q{i}"), *correct))
            .collect();
        QuizRunner::new(HskLevel::default(), QuizMode::Practice, questions).unwrap()
    }

    fn answer(runner: &mut QuizRunner, option: usize) -> AnswerFeedback {
        runner.select_option(option).unwrap();
        let feedback = runner.reveal().unwrap();
        runner.advance().unwrap();
        feedback
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let result = QuizRunner::new(HskLevel::default(), QuizMode::Exam, Vec::new());
        assert_eq!(result.unwrap_err(), QuizError::Empty);
    }

    #[test]
    fn starts_on_first_question_without_selection() {
        let runner = runner(&[1, 2]);
        assert_eq!(
            runner.phase(),
            QuizPhase::Active {
                index: 0,
                selected: None,
                revealed: false
            }
        );
        assert_eq!(runner.current_question().map(|q| q.id.as_str()), Some("q0"));
    }

    #[test]
    fn reveal_requires_selection_and_does_not_score() {
        let mut runner = runner(&[1]);
        assert_eq!(runner.reveal(), Err(QuizError::NoSelection));

        runner.select_option(1).unwrap();
        let feedback = runner.reveal().unwrap();

        assert!(feedback.correct);
        assert_eq!(runner.correct_count(), 0);
        assert_eq!(runner.reveal(), Err(QuizError::AlreadyRevealed));
    }

    #[test]
    fn selection_is_locked_after_reveal() {
        let mut runner = runner(&[0]);
        runner.select_option(2).unwrap();
        runner.reveal().unwrap();
        assert_eq!(runner.select_option(0), Err(QuizError::AlreadyRevealed));
    }

    #[test]
    fn advance_requires_reveal() {
        let mut runner = runner(&[0]);
        runner.select_option(0).unwrap();
        assert_eq!(runner.advance(), Err(QuizError::NotRevealed));
    }

    #[test]
    fn out_of_range_selection_is_rejected() {
        let mut runner = runner(&[0]);
        assert_eq!(
            runner.select_option(4),
            Err(QuizError::OptionOutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    fn repeated_selection_scores_once_with_last_choice() {
        let mut runner = runner(&[2, 0]);
        runner.select_option(2).unwrap();
        runner.select_option(2).unwrap();
        runner.select_option(1).unwrap();
        runner.select_option(2).unwrap();
        runner.reveal().unwrap();
        runner.advance().unwrap();
        assert_eq!(runner.correct_count(), 1);

        runner.select_option(0).unwrap();
        runner.select_option(3).unwrap();
        let feedback = runner.reveal().unwrap();
        assert!(!feedback.correct);
        assert_eq!(feedback.correct_answer, 0);
        runner.advance().unwrap();
        assert_eq!(runner.correct_count(), 1);
    }

    #[test]
    fn finishing_locks_every_transition() {
        let mut runner = runner(&[0]);
        answer(&mut runner, 0);

        assert_eq!(runner.phase(), QuizPhase::Finished { score: 1, total: 1 });
        assert!(runner.current_question().is_none());
        assert_eq!(runner.select_option(0), Err(QuizError::Finished));
        assert_eq!(runner.reveal(), Err(QuizError::Finished));
        assert_eq!(runner.advance(), Err(QuizError::Finished));
    }

    #[test]
    fn all_correct_answers_produce_full_score_record() {
        let correct = [0, 1, 2, 3, 1];
        let mut runner = QuizRunner::new(
            HskLevel::new(2).unwrap(),
            QuizMode::Practice,
            correct
                .iter()
                .enumerate()
                .map(|(i, c)| question(&format!("q{i}"), *c))
                .collect(),
        )
        .unwrap();
        for choice in correct {
            answer(&mut runner, choice);
        }

        assert_eq!(runner.phase(), QuizPhase::Finished { score: 5, total: 5 });
        let record = runner.commit(1_700_000_000_000).unwrap();
        assert_eq!(record.score, 5);
        assert_eq!(record.total, 5);
        assert_eq!(record.level.value(), 2);
        assert_eq!(record.mode, QuizMode::Practice);
        assert_eq!(record.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn commit_before_finish_returns_the_runner() {
        let runner = runner(&[0, 1]);
        let runner = runner.commit(0).unwrap_err();
        assert!(!runner.is_finished());
    }

    #[test]
    fn shuffling_keeps_correct_answer_on_the_same_text() {
        let mut questions: Vec<QuizQuestion> = (0..4).map(|i| question("s", i)).collect();
        let expected: Vec<String> = questions
            .iter()
            .map(|q| q.options[q.correct_answer].clone())
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        shuffle_options(&mut questions, &mut rng);

        for (question, text) in questions.iter().zip(expected) {
            assert_eq!(question.options.len(), 4);
            assert_eq!(question.options[question.correct_answer], text);
        }
    }

    #[test]
    fn tutor_message_depends_on_percentage_band() {
        assert_eq!(tutor_message(80), "Luar biasa! Pertahankan prestasimu.");
        assert_eq!(tutor_message(60), "Kerja bagus, sedikit lagi kamu akan mahir.");
        assert_eq!(tutor_message(59), "Tetap semangat! Coba pelajari lagi materinya.");
    }
}
