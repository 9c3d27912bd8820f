//! Timed true/false qualification quiz gating committee membership.

use crate::{
    battle::{
        Battle,
        BattleId,
        Choice,
        Position,
    },
    error::Rejection,
};
use std::time::Duration;
use tokio::time::Instant;

pub mod timer;

pub use timer::{
    QuizTimer,
    SessionId,
    TimerToken,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitteeQuiz {
    pub question: String,
    pub player: Choice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuizAnswer {
    pub answer: bool,
    pub quiz_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailReason {
    Incorrect,
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizStep {
    /// Answer accepted; the question at `index` is now showing with a fresh deadline.
    Next { index: usize },
    /// Every question answered correctly.
    Passed { answers: Vec<QuizAnswer> },
    /// Session over; the member is disqualified at question `at`.
    Failed { at: usize, reason: FailReason },
}

impl QuizStep {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuizStep::Next { .. })
    }
}

/// Questions for a committee session: all of side A's statements, then all of side B's.
pub fn build_quiz(battle: &Battle) -> Result<Vec<CommitteeQuiz>, Rejection> {
    let option_b = battle
        .option_b
        .as_ref()
        .ok_or(Rejection::NoQuizzes(battle.id))?;
    if battle.option_a.statements.is_empty() || option_b.statements.is_empty() {
        return Err(Rejection::NoQuizzes(battle.id));
    }
    let tagged = |position: &Position, player: Choice| {
        position
            .statements
            .iter()
            .map(move |s| CommitteeQuiz {
                question: s.text.clone(),
                player,
            })
            .collect::<Vec<_>>()
    };
    let mut quizzes = tagged(&battle.option_a, Choice::A);
    quizzes.extend(tagged(option_b, Choice::B));
    Ok(quizzes)
}

/// One committee attempt. Answers are checked against a snapshot of both
/// sides' statements taken when the session starts.
#[derive(Clone, Debug)]
pub struct QuizSession {
    id: SessionId,
    battle: BattleId,
    side_a: Position,
    side_b: Position,
    quizzes: Vec<CommitteeQuiz>,
    current: usize,
    answers: Vec<QuizAnswer>,
    window: Duration,
    timer: QuizTimer,
}

impl QuizSession {
    pub fn start(
        id: SessionId,
        battle: &Battle,
        window: Duration,
        now: Instant,
    ) -> Result<Self, Rejection> {
        let quizzes = build_quiz(battle)?;
        let side_b = battle
            .option_b
            .clone()
            .ok_or(Rejection::NoQuizzes(battle.id))?;
        Ok(Self {
            id,
            battle: battle.id,
            side_a: battle.option_a.clone(),
            side_b,
            quizzes,
            current: 0,
            answers: Vec::new(),
            window,
            timer: QuizTimer::start(now, window),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn battle(&self) -> BattleId {
        self.battle
    }

    pub fn quizzes(&self) -> &[CommitteeQuiz] {
        &self.quizzes
    }

    pub fn answers(&self) -> &[QuizAnswer] {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&CommitteeQuiz> {
        self.quizzes.get(self.current)
    }

    pub fn deadline(&self) -> Instant {
        self.timer.deadline()
    }

    pub fn remaining(&self, now: Instant) -> f32 {
        self.timer.remaining(now)
    }

    pub fn token(&self) -> TimerToken {
        TimerToken {
            session: self.id,
            question: self.current,
        }
    }

    fn expected_answer(&self, quiz: &CommitteeQuiz) -> Option<bool> {
        match quiz.player {
            Choice::A => self.side_a.answer_for(&quiz.question),
            Choice::B => self.side_b.answer_for(&quiz.question),
        }
    }

    /// Records the member's answer to the current question.
    pub fn answer(&mut self, answer: bool, now: Instant) -> QuizStep {
        let index = self.current;
        if self.timer.is_expired(now) {
            return QuizStep::Failed {
                at: index,
                reason: FailReason::TimedOut,
            };
        }
        let Some(quiz) = self.quizzes.get(index) else {
            return QuizStep::Failed {
                at: index,
                reason: FailReason::Incorrect,
            };
        };
        if self.expected_answer(quiz) != Some(answer) {
            return QuizStep::Failed {
                at: index,
                reason: FailReason::Incorrect,
            };
        }

        self.answers.push(QuizAnswer {
            answer,
            quiz_index: index,
        });
        if index + 1 < self.quizzes.len() {
            self.current = index + 1;
            self.timer = QuizTimer::start(now, self.window);
            QuizStep::Next {
                index: self.current,
            }
        } else {
            QuizStep::Passed {
                answers: self.answers.clone(),
            }
        }
    }

    /// Fails the session if `token` names the running deadline and it has passed.
    pub fn expire(&self, token: TimerToken, now: Instant) -> Option<QuizStep> {
        if token != self.token() || !self.timer.is_expired(now) {
            return None;
        }
        Some(QuizStep::Failed {
            at: self.current,
            reason: FailReason::TimedOut,
        })
    }
}
