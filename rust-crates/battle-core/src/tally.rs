use crate::{
    battle::{
        Address,
        BattleId,
        BattlePhase,
        CastVote,
        Choice,
    },
    error::Rejection,
    quiz::{
        CommitteeQuiz,
        QuizAnswer,
    },
};
use std::cmp::Ordering;

/// Per-side score from a member's quiz answers. Informational only;
/// qualification depends on correctness alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuizScore {
    pub a: i32,
    pub b: i32,
}

pub fn score(quizzes: &[CommitteeQuiz], answers: &[QuizAnswer]) -> QuizScore {
    answers
        .iter()
        .filter_map(|answer| {
            let quiz = quizzes.get(answer.quiz_index)?;
            let delta = if answer.answer { 1 } else { -1 };
            Some((quiz.player, delta))
        })
        .fold(QuizScore::default(), |mut score, (player, delta)| {
            match player {
                Choice::A => score.a += delta,
                Choice::B => score.b += delta,
            }
            score
        })
}

/// Committee votes per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteCount {
    pub a: u32,
    pub b: u32,
}

impl VoteCount {
    pub fn total(&self) -> u32 {
        self.a + self.b
    }

    /// Side with more votes; `None` on a tie.
    pub fn leader(&self) -> Option<Choice> {
        match self.a.cmp(&self.b) {
            Ordering::Greater => Some(Choice::A),
            Ordering::Less => Some(Choice::B),
            Ordering::Equal => None,
        }
    }
}

pub fn count(votes: &[CastVote]) -> VoteCount {
    votes
        .iter()
        .fold(VoteCount::default(), |mut count, vote| {
            match vote.choice {
                Choice::A => count.a += 1,
                Choice::B => count.b += 1,
            }
            count
        })
}

/// Final single-choice vote offered to a qualified committee member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VotePrompt {
    battle: BattleId,
    voter: Option<Address>,
    selected: Option<Choice>,
}

impl VotePrompt {
    pub fn new(battle: BattleId, voter: Option<Address>) -> Self {
        Self {
            battle,
            voter,
            selected: None,
        }
    }

    pub fn battle(&self) -> BattleId {
        self.battle
    }

    /// Account that qualified for this prompt.
    pub fn voter(&self) -> Option<&Address> {
        self.voter.as_ref()
    }

    pub fn selected(&self) -> Option<Choice> {
        self.selected
    }

    pub fn select(&mut self, choice: Choice) {
        self.selected = Some(choice);
    }

    /// The choice to record, or `NoVoteSelected` if nothing was picked yet.
    pub fn decision(&self) -> Result<Choice, Rejection> {
        self.selected.ok_or(Rejection::NoVoteSelected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteReceipt {
    pub battle: BattleId,
    pub choice: Choice,
    pub label: String,
    pub count: VoteCount,
    /// `Resolved` once the committee is complete, `Voting` before.
    pub phase: BattlePhase,
}
