//! Drives a committee quiz from an answer channel against the question deadlines.

use crate::{
    Result,
    battle::BattleId,
    lifecycle::BattleController,
    quiz::QuizStep,
};
use tokio::{
    sync::mpsc,
    time::{
        Instant,
        sleep_until,
    },
};
use tracing::{
    debug,
    info,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitteeOutcome {
    /// Every question answered correctly; the vote prompt is open.
    Qualified,
    Disqualified(QuizStep),
    /// The answer channel closed before the quiz finished.
    Abandoned,
}

/// Runs the committee quiz for `battle` until it passes, fails or the
/// answer sender is dropped.
pub async fn run_committee<W, C>(
    controller: &mut BattleController<W, C>,
    battle: BattleId,
    answers: &mut mpsc::Receiver<bool>,
) -> Result<CommitteeOutcome> {
    let first = controller.join_committee(battle, Instant::now())?;
    debug!(question = %first.question, player = %first.player, "question shown");

    loop {
        let (Some(deadline), Some(token)) =
            (controller.committee_deadline(), controller.committee_token())
        else {
            return Ok(CommitteeOutcome::Abandoned);
        };

        let step = tokio::select! {
            answer = answers.recv() => match answer {
                Some(answer) => controller.answer_question(answer, Instant::now())?,
                None => {
                    controller.abandon_committee();
                    info!(%battle, "answer channel closed");
                    return Ok(CommitteeOutcome::Abandoned);
                }
            },
            _ = sleep_until(deadline) => match controller.expire(token, Instant::now()) {
                Some(step) => step,
                None => continue,
            },
        };

        match step {
            QuizStep::Next { index } => {
                if let Some(quiz) = controller.current_question() {
                    debug!(index, question = %quiz.question, player = %quiz.player, "question shown");
                }
            }
            QuizStep::Passed { .. } => return Ok(CommitteeOutcome::Qualified),
            failed @ QuizStep::Failed { .. } => {
                return Ok(CommitteeOutcome::Disqualified(failed));
            }
        }
    }
}
