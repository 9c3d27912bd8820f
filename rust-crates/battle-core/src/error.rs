use crate::battle::BattleId;
use thiserror::Error;

/// Reason an operation was declined. The `Display` text is what the user
/// is shown; nothing has been mutated when one of these is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("Please fill in all required fields ({0} is missing)")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid amount")]
    InvalidAmount(String),
    #[error("'{0}' is not a valid address")]
    InvalidAddress(String),
    #[error("A battle needs between 1 and 5 quizzes, got {0}")]
    QuizCountOutOfRange(usize),
    #[error("Please fill in all {expected} quizzes ({actual} provided)")]
    QuizCountMismatch { expected: usize, actual: usize },
    #[error("Quiz statement {} is empty", .0 + 1)]
    EmptyStatement(usize),
    #[error("Battle {0} does not exist")]
    UnknownBattle(BattleId),
    #[error("Battle {0} is not open for challenge")]
    NotWaiting(BattleId),
    #[error("Battle {0} is not active")]
    NotActive(BattleId),
    #[error("Battle {0} is already being accepted")]
    AcceptancePending(BattleId),
    #[error("Battle {0} has no contract on chain")]
    NotDeployed(BattleId),
    #[error("Battle {0} has no quizzes to answer")]
    NoQuizzes(BattleId),
    #[error("A committee quiz is already in progress")]
    SessionInProgress,
    #[error("No committee quiz is in progress")]
    NoSession,
    #[error("You have already voted on battle {0}")]
    AlreadyVoted(BattleId),
    #[error("There is nothing to vote on")]
    NoVotePrompt,
    #[error("Please select either option A or option B to vote.")]
    NoVoteSelected,
    #[error("Please connect your wallet")]
    WalletNotConnected,
    #[error("Transaction failed: {0}")]
    Collaborator(String),
}

impl Rejection {
    pub fn collaborator(err: anyhow::Error) -> Self {
        Rejection::Collaborator(format!("{err:#}"))
    }
}
