pub mod amount;
pub mod battle;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod quiz;
pub mod runner;
pub mod store;
pub mod tally;

pub use amount::Wei;
pub use battle::{
    Address,
    Battle,
    BattleId,
    BattlePhase,
    Choice,
    Position,
    Statement,
    TxHash,
};
pub use config::BattleConfig;
pub use error::Rejection;
pub use lifecycle::BattleController;

pub type Result<T, E = Rejection> = std::result::Result<T, E>;
