//! Seams to the wallet and the on-chain contracts.
//!
//! The controller only talks to these traits; the concrete browser wallet and
//! RPC bindings live outside this crate. [`in_memory`] provides a local model of
//! the battle factory used by tests and the scenario runner.

use crate::{
    amount::Wei,
    battle::{
        Address,
        BattlePhase,
        Choice,
        TxHash,
    },
};
use anyhow::Result;
use tokio::sync::watch;

pub mod in_memory;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub account: Address,
    pub chain_id: u64,
}

pub trait WalletGateway {
    fn connect(&self) -> impl Future<Output = Result<Connection>>;

    fn disconnect(&self) -> impl Future<Output = Result<()>>;

    /// Currently selected account, if the wallet has granted access.
    fn account(&self) -> impl Future<Output = Result<Option<Address>>>;

    fn balance(&self, account: &Address) -> impl Future<Output = Result<Wei>>;
}

/// Arguments of the factory's `createBattle` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployRequest {
    pub player1: Address,
    pub minimum_committee: u32,
    pub bet_amount: Wei,
    pub side_a_label: String,
    pub duration_days: u8,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployReceipt {
    /// Factory that created the battle.
    pub factory: Address,
    pub chain_battle_id: u64,
    pub contract_address: Address,
    pub tx_hash: TxHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptReceipt {
    pub contract_address: Address,
    pub tx_hash: TxHash,
}

/// Battle metadata as reported by the factory contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleMeta {
    pub battle_id: u64,
    pub battle_contract: Address,
    pub player1: Address,
    pub player1_bet: String,
    pub player2: Option<Address>,
    pub player2_bet: Option<String>,
    pub bet_amount: Wei,
    pub minimum_committee: u32,
    pub duration_days: u8,
    pub title: String,
    pub is_accepted: bool,
    pub side_betting_contract: Option<Address>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BattleStatus {
    pub is_active: bool,
    pub side_betting_open: bool,
    pub committee_recruitment_open: bool,
    pub committee_count: u32,
    pub minimum_committee: u32,
    pub voting_phase: bool,
    pub game_ended: bool,
    pub winner: Option<Address>,
}

impl BattleStatus {
    pub fn phase(&self) -> BattlePhase {
        if self.game_ended {
            BattlePhase::Resolved
        } else if self.voting_phase {
            BattlePhase::Voting
        } else if self.committee_recruitment_open {
            BattlePhase::CommitteeRecruiting
        } else {
            BattlePhase::Active
        }
    }
}

/// Live view of a contract's status. Dropping it unsubscribes.
#[derive(Debug)]
pub struct StatusSubscription {
    receiver: watch::Receiver<BattleStatus>,
}

impl StatusSubscription {
    pub fn new(receiver: watch::Receiver<BattleStatus>) -> Self {
        Self { receiver }
    }

    pub fn current(&self) -> BattleStatus {
        self.receiver.borrow().clone()
    }

    /// Waits for the next status change; `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<BattleStatus> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

pub trait ContractGateway {
    fn deploy_battle(
        &self,
        request: DeployRequest,
    ) -> impl Future<Output = Result<DeployReceipt>>;

    fn accept_battle(
        &self,
        chain_battle_id: u64,
        player2: &Address,
        side_b_label: &str,
    ) -> impl Future<Output = Result<AcceptReceipt>>;

    fn place_side_bet(
        &self,
        contract: &Address,
        chain_battle_id: u64,
        bettor: &Address,
        side: Choice,
        amount: Wei,
    ) -> impl Future<Output = Result<TxHash>>;

    fn all_battles(&self) -> impl Future<Output = Result<Vec<BattleMeta>>>;

    fn battle_status(&self, contract: &Address) -> impl Future<Output = Result<BattleStatus>>;

    fn subscribe_status(
        &self,
        contract: &Address,
    ) -> impl Future<Output = Result<StatusSubscription>>;
}
