//! Single authoritative battle collection.
//!
//! The hot, waiting and "mine" listings are projections computed on demand.
//! Creation and acceptance go through a pending ticket first and only touch
//! the confirmed collection once the contract call has resolved.

use crate::{
    amount::Wei,
    battle::{
        Address,
        Battle,
        BattleId,
        BattlePhase,
        Choice,
        Position,
    },
    error::Rejection,
    gateway::BattleMeta,
};
use chrono::{
    DateTime,
    Utc,
};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleDraft {
    pub title: String,
    pub option_a: Position,
    pub bet_amount: Wei,
    pub quiz_count: usize,
    pub minimum_committee: u32,
    pub creator: Option<Address>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingOp {
    Create(BattleDraft),
    Accept {
        battle: BattleId,
        position: Position,
        account: Option<Address>,
    },
}

/// On-chain identity assigned when a creation is confirmed. `None` fields
/// mean the battle was kept local.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deployment {
    pub chain_battle_id: Option<u64>,
    pub escrow: Option<Address>,
}

#[derive(Debug, Default)]
pub struct BattleStore {
    battles: BTreeMap<BattleId, Battle>,
    pending: BTreeMap<Ticket, PendingOp>,
    next_ticket: u64,
}

impl BattleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: BattleId) -> Option<&Battle> {
        self.battles.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BattleId) -> Option<&mut Battle> {
        self.battles.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.battles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }

    fn newest_first(&self, keep: impl Fn(&Battle) -> bool) -> Vec<&Battle> {
        self.battles.values().rev().filter(|b| keep(b)).collect()
    }

    /// Accepted battles, newest first.
    pub fn hot(&self) -> Vec<&Battle> {
        self.newest_first(|b| !b.is_waiting())
    }

    /// Battles open for a challenger, newest first.
    pub fn waiting(&self) -> Vec<&Battle> {
        self.newest_first(Battle::is_waiting)
    }

    /// Battles the local user took a side in or that involve `account`.
    pub fn mine(&self, account: Option<&Address>) -> Vec<&Battle> {
        self.newest_first(|b| b.my_choice.is_some() || account.is_some_and(|a| b.involves(a)))
    }

    pub fn pending(&self) -> impl Iterator<Item = (Ticket, &PendingOp)> {
        self.pending.iter().map(|(ticket, op)| (*ticket, op))
    }

    fn next_id(&self) -> BattleId {
        let max = self.battles.keys().next_back().map_or(0, |id| id.0);
        BattleId(max + 1)
    }

    fn issue(&mut self, op: PendingOp) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending.insert(ticket, op);
        ticket
    }

    pub fn stage_create(&mut self, draft: BattleDraft) -> Ticket {
        self.issue(PendingOp::Create(draft))
    }

    pub fn stage_accept(
        &mut self,
        battle: BattleId,
        position: Position,
        account: Option<Address>,
    ) -> Result<Ticket, Rejection> {
        let existing = self.get(battle).ok_or(Rejection::UnknownBattle(battle))?;
        if !existing.is_waiting() {
            return Err(Rejection::NotWaiting(battle));
        }
        let in_flight = self.pending.values().any(|op| {
            matches!(op, PendingOp::Accept { battle: b, .. } if *b == battle)
        });
        if in_flight {
            return Err(Rejection::AcceptancePending(battle));
        }
        Ok(self.issue(PendingOp::Accept {
            battle,
            position,
            account,
        }))
    }

    /// Moves a staged creation into the waiting collection.
    pub fn confirm_create(
        &mut self,
        ticket: Ticket,
        deployment: Deployment,
        created_at: DateTime<Utc>,
    ) -> Option<BattleId> {
        let PendingOp::Create(draft) = self.take_if(ticket, |op| {
            matches!(op, PendingOp::Create(_))
        })?
        else {
            return None;
        };
        let id = self.next_id();
        self.battles.insert(
            id,
            Battle {
                id,
                title: draft.title,
                option_a: draft.option_a,
                option_b: None,
                bet_amount: draft.bet_amount,
                participants: 1,
                quiz_count: draft.quiz_count,
                creator: draft.creator,
                challenger: None,
                my_choice: Some(Choice::A),
                phase: BattlePhase::Waiting,
                escrow: deployment.escrow,
                side_betting: None,
                chain_battle_id: deployment.chain_battle_id,
                minimum_committee: draft.minimum_committee,
                votes: Vec::new(),
                vote: None,
                created_at,
            },
        );
        Some(id)
    }

    /// Applies a staged acceptance: the battle leaves the waiting view for good.
    pub fn confirm_accept(
        &mut self,
        ticket: Ticket,
        side_betting: Option<Address>,
    ) -> Option<BattleId> {
        let PendingOp::Accept {
            battle,
            position,
            account,
        } = self.take_if(ticket, |op| matches!(op, PendingOp::Accept { .. }))?
        else {
            return None;
        };
        let record = self.battles.get_mut(&battle)?;
        record.option_b = Some(position);
        record.challenger = account;
        record.participants = 2;
        record.my_choice = Some(Choice::B);
        record.phase = BattlePhase::Active;
        if side_betting.is_some() {
            record.side_betting = side_betting;
        }
        Some(battle)
    }

    pub fn abandon(&mut self, ticket: Ticket) -> Option<PendingOp> {
        self.pending.remove(&ticket)
    }

    fn take_if(
        &mut self,
        ticket: Ticket,
        matches: impl Fn(&PendingOp) -> bool,
    ) -> Option<PendingOp> {
        if !self.pending.get(&ticket).is_some_and(matches) {
            return None;
        }
        self.pending.remove(&ticket)
    }

    /// Upserts a battle reported by the factory contract. Locally known
    /// statements are kept; acceptance seen on chain is applied.
    pub fn merge_chain_meta(&mut self, meta: &BattleMeta, account: Option<&Address>) -> BattleId {
        let known = self
            .battles
            .values()
            .find(|b| b.chain_battle_id == Some(meta.battle_id))
            .map(|b| b.id);

        let id = match known {
            Some(id) => id,
            None => {
                let id = self.next_id();
                let my_choice = match account {
                    Some(a) if *a == meta.player1 => Some(Choice::A),
                    Some(a) if meta.player2.as_ref() == Some(a) => Some(Choice::B),
                    _ => None,
                };
                self.battles.insert(
                    id,
                    Battle {
                        id,
                        title: meta.title.clone(),
                        option_a: Position::new(meta.player1_bet.clone(), Vec::new()),
                        option_b: None,
                        bet_amount: meta.bet_amount,
                        participants: 1,
                        quiz_count: 0,
                        creator: Some(meta.player1.clone()),
                        challenger: None,
                        my_choice,
                        phase: BattlePhase::Waiting,
                        escrow: Some(meta.battle_contract.clone()),
                        side_betting: None,
                        chain_battle_id: Some(meta.battle_id),
                        minimum_committee: meta.minimum_committee,
                        votes: Vec::new(),
                        vote: None,
                        created_at: Utc::now(),
                    },
                );
                id
            }
        };

        if let Some(record) = self.battles.get_mut(&id) {
            if record.escrow.is_none() {
                record.escrow = Some(meta.battle_contract.clone());
            }
            if meta.is_accepted && record.is_waiting() {
                let label = meta
                    .player2_bet
                    .as_deref()
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map_or_else(|| format!("Player {}", Choice::B), str::to_string);
                record.option_b = Some(Position::new(label, Vec::new()));
                record.challenger = meta.player2.clone();
                record.participants = 2;
                record.phase = BattlePhase::Active;
            }
            if record.side_betting.is_none() {
                record.side_betting = meta.side_betting_contract.clone();
            }
        }
        id
    }
}
