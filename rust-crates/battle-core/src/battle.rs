use crate::{
    amount::Wei,
    error::Rejection,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleId(pub u64);

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::A => f.write_str("A"),
            Choice::B => f.write_str("B"),
        }
    }
}

fn parse_hex_prefixed(raw: &str, bytes: usize) -> Option<String> {
    let digits = raw.trim().strip_prefix("0x")?;
    if digits.len() != bytes * 2 {
        return None;
    }
    hex::decode(digits).ok()?;
    Some(format!("0x{}", digits.to_ascii_lowercase()))
}

/// 20-byte account or contract address, stored lowercased with its `0x` prefix.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Rejection;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_hex_prefixed(raw, 20)
            .map(Address)
            .ok_or_else(|| Rejection::InvalidAddress(raw.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = Rejection;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxHash(String);

impl TxHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        TxHash(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = Rejection;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_hex_prefixed(raw, 32)
            .map(TxHash)
            .ok_or_else(|| Rejection::InvalidAddress(raw.to_string()))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A true/false quiz statement together with its authoritative answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub text: String,
    pub answer: bool,
}

impl Statement {
    pub fn new(text: impl Into<String>, answer: bool) -> Self {
        Self {
            text: text.into(),
            answer,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One side of a battle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub label: String,
    pub photo: Option<String>,
    pub statements: Vec<Statement>,
}

impl Position {
    pub fn new(label: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            label: label.into(),
            photo: None,
            statements,
        }
    }

    /// Authoritative answer for `question`, taken from the first statement with that text.
    pub fn answer_for(&self, question: &str) -> Option<bool> {
        self.statements
            .iter()
            .find(|s| s.text == question)
            .map(|s| s.answer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BattlePhase {
    Waiting,
    Active,
    CommitteeRecruiting,
    Voting,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    Escrow,
    SideBetting,
}

/// A committee member's final vote. `voter` is `None` for a local user
/// without a connected wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastVote {
    pub voter: Option<Address>,
    pub choice: Choice,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Battle {
    pub id: BattleId,
    pub title: String,
    pub option_a: Position,
    pub option_b: Option<Position>,
    pub bet_amount: Wei,
    pub participants: u32,
    pub quiz_count: usize,
    pub creator: Option<Address>,
    pub challenger: Option<Address>,
    pub my_choice: Option<Choice>,
    pub phase: BattlePhase,
    pub escrow: Option<Address>,
    pub side_betting: Option<Address>,
    pub chain_battle_id: Option<u64>,
    /// Votes needed before the battle resolves.
    pub minimum_committee: u32,
    pub votes: Vec<CastVote>,
    /// The vote cast from this client, if any.
    pub vote: Option<Choice>,
    pub created_at: DateTime<Utc>,
}

impl Battle {
    pub fn is_waiting(&self) -> bool {
        self.option_b.is_none()
    }

    pub fn position(&self, side: Choice) -> Option<&Position> {
        match side {
            Choice::A => Some(&self.option_a),
            Choice::B => self.option_b.as_ref(),
        }
    }

    /// Display label for a side, falling back to "Player A"/"Player B".
    pub fn label(&self, side: Choice) -> String {
        self.position(side)
            .map(|p| p.label.trim())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Player {side}"))
    }

    /// Contract currently managing the battle: the side-betting contract once
    /// accepted, the escrow contract before.
    pub fn contract(&self) -> Option<(&Address, ContractKind)> {
        match (&self.side_betting, &self.escrow) {
            (Some(address), _) => Some((address, ContractKind::SideBetting)),
            (None, Some(address)) => Some((address, ContractKind::Escrow)),
            (None, None) => None,
        }
    }

    pub fn involves(&self, account: &Address) -> bool {
        self.creator.as_ref() == Some(account) || self.challenger.as_ref() == Some(account)
    }

    pub fn has_voted(&self, voter: Option<&Address>) -> bool {
        self.votes.iter().any(|v| v.voter.as_ref() == voter)
    }

    pub fn committee_complete(&self) -> bool {
        self.votes.len() >= self.minimum_committee as usize
    }
}
