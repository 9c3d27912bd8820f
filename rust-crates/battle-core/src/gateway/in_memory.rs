use crate::{
    amount::Wei,
    battle::{
        Address,
        Choice,
        TxHash,
    },
    gateway::{
        AcceptReceipt,
        BattleMeta,
        BattleStatus,
        Connection,
        ContractGateway,
        DeployReceipt,
        DeployRequest,
        StatusSubscription,
        WalletGateway,
    },
};
use anyhow::{
    Result,
    anyhow,
    bail,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::watch;

fn lock<T>(state: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    state
        .lock()
        .map_err(|_| anyhow!("in-memory state lock poisoned"))
}

fn digest(domain: &str, nonce: u64, salt: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update(salt.as_bytes());
    hasher.finalize().into()
}

fn derive_address(domain: &str, nonce: u64, salt: &str) -> Address {
    let hash = digest(domain, nonce, salt);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

#[derive(Default)]
struct WalletState {
    accounts: Vec<Address>,
    balances: HashMap<Address, Wei>,
    chain_id: u64,
    connected: bool,
    failure: Option<String>,
}

/// Wallet that exposes a fixed list of accounts; the first one is selected.
#[derive(Clone, Default)]
pub struct InMemoryWallet {
    state: Arc<Mutex<WalletState>>,
}

impl InMemoryWallet {
    pub fn new(chain_id: u64) -> Self {
        let wallet = Self::default();
        if let Ok(mut state) = wallet.state.lock() {
            state.chain_id = chain_id;
        }
        wallet
    }

    pub fn with_account(self, account: Address, balance: Wei) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.balances.insert(account.clone(), balance);
            state.accounts.push(account);
        }
        self
    }

    /// Moves `account` to the front of the list, as a wallet account switch does.
    pub fn select_account(&self, account: &Address) -> Result<()> {
        let mut state = lock(&self.state)?;
        let index = state
            .accounts
            .iter()
            .position(|a| a == account)
            .ok_or_else(|| anyhow!("unknown account {account}"))?;
        let selected = state.accounts.remove(index);
        state.accounts.insert(0, selected);
        Ok(())
    }

    pub fn accounts(&self) -> Result<Vec<Address>> {
        Ok(lock(&self.state)?.accounts.clone())
    }

    pub fn set_chain_id(&self, chain_id: u64) -> Result<()> {
        lock(&self.state)?.chain_id = chain_id;
        Ok(())
    }

    pub fn fail_next(&self, reason: impl Into<String>) -> Result<()> {
        lock(&self.state)?.failure = Some(reason.into());
        Ok(())
    }
}

impl WalletGateway for InMemoryWallet {
    async fn connect(&self) -> Result<Connection> {
        let mut state = lock(&self.state)?;
        if let Some(reason) = state.failure.take() {
            bail!(reason);
        }
        let account = state
            .accounts
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Wallet connection cancelled or no accounts found."))?;
        state.connected = true;
        Ok(Connection {
            account,
            chain_id: state.chain_id,
        })
    }

    async fn disconnect(&self) -> Result<()> {
        lock(&self.state)?.connected = false;
        Ok(())
    }

    async fn account(&self) -> Result<Option<Address>> {
        let state = lock(&self.state)?;
        if !state.connected {
            return Ok(None);
        }
        Ok(state.accounts.first().cloned())
    }

    async fn balance(&self, account: &Address) -> Result<Wei> {
        let state = lock(&self.state)?;
        Ok(state.balances.get(account).copied().unwrap_or_default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideBet {
    pub contract: Address,
    pub chain_battle_id: u64,
    pub bettor: Address,
    pub side: Choice,
    pub amount: Wei,
}

#[derive(Default)]
struct ChainState {
    factory: Option<Address>,
    battles: Vec<BattleMeta>,
    side_bets: Vec<SideBet>,
    statuses: HashMap<Address, watch::Sender<BattleStatus>>,
    nonce: u64,
    failure: Option<String>,
}

impl ChainState {
    fn factory_address(&self) -> Address {
        self.factory
            .clone()
            .unwrap_or_else(|| derive_address("factory", 0, ""))
    }

    fn next_nonce(&mut self) -> u64 {
        self.nonce += 1;
        self.nonce
    }

    fn check_failure(&mut self) -> Result<()> {
        match self.failure.take() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }

    fn publish(&mut self, contract: &Address, status: BattleStatus) {
        match self.statuses.get(contract) {
            Some(sender) => {
                sender.send_replace(status);
            }
            None => {
                let (sender, _) = watch::channel(status);
                self.statuses.insert(contract.clone(), sender);
            }
        }
    }
}

/// Local model of the battle factory and the contracts it deploys.
#[derive(Clone, Default)]
pub struct InMemoryContracts {
    state: Arc<Mutex<ChainState>>,
}

impl InMemoryContracts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory deployed at `factory`, e.g. the address from a deployment record.
    pub fn at(factory: Address) -> Self {
        let contracts = Self::default();
        if let Ok(mut state) = contracts.state.lock() {
            state.factory = Some(factory);
        }
        contracts
    }

    pub fn factory(&self) -> Result<Address> {
        Ok(lock(&self.state)?.factory_address())
    }

    /// Makes the next contract call fail with `reason`.
    pub fn fail_next(&self, reason: impl Into<String>) -> Result<()> {
        lock(&self.state)?.failure = Some(reason.into());
        Ok(())
    }

    pub fn set_status(&self, contract: &Address, status: BattleStatus) -> Result<()> {
        lock(&self.state)?.publish(contract, status);
        Ok(())
    }

    pub fn side_bets(&self) -> Result<Vec<SideBet>> {
        Ok(lock(&self.state)?.side_bets.clone())
    }

    pub fn battle_count(&self) -> Result<usize> {
        Ok(lock(&self.state)?.battles.len())
    }
}

impl ContractGateway for InMemoryContracts {
    async fn deploy_battle(&self, request: DeployRequest) -> Result<DeployReceipt> {
        let mut state = lock(&self.state)?;
        state.check_failure()?;
        if request.bet_amount.is_zero() {
            bail!("bet amount must be greater than zero");
        }
        let nonce = state.next_nonce();
        let battle_id = state.battles.len() as u64 + 1;
        let factory = state.factory_address();
        let contract_address =
            derive_address("battle", nonce, &format!("{factory}{}", request.title));
        let tx_hash = TxHash::from_bytes(digest("tx", nonce, &request.title));

        state.battles.push(BattleMeta {
            battle_id,
            battle_contract: contract_address.clone(),
            player1: request.player1,
            player1_bet: request.side_a_label,
            player2: None,
            player2_bet: None,
            bet_amount: request.bet_amount,
            minimum_committee: request.minimum_committee,
            duration_days: request.duration_days,
            title: request.title,
            is_accepted: false,
            side_betting_contract: None,
        });
        state.publish(
            &contract_address,
            BattleStatus {
                minimum_committee: request.minimum_committee,
                ..BattleStatus::default()
            },
        );

        Ok(DeployReceipt {
            factory,
            chain_battle_id: battle_id,
            contract_address,
            tx_hash,
        })
    }

    async fn accept_battle(
        &self,
        chain_battle_id: u64,
        player2: &Address,
        side_b_label: &str,
    ) -> Result<AcceptReceipt> {
        let mut state = lock(&self.state)?;
        state.check_failure()?;
        let nonce = state.next_nonce();
        let meta = state
            .battles
            .iter_mut()
            .find(|m| m.battle_id == chain_battle_id)
            .ok_or_else(|| anyhow!("battle {chain_battle_id} does not exist"))?;
        if meta.is_accepted {
            bail!("battle {chain_battle_id} was already accepted");
        }
        if &meta.player1 == player2 {
            bail!("battle creator cannot accept their own battle");
        }

        let side_betting = derive_address("side-betting", nonce, meta.battle_contract.as_str());
        meta.player2 = Some(player2.clone());
        meta.player2_bet = Some(side_b_label.to_string());
        meta.is_accepted = true;
        meta.side_betting_contract = Some(side_betting.clone());
        let escrow = meta.battle_contract.clone();
        let status = BattleStatus {
            is_active: true,
            side_betting_open: true,
            committee_recruitment_open: true,
            minimum_committee: meta.minimum_committee,
            ..BattleStatus::default()
        };
        state.publish(&escrow, status.clone());
        state.publish(&side_betting, status);

        Ok(AcceptReceipt {
            contract_address: side_betting,
            tx_hash: TxHash::from_bytes(digest("tx", nonce, side_b_label)),
        })
    }

    async fn place_side_bet(
        &self,
        contract: &Address,
        chain_battle_id: u64,
        bettor: &Address,
        side: Choice,
        amount: Wei,
    ) -> Result<TxHash> {
        let mut state = lock(&self.state)?;
        state.check_failure()?;
        let known = state.battles.iter().any(|m| {
            m.battle_id == chain_battle_id
                && m.side_betting_contract.as_ref() == Some(contract)
        });
        if !known {
            bail!("{contract} is not the side-betting contract of battle {chain_battle_id}");
        }
        let open = state
            .statuses
            .get(contract)
            .is_some_and(|s| s.borrow().side_betting_open);
        if !open {
            bail!("side betting is closed for battle {chain_battle_id}");
        }
        if amount.is_zero() {
            bail!("bet amount must be greater than zero");
        }

        let nonce = state.next_nonce();
        state.side_bets.push(SideBet {
            contract: contract.clone(),
            chain_battle_id,
            bettor: bettor.clone(),
            side,
            amount,
        });
        Ok(TxHash::from_bytes(digest("tx", nonce, bettor.as_str())))
    }

    async fn all_battles(&self) -> Result<Vec<BattleMeta>> {
        let mut state = lock(&self.state)?;
        state.check_failure()?;
        Ok(state.battles.clone())
    }

    async fn battle_status(&self, contract: &Address) -> Result<BattleStatus> {
        let mut state = lock(&self.state)?;
        state.check_failure()?;
        state
            .statuses
            .get(contract)
            .map(|sender| sender.borrow().clone())
            .ok_or_else(|| anyhow!("no contract deployed at {contract}"))
    }

    async fn subscribe_status(&self, contract: &Address) -> Result<StatusSubscription> {
        let mut state = lock(&self.state)?;
        state.check_failure()?;
        state
            .statuses
            .get(contract)
            .map(|sender| StatusSubscription::new(sender.subscribe()))
            .ok_or_else(|| anyhow!("no contract deployed at {contract}"))
    }
}
