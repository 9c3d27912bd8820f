//! Battle lifecycle: creation, acceptance, committee qualification and voting.
//!
//! [`BattleController`] is constructed with its collaborators and owns all
//! client-side state. Operations that are declined return a [`Rejection`]
//! and leave that state untouched.

use crate::{
    Result,
    amount::Wei,
    battle::{
        Address,
        Battle,
        BattleId,
        BattlePhase,
        CastVote,
        Choice,
        Position,
        Statement,
        TxHash,
    },
    config::{
        BattleConfig,
        QUIZ_COUNT_RANGE,
    },
    error::Rejection,
    gateway::{
        BattleStatus,
        ContractGateway,
        DeployRequest,
        StatusSubscription,
        WalletGateway,
    },
    quiz::{
        CommitteeQuiz,
        QuizSession,
        QuizStep,
        SessionId,
        TimerToken,
    },
    store::{
        BattleDraft,
        BattleStore,
        Deployment,
    },
    tally::{
        self,
        QuizScore,
        VotePrompt,
        VoteReceipt,
    },
};
use chrono::Utc;
use tokio::time::Instant;
use tracing::{
    debug,
    error,
    info,
    warn,
};

#[cfg(test)]
mod tests;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateBattleForm {
    pub title: String,
    pub option_a: String,
    pub bet_amount: String,
    pub quiz_count: usize,
    pub statements: Vec<Statement>,
    pub photo: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcceptForm {
    pub option_b: String,
    pub statements: Vec<Statement>,
    pub photo: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletSession {
    pub account: Address,
    pub chain_id: u64,
}

#[derive(Debug)]
struct CommitteeAttempt {
    session: QuizSession,
    prior_phase: BattlePhase,
    voter: Option<Address>,
}

fn log_rejection(rejection: &Rejection) {
    if !matches!(rejection, Rejection::Collaborator(_)) {
        warn!(%rejection, "operation rejected");
    }
}

fn collaborator_failure(action: &'static str) -> impl FnOnce(anyhow::Error) -> Rejection {
    move |err| {
        error!(action, ?err, "collaborator call failed");
        Rejection::collaborator(err)
    }
}

fn required(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Rejection::MissingField(field));
    }
    Ok(())
}

fn positive_amount(raw: &str) -> Result<Wei> {
    let amount = Wei::parse_ether(raw)?;
    if amount.is_zero() {
        return Err(Rejection::InvalidAmount(raw.to_string()));
    }
    Ok(amount)
}

fn filled_statements(statements: &[Statement], expected: usize) -> Result<()> {
    if statements.len() != expected {
        return Err(Rejection::QuizCountMismatch {
            expected,
            actual: statements.len(),
        });
    }
    match statements.iter().position(Statement::is_blank) {
        Some(index) => Err(Rejection::EmptyStatement(index)),
        None => Ok(()),
    }
}

pub struct BattleController<W, C> {
    config: BattleConfig,
    wallet: W,
    contracts: C,
    session: Option<WalletSession>,
    network_warning: Option<String>,
    store: BattleStore,
    committee: Option<CommitteeAttempt>,
    sessions_started: u64,
    vote: Option<VotePrompt>,
    last_score: Option<QuizScore>,
}

impl<W, C> BattleController<W, C> {
    pub fn new(config: BattleConfig, wallet: W, contracts: C) -> Self {
        Self {
            config,
            wallet,
            contracts,
            session: None,
            network_warning: None,
            store: BattleStore::new(),
            committee: None,
            sessions_started: 0,
            vote: None,
            last_score: None,
        }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn contracts(&self) -> &C {
        &self.contracts
    }

    pub fn store(&self) -> &BattleStore {
        &self.store
    }

    pub fn session(&self) -> Option<&WalletSession> {
        self.session.as_ref()
    }

    fn account(&self) -> Option<&Address> {
        self.session.as_ref().map(|s| &s.account)
    }

    /// Set when the wallet reports a chain other than the configured network.
    pub fn network_warning(&self) -> Option<&str> {
        self.network_warning.as_deref()
    }

    pub fn hot(&self) -> Vec<&Battle> {
        self.store.hot()
    }

    pub fn waiting(&self) -> Vec<&Battle> {
        self.store.waiting()
    }

    pub fn mine(&self) -> Vec<&Battle> {
        self.store.mine(self.account())
    }

    fn check_network(&mut self, chain_id: u64) {
        let expected = self.config.network.chain_id;
        self.network_warning = if chain_id == expected {
            None
        } else {
            let warning = format!(
                "Wallet is on chain {chain_id}, please switch to {} ({expected})",
                self.config.network.name
            );
            warn!(%warning);
            Some(warning)
        };
    }

    /// Wallet reported a new account list; an empty list means disconnected.
    pub fn on_accounts_changed(&mut self, accounts: &[Address]) {
        match accounts.first() {
            None => {
                info!("wallet disconnected");
                self.session = None;
            }
            Some(account) => {
                let chain_id = self
                    .session
                    .as_ref()
                    .map_or(self.config.network.chain_id, |s| s.chain_id);
                info!(%account, "wallet account changed");
                self.session = Some(WalletSession {
                    account: account.clone(),
                    chain_id,
                });
            }
        }
    }

    pub fn on_chain_changed(&mut self, chain_id: u64) {
        if let Some(session) = self.session.as_mut() {
            session.chain_id = chain_id;
        }
        self.check_network(chain_id);
    }

    pub fn is_committee_mode(&self) -> bool {
        self.committee.is_some()
    }

    pub fn current_question(&self) -> Option<&CommitteeQuiz> {
        self.committee.as_ref().and_then(|c| c.session.current())
    }

    pub fn committee_token(&self) -> Option<TimerToken> {
        self.committee.as_ref().map(|c| c.session.token())
    }

    pub fn committee_deadline(&self) -> Option<Instant> {
        self.committee.as_ref().map(|c| c.session.deadline())
    }

    /// Seconds left on the current question, as displayed.
    pub fn countdown(&self, now: Instant) -> Option<f32> {
        self.committee.as_ref().map(|c| c.session.remaining(now))
    }

    pub fn vote_prompt(&self) -> Option<&VotePrompt> {
        self.vote.as_ref()
    }

    /// Diagnostic score of the last qualifying quiz.
    pub fn last_score(&self) -> Option<QuizScore> {
        self.last_score
    }

    pub fn join_committee(&mut self, id: BattleId, now: Instant) -> Result<CommitteeQuiz> {
        self.start_committee(id, now).inspect_err(log_rejection)
    }

    fn start_committee(&mut self, id: BattleId, now: Instant) -> Result<CommitteeQuiz> {
        if self.committee.is_some() || self.vote.is_some() {
            return Err(Rejection::SessionInProgress);
        }
        let battle = self.store.get(id).ok_or(Rejection::UnknownBattle(id))?;
        if !matches!(
            battle.phase,
            BattlePhase::Active | BattlePhase::CommitteeRecruiting | BattlePhase::Voting
        ) {
            return Err(Rejection::NotActive(id));
        }
        let voter = self.account().cloned();
        if battle.has_voted(voter.as_ref()) {
            return Err(Rejection::AlreadyVoted(id));
        }
        self.sessions_started += 1;
        let session = QuizSession::start(
            SessionId(self.sessions_started),
            battle,
            self.config.quiz_window(),
            now,
        )
        .inspect_err(|_| error!(battle = %id, "battle has no quiz data for committee review"))?;
        let first = session.current().cloned().ok_or(Rejection::NoQuizzes(id))?;
        let prior_phase = battle.phase;

        if let Some(battle) = self.store.get_mut(id)
            && battle.phase < BattlePhase::CommitteeRecruiting
        {
            battle.phase = BattlePhase::CommitteeRecruiting;
        }
        info!(battle = %id, questions = session.quizzes().len(), "committee quiz started");
        self.committee = Some(CommitteeAttempt {
            session,
            prior_phase,
            voter,
        });
        Ok(first)
    }

    pub fn answer_question(&mut self, answer: bool, now: Instant) -> Result<QuizStep> {
        let Some(attempt) = self.committee.as_mut() else {
            log_rejection(&Rejection::NoSession);
            return Err(Rejection::NoSession);
        };
        let step = attempt.session.answer(answer, now);
        self.settle(&step);
        Ok(step)
    }

    /// Fails the running question if its deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Option<QuizStep> {
        let token = self.committee_token()?;
        self.expire(token, now)
    }

    /// Handles a deadline firing. Tokens from an earlier question or session are ignored.
    pub fn expire(&mut self, token: TimerToken, now: Instant) -> Option<QuizStep> {
        let step = self.committee.as_ref()?.session.expire(token, now)?;
        self.settle(&step);
        Some(step)
    }

    pub fn abandon_committee(&mut self) -> bool {
        let Some(attempt) = self.committee.take() else {
            return false;
        };
        info!(battle = %attempt.session.battle(), "committee quiz abandoned");
        self.restore_phase(&attempt);
        true
    }

    fn restore_phase(&mut self, attempt: &CommitteeAttempt) {
        if let Some(battle) = self.store.get_mut(attempt.session.battle())
            && battle.phase == BattlePhase::CommitteeRecruiting
        {
            battle.phase = attempt.prior_phase;
        }
    }

    fn settle(&mut self, step: &QuizStep) {
        if !step.is_terminal() {
            return;
        }
        let Some(attempt) = self.committee.take() else {
            return;
        };
        let id = attempt.session.battle();
        match step {
            QuizStep::Passed { answers } => {
                let score = tally::score(attempt.session.quizzes(), answers);
                debug!(battle = %id, a = score.a, b = score.b, "quiz score");
                self.last_score = Some(score);
                if let Some(battle) = self.store.get_mut(id)
                    && battle.phase < BattlePhase::Voting
                {
                    battle.phase = BattlePhase::Voting;
                }
                info!(battle = %id, "committee member qualified");
                self.vote = Some(VotePrompt::new(id, attempt.voter));
            }
            QuizStep::Failed { at, reason } => {
                info!(battle = %id, question = at, ?reason, "committee member disqualified");
                self.restore_phase(&attempt);
            }
            QuizStep::Next { .. } => {}
        }
    }

    pub fn select_vote(&mut self, choice: Choice) -> Result<()> {
        let Some(prompt) = self.vote.as_mut() else {
            log_rejection(&Rejection::NoVotePrompt);
            return Err(Rejection::NoVotePrompt);
        };
        prompt.select(choice);
        Ok(())
    }

    pub fn submit_vote(&mut self) -> Result<VoteReceipt> {
        self.record_vote().inspect_err(log_rejection)
    }

    /// Records the vote; the battle resolves once `minimum_committee` votes are in.
    fn record_vote(&mut self) -> Result<VoteReceipt> {
        let prompt = self.vote.as_ref().ok_or(Rejection::NoVotePrompt)?;
        let choice = prompt.decision()?;
        let id = prompt.battle();
        let voter = prompt.voter().cloned();
        let battle = self.store.get_mut(id).ok_or(Rejection::UnknownBattle(id))?;
        if battle.has_voted(voter.as_ref()) {
            return Err(Rejection::AlreadyVoted(id));
        }
        battle.votes.push(CastVote { voter, choice });
        battle.vote = Some(choice);
        let count = tally::count(&battle.votes);
        if battle.committee_complete() && battle.phase < BattlePhase::Resolved {
            battle.phase = BattlePhase::Resolved;
            info!(battle = %id, a = count.a, b = count.b, winner = ?count.leader(), "committee vote complete");
        }
        let receipt = VoteReceipt {
            battle: id,
            choice,
            label: battle.label(choice),
            count,
            phase: battle.phase,
        };
        self.vote = None;
        info!(battle = %id, %choice, label = %receipt.label, votes = count.total(), "vote recorded");
        Ok(receipt)
    }

    /// Moves the battle's phase forward to what the contract reports. Never moves it back.
    pub fn apply_status(&mut self, id: BattleId, status: &BattleStatus) -> Result<BattlePhase> {
        let battle = self.store.get_mut(id).ok_or(Rejection::UnknownBattle(id))?;
        let reported = status.phase();
        if !battle.is_waiting() && reported > battle.phase {
            info!(battle = %id, from = ?battle.phase, to = ?reported, "phase advanced from chain");
            battle.phase = reported;
        }
        Ok(battle.phase)
    }
}

impl<W: WalletGateway, C: ContractGateway> BattleController<W, C> {
    pub async fn connect_wallet(&mut self) -> Result<WalletSession> {
        let connection = self
            .wallet
            .connect()
            .await
            .map_err(collaborator_failure("connect wallet"))?;
        info!(account = %connection.account, chain_id = connection.chain_id, "wallet connected");
        let session = WalletSession {
            account: connection.account,
            chain_id: connection.chain_id,
        };
        self.session = Some(session.clone());
        self.check_network(session.chain_id);
        Ok(session)
    }

    pub async fn disconnect_wallet(&mut self) -> Result<()> {
        self.wallet
            .disconnect()
            .await
            .map_err(collaborator_failure("disconnect wallet"))?;
        info!("wallet disconnected");
        self.session = None;
        self.network_warning = None;
        Ok(())
    }

    /// Re-reads the wallet's selected account after an account switch.
    pub async fn sync_account(&mut self) -> Result<Option<Address>> {
        let account = self
            .wallet
            .account()
            .await
            .map_err(collaborator_failure("read wallet account"))?;
        self.on_accounts_changed(account.as_slice());
        Ok(account)
    }

    pub async fn balance(&self) -> Result<Wei> {
        let account = self
            .account()
            .ok_or(Rejection::WalletNotConnected)
            .inspect_err(log_rejection)?;
        self.wallet
            .balance(account)
            .await
            .map_err(collaborator_failure("read balance"))
    }

    pub async fn create_battle(&mut self, form: CreateBattleForm) -> Result<BattleId> {
        let draft = self.validate_create(form).inspect_err(log_rejection)?;
        let request = match (&draft.creator, self.config.deploy_contracts) {
            (Some(creator), true) => Some(DeployRequest {
                player1: creator.clone(),
                minimum_committee: self.config.minimum_committee,
                bet_amount: draft.bet_amount,
                side_a_label: draft.option_a.label.clone(),
                duration_days: self.config.duration_days,
                title: draft.title.clone(),
            }),
            _ => None,
        };
        let title = draft.title.clone();
        let ticket = self.store.stage_create(draft);

        let deployment = match request {
            None => Deployment::default(),
            Some(request) => match self.contracts.deploy_battle(request).await {
                Ok(receipt) => {
                    info!(
                        factory = %receipt.factory,
                        contract = %receipt.contract_address,
                        tx = %receipt.tx_hash,
                        "battle contract deployed"
                    );
                    Deployment {
                        chain_battle_id: Some(receipt.chain_battle_id),
                        escrow: Some(receipt.contract_address),
                    }
                }
                Err(err) => {
                    self.store.abandon(ticket);
                    return Err(collaborator_failure("deploy battle")(err));
                }
            },
        };

        let id = self
            .store
            .confirm_create(ticket, deployment, Utc::now())
            .ok_or(Rejection::Collaborator("pending battle vanished".to_string()))?;
        info!(battle = %id, %title, "battle created and waiting for a challenger");
        Ok(id)
    }

    fn validate_create(&self, form: CreateBattleForm) -> Result<BattleDraft> {
        required(&form.title, "title")?;
        required(&form.option_a, "option A")?;
        required(&form.bet_amount, "bet amount")?;
        let bet_amount = positive_amount(form.bet_amount.trim())?;
        if !QUIZ_COUNT_RANGE.contains(&form.quiz_count) {
            return Err(Rejection::QuizCountOutOfRange(form.quiz_count));
        }
        filled_statements(&form.statements, form.quiz_count)?;
        let creator = self.account().cloned();
        if self.config.deploy_contracts && creator.is_none() {
            return Err(Rejection::WalletNotConnected);
        }

        let mut option_a = Position::new(form.option_a.trim(), form.statements);
        option_a.photo = form.photo;
        Ok(BattleDraft {
            title: form.title.trim().to_string(),
            option_a,
            bet_amount,
            quiz_count: form.quiz_count,
            minimum_committee: self.config.minimum_committee,
            creator,
        })
    }

    pub async fn accept_battle(&mut self, id: BattleId, form: AcceptForm) -> Result<BattleId> {
        let (position, chain_battle_id) =
            self.validate_accept(id, form).inspect_err(log_rejection)?;
        let account = self.account().cloned();
        let label = position.label.clone();
        let ticket = self
            .store
            .stage_accept(id, position, account.clone())
            .inspect_err(log_rejection)?;

        let side_betting = match (chain_battle_id, account) {
            (Some(chain_battle_id), Some(account)) => {
                match self
                    .contracts
                    .accept_battle(chain_battle_id, &account, &label)
                    .await
                {
                    Ok(receipt) => {
                        info!(
                            contract = %receipt.contract_address,
                            tx = %receipt.tx_hash,
                            "side-betting contract deployed"
                        );
                        Some(receipt.contract_address)
                    }
                    Err(err) => {
                        self.store.abandon(ticket);
                        return Err(collaborator_failure("accept battle")(err));
                    }
                }
            }
            _ => None,
        };

        self.store
            .confirm_accept(ticket, side_betting)
            .ok_or(Rejection::UnknownBattle(id))?;
        info!(battle = %id, challenger = %label, "battle accepted");
        Ok(id)
    }

    fn validate_accept(&self, id: BattleId, form: AcceptForm) -> Result<(Position, Option<u64>)> {
        let battle = self.store.get(id).ok_or(Rejection::UnknownBattle(id))?;
        if !battle.is_waiting() {
            return Err(Rejection::NotWaiting(id));
        }
        required(&form.option_b, "option B")?;
        let statements = if self.config.skip_quiz_validation {
            form.statements
                .into_iter()
                .filter(|s| !s.is_blank())
                .collect()
        } else {
            filled_statements(&form.statements, battle.quiz_count)?;
            form.statements
        };
        let chain_battle_id = battle.chain_battle_id.filter(|_| self.config.deploy_contracts);
        if chain_battle_id.is_some() && self.session.is_none() {
            return Err(Rejection::WalletNotConnected);
        }

        let mut position = Position::new(form.option_b.trim(), statements);
        position.photo = form.photo;
        Ok((position, chain_battle_id))
    }

    pub async fn place_side_bet(&mut self, id: BattleId, side: Choice, amount: &str) -> Result<TxHash> {
        let (contract, chain_battle_id, bettor, amount) =
            self.validate_side_bet(id, amount).inspect_err(log_rejection)?;
        let tx = self
            .contracts
            .place_side_bet(&contract, chain_battle_id, &bettor, side, amount)
            .await
            .map_err(collaborator_failure("place side bet"))?;
        info!(battle = %id, %side, amount = %amount, %tx, "side bet placed");
        Ok(tx)
    }

    fn validate_side_bet(&self, id: BattleId, amount: &str) -> Result<(Address, u64, Address, Wei)> {
        let battle = self.store.get(id).ok_or(Rejection::UnknownBattle(id))?;
        if battle.is_waiting() || battle.phase == BattlePhase::Resolved {
            return Err(Rejection::NotActive(id));
        }
        let (Some(contract), Some(chain_battle_id)) = (&battle.side_betting, battle.chain_battle_id)
        else {
            return Err(Rejection::NotDeployed(id));
        };
        required(amount, "amount")?;
        let amount = positive_amount(amount.trim())?;
        let bettor = self.account().cloned().ok_or(Rejection::WalletNotConnected)?;
        Ok((contract.clone(), chain_battle_id, bettor, amount))
    }

    /// Merges every battle the factory knows about into the store.
    pub async fn refresh_from_chain(&mut self) -> Result<usize> {
        let metas = self
            .contracts
            .all_battles()
            .await
            .map_err(collaborator_failure("list battles"))?;
        let account = self.account().cloned();
        for meta in &metas {
            self.store.merge_chain_meta(meta, account.as_ref());
        }
        info!(count = metas.len(), "battles refreshed from chain");
        Ok(metas.len())
    }

    fn contract_of(&self, id: BattleId) -> Result<Address> {
        let battle = self.store.get(id).ok_or(Rejection::UnknownBattle(id))?;
        battle
            .contract()
            .map(|(address, _)| address.clone())
            .ok_or(Rejection::NotDeployed(id))
    }

    pub async fn refresh_status(&mut self, id: BattleId) -> Result<BattlePhase> {
        let contract = self.contract_of(id).inspect_err(log_rejection)?;
        let status = self
            .contracts
            .battle_status(&contract)
            .await
            .map_err(collaborator_failure("read battle status"))?;
        debug!(battle = %id, ?status, "battle status");
        self.apply_status(id, &status)
    }

    /// Subscribes to status changes; feed updates back through [`Self::apply_status`].
    pub async fn watch_status(&self, id: BattleId) -> Result<StatusSubscription> {
        let contract = self.contract_of(id).inspect_err(log_rejection)?;
        self.contracts
            .subscribe_status(&contract)
            .await
            .map_err(collaborator_failure("subscribe to battle status"))
    }
}
