//! Scripted sessions replayed against the in-memory battle factory.

use battle_core::{
    Address,
    Battle,
    BattleConfig,
    BattleController,
    BattleId,
    Choice,
    Rejection,
    Statement,
    Wei,
    gateway::in_memory::{
        InMemoryContracts,
        InMemoryWallet,
    },
    lifecycle::{
        AcceptForm,
        CreateBattleForm,
    },
    quiz::{
        FailReason,
        QuizStep,
    },
    runner::{
        CommitteeOutcome,
        run_committee,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::Deserialize;
use std::{
    fs,
    path::Path,
    time::Duration,
};
use tokio::sync::mpsc;

type Controller = BattleController<InMemoryWallet, InMemoryContracts>;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct AccountSeed {
    pub address: Address,
    /// Ether amount, e.g. "10" or "0.5"
    #[serde(default)]
    pub balance: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct TimedAnswer {
    pub answer: bool,
    /// Time taken to answer, measured from the previous answer.
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Connect,
    Disconnect,
    SwitchAccount {
        account: Address,
    },
    Create {
        title: String,
        option_a: String,
        bet_amount: String,
        #[serde(default)]
        quiz_count: Option<usize>,
        statements: Vec<Statement>,
        #[serde(default)]
        photo: Option<String>,
    },
    Accept {
        battle: BattleId,
        option_b: String,
        #[serde(default)]
        statements: Vec<Statement>,
        #[serde(default)]
        photo: Option<String>,
    },
    Committee {
        battle: BattleId,
        answers: Vec<TimedAnswer>,
    },
    Vote {
        #[serde(default)]
        choice: Option<Choice>,
    },
    SideBet {
        battle: BattleId,
        choice: Choice,
        amount: String,
    },
    Refresh,
    Status {
        battle: BattleId,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Connect => "connect",
            Step::Disconnect => "disconnect",
            Step::SwitchAccount { .. } => "switch account",
            Step::Create { .. } => "create",
            Step::Accept { .. } => "accept",
            Step::Committee { .. } => "committee",
            Step::Vote { .. } => "vote",
            Step::SideBet { .. } => "side bet",
            Step::Refresh => "refresh",
            Step::Status { .. } => "status",
        }
    }
}

impl Scenario {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .wrap_err_with(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_slice(&data)
            .wrap_err_with(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Replays every step and returns one report line per step plus a summary.
    /// Rejected steps are reported and the replay carries on.
    pub async fn play(self, config: BattleConfig) -> Result<Vec<String>> {
        let mut wallet = InMemoryWallet::new(config.network.chain_id);
        for seed in self.accounts {
            let balance = match seed.balance.as_deref() {
                Some(raw) => Wei::parse_ether(raw)
                    .wrap_err_with(|| format!("bad balance for {}", seed.address))?,
                None => Wei::ZERO,
            };
            wallet = wallet.with_account(seed.address, balance);
        }
        let contracts = match config.network.factory_address.clone() {
            Some(factory) => InMemoryContracts::at(factory),
            None => InMemoryContracts::new(),
        };
        let mut controller = BattleController::new(config, wallet.clone(), contracts);

        let mut report = Vec::with_capacity(self.steps.len() + 2);
        for (index, step) in self.steps.into_iter().enumerate() {
            let name = step.name();
            let outcome = play_step(&mut controller, &wallet, step)
                .await
                .unwrap_or_else(|rejection| format!("rejected: {rejection}"));
            report.push(format!("{:>2}. {name}: {outcome}", index + 1));
        }
        report.push(summary("hot", &controller.hot()));
        report.push(summary("waiting", &controller.waiting()));
        Ok(report)
    }
}

fn summary(view: &str, battles: &[&Battle]) -> String {
    let entries: Vec<String> = battles
        .iter()
        .map(|b| format!("{} {} [{:?}]", b.id, b.title, b.phase))
        .collect();
    format!("{view}: {}", entries.join(", "))
}

async fn play_step(
    controller: &mut Controller,
    wallet: &InMemoryWallet,
    step: Step,
) -> Result<String, Rejection> {
    match step {
        Step::Connect => {
            let session = controller.connect_wallet().await?;
            let balance = controller.balance().await?;
            let mut line = format!(
                "{} on chain {} holding {}",
                session.account,
                session.chain_id,
                controller.config().network.format_amount(balance)
            );
            if let Some(warning) = controller.network_warning() {
                line.push_str(&format!(" ({warning})"));
            }
            Ok(line)
        }
        Step::Disconnect => {
            controller.disconnect_wallet().await?;
            Ok("wallet disconnected".to_string())
        }
        Step::SwitchAccount { account } => {
            wallet
                .select_account(&account)
                .map_err(Rejection::collaborator)?;
            match controller.sync_account().await? {
                Some(_) => Ok(format!("now acting as {account}")),
                None => Ok(format!("{account} selected, wallet not connected")),
            }
        }
        Step::Create {
            title,
            option_a,
            bet_amount,
            quiz_count,
            statements,
            photo,
        } => {
            let form = CreateBattleForm {
                title,
                option_a,
                bet_amount,
                quiz_count: quiz_count.unwrap_or(statements.len()),
                statements,
                photo,
            };
            let id = controller.create_battle(form).await?;
            let factory = controller
                .contracts()
                .factory()
                .map_err(Rejection::collaborator)?;
            let contract = controller
                .store()
                .get(id)
                .and_then(|b| b.escrow.as_ref())
                .map_or_else(
                    || "local only".to_string(),
                    |c| format!("escrow {c} via factory {factory}"),
                );
            Ok(format!("battle {id} waiting for a challenger, {contract}"))
        }
        Step::Accept {
            battle,
            option_b,
            statements,
            photo,
        } => {
            let form = AcceptForm {
                option_b,
                statements,
                photo,
            };
            let id = controller.accept_battle(battle, form).await?;
            let label = controller
                .store()
                .get(id)
                .map(|b| format!("{} vs {}", b.label(Choice::A), b.label(Choice::B)))
                .unwrap_or_default();
            Ok(format!("battle {id} is active: {label}"))
        }
        Step::Committee { battle, answers } => {
            let (sender, mut receiver) = mpsc::channel(answers.len().max(1));
            tokio::spawn(async move {
                for timed in answers {
                    tokio::time::sleep(Duration::from_millis(timed.delay_ms)).await;
                    if sender.send(timed.answer).await.is_err() {
                        return;
                    }
                }
                // Stay silent until the quiz ends so an unanswered question times out.
                sender.closed().await;
            });
            let outcome = run_committee(controller, battle, &mut receiver).await?;
            Ok(describe_committee(&outcome))
        }
        Step::Vote { choice } => {
            if let Some(choice) = choice {
                controller.select_vote(choice)?;
            }
            let receipt = controller.submit_vote()?;
            let minimum = controller
                .store()
                .get(receipt.battle)
                .map_or(0, |b| b.minimum_committee);
            Ok(format!(
                "recorded {} ({}) for battle {}, {} of {minimum} votes, {:?}",
                receipt.choice,
                receipt.label,
                receipt.battle,
                receipt.count.total(),
                receipt.phase
            ))
        }
        Step::SideBet {
            battle,
            choice,
            amount,
        } => {
            let tx = controller.place_side_bet(battle, choice, &amount).await?;
            let network = &controller.config().network;
            let staked = Wei::parse_ether(&amount).map_or(amount.clone(), |w| network.format_amount(w));
            let link = network.tx_url(&tx).unwrap_or_else(|| tx.to_string());
            Ok(format!("{staked} on {choice} for battle {battle}, {link}"))
        }
        Step::Refresh => {
            let count = controller.refresh_from_chain().await?;
            Ok(format!("{count} battles on chain"))
        }
        Step::Status { battle } => {
            let phase = controller.refresh_status(battle).await?;
            Ok(format!("battle {battle} is {phase:?}"))
        }
    }
}

fn describe_committee(outcome: &CommitteeOutcome) -> String {
    match outcome {
        CommitteeOutcome::Qualified => "qualified, vote prompt open".to_string(),
        CommitteeOutcome::Disqualified(QuizStep::Failed { at, reason }) => {
            let reason = match reason {
                FailReason::Incorrect => "wrong answer",
                FailReason::TimedOut => "timed out",
            };
            format!("disqualified at question {} ({reason})", at + 1)
        }
        CommitteeOutcome::Disqualified(step) => format!("disqualified ({step:?})"),
        CommitteeOutcome::Abandoned => "abandoned".to_string(),
    }
}
