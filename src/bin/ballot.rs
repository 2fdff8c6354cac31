//! Terminal client for the election service.
//!
//! ```text
//! ballot candidates
//! ballot status
//! ballot vote <candidate_id> [--yes]
//! ballot results
//! ballot watch
//! ballot score [add <points>]
//! ```

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nepali_ballot::client::{
    BallotSession, BallotView, ClientConfig, ElectionApi, ElectionClient, Notice, NoticeLevel,
    PollPhase, PollerHandle, ResultsView,
};
use nepali_ballot::identity::{self, FileStore};
use nepali_ballot::types::ResultsSummary;

/// Terminal client for the election service
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the candidates on the ballot
    Candidates,
    /// Show whether this profile has voted
    Status,
    /// Cast this profile's single vote
    Vote {
        candidate_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the current results
    Results,
    /// Follow the results live until Ctrl+C
    Watch,
    /// Show or raise the locally stored game score
    Score {
        #[command(subcommand)]
        add: Option<ScoreAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ScoreAction {
    /// Add points to the stored score
    Add { points: u64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nepali_ballot=warn,ballot=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env();
    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let api: Arc<dyn ElectionApi> = Arc::new(ElectionClient::from_config(config)?);

    match command {
        Command::Candidates => {
            for c in api.candidates().await? {
                println!("{:<10} {:<28} {} ({})", c.id, c.name, c.party, c.party_symbol);
                if !c.slogan.is_empty() {
                    println!("{:<10} \"{}\"", "", c.slogan);
                }
            }
        }
        Command::Status => {
            let store = FileStore::open(&config.store_path)?;
            let mut session = BallotSession::start(api, &store);
            session.load().await?;
            match session.view() {
                BallotView::AlreadyVoted {
                    candidate_id: Some(id),
                } => {
                    let name = session.candidate(id).map(|c| c.name.as_str()).unwrap_or(id);
                    println!("You have voted for {}.", name);
                }
                BallotView::AlreadyVoted { candidate_id: None } => {
                    println!("You have already voted.");
                }
                BallotView::Unsupported { warning } => println!("{}", warning),
                _ => println!("You have not voted yet."),
            }
        }
        Command::Vote { candidate_id, yes } => {
            let store = FileStore::open(&config.store_path)?;
            let mut session = BallotSession::start(api, &store);
            session.load().await?;

            match session.view() {
                BallotView::Unsupported { warning } => return Err(warning.clone().into()),
                BallotView::AlreadyVoted { .. } => {
                    println!("You have already voted in this election.");
                    return Ok(());
                }
                _ => {}
            }

            session.select(&candidate_id)?;
            if !session.request_confirmation() {
                return Err("could not open the confirmation step".into());
            }

            let name = session
                .candidate(&candidate_id)
                .map(|c| format!("{} ({})", c.name, c.party))
                .unwrap_or_else(|| candidate_id.clone());
            if !yes && !confirm_prompt(&format!("Cast your vote for {}? [y/N] ", name)).await? {
                session.cancel_confirmation();
                println!("Vote not cast.");
                return Ok(());
            }

            let result = session.confirm().await;
            if let Some(notice) = session.take_notice() {
                print_notice(&notice);
            }
            result?;
        }
        Command::Results => {
            print_results(&api.results().await?);
        }
        Command::Watch => watch(api, config).await?,
        Command::Score { add } => {
            let store = FileStore::open(&config.store_path)?;
            let score = match add {
                Some(ScoreAction::Add { points }) => identity::add_game_score(&store, points)?,
                None => identity::game_score(&store)?,
            };
            println!("Score: {}", score);
        }
    }

    Ok(())
}

async fn confirm_prompt(question: &str) -> std::io::Result<bool> {
    eprint!("{}", question);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Print every change of the live view until Ctrl+C
async fn watch(api: Arc<dyn ElectionApi>, config: &ClientConfig) -> std::io::Result<()> {
    let poller = PollerHandle::start(api, config.poll_interval);
    let mut rx = poller.subscribe();

    println!(
        "Watching results every {}s (Ctrl+C to stop)",
        config.poll_interval.as_secs()
    );

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                print_view(&view);
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}

fn print_view(view: &ResultsView) {
    if let Some(notice) = &view.notice {
        print_notice(notice);
    }
    match (view.phase, &view.results) {
        (PollPhase::Loading, _) => println!("Loading results..."),
        (PollPhase::Refreshing, _) => {}
        (_, Some(results)) => {
            if let Some(at) = view.last_updated {
                println!("-- updated {} --", at.format("%H:%M:%S"));
            }
            print_results(results);
        }
        (_, None) => {}
    }
}

fn print_results(summary: &ResultsSummary) {
    const BAR_WIDTH: f64 = 30.0;

    println!("Total votes: {}", summary.total_votes);
    for tally in &summary.results {
        let filled = ((tally.percentage / 100.0) * BAR_WIDTH).round() as usize;
        println!(
            "{:<28} {:>6} {:>5.1}% {}",
            tally.candidate_name,
            tally.vote_count,
            tally.percentage,
            "#".repeat(filled)
        );
    }
    if let Some(leader) = summary.leader() {
        println!("Leading: {} ({})", leader.candidate_name, leader.party);
    }
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    eprintln!("[{}] {}", tag, notice.message);
}
