use anyhow::{Context, Result};
use fairydust::flows::payment::OutcomeCallback;
use fairydust::{
    logging, AuthInput, AuthState, AuthStep, Fairydust, PaymentFlow, PaymentInput,
    PaymentOutcome, PaymentProps, PaymentState,
};
use fairydust_api::endpoints::Dust;
use fairydust_auth::{DustApi, FileStorage, Settings};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    let (log_path, _guard) = logging::init_logging()?;
    tracing::info!("Logging to {}", log_path.display());

    let settings = Settings::new().context("Failed to load settings")?;
    let storage = Arc::new(FileStorage::new()?);
    let fairydust = Fairydust::new(settings, storage)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("logout") => {
            fairydust.api().logout().await?;
            println!("Signed out.");
        }
        Some("balance") => match fairydust.auth_state().await {
            AuthState::Connected(user) => {
                println!("{}: {} dust", user.fairyname, user.dust_balance)
            }
            AuthState::Disconnected => println!("Not connected."),
        },
        _ => {
            let cost = match args.first() {
                Some(raw) => raw
                    .parse::<i64>()
                    .with_context(|| format!("Invalid cost {:?}", raw))?,
                None => 1,
            };
            anyhow::ensure!(cost > 0, "Cost must be positive");
            let label = args.get(1).cloned().unwrap_or_else(|| "Action".to_string());
            pay(&fairydust, Dust::new(cost), label).await?;
        }
    }

    Ok(())
}

async fn pay(fairydust: &Fairydust, cost: Dust, label: String) -> Result<()> {
    let on_outcome: OutcomeCallback = Arc::new(|outcome: &PaymentOutcome| match outcome {
        PaymentOutcome::Succeeded(transaction) => {
            println!("Charged {} dust (transaction {}).", transaction.amount, transaction.id)
        }
        PaymentOutcome::Failed(message) => eprintln!("Payment failed: {}", message),
        PaymentOutcome::TopUpRequested(url) => {
            println!("Top up at {}", url);
            if let Err(e) = open::that(url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }
    });

    let mut flow = fairydust.payment_flow(PaymentProps::new(cost, label), on_outcome);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    flow.handle(PaymentInput::Click).await;
    while let Some(next) = next_input(&flow, &mut input).await? {
        flow.handle(next).await;
    }

    if let Some(user) = flow.user() {
        println!("Balance: {} dust", user.dust_balance);
    }
    Ok(())
}

/// Prompt for whatever the flow is waiting on; `None` once it is settled.
async fn next_input(flow: &PaymentFlow, input: &mut Input) -> Result<Option<PaymentInput>> {
    let next = match flow.state() {
        PaymentState::NeedsAuth(auth) => {
            if let Some(error) = auth.error() {
                eprintln!("{}", error);
            }
            let auth_input = match auth.step() {
                AuthStep::Input => {
                    let identifier = prompt(input, "Email or phone (empty to cancel): ").await?;
                    if identifier.is_empty() {
                        AuthInput::Cancel
                    } else {
                        AuthInput::SubmitIdentifier(identifier)
                    }
                }
                AuthStep::CodeEntry => {
                    let label = format!(
                        "Code sent to your {} (empty to go back): ",
                        auth.identifier_type().display_name()
                    );
                    let code = prompt(input, &label).await?;
                    if code.is_empty() {
                        AuthInput::UseDifferentIdentifier
                    } else {
                        AuthInput::EnterCode(code)
                    }
                }
                AuthStep::Success(_) | AuthStep::Cancelled => return Ok(None),
            };
            PaymentInput::Auth(auth_input)
        }
        PaymentState::InsufficientBalance { deficit } => {
            let answer = prompt(
                input,
                &format!("You need {} more dust. Top up? [y/N] ", deficit),
            )
            .await?;
            if is_yes(&answer) {
                PaymentInput::TopUp
            } else {
                PaymentInput::Cancel
            }
        }
        PaymentState::Confirming => {
            let props = flow.props();
            let answer = prompt(
                input,
                &format!(
                    "Spend {} dust on {}? [y/N/a = always] ",
                    props.cost, props.label
                ),
            )
            .await?;
            match answer.to_lowercase().as_str() {
                "a" | "always" => PaymentInput::Confirm { skip_future: true },
                other if is_yes(other) => PaymentInput::Confirm { skip_future: false },
                _ => PaymentInput::Cancel,
            }
        }
        // Failures were already reported through the outcome callback.
        _ => return Ok(None),
    };
    Ok(Some(next))
}

async fn prompt(input: &mut Input, label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    let line = input.next_line().await?.unwrap_or_default();
    Ok(line.trim().to_string())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}
