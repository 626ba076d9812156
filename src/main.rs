use base64::{Engine as _, engine::general_purpose::STANDARD};
use chiatien::config::CONFIG;
use chiatien::core::amount::format_amount;
use chiatien::core::models::group::{GroupUpdate, NewGroup};
use chiatien::core::services::ExpenseDraft;
use chiatien::{AuthSession, ChiaTienError, ExpenseService, FileTokenStore, HttpBackend, SplitMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chiatien", about = "Split shared expenses with your groups")]
struct Cli {
    /// Override the API base URL (e.g. http://localhost:3000).
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        username: String,
        /// Read from CHIATIEN_PASSWORD when not given.
        #[arg(long, env = "CHIATIEN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, env = "CHIATIEN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// List groups with your balance in each.
    Groups,
    /// Create a group with you as its first member.
    CreateGroup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a group or change its emoji or description.
    UpdateGroup {
        group_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a group you created.
    DeleteGroup { group_id: String },
    /// List expenses, optionally for one group.
    Expenses {
        #[arg(long)]
        group: Option<String>,
    },
    /// Record an expense typed in by hand.
    Split {
        #[arg(long)]
        group: String,
        /// Total as typed, `.` separators allowed (e.g. 1.250.000).
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: String,
        /// Member who paid; defaults to you.
        #[arg(long)]
        payer: Option<String>,
        /// Member id to leave out of the split. Repeatable.
        #[arg(long = "exclude")]
        excluded: Vec<String>,
        /// Manual share as USER_ID=AMOUNT. Switches to manual mode. Repeatable.
        #[arg(long = "share", value_parser = parse_share)]
        shares: Vec<(String, String)>,
    },
    /// Record an expense from a photographed receipt.
    Receipt {
        #[arg(long)]
        group: String,
        #[arg(long)]
        image: PathBuf,
        /// Zero-based index of a line item to leave out. Repeatable.
        #[arg(long = "skip-item")]
        skipped: Vec<usize>,
        #[arg(long)]
        payer: Option<String>,
        #[arg(long = "exclude")]
        excluded: Vec<String>,
    },
    /// Mark an expense (or one participant's share) as settled.
    Settle {
        expense_id: String,
        #[arg(long)]
        participant: Option<String>,
    },
}

fn parse_share(raw: &str) -> Result<(String, String), String> {
    let (user_id, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected USER_ID=AMOUNT, got `{}`", raw))?;
    if user_id.trim().is_empty() {
        return Err("share is missing a user id".to_string());
    }
    Ok((user_id.trim().to_string(), amount.trim().to_string()))
}

fn print_draft(draft: &ExpenseDraft) {
    let allocator = draft.allocator();
    println!("Total: {} ({} split)", format_amount(allocator.total()), allocator.mode());
    for participant in allocator.participants().iter().filter(|p| p.selected) {
        let payer_mark = if allocator.payer_id() == Some(participant.user_id.as_str()) {
            " (paid)"
        } else {
            ""
        };
        println!(
            "  {:<24} {:>14}{}",
            participant.display_name,
            format_amount(participant.owed_amount),
            payer_mark
        );
    }
    let slack = allocator.rounding_slack();
    if slack != 0 {
        println!("  unallocated: {}", slack);
    }
}

fn apply_participants(
    draft: &mut ExpenseDraft,
    payer: Option<&str>,
    excluded: &[String],
    shares: &[(String, String)],
) -> Result<(), ChiaTienError> {
    if let Some(payer) = payer {
        draft.allocator_mut().set_payer(payer)?;
    }
    for user_id in excluded {
        draft.allocator_mut().toggle_participant(user_id)?;
    }
    if !shares.is_empty() {
        draft.allocator_mut().set_mode(SplitMode::Manual);
        for (user_id, amount) in shares {
            draft.set_participant_amount_text(user_id, amount)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&CONFIG.log_level))
        .init();

    let cli = Cli::parse();
    let base_url = cli.api_url.clone().unwrap_or_else(|| CONFIG.api_base_url.clone());
    info!(%base_url, "Using API");

    let backend = HttpBackend::new(CONFIG.request_timeout)?;
    let mut session = AuthSession::new(
        backend.clone(),
        FileTokenStore::new(&CONFIG.credentials_path),
        base_url,
    );
    session.restore().await;
    let service = ExpenseService::new(backend.clone(), backend.clone(), backend);

    match cli.command {
        Command::Login { username, password } => {
            let user = session.login(&username, &password).await?;
            println!("Signed in as {} ({})", user.display_name, user.id);
        }
        Command::Register {
            username,
            password,
            display_name,
        } => {
            let user = session.register(&username, &password, display_name.as_deref()).await?;
            println!("Registered {} ({})", user.display_name, user.id);
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        Command::Groups => {
            let ctx = session.context();
            for group in service.list_groups(&ctx).await? {
                println!(
                    "{} {} [{}] members: {} expenses: {} balance: {}",
                    group.emoji,
                    group.name,
                    group.id,
                    group.member_count,
                    group.expense_count,
                    group.balance
                );
            }
        }
        Command::CreateGroup {
            name,
            emoji,
            description,
        } => {
            let ctx = session.context();
            let group = service
                .create_group(
                    &ctx,
                    &NewGroup {
                        name,
                        emoji,
                        description,
                    },
                )
                .await?;
            println!("Created {} {} [{}]", group.emoji, group.name, group.id);
        }
        Command::UpdateGroup {
            group_id,
            name,
            emoji,
            description,
        } => {
            let ctx = session.context();
            let update = GroupUpdate {
                name,
                emoji,
                description,
            };
            let group = service.update_group(&ctx, &group_id, &update).await?;
            println!("Updated {} {} [{}]", group.emoji, group.name, group.id);
        }
        Command::DeleteGroup { group_id } => {
            let ctx = session.context();
            let response = service.delete_group(&ctx, &group_id).await?;
            println!("{}", response.message);
        }
        Command::Expenses { group } => {
            let ctx = session.context();
            for expense in service.list_expenses(&ctx, group.as_deref()).await? {
                println!(
                    "{} {} {} paid by {} [{}]",
                    expense.date.format("%Y-%m-%d"),
                    format_amount(expense.amount),
                    expense.description,
                    expense.paid_by.display_name,
                    expense.id
                );
            }
        }
        Command::Split {
            group,
            amount,
            description,
            payer,
            excluded,
            shares,
        } => {
            let ctx = session.context();
            let current = session.current_user().map(|u| u.id.clone());
            let mut draft = service.start_manual(&ctx, &group, current.as_deref()).await?;
            draft.set_amount_text(&amount)?;
            draft.set_description(description);
            apply_participants(&mut draft, payer.as_deref(), &excluded, &shares)?;
            print_draft(&draft);
            let expense = service.submit(&ctx, &draft).await?;
            println!("Created expense {}", expense.id);
        }
        Command::Receipt {
            group,
            image,
            skipped,
            payer,
            excluded,
        } => {
            let ctx = session.context();
            let current = session.current_user().map(|u| u.id.clone());
            let bytes = tokio::fs::read(&image).await?;
            let encoded = format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes));
            let mut draft = service
                .start_receipt(&ctx, &group, current.as_deref(), &encoded)
                .await?;
            for index in skipped {
                draft.toggle_item(index)?;
            }
            apply_participants(&mut draft, payer.as_deref(), &excluded, &[])?;
            if let Some(receipt) = draft.receipt() {
                for (i, line) in receipt.items().iter().enumerate() {
                    let mark = if line.selected { "x" } else { " " };
                    println!(
                        "[{}] {:>2} {} x{} {}",
                        mark,
                        i,
                        line.item.name,
                        line.item.quantity,
                        format_amount(line.line_total())
                    );
                }
            }
            print_draft(&draft);
            let expense = service.submit(&ctx, &draft).await?;
            println!("Created expense {}", expense.id);
        }
        Command::Settle {
            expense_id,
            participant,
        } => {
            let ctx = session.context();
            let response = service
                .settle_expense(&ctx, &expense_id, participant.as_deref())
                .await?;
            println!("{}", response.message);
        }
    }

    Ok(())
}
