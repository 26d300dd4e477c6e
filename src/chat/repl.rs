//! Interactive terminal chat surface: status banner, transcript rendering,
//! one free-text input per turn, `/reset` and `/quit` commands.

use anyhow::Result;
use console::style;
use dialoguer::Input;

use super::session::{RESET_GREETING, Role, Session};
use super::ChatEngine;

/// Run the chat loop until the user quits. One turn runs to completion
/// before the next prompt is shown.
#[inline]
pub async fn run(engine: &ChatEngine, session: &mut Session) -> Result<()> {
    print_banner(engine).await;
    for turn in session.turns() {
        print_turn(turn.role, &turn.content);
    }
    eprintln!(
        "{}",
        style("Type your query, /reset to clear the conversation, /quit to exit.").dim()
    );
    eprintln!();

    loop {
        let input: String = Input::new()
            .with_prompt(style("You").cyan().bold().to_string())
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                print_turn(Role::Assistant, RESET_GREETING);
                continue;
            }
            _ => {}
        }

        eprintln!("{}", style("Processing query...").dim());

        match engine.ask(session, input).await {
            Ok(reply) => print_turn(Role::Assistant, &reply),
            Err(e) => {
                // Surfaced as a transcript entry; the turn is not retried
                // and the conversation stays usable
                eprintln!("{} {}", style("⚠ An error occurred:").red().bold(), e);
                eprintln!();
            }
        }
    }

    eprintln!("{}", style("Goodbye!").dim());
    Ok(())
}

async fn print_banner(engine: &ChatEngine) {
    eprintln!();
    eprintln!("{}", style("🇵🇰 NADRA SOP Assistant").bold().green());
    eprintln!(
        "{}",
        style("Official AI Assistant for SOPs, Fees & Procedures").dim()
    );
    eprintln!();
    eprintln!("  {} Service Online", style("🟢").green());
    eprintln!("  🧠 Model: {}", style(engine.active_model()).cyan());
    eprintln!(
        "  📂 Knowledge Base: {}",
        style(engine.knowledge_base()).cyan()
    );
    if let Ok(count) = engine.collection_count().await {
        eprintln!("  📄 Indexed Chunks: {}", style(count).cyan());
    }
    eprintln!();
}

fn print_turn(role: Role, content: &str) {
    match role {
        Role::User => {
            eprintln!("{} {}", style("You:").cyan().bold(), content);
        }
        Role::Assistant => {
            eprintln!("{} {}", style("Assistant:").green().bold(), content);
        }
    }
    eprintln!();
}
