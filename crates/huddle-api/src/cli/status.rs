//! System status command.

use anyhow::Result;
use console::style;

use huddle_core::repository::chat::ChatRepository;
use huddle_core::repository::user::UserRepository;

use crate::state::AppState;

/// Display user, chat and message counts plus where data lives.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let users = state.users.count().await?;
    let chats = state.chats.count_chats().await?;
    let messages = state.chats.count_messages().await?;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "media_dir": state.media_dir.display().to_string(),
            "users": users,
            "chats": chats,
            "messages": messages,
            "listen": format!("{}:{}", state.config.host, state.config.port),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Huddle v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Data ──").dim());
    println!("  Users:    {}", style(users).bold());
    println!("  Chats:    {}", style(chats).bold());
    println!("  Messages: {}", style(format_count(messages)).bold());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Media:    {}", style(state.media_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!(
        "  Listen:   {}",
        style(format!("{}:{}", state.config.host, state.config.port)).dim()
    );
    println!();

    Ok(())
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
