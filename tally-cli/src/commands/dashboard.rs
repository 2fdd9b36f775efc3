//! Dashboard and public feed commands

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table, ContentArrangement};

use super::transaction::format_kind;
use super::{get_context, log_command, require_identity};
use crate::output;

pub async fn dashboard(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let owner = require_identity(&ctx).await?;
    let dashboard = ctx.dashboard_service.dashboard(&owner).await?;
    log_command(&ctx, "dashboard", Some(&owner));

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    let summary = &dashboard.summary;
    println!("{}", format!("Dashboard for {}", owner.display_name).bold());
    println!();

    // Vertical key-value summary
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Income", &summary.total_income.to_string()]);
    table.add_row(vec!["Expenses", &summary.total_expenses.to_string()]);
    let balance = if summary.balance.is_sign_negative() {
        summary.balance.to_string().red().to_string()
    } else {
        summary.balance.to_string().green().to_string()
    };
    table.add_row(vec!["Balance".to_string(), balance]);
    table.add_row(vec!["Transactions", &dashboard.transaction_count.to_string()]);
    println!("{}", table);
    println!();

    if summary.category_breakdown.is_empty() {
        println!("{}", "No expenses to break down yet.".dimmed());
    } else {
        println!("{}", "Spending by Category".bold());
        let mut table = output::create_table();
        table.set_header(vec!["Category", "Amount"]);
        for entry in summary.category_breakdown.iter() {
            table.add_row(vec![
                Cell::new(&entry.category),
                Cell::new(entry.amount.to_string()).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{}", table);
    }

    if !dashboard.recent.is_empty() {
        println!();
        println!("{}", "Recent Transactions".bold());
        for tx in &dashboard.recent {
            println!(
                "  {}  {:<8} {:<16} {}",
                tx.date.format("%Y-%m-%d").to_string().dimmed(),
                format_kind(tx.kind),
                tx.category,
                tx.amount
            );
        }
    }

    Ok(())
}

pub async fn public_feed(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let feed = ctx.dashboard_service.public_feed().await?;
    log_command(&ctx, "public", None);

    if json {
        println!("{}", serde_json::to_string_pretty(&feed)?);
        return Ok(());
    }

    if feed.is_empty() {
        println!("Nobody has recorded a transaction yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Who", "Kind", "Category", "Amount", "Description"]);
    for tx in &feed {
        table.add_row(vec![
            tx.date.format("%Y-%m-%d").to_string(),
            tx.owner_name.clone().unwrap_or_else(|| "(unknown)".to_string()),
            format_kind(tx.kind),
            tx.category.clone(),
            tx.amount.to_string(),
            tx.description.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
