//! Transaction commands - add, list, show, edit and delete your own records

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use tally_core::{Transaction, TransactionDraft, TransactionInput};
use uuid::Uuid;

use super::{get_context, log_command, require_identity};
use crate::output;

/// Fields of a transaction as given on the command line
#[derive(Args)]
pub struct TransactionArgs {
    /// income or expense
    #[arg(long)]
    pub kind: Option<String>,
    /// Free-form category label
    #[arg(long)]
    pub category: Option<String>,
    /// Non-negative amount (e.g. 12.50)
    #[arg(long)]
    pub amount: Option<String>,
    /// Optional description
    #[arg(long)]
    pub description: Option<String>,
    /// Date as YYYY-MM-DD or RFC 3339 (defaults to now on add, unchanged on edit)
    #[arg(long)]
    pub date: Option<String>,
}

impl TransactionArgs {
    /// Prompt for any required field that wasn't given, then validate
    fn into_draft(self) -> Result<TransactionDraft> {
        let kind = match self.kind {
            Some(k) => k,
            None => Input::new().with_prompt("Kind (income/expense)").interact_text()?,
        };
        let category = match self.category {
            Some(c) => c,
            None => Input::new().with_prompt("Category").interact_text()?,
        };
        let amount = match self.amount {
            Some(a) => a,
            None => Input::new().with_prompt("Amount").interact_text()?,
        };

        let input = TransactionInput {
            kind,
            category,
            amount,
            description: self.description,
            date: self.date,
        };
        Ok(input.parse()?)
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("Invalid transaction ID: {}", id))
}

pub(crate) fn format_kind(tx_kind: tally_core::TransactionKind) -> String {
    match tx_kind {
        tally_core::TransactionKind::Income => "income".green().to_string(),
        tally_core::TransactionKind::Expense => "expense".red().to_string(),
    }
}

fn print_transaction(tx: &Transaction) {
    println!("  ID: {}", tx.id);
    println!("  Kind: {}", format_kind(tx.kind));
    println!("  Category: {}", tx.category);
    println!("  Amount: {}", tx.amount);
    if let Some(description) = &tx.description {
        println!("  Description: {}", description);
    }
    println!("  Date: {}", tx.date.format("%Y-%m-%d %H:%M"));
}

pub async fn add(fields: TransactionArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let owner = require_identity(&ctx).await?;
    let draft = fields.into_draft()?;

    let tx = ctx.ledger_service.add(&owner, draft).await?;
    log_command(&ctx, "add", Some(&owner));

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        output::success("Transaction added");
        print_transaction(&tx);
    }
    Ok(())
}

pub async fn list(limit: Option<usize>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let owner = require_identity(&ctx).await?;
    let transactions = ctx.ledger_service.list(&owner, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions yet. Use 'tally add' to record one.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Kind", "Category", "Amount", "Description", "ID"]);
    for tx in &transactions {
        table.add_row(vec![
            tx.date.format("%Y-%m-%d").to_string(),
            format_kind(tx.kind),
            tx.category.clone(),
            tx.amount.to_string(),
            tx.description.clone().unwrap_or_default(),
            tx.id.to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub async fn show(id: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let owner = require_identity(&ctx).await?;
    let tx = ctx.ledger_service.get(&owner, parse_id(id)?).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        print_transaction(&tx);
    }
    Ok(())
}

pub async fn edit(id: &str, fields: TransactionArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let owner = require_identity(&ctx).await?;
    let id = parse_id(id)?;
    let draft = fields.into_draft()?;

    let tx = ctx.ledger_service.update(&owner, id, &draft).await?;
    log_command(&ctx, "edit", Some(&owner));

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        output::success("Transaction updated");
        print_transaction(&tx);
    }
    Ok(())
}

pub async fn delete(id: &str, force: bool) -> Result<()> {
    let ctx = get_context()?;
    let owner = require_identity(&ctx).await?;
    let id = parse_id(id)?;

    if !force {
        let tx = ctx.ledger_service.get(&owner, id).await?;
        println!();
        print_transaction(&tx);
        println!();
        if !Confirm::new()
            .with_prompt("Delete this transaction?")
            .default(false)
            .interact()?
        {
            println!("{}", "Cancelled".dimmed());
            return Ok(());
        }
    }

    ctx.ledger_service.delete(&owner, id).await?;
    log_command(&ctx, "delete", Some(&owner));
    output::success("Transaction deleted");
    Ok(())
}
