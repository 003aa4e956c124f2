use std::str::FromStr;

use bzk_domain::{
    BudgetTier, Decimal, PeriodId, PeriodSummary, PeriodView, Transaction, TransactionId,
    TransactionPatch,
};

use crate::{
    cli::{
        context::{CommandError, CommandResult, LoopControl, ShellContext},
        output,
    },
    utils::build_info::BuildMetadata,
};

pub(crate) type CommandHandler = fn(&mut ShellContext, &[&str]) -> CommandResult;

pub(crate) struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub summary: &'static str,
    pub handler: CommandHandler,
}

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        aliases: &[],
        usage: "start [limit] [label...]",
        summary: "Lock in a limit and start a new period",
        handler: cmd_start,
    },
    CommandSpec {
        name: "spend",
        aliases: &["add"],
        usage: "spend <amount> <description> [venue]",
        summary: "Record a purchase against the active period",
        handler: cmd_spend,
    },
    CommandSpec {
        name: "edit",
        aliases: &[],
        usage: "edit <txn-id> [--amount X] [--description Y]",
        summary: "Correct a transaction in the active period",
        handler: cmd_edit,
    },
    CommandSpec {
        name: "delete",
        aliases: &["rm"],
        usage: "delete <txn-id>",
        summary: "Remove a transaction from the active period",
        handler: cmd_delete,
    },
    CommandSpec {
        name: "close",
        aliases: &["end"],
        usage: "close",
        summary: "Close the active period and show the verdict",
        handler: cmd_close,
    },
    CommandSpec {
        name: "status",
        aliases: &["st"],
        usage: "status",
        summary: "Show the active period and its transactions",
        handler: cmd_status,
    },
    CommandSpec {
        name: "history",
        aliases: &[],
        usage: "history [limit] [offset]",
        summary: "List closed periods, most recent first",
        handler: cmd_history,
    },
    CommandSpec {
        name: "show",
        aliases: &[],
        usage: "show <period-id>",
        summary: "Show every transaction of a period",
        handler: cmd_show,
    },
    CommandSpec {
        name: "presets",
        aliases: &[],
        usage: "presets",
        summary: "Show the preset limits and defaults",
        handler: cmd_presets,
    },
    CommandSpec {
        name: "flush",
        aliases: &["save"],
        usage: "flush",
        summary: "Write any unsaved changes to disk",
        handler: cmd_flush,
    },
    CommandSpec {
        name: "backup",
        aliases: &[],
        usage: "backup [note...]",
        summary: "Write a named backup of the ledger",
        handler: cmd_backup,
    },
    CommandSpec {
        name: "backups",
        aliases: &[],
        usage: "backups",
        summary: "List ledger backups, newest first",
        handler: cmd_backups,
    },
    CommandSpec {
        name: "restore",
        aliases: &[],
        usage: "restore <backup-id>",
        summary: "Replace the ledger with a backup",
        handler: cmd_restore,
    },
    CommandSpec {
        name: "version",
        aliases: &[],
        usage: "version",
        summary: "Show build information",
        handler: cmd_version,
    },
    CommandSpec {
        name: "help",
        aliases: &["h"],
        usage: "help [command]",
        summary: "List commands or describe one",
        handler: cmd_help,
    },
    CommandSpec {
        name: "exit",
        aliases: &["quit"],
        usage: "exit",
        summary: "Save and leave the shell",
        handler: cmd_exit,
    },
];

pub(crate) fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name == name || spec.aliases.contains(&name))
}

fn cmd_start(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (limit, label_parts) = match args.split_first() {
        Some((first, rest)) if looks_numeric(first) => (Some(parse_amount(first)?), rest),
        _ => (None, args),
    };
    let resolved = limit.unwrap_or_else(|| ctx.session.config().suggested_limit());
    let label = if label_parts.is_empty() {
        BudgetTier::for_limit(resolved).to_string()
    } else {
        label_parts.join(" ")
    };

    let previous = ctx.ledger().active_period();
    let id = ctx.session.start_period(Some(resolved), label.clone())?;

    if let Some(previous) = previous {
        output::info(format!(
            "Archived `{}` ({} spent).",
            previous.summary.label,
            output::money(previous.summary.spent, ctx.currency())
        ));
    }
    output::success(format!(
        "Period started: {} with a limit of {}",
        label,
        output::money(resolved, ctx.currency())
    ));
    output::line(format!("tier: {}", BudgetTier::for_limit(resolved)));
    output::line(format!("id:   {}", id));
    Ok(LoopControl::Continue)
}

fn cmd_spend(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (amount, description, venue) = match args {
        [amount, description] => (amount, description, ""),
        [amount, description, venue] => (amount, description, *venue),
        _ => return Err(usage_error("spend")),
    };
    let amount = parse_amount(amount)?;
    let ledger = ctx.ledger();
    let id = ledger.record_transaction_now(amount, *description, venue)?;

    output::success(format!(
        "Recorded {} for {}",
        description,
        output::money(amount, ctx.currency())
    ));
    output::line(format!("id: {}", id));
    if let Some(view) = ledger.active_period() {
        print_progress(ctx, &view);
    }
    Ok(LoopControl::Continue)
}

fn cmd_edit(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some((raw_id, flags)) = args.split_first() else {
        return Err(usage_error("edit"));
    };
    let id = parse_transaction_id(raw_id)?;
    let patch = parse_patch(flags)?;
    if patch.is_empty() {
        return Err(CommandError::InvalidArguments(
            "Nothing to change. Pass --amount and/or --description.".into(),
        ));
    }

    let ledger = ctx.ledger();
    ledger.edit_transaction(id, patch)?;
    output::success("Transaction updated.");
    if let Some(view) = ledger.active_period() {
        print_progress(ctx, &view);
    }
    Ok(LoopControl::Continue)
}

fn cmd_delete(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [raw_id] = args else {
        return Err(usage_error("delete"));
    };
    let id = parse_transaction_id(raw_id)?;
    let ledger = ctx.ledger();
    let removed = ledger.delete_transaction(id)?;
    output::success(format!(
        "Deleted {} ({}).",
        removed.description,
        output::money(removed.amount, ctx.currency())
    ));
    if let Some(view) = ledger.active_period() {
        print_progress(ctx, &view);
    }
    Ok(LoopControl::Continue)
}

fn cmd_close(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_no_args("close", args)?;
    let summary = ctx.ledger().close_period()?;
    output::section(format!("Period closed: {}", summary.label));
    print_summary(ctx, &summary);
    if summary.is_over_budget {
        output::warning(format!(
            "{} by {}",
            summary.verdict(),
            output::money(summary.overspent_amount, ctx.currency())
        ));
    } else {
        output::success(format!(
            "{} with {} to spare",
            summary.verdict(),
            output::money(summary.underspent_amount, ctx.currency())
        ));
    }
    Ok(LoopControl::Continue)
}

fn cmd_status(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_no_args("status", args)?;
    let Some(view) = ctx.ledger().active_period() else {
        output::info("No active period. Start one with `start <limit> [label]`.");
        return Ok(LoopControl::Continue);
    };

    output::section(format!("{} ({})", view.summary.label, view.tier));
    output::line(format!("id:        {}", view.id()));
    output::line(format!("started:   {}", output::timestamp(view.summary.started_at)));
    print_summary(ctx, &view.summary);
    print_transactions(ctx, &sorted(view.transactions.clone()));
    print_progress(ctx, &view);
    Ok(LoopControl::Continue)
}

fn cmd_history(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.len() > 2 {
        return Err(usage_error("history"));
    }
    let limit = args.first().map(|raw| parse_count(raw)).transpose()?;
    let offset = args.get(1).map(|raw| parse_count(raw)).transpose()?;

    let ledger = ctx.ledger();
    let periods = ledger.list_history(limit, offset);
    if periods.is_empty() {
        output::info("No closed periods to show.");
        return Ok(LoopControl::Continue);
    }

    output::section("History");
    for summary in &periods {
        let ended = summary
            .ended_at
            .map(output::timestamp)
            .unwrap_or_else(|| "-".into());
        output::line(format!(
            "{}  {}: spent {} of {} ({})  [{}]",
            ended,
            summary.label,
            output::money(summary.spent, ctx.currency()),
            output::money(summary.limit, ctx.currency()),
            summary.verdict(),
            summary.id
        ));
    }
    output::info(format!(
        "Showing {} of {} closed periods.",
        periods.len(),
        ledger.history_len()
    ));
    Ok(LoopControl::Continue)
}

fn cmd_show(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [raw_id] = args else {
        return Err(usage_error("show"));
    };
    let id = PeriodId::from_str(raw_id).map_err(|_| {
        CommandError::InvalidArguments(format!("`{}` is not a valid period id", raw_id))
    })?;
    let detail = ctx.ledger().period_detail(id)?;

    output::section(format!("{} [{}]", detail.summary.label, detail.status));
    output::line(format!(
        "started:   {}",
        output::timestamp(detail.summary.started_at)
    ));
    if let Some(ended) = detail.summary.ended_at {
        output::line(format!("ended:     {}", output::timestamp(ended)));
    }
    print_summary(ctx, &detail.summary);
    output::line(format!("verdict:   {}", detail.summary.verdict()));
    print_transactions(ctx, &detail.chronological());
    Ok(LoopControl::Continue)
}

fn cmd_presets(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_no_args("presets", args)?;
    let config = ctx.session.config();
    let currency = config.currency.as_str();

    output::section("Limits");
    for preset in config.presets() {
        output::line(format!(
            "{:>10}  {}",
            output::money(preset, currency),
            BudgetTier::for_limit(preset)
        ));
    }
    output::line(format!("step:      {}", output::money(config.limit_step, currency)));
    output::line(format!(
        "default:   {}",
        output::money(config.default_limit, currency)
    ));
    if let Some(last) = config.last_limit {
        output::line(format!("last used: {}", output::money(last, currency)));
    }
    match config.near_limit_threshold() {
        Some(threshold) => output::line(format!("warn at:   {}% of the limit", threshold)),
        None => output::line("warn at:   off"),
    }
    Ok(LoopControl::Continue)
}

fn cmd_flush(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_no_args("flush", args)?;
    ctx.ledger().flush()?;
    match ctx.session.ledger_path() {
        Some(path) => output::success(format!("Ledger saved to {}", path.display())),
        None => output::success("Ledger saved."),
    }
    Ok(LoopControl::Continue)
}

fn cmd_backup(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let note = args.join(" ");
    let note = (!note.trim().is_empty()).then_some(note.as_str());
    let info = ctx.session.backup(note)?;
    output::success(format!("Backup written: {}", info.id));
    Ok(LoopControl::Continue)
}

fn cmd_backups(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_no_args("backups", args)?;
    let backups = ctx.session.backups()?;
    if backups.is_empty() {
        output::info("No backups yet.");
        return Ok(LoopControl::Continue);
    }
    output::section("Backups");
    for backup in backups {
        let created = backup
            .created_at
            .map(output::timestamp)
            .unwrap_or_else(|| "unknown".into());
        output::line(format!("{}  {}  ({} bytes)", created, backup.id, backup.size_bytes));
    }
    Ok(LoopControl::Continue)
}

fn cmd_restore(ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [backup_id] = args else {
        return Err(usage_error("restore"));
    };
    let ledger = ctx.session.restore_backup(backup_id)?;
    output::success(format!("Restored {}", backup_id));
    match ledger.active_period() {
        Some(view) => print_progress(ctx, &view),
        None => output::info("No active period in the restored ledger."),
    }
    Ok(LoopControl::Continue)
}

fn cmd_version(_ctx: &mut ShellContext, _args: &[&str]) -> CommandResult {
    for line in BuildMetadata::current().to_string().lines() {
        output::info(line);
    }
    Ok(LoopControl::Continue)
}

fn cmd_help(_ctx: &mut ShellContext, args: &[&str]) -> CommandResult {
    if let Some(name) = args.first() {
        let spec = find(&name.to_ascii_lowercase()).ok_or_else(|| {
            CommandError::InvalidArguments(format!("No help for unknown command `{}`", name))
        })?;
        output::info(format!("{}: {}", spec.usage, spec.summary));
        if !spec.aliases.is_empty() {
            output::line(format!("aliases: {}", spec.aliases.join(", ")));
        }
        return Ok(LoopControl::Continue);
    }

    output::section("Commands");
    for spec in COMMANDS {
        output::line(format!("{:<46} {}", spec.usage, spec.summary));
    }
    Ok(LoopControl::Continue)
}

fn cmd_exit(ctx: &mut ShellContext, _args: &[&str]) -> CommandResult {
    ctx.shutdown();
    output::info("Goodbye.");
    Ok(LoopControl::Exit)
}

fn print_summary(ctx: &ShellContext, summary: &PeriodSummary) {
    let currency = ctx.currency();
    output::line(format!("limit:     {}", output::money(summary.limit, currency)));
    output::line(format!("spent:     {}", output::money(summary.spent, currency)));
    output::line(format!(
        "remaining: {}",
        output::money(summary.remaining, currency)
    ));
    output::line(format!("purchases: {}", summary.transaction_count));
}

fn print_transactions(ctx: &ShellContext, transactions: &[Transaction]) {
    if transactions.is_empty() {
        output::line("(no transactions)");
        return;
    }
    for txn in transactions {
        let venue = if txn.venue.is_empty() {
            String::new()
        } else {
            format!(" @ {}", txn.venue)
        };
        let edited = if txn.edited_at.is_some() { " (edited)" } else { "" };
        output::line(format!(
            "{}  {:>10}  {}{}{}  [{}]",
            output::timestamp(txn.timestamp),
            output::money(txn.amount, ctx.currency()),
            txn.description,
            venue,
            edited,
            txn.id
        ));
    }
}

fn print_progress(ctx: &ShellContext, view: &PeriodView) {
    let summary = &view.summary;
    let currency = ctx.currency();
    if summary.is_over_budget {
        output::warning(format!(
            "Over budget by {} ({} of {})",
            output::money(summary.overspent_amount, currency),
            output::money(summary.spent, currency),
            output::money(summary.limit, currency)
        ));
        return;
    }

    let bar = view
        .percent_used
        .map(|percent| format!(" {} {}%", output::progress_bar(percent), percent.round()))
        .unwrap_or_default();
    output::info(format!(
        "Spent {} of {}, {} left{}",
        output::money(summary.spent, currency),
        output::money(summary.limit, currency),
        output::money(summary.remaining, currency),
        bar
    ));
    if view.near_limit {
        output::warning("Heads up: you are getting close to your limit.");
    }
}

fn sorted(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    transactions.sort_by_key(|txn| txn.timestamp);
    transactions
}

fn usage_error(command: &str) -> CommandError {
    let usage = find(command).map(|spec| spec.usage).unwrap_or(command);
    CommandError::InvalidArguments(format!("Usage: {}", usage))
}

fn expect_no_args(command: &str, args: &[&str]) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(usage_error(command))
    }
}

fn looks_numeric(raw: &str) -> bool {
    let trimmed = raw.trim().trim_start_matches(['-', '+']).trim_start_matches('$');
    trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, CommandError> {
    let trimmed = raw.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let digits = unsigned.strip_prefix('$').unwrap_or(unsigned);
    let value = Decimal::from_str(digits)
        .map_err(|_| CommandError::InvalidArguments(format!("`{}` is not a valid amount", raw)))?;
    Ok(if negative { -value } else { value })
}

fn parse_count(raw: &str) -> Result<usize, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidArguments(format!("`{}` is not a valid count", raw)))
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, CommandError> {
    TransactionId::from_str(raw).map_err(|_| {
        CommandError::InvalidArguments(format!("`{}` is not a valid transaction id", raw))
    })
}

pub(crate) fn parse_patch(flags: &[&str]) -> Result<TransactionPatch, CommandError> {
    let mut patch = TransactionPatch::default();
    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        let value = iter.next().ok_or_else(|| {
            CommandError::InvalidArguments(format!("`{}` needs a value", flag))
        })?;
        patch = match *flag {
            "--amount" | "-a" => patch.with_amount(parse_amount(value)?),
            "--description" | "-d" => patch.with_description(*value),
            other => {
                return Err(CommandError::InvalidArguments(format!(
                    "Unknown option `{}`",
                    other
                )))
            }
        };
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_accept_dollar_prefix_and_sign() {
        assert_eq!(parse_amount("12.50").unwrap(), dec!(12.50));
        assert_eq!(parse_amount("$7").unwrap(), dec!(7));
        assert_eq!(parse_amount("-5").unwrap(), dec!(-5));
        assert!(parse_amount("lots").is_err());
    }

    #[test]
    fn numeric_first_argument_is_a_limit() {
        assert!(looks_numeric("40"));
        assert!(looks_numeric("$40"));
        assert!(looks_numeric("-5"));
        assert!(!looks_numeric("Friday"));
    }

    #[test]
    fn patch_flags_are_parsed() {
        let patch = parse_patch(&["--amount", "9.5", "-d", "Nachos"]).unwrap();
        assert_eq!(patch.amount, Some(dec!(9.5)));
        assert_eq!(patch.description.as_deref(), Some("Nachos"));

        assert!(parse_patch(&[]).unwrap().is_empty());
        assert!(parse_patch(&["--amount"]).is_err());
        assert!(parse_patch(&["--venue", "Bar"]).is_err());
    }

    #[test]
    fn every_command_resolves_by_name_and_alias() {
        for spec in COMMANDS {
            assert_eq!(find(spec.name).map(|s| s.name), Some(spec.name));
            for alias in spec.aliases {
                assert_eq!(find(alias).map(|s| s.name), Some(spec.name));
            }
        }
        assert!(find("stat").is_none());
    }
}
