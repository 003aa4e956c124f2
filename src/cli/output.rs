use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use bzk_domain::Decimal;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use rust_decimal::prelude::ToPrimitive;

/// Message categories used by the CLI output helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
    Hint,
    Section,
}

static PLAIN: AtomicBool = AtomicBool::new(false);

/// Disables colour codes, e.g. when reading commands from a pipe.
pub fn set_plain(plain: bool) {
    PLAIN.store(plain, Ordering::Relaxed);
    if plain {
        colored::control::set_override(false);
    } else {
        colored::control::unset_override();
    }
}

fn icon(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Info => "[i]",
        MessageKind::Success => "[ok]",
        MessageKind::Warning => "[!]",
        MessageKind::Error => "[x]",
        MessageKind::Hint => "  >",
        MessageKind::Section => "",
    }
}

fn apply_style(kind: MessageKind, message: impl fmt::Display) -> String {
    let text = message.to_string();
    let base = match kind {
        MessageKind::Section => format!("=== {} ===", text.trim()),
        _ => format!("{} {}", icon(kind), text),
    };

    if PLAIN.load(Ordering::Relaxed) {
        return base;
    }
    match kind {
        MessageKind::Success => base.bright_green().to_string(),
        MessageKind::Warning => base.bright_yellow().to_string(),
        MessageKind::Error => base.bright_red().to_string(),
        MessageKind::Hint => base.dimmed().to_string(),
        MessageKind::Section => base.bold().to_string(),
        MessageKind::Info => base,
    }
}

pub fn print(kind: MessageKind, message: impl fmt::Display) {
    let formatted = apply_style(kind, message);
    match kind {
        MessageKind::Section => println!("\n{}", formatted),
        _ => println!("{}", formatted),
    }
}

pub fn info(message: impl fmt::Display) {
    print(MessageKind::Info, message);
}

pub fn success(message: impl fmt::Display) {
    print(MessageKind::Success, message);
}

pub fn warning(message: impl fmt::Display) {
    print(MessageKind::Warning, message);
}

pub fn error(message: impl fmt::Display) {
    print(MessageKind::Error, message);
}

pub fn hint(message: impl fmt::Display) {
    print(MessageKind::Hint, message);
}

pub fn section(title: impl fmt::Display) {
    print(MessageKind::Section, title);
}

/// Prints an indented detail line without an icon.
pub fn line(message: impl fmt::Display) {
    println!("    {}", message);
}

/// Formats an amount in the configured currency, e.g. `$12.50` or `-£3.00`.
pub fn money(amount: Decimal, currency: &str) -> String {
    let rounded = amount.abs().round_dp(2);
    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    match currency_symbol(currency) {
        Some(symbol) => format!("{sign}{symbol}{rounded:.2}"),
        None => format!("{sign}{rounded:.2} {}", currency.to_ascii_uppercase()),
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

pub fn timestamp(value: DateTime<Utc>) -> String {
    value
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// A ten-cell bar such as `[#######---]`, capped at full.
pub fn progress_bar(percent_used: Decimal) -> String {
    let cells = (percent_used / Decimal::TEN)
        .floor()
        .clamp(Decimal::ZERO, Decimal::TEN);
    let filled = cells.to_usize().unwrap_or(0);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(10 - filled))
}
