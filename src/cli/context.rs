use std::io;

use bzk_core::{CoreError, PersistenceStatus};
use rustyline::error::ReadlineError;
use strsim::levenshtein;
use thiserror::Error;

use crate::{
    cli::{commands, output},
    BuzzkillError, LedgerHandle, Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Failures that end the shell.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Session(#[from] BuzzkillError),
    #[error("Readline error: {0}")]
    Readline(#[from] ReadlineError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failures of a single command. The shell reports them and keeps going.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Session(#[from] BuzzkillError),
}

pub type CommandResult = Result<LoopControl, CommandError>;

pub struct ShellContext {
    pub(crate) session: Session,
    pub(crate) running: bool,
    reported_save_error: Option<String>,
}

impl ShellContext {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            running: true,
            reported_save_error: None,
        }
    }

    pub fn open() -> Result<Self, CliError> {
        let session = Session::open_default()?;
        let context = Self::new(session);
        for warning in context.ledger().load_warnings() {
            output::warning(format!("Ledger loaded with anomaly: {warning}"));
        }
        Ok(context)
    }

    pub(crate) fn ledger(&self) -> LedgerHandle {
        self.session.ledger()
    }

    pub(crate) fn currency(&self) -> &str {
        &self.session.config().currency
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        commands::COMMANDS
            .iter()
            .flat_map(|spec| std::iter::once(spec.name).chain(spec.aliases.iter().copied()))
            .collect()
    }

    pub fn prompt(&self) -> String {
        match self.ledger().active_period() {
            Some(view) => format!(
                "buzzkill [{}/{}]> ",
                output::money(view.summary.spent, self.currency()),
                output::money(view.summary.limit, self.currency())
            ),
            None => "buzzkill> ".to_string(),
        }
    }

    pub fn dispatch(&mut self, command: &str, raw: &str, args: &[&str]) -> CommandResult {
        let Some(spec) = commands::find(command) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        let result = (spec.handler)(self, args);
        self.check_persistence();
        result
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));

        let needle = input.to_ascii_lowercase();
        let best = self
            .command_names()
            .into_iter()
            .map(|name| (levenshtein(name, &needle), name))
            .min_by_key(|(distance, _)| *distance);

        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            CommandError::Core(CoreError::NoActivePeriod) => {
                output::error("No active budget period.");
                output::hint("Start one with `start <limit> [label]`.");
            }
            other => output::error(other),
        }
    }

    /// Warns once per distinct save failure; the ledger keeps working in memory.
    fn check_persistence(&mut self) {
        match self.session.persistence_status() {
            PersistenceStatus::Clean => self.reported_save_error = None,
            PersistenceStatus::Dirty {
                last_error: Some(message),
                unsaved_revisions,
            } => {
                if self.reported_save_error.as_deref() != Some(message.as_str()) {
                    output::warning(format!(
                        "Changes are not saved yet ({unsaved_revisions} pending): {message}"
                    ));
                    output::hint("Run `flush` to retry.");
                    self.reported_save_error = Some(message);
                }
            }
            PersistenceStatus::Dirty { last_error: None, .. } => {}
        }
    }

    /// Last chance to write pending changes before the shell exits.
    pub(crate) fn shutdown(&mut self) {
        self.running = false;
        if self.session.persistence_status().is_clean() {
            return;
        }
        if let Err(err) = self.ledger().flush() {
            output::error(format!("Could not save the ledger on exit: {err}"));
        }
    }
}
