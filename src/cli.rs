//! Command-line surface and account-source resolution.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::config::Credentials;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("must provide a login user AND password, or neither")]
    CredentialPair,
    #[error("no account given: pass an account name or --accounts-file")]
    NoAccountSource,
    #[error("pass either an account name or --accounts-file, not both")]
    ConflictingAccountSources,
    #[error("failed to read accounts file {path}")]
    AccountsFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("accounts file {path} contains no account names")]
    AccountsFileEmpty { path: PathBuf },
}

/// Scrapes and downloads an account's photos and videos.
#[derive(Debug, Parser)]
#[command(name = "instagram-media-scraper", version)]
pub struct Cli {
    /// Account to scrape
    pub account: Option<String>,

    /// Newline-delimited file of account names to scrape
    #[arg(short = 'f', long)]
    pub accounts_file: Option<PathBuf>,

    /// Download destination root; one folder is created per account
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// CSV output path (default: results-YYYY-M-D.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Login username
    #[arg(short = 'u', long)]
    pub login_user: Option<String>,

    /// Login password
    #[arg(short = 'p', long)]
    pub login_pass: Option<String>,
}

impl Cli {
    /// Check invocation shape before any network or filesystem activity.
    ///
    /// # Errors
    ///
    /// `UsageError::CredentialPair` when exactly one of user/password is
    /// given; account-source errors when neither or both of the positional
    /// account and `--accounts-file` are present.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.login_user.is_some() != self.login_pass.is_some() {
            return Err(UsageError::CredentialPair);
        }
        match (&self.account, &self.accounts_file) {
            (None, None) => Err(UsageError::NoAccountSource),
            (Some(_), Some(_)) => Err(UsageError::ConflictingAccountSources),
            _ => Ok(()),
        }
    }

    /// The batch of account names for this invocation: the positional
    /// account, or the lines of `--accounts-file` with surrounding
    /// whitespace and blank lines dropped.
    ///
    /// # Errors
    ///
    /// File read failures and an accounts file with no usable names are
    /// usage errors.
    pub fn resolve_accounts(&self) -> Result<Vec<String>, UsageError> {
        if let Some(account) = &self.account {
            return Ok(vec![account.clone()]);
        }

        let Some(path) = &self.accounts_file else {
            return Err(UsageError::NoAccountSource);
        };

        let contents =
            std::fs::read_to_string(path).map_err(|source| UsageError::AccountsFileUnreadable {
                path: path.clone(),
                source,
            })?;

        let accounts: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect();

        if accounts.is_empty() {
            return Err(UsageError::AccountsFileEmpty { path: path.clone() });
        }
        Ok(accounts)
    }

    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.login_user, &self.login_pass) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}
