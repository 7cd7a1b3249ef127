use clap::Parser;
use std::path::PathBuf;

use crate::replicate::session::Security;

const EXAMPLES: &str = "\
Examples:
  IMAP to IMAP:
    mailclone --source mail.example.com me@example.com pa5sw0rd --destination mail.example2.com me@example2.com pa5sw0rd2

  IMAP to store:
    mailclone --source mail.example.com me@example.com pa5sw0rd --destination backup.db

  Store to IMAP:
    mailclone --source backup.db --destination mail.example2.com me@example2.com pa5sw0rd2";

#[derive(Parser, Debug)]
#[command(
    name = "mailclone",
    version,
    about = "Clone mailbox folders, messages and flags between IMAP servers and a SQLite store",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Source: HOST[:PORT] USER PASSWORD for an IMAP server, or PATH for a store
    #[arg(short, long, num_args = 1..=3, value_names = ["HOST|PATH", "USER", "PASSWORD"])]
    pub source: Vec<String>,

    /// Destination: HOST[:PORT] USER PASSWORD for an IMAP server, or PATH for a store
    #[arg(short, long, num_args = 1..=3, value_names = ["HOST|PATH", "USER", "PASSWORD"])]
    pub destination: Vec<String>,

    /// Transport security for the source server
    #[arg(long, value_enum)]
    pub source_security: Option<Security>,

    /// Transport security for the destination server
    #[arg(long, value_enum)]
    pub destination_security: Option<Security>,

    /// Seconds to wait before retrying a failed server operation
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// Give up after this many attempts per operation (default: retry forever)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// TOML file with [source], [destination] and [retry] sections
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
