use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use miette::{Context, IntoDiagnostic, Result};

use opkv::config::OpenOptions;
use opkv::dataframe::DataFrame;
use opkv::operator::Operator;

#[derive(Parser, Debug)]
#[command(name = "opkv", version, about, long_about = None)]
struct Cli {
    /// Path to the storage directory (defaults to $HOME/.opkv)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Set a string value
    #[command(alias = "ss")]
    SetString { key: String, value: String },

    /// Get a string value
    #[command(alias = "gs")]
    GetString { key: String },

    /// Set an integer value
    SetInt { key: String, value: i64 },

    /// Increment an integer (creates it at 0 first if missing)
    IncInt { key: String },

    /// Add a delta to an integer
    AddInt { key: String, delta: i64 },

    /// Remove any key (primitive or composite metadata + its children)
    #[command(alias = "rm")]
    Delete { key: String },

    /// Push a value onto a list
    ListPush {
        name: String,
        value: String,
        /// Push onto the left (head) instead of the right (tail)
        #[arg(long)]
        left: bool,
    },

    /// Pop a value off a list
    ListPop {
        name: String,
        /// Pop from the left (head) instead of the right (tail)
        #[arg(long)]
        left: bool,
    },

    /// Print a list's `[start, end]` logical range
    ListRange { name: String, start: i64, end: i64 },

    /// Set a map field
    MapSet { name: String, field: String, value: String },

    /// Get a map field
    MapGet { name: String, field: String },

    /// Add a member to a set
    SetAdd { name: String, member: String },

    /// List every member of a set
    SetMembers { name: String },

    /// Create a bloom filter with the given bit width (0 = default)
    BloomCreate { name: String, bits: u64 },

    /// Add a string item to a bloom filter
    BloomAdd { name: String, item: String },

    /// Check whether a string item might be in a bloom filter
    BloomContains { name: String, item: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let options = OpenOptions::new().with_path(config_path.clone());
    let op = Operator::open(options)
        .into_diagnostic()
        .wrap_err_with(|| format!("could not initialize storage at {:?}", config_path))?;

    match cli.command {
        Command::SetString { key, value } => {
            op.set_string(key.as_bytes(), &value)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to set string key={key}"))?;
            success(&format!("set: {key} = {value}"));
        }
        Command::GetString { key } => match op.get_string(key.as_bytes()) {
            Ok(value) => info(&format!("{key} = {value}")),
            Err(_) => warn(&format!("key not found: {key}")),
        },
        Command::SetInt { key, value } => {
            op.set_int(key.as_bytes(), value)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to set int key={key}"))?;
            success(&format!("set: {key} = {value}"));
        }
        Command::IncInt { key } => {
            let v = op
                .inc_int(key.as_bytes())
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to increment key={key}"))?;
            success(&format!("{key} = {v}"));
        }
        Command::AddInt { key, delta } => {
            let v = op
                .add_int(key.as_bytes(), delta)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to add to key={key}"))?;
            success(&format!("{key} = {v}"));
        }
        Command::Delete { key } => {
            op.delete(key.as_bytes())
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to delete key={key}"))?;
            success(&format!("deleted: {key}"));
        }
        Command::ListPush { name, value, left } => {
            let df = DataFrame::Str(value.clone());
            let len = if left {
                op.push_left(&name, df)
            } else {
                op.push_right(&name, df)
            }
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to push onto list={name}"))?;
            success(&format!("{name} length = {len}"));
        }
        Command::ListPop { name, left } => {
            let result = if left { op.pop_left(&name) } else { op.pop_right(&name) };
            match result {
                Ok(df) => info(&format!("popped: {df:?}")),
                Err(_) => warn(&format!("list is empty: {name}")),
            }
        }
        Command::ListRange { name, start, end } => match op.list_range(&name, start, end) {
            Ok(values) => info(&format!("{name}[{start}..={end}] = {values:?}")),
            Err(_) => warn(&format!("list is empty: {name}")),
        },
        Command::MapSet { name, field, value } => {
            op.map_set(&name, &field, DataFrame::Str(value.clone()))
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to set field={field} on map={name}"))?;
            success(&format!("{name}.{field} = {value}"));
        }
        Command::MapGet { name, field } => match op.map_get(&name, &field) {
            Ok(df) => info(&format!("{name}.{field} = {df:?}")),
            Err(_) => warn(&format!("field not found: {name}.{field}")),
        },
        Command::SetAdd { name, member } => {
            let card = op
                .set_add(&name, &member)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to add to set={name}"))?;
            success(&format!("{name} cardinality = {card}"));
        }
        Command::SetMembers { name } => {
            let members = op
                .set_members(&name)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to list set={name}"))?;
            info(&format!("{name} = {members:?}"));
        }
        Command::BloomCreate { name, bits } => {
            op.create_bloom_filter(&name, bits)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create bloom filter={name}"))?;
            success(&format!("created bloom filter: {name}"));
        }
        Command::BloomAdd { name, item } => {
            op.bloom_filter_add(&name, &DataFrame::Str(item.clone()))
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to add to bloom filter={name}"))?;
            success(&format!("added {item:?} to {name}"));
        }
        Command::BloomContains { name, item } => {
            let present = op
                .bloom_filter_contains(&name, &DataFrame::Str(item.clone()))
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to query bloom filter={name}"))?;
            info(&format!("{name} may contain {item:?}: {present}"));
        }
    }

    op.close().into_diagnostic().wrap_err("failed to close storage")?;
    Ok(())
}

/// Resolve a default config path depending on OS.
fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".opkv"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn success(msg: &str) {
    println!("{} {}", "✔".bright_green().bold(), msg.normal());
}

fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".bright_yellow().bold(), msg.yellow());
}

fn info(msg: &str) {
    println!("{} {}", "➤".bright_cyan().bold(), msg.cyan());
}
