use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jyutping_core::{Dictionary, DictionaryStore, Envelope, InMemoryRuleStore, RedbRuleStore, RuleSeed, RuleStore};
use libjyutping::{Engine, JyutpingConfig, RecommendRequest, Requester};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jyutping", about = "Jyutping fuzzy search and word recommendation")]
struct Args {
    /// Dictionary file (.json, .bincode or tab-separated text)
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Matching-rule database (redb)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    user: Option<u64>,

    #[arg(long)]
    profile: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tiered search by jyutping code or hanzi phrase
    Search { code: String },
    /// Prefix suggestions; no input lists everyday words
    Suggest {
        #[arg(default_value = "")]
        input: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Related words for a selected word
    Recommend {
        #[arg(long)]
        hanzi: Option<String>,
        #[arg(long)]
        jyutping: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },
    /// Hanzi to jyutping
    Translate { text: String },
    /// Write the loaded dictionary as a bincode snapshot
    Snapshot { out: PathBuf },
    #[command(subcommand)]
    Rules(RulesCommand),
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Effective matching rule and exception rules for --user/--profile
    Show,
    /// Import rule rows from JSON into the --rules database
    Import { file: PathBuf },
}

fn print<T: Serialize>(envelope: &Envelope<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(p) => JyutpingConfig::load_toml(p)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("reading config {}", p.display()))?,
        None => JyutpingConfig::default(),
    };

    if let Command::Rules(RulesCommand::Import { file }) = &args.command {
        let Some(db) = &args.rules else {
            bail!("rules import needs --rules <db>");
        };
        let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let seed = RuleSeed::from_json_str(&text)?;
        let written = RedbRuleStore::new(db)?.import(&seed)?;
        eprintln!("imported {written} rows into {}", db.display());
        return Ok(());
    }

    let dict = match &args.dict {
        Some(p) => Dictionary::load(p)?,
        None if matches!(args.command, Command::Rules(_)) => Dictionary::empty(),
        None => bail!("--dict <file> is required"),
    };
    tracing::info!(entries = dict.len(), "dictionary loaded");

    if let Command::Snapshot { out } = &args.command {
        dict.save_bincode(out)?;
        eprintln!("wrote {} entries to {}", dict.len(), out.display());
        return Ok(());
    }

    let rules: Arc<dyn RuleStore> = match &args.rules {
        Some(p) => Arc::new(RedbRuleStore::new(p)?),
        None => Arc::new(InMemoryRuleStore::new()),
    };
    let dict: Arc<dyn DictionaryStore> = Arc::new(dict);
    let engine = Engine::from_config(dict, rules, &config);
    let who = Requester::new(args.user, args.profile);

    match &args.command {
        Command::Search { code } => print(&Envelope::from_result(engine.search(code, who))),
        Command::Suggest { input, limit } => {
            print(&Envelope::from_result(engine.suggest(input, *limit, who)))
        }
        Command::Recommend {
            hanzi,
            jyutping,
            context,
        } => {
            let req = RecommendRequest {
                hanzi: hanzi.as_deref(),
                jyutping: jyutping.as_deref(),
                context: context.as_deref(),
            };
            print(&Envelope::from_result(engine.recommend(req, who)))
        }
        Command::Translate { text } => print(&Envelope::from_result(engine.translate(text))),
        Command::Rules(RulesCommand::Show) => print(&Envelope::from_result(engine.rules(who))),
        Command::Rules(RulesCommand::Import { .. }) | Command::Snapshot { .. } => Ok(()),
    }
}
