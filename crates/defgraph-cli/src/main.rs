use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use defgraph_core::{DefgraphError, Result};
use defgraph_engine::{build_activation, ActivationReport, EdgeGraph, Lexicon};
use defgraph_parser::{load_config, parse_token, MachineConfig};
use defgraph_store::{DefinitionSource, GraphFile};
use tracing_subscriber::EnvFilter;

// ─── CLI ────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "defgraph", about = "Definition graphs and spreading activation over them")]
struct Cli {
    /// Machine config (`machine.cfg` INI or `.toml`)
    #[arg(short, long, default_value = "machine.cfg")]
    config: PathBuf,
    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the config and load every graph
    Check,
    /// Print the definition tree of a word
    Show {
        word: String,
        #[arg(long, default_value = "3")]
        max_depth: usize,
    },
    /// Print definitions as a graphviz digraph
    Dot {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Run spreading activation on `word/POS` tokens
    Activate {
        #[arg(required = true, num_args = 1..)]
        tokens: Vec<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Headword and machine counts per graph
    Stats,
}

// ─── Commands ───────────────────────────────────────────────────

fn definition_of(lexicon: &Lexicon, word: &str) -> Result<defgraph_core::MachineId> {
    lexicon
        .definition(word)
        .ok_or_else(|| DefgraphError::UnknownWord(word.to_string()))
}

fn check(config: &MachineConfig) -> Result<()> {
    let lexicon = Lexicon::from_config(config)?;
    for graph in config.resolved_graphs() {
        println!("{:<10} {}", graph.name, graph.path.display());
    }
    println!(
        "{} headwords, {} machines, {} shadowed",
        lexicon.definitions().len(),
        lexicon.store().len(),
        lexicon.conflicts()
    );
    if let Some(path) = config.resolved_constructions() {
        let rules = defgraph_parser::load_constructions(&path)?;
        println!("{} construction rule(s) in {}", rules.len(), path.display());
    }
    Ok(())
}

fn show(config: &MachineConfig, word: &str, max_depth: usize) -> Result<()> {
    let lexicon = Lexicon::from_config(config)?;
    let root = definition_of(&lexicon, word)?;
    println!("{}", lexicon.store().to_debug_str(root, max_depth, 2)?);
    Ok(())
}

fn dot(config: &MachineConfig, words: &[String], max_depth: Option<usize>) -> Result<()> {
    let lexicon = Lexicon::from_config(config)?;
    let roots = words
        .iter()
        .map(|w| definition_of(&lexicon, w))
        .collect::<Result<Vec<_>>>()?;
    let graph = EdgeGraph::from_machines(lexicon.store(), roots, max_depth)?;
    println!("{}", graph.to_dot(lexicon.store())?);
    Ok(())
}

/// JSON failures surface as I/O errors, like any other output failure.
fn render_json(report: &ActivationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report).map_err(std::io::Error::from)?)
}

fn activate(config: &MachineConfig, tokens: &[String], json: bool) -> Result<()> {
    let mut sa = build_activation(config)?;
    for raw in tokens {
        match parse_token(raw) {
            Some(token) => {
                sa.lexicon_mut().activate_token(&token);
            }
            None => tracing::warn!("skipping empty token {:?}", raw),
        }
    }
    let verbs = sa.add_verb_constructions(&HashMap::new())?;
    tracing::info!("{} verb construction(s) added", verbs);

    let report = sa.activation_loop()?;
    if json {
        println!("{}", render_json(&report)?);
        return Ok(());
    }

    println!(
        "{} iteration(s), {} active machine(s)",
        report.iterations, report.active
    );
    println!("sentence: {}", report.sentence.join(" "));
    for msg in &report.messages {
        let args: Vec<String> = msg.arguments.iter().map(|p| p.join(",")).collect();
        println!("{} <- {} [{}]", msg.plugin, msg.word, args.join(" | "));
    }
    Ok(())
}

fn stats(config: &MachineConfig) -> Result<()> {
    config.validate()?;
    println!("{:<10} {:<10} {:>10} {:>10}", "graph", "source", "headwords", "machines");
    for graph in config.resolved_graphs() {
        let file = GraphFile::load(&graph.path)?;
        println!(
            "{:<10} {:<10} {:>10} {:>10}",
            graph.name,
            file.name(),
            file.len(),
            file.machines.len()
        );
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    match &cli.command {
        Command::Check => check(&config),
        Command::Show { word, max_depth } => show(&config, word, *max_depth),
        Command::Dot { words, max_depth } => dot(&config, words, *max_depth),
        Command::Activate { tokens, json } => activate(&config, tokens, *json),
        Command::Stats => stats(&config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
