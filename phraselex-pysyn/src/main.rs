//! Command-line interface for the Python-flavoured demo grammar.
//!
//! Parses a file with the [`python_grammar`] configuration and dumps the
//! committed tree as an indented listing, one token per line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use phraselex::TokenRef;
use phraselex_pysyn::python_grammar;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Command
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parses a file and prints the token tree
    Parse {
        /// Input file
        #[arg(short, long)]
        input: String,
    },
}

fn dump(token: TokenRef<'_>, depth: usize) {
    println!(
        "{:indent$}{:?}{} {}:{}..{} {:?}",
        "",
        token.kind(),
        token
            .label()
            .map(|l| format!(" [{l}]"))
            .unwrap_or_default(),
        token.row_no(),
        token.column_start(),
        token.column_end(),
        token.content(),
        indent = depth * 2,
    );
    if token.is_node() {
        for child in token.children() {
            dump(child, depth + 1);
        }
        if let Some(end) = token.end() {
            dump(end, depth + 1);
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Parse { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("can't open {input:?}"))?;
            let syntax = python_grammar();
            let tree = syntax.grammar.parse_string(&text)?;
            log::debug!(
                "parsed {} rows into {} tokens",
                tree.row_count(),
                tree.token_count(),
            );
            dump(tree.root(), 0);
        }
    }
    Ok(())
}
