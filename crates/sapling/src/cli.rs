//! Command-line interface for sapling.
//!
//! Compiles a Tree-sitter `grammar.json` and, given a source file, parses it
//! and prints the tree.

use facet::Facet;
use sapling::{compile, parse_grammar, validate, Language, Node, Parser};
use std::io::IsTerminal;
use std::process::ExitCode;

/// Compile a Tree-sitter grammar and optionally parse a file with it.
#[derive(Facet)]
struct Args {
    /// Path to a `grammar.json` file.
    #[facet(positional)]
    grammar: String,

    /// A file to parse with the compiled grammar.
    #[facet(named, short = 's', default)]
    source: Option<String>,

    /// Print the parse tree as JSON instead of an S-expression.
    #[facet(named, default)]
    json: bool,

    /// Print parse table statistics.
    #[facet(named, default)]
    stats: bool,

    /// Log compiler and parser activity to stderr.
    #[facet(named, short = 'v', default)]
    verbose: bool,
}

/// A parse tree, flattened into rows for JSON output.
#[derive(Facet)]
struct TreeDump {
    language: String,
    has_error: bool,
    nodes: Vec<NodeRow>,
}

#[derive(Facet)]
struct NodeRow {
    depth: usize,
    kind: String,
    field: Option<String>,
    named: bool,
    start_byte: usize,
    end_byte: usize,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let args: Args = facet_args::from_std_args().map_err(|e| e.to_string())?;
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();
    }

    let json = std::fs::read_to_string(&args.grammar)
        .map_err(|e| format!("cannot read {}: {e}", args.grammar))?;
    let grammar = parse_grammar(&json).map_err(|e| e.to_string())?;
    for warning in validate(&grammar).map_err(|e| e.to_string())? {
        eprintln!("warning: {warning}");
    }
    let language = compile(&grammar).map_err(|e| e.to_string())?;

    if args.stats {
        print_stats(&language);
    }

    let Some(path) = args.source else {
        if !args.stats {
            println!("{}: ok", language.name());
        }
        return Ok(());
    };

    let text = std::fs::read_to_string(&path).map_err(|e| format!("cannot read {path}: {e}"))?;
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| e.to_string())?;
    let tree = parser
        .parse(&text, None)
        .ok_or_else(|| "parser has no language".to_string())?;
    let root = tree.root_node();

    if args.json {
        let mut nodes = Vec::new();
        collect_rows(root, 0, &mut nodes);
        let dump = TreeDump {
            language: language.name().to_string(),
            has_error: root.has_error(),
            nodes,
        };
        println!("{}", facet_json::to_string(&dump));
    } else {
        println!("{}", root.to_sexp());
    }

    if root.has_error() {
        return Err(format!("{path}: syntax errors"));
    }
    Ok(())
}

fn print_stats(language: &Language) {
    println!("grammar: {}", language.name());
    println!("symbols: {}", language.symbol_count());
    println!("productions: {}", language.production_count());
    println!("states: {}", language.state_count());
    println!("lex modes: {}", language.lex_mode_count());
    println!("fields: {}", language.field_count());
}

fn collect_rows(node: Node<'_>, depth: usize, rows: &mut Vec<NodeRow>) {
    rows.push(NodeRow {
        depth,
        kind: node.kind().to_string(),
        field: node.field_name().map(str::to_string),
        named: node.is_named(),
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    });
    for child in node.children() {
        collect_rows(child, depth + 1, rows);
    }
}
