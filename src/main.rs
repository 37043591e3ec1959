//! Command-line interface for contentmodel

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use contentmodel::{
    compact, Checker, Document, Grammar, Limits, Node, Schema, SchemaAnalyzer, ValidationMode,
    Validator,
};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "contentmodel")]
#[command(author, version, about = "Content-model compiler and structural validator", long_about = None)]
struct Cli {
    /// Use strict resource limits
    #[arg(long, global = true)]
    strict_limits: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a JSON grammar into the compact encoding
    Compile {
        /// Path to the grammar file
        #[arg(value_name = "GRAMMAR")]
        grammar: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate an XML document against a schema
    Validate {
        /// Path to the schema (grammar or compact JSON)
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the XML file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Validation mode: strict, lax or skip
        #[arg(short, long, default_value = "strict")]
        mode: String,
    },

    /// Summarize a schema and report design findings
    Check {
        /// Path to the schema (grammar or compact JSON)
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,
    },

    /// Find where a child can be inserted
    #[command(name = "insert-pos")]
    InsertPos {
        /// Path to the schema (grammar or compact JSON)
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Parent element
        #[arg(long)]
        parent: String,

        /// Existing children, comma separated (`#text` for text)
        #[arg(long, value_delimiter = ',')]
        children: Vec<String>,

        /// Tag to insert
        #[arg(long)]
        tag: String,

        /// Report the last valid position instead of the first
        #[arg(long)]
        last: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let limits = if cli.strict_limits {
        Limits::strict()
    } else {
        Limits::default()
    };

    let result = match cli.command {
        Commands::Compile {
            grammar,
            output,
            pretty,
        } => cmd_compile(grammar, output, pretty, limits),
        Commands::Validate { schema, file, mode } => cmd_validate(schema, file, mode, limits),
        Commands::Check { schema } => cmd_check(schema, limits),
        Commands::InsertPos {
            schema,
            parent,
            children,
            tag,
            last,
        } => cmd_insert_pos(schema, parent, children, tag, last, limits),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn cmd_compile(
    grammar_path: PathBuf,
    output: Option<PathBuf>,
    pretty: bool,
    limits: Limits,
) -> Result<(), Box<dyn std::error::Error>> {
    let grammar = Grammar::from_json(&fs::read_to_string(&grammar_path)?)?;
    let schema = Schema::from_grammar(&grammar, limits)?;
    for warning in schema.compile_warnings() {
        eprintln!("warning: {}", warning);
    }

    let json = compact::encode_to_string(&schema, pretty)?;
    match output {
        Some(path) => fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_validate(
    schema_path: PathBuf,
    file: PathBuf,
    mode: String,
    limits: Limits,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(&schema_path, limits)?;
    let doc = Document::from_file(&file)?;
    let mode: ValidationMode = mode.to_lowercase().parse()?;

    match Validator::new(&schema).with_mode(mode).validate_document(&doc) {
        Ok(()) => {
            println!("✓ Document is valid");
            Ok(())
        }
        Err(errors) => {
            println!("✗ Document is invalid");
            println!();
            println!("Errors:");
            for error in &errors {
                println!("  - {}", error);
            }
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "cli")]
fn cmd_check(schema_path: PathBuf, limits: Limits) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(&schema_path, limits)?;
    let analyzer = SchemaAnalyzer::new(&schema);

    println!("=== Schema Summary ===");
    println!("Elements: {}", schema.len());
    println!("Start element: {}", schema.start().unwrap_or("(none)"));
    println!();
    for element in schema.elements() {
        let children: Vec<&str> = analyzer.children(element.name()).into_iter().collect();
        println!(
            "  {} ({}){}{}",
            element.name(),
            element.kind(),
            if element.is_text_allowed() { " text" } else { "" },
            if children.is_empty() {
                String::new()
            } else {
                format!(" -> {}", children.join(", "))
            }
        );
    }

    for warning in schema.compile_warnings() {
        println!("warning: {}", warning);
    }

    let findings = Checker::new(&schema).check();
    println!();
    if findings.is_empty() {
        println!("✓ No design findings");
    } else {
        println!("Findings:");
        for finding in &findings {
            println!("  - {}", finding);
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_insert_pos(
    schema_path: PathBuf,
    parent: String,
    children: Vec<String>,
    tag: String,
    last: bool,
    limits: Limits,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(&schema_path, limits)?;
    let element = schema.require(&parent)?;
    let nodes: Vec<Node> = children
        .iter()
        .map(|name| match name.as_str() {
            contentmodel::names::TEXT_TOKEN => Node::text("text"),
            name => Node::Element(contentmodel::Element::new(name)),
        })
        .collect();

    let pos = if last {
        element.find_last_valid_pos(&nodes, &tag)
    } else {
        element.find_first_valid_pos(&nodes, &tag)
    };
    match pos {
        Some(index) => println!("{}", index),
        None => {
            println!("✗ <{}> cannot be inserted into <{}>", tag, parent);
            std::process::exit(1);
        }
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
