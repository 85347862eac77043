#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use octofhir_elementmodel::*;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "elementmodel")]
#[command(about = "Parse and compose FHIR XML against StructureDefinitions")]
#[command(version)]
struct Cli {
    /// Directory of StructureDefinition JSON files (single resources or Bundles)
    #[arg(short, long, global = true, default_value = "definitions")]
    definitions: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    None,
    Quick,
    Everything,
}

#[cfg(feature = "cli")]
impl From<Policy> for ValidationPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::None => ValidationPolicy::None,
            Policy::Quick => ValidationPolicy::Quick,
            Policy::Everything => ValidationPolicy::Everything,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Parse a document, print its diagnostics and the composed result
    Parse {
        /// Path to the XML document
        #[arg(short, long)]
        input: PathBuf,
        /// Validation policy
        #[arg(short, long, value_enum, default_value = "everything")]
        policy: Policy,
        /// Pretty-print the composed output
        #[arg(long)]
        pretty: bool,
        /// Bind the root element to this type instead of its name
        #[arg(long)]
        as_type: Option<String>,
    },
    /// Parse, compose and parse again, then compare the two trees
    Roundtrip {
        /// Path to the XML document
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let parser = load_parser(&cli.definitions)?;

    match cli.command {
        Commands::Parse {
            input,
            policy,
            pretty,
            as_type,
        } => {
            parse_document(&parser, &input, policy.into(), pretty, as_type.as_deref())?;
        }
        Commands::Roundtrip { input } => {
            roundtrip(&parser, &input)?;
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn load_parser(definitions: &Path) -> std::result::Result<XmlParser, Box<dyn std::error::Error>> {
    let mut repository = MemoryRepository::new();
    let count = repository.load_directory(definitions)?;
    tracing::info!("Loaded {} definitions from {}", count, definitions.display());
    Ok(XmlParser::new(Arc::new(repository)))
}

#[cfg(feature = "cli")]
fn parse_document(
    parser: &XmlParser,
    input: &Path,
    policy: ValidationPolicy,
    pretty: bool,
    as_type: Option<&str>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read(input)?;
    let config = ParserConfig::with_policy(policy);
    let outcome = match as_type {
        Some(type_name) => parser.parse_as(&content, type_name, &config)?,
        None => parser.parse(&content, &config)?,
    };

    if outcome.diagnostics.is_empty() {
        eprintln!("✅ No issues found");
    } else {
        eprintln!("Found {} issues:\n", outcome.diagnostics.len());
        for diagnostic in &outcome.diagnostics {
            eprintln!("  {diagnostic}");
        }
    }

    match outcome.element {
        Some(element) => {
            let style = if pretty {
                OutputStyle::Pretty
            } else {
                OutputStyle::Normal
            };
            println!("{}", parser.compose_to_string(&element, style, &config)?);
        }
        None => {
            eprintln!("❌ The document could not be read");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn roundtrip(parser: &XmlParser, input: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read(input)?;
    let config = ParserConfig::default();

    let Some(first) = parser.parse(&content, &config)?.element else {
        eprintln!("❌ The document could not be read");
        std::process::exit(1);
    };
    let composed = parser.compose_to_string(&first, OutputStyle::Normal, &config)?;
    let Some(second) = parser.parse(composed.as_bytes(), &config)?.element else {
        eprintln!("❌ The composed document could not be read back");
        std::process::exit(1);
    };

    if first.content_equals(&second) {
        println!("✅ Round trip preserved {}", first.name);
    } else {
        println!("❌ Round trip changed the content of {}", first.name);
        println!("{composed}");
        std::process::exit(2);
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Please compile with --features cli");
    std::process::exit(1);
}
