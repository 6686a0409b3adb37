//! Hookmap CLI - map webhook payloads onto flat templates
//!
//! # Main Commands
//!
//! ```bash
//! hookmap process batch.json              # Map, transform and validate a batch
//! hookmap export batch.json --out-dir out # Same, written as data/validation sheets
//! hookmap serve                           # Start HTTP server (port 3000)
//! hookmap template list                   # Manage templates
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! hookmap resolve data.json records.0.PriceArea  # Evaluate a source path
//! hookmap extract response.json --layout 1-single # Split a webhook response into rows
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use hookmap::{
    config::Settings,
    export::write_workbook,
    models::{BatchInput, ReferenceData, ValidationMode},
    parser::{load_json_file, parse_batch_input, rows_from_response, RowLayout},
    path::display_value,
    registry::FileCatalog,
    resolve,
    server::{start_server, AppState},
    transform::process_with_template,
    TemplateRegistry,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hookmap")]
#[command(about = "Map nested webhook payloads onto flat, validated template records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Template field rules
    Template,
    /// Business-field rules used while editing mappings
    Preview,
}

impl From<ModeArg> for ValidationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Template => ValidationMode::Template,
            ModeArg::Preview => ValidationMode::MappingPreview,
        }
    }
}

/// Overrides applied on top of a batch file.
#[derive(clap::Args)]
struct BatchArgs {
    /// Batch JSON file ({ rows, templateName, fieldMappings?, ... })
    input: PathBuf,

    /// Template name (overrides the batch file)
    #[arg(short, long)]
    template: Option<String>,

    /// Reference data JSON file (overrides the batch file and REFERENCE_DATA_FILE)
    #[arg(long)]
    refs: Option<PathBuf>,

    /// Leave invalid records out of the output
    #[arg(long)]
    drop_invalid: bool,

    /// Validation rules to apply
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Map, transform and validate a batch; prints the result as JSON
    Process {
        #[command(flatten)]
        batch: BatchArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Process a batch and write the data and validation sheets
    Export {
        #[command(flatten)]
        batch: BatchArgs,

        /// Directory for the sheets
        #[arg(long)]
        out_dir: PathBuf,

        /// File name stem (default: input file stem)
        #[arg(long)]
        stem: Option<String>,
    },

    /// Resolve a source path against a JSON document
    Resolve {
        /// JSON file
        data: PathBuf,
        /// Path such as records.0.PriceArea or records[*].PriceArea
        path: String,
    },

    /// Extract rows from a webhook response
    Extract {
        /// Webhook response JSON file
        response: PathBuf,

        /// Template type: 1-single treats the response as one row
        #[arg(short, long, default_value = "2-multiple")]
        layout: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: HOOKMAP_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List built-in and stored templates
    List,

    /// Import a template JSON file into the template store
    Import {
        /// Template JSON file to import
        file: PathBuf,
        /// Name for the template (default: file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show a template
    Show {
        name: String,
    },

    /// Delete a stored template
    Delete {
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match Settings::from_env() {
        Ok(settings) => run(cli.command, settings).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("[error] {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Process { batch, output } => cmd_process(&batch, output.as_deref(), &settings),

        Commands::Export {
            batch,
            out_dir,
            stem,
        } => cmd_export(&batch, &out_dir, stem.as_deref(), &settings),

        Commands::Resolve { data, path } => cmd_resolve(&data, &path),

        Commands::Extract {
            response,
            layout,
            output,
        } => cmd_extract(&response, &layout, output.as_deref()),

        Commands::Serve { port } => cmd_serve(port, settings).await,

        Commands::Template { action } => cmd_template(action, &settings),
    }
}

fn load_batch(args: &BatchArgs, settings: &Settings) -> Result<BatchInput, Box<dyn std::error::Error>> {
    let mut value = load_json_file(&args.input)?;

    if let (Some(name), Some(object)) = (&args.template, value.as_object_mut()) {
        object.remove("envizi_template");
        object.remove("template_name");
        object.insert("templateName".into(), Value::String(name.clone()));
    }

    let mut input = parse_batch_input(value)?;

    if let Some(ref refs) = args.refs {
        input.references = serde_json::from_value::<ReferenceData>(load_json_file(refs)?)?;
    } else if input.references.is_empty() {
        input.references = settings.load_references()?;
    }
    if args.drop_invalid {
        input.drop_invalid_records = true;
    }
    if let Some(mode) = args.mode {
        input.validation_mode = Some(mode.into());
    }

    Ok(input)
}

fn cmd_process(
    args: &BatchArgs,
    output: Option<&Path>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Processing: {}", args.input.display());

    let input = load_batch(args, settings)?;
    let template = TemplateRegistry::with_dir(&settings.templates_dir).get(&input.template_name)?;
    let result = process_with_template(&input, &template)?;

    print_errors(&result.validation_errors);

    let json = serde_json::to_string_pretty(&result)?;
    write_output(&json, output)
}

fn cmd_export(
    args: &BatchArgs,
    out_dir: &Path,
    stem: Option<&str>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = load_batch(args, settings)?;
    let template = TemplateRegistry::with_dir(&settings.templates_dir).get(&input.template_name)?;
    let result = process_with_template(&input, &template)?;

    let stem = stem
        .map(str::to_string)
        .or_else(|| {
            args.input
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "batch".to_string());

    for path in write_workbook(out_dir, &stem, &template, &result)? {
        eprintln!("Written: {}", path.display());
    }
    print_errors(&result.validation_errors);

    Ok(())
}

fn cmd_resolve(data: &Path, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value = load_json_file(data)?;
    println!("{}", display_value(&resolve(&value, path)));
    Ok(())
}

fn cmd_extract(
    response: &Path,
    layout: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = load_json_file(response)?;
    let layout: RowLayout = layout.parse()?;
    let rows = rows_from_response(&value, layout);
    eprintln!("Extracted {} rows", rows.len());

    let json = serde_json::to_string_pretty(&rows)?;
    write_output(&json, output)
}

async fn cmd_serve(port: Option<u16>, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let references = settings.load_references()?;
    let state = AppState::new(TemplateRegistry::with_dir(&settings.templates_dir), references);
    start_server(port.unwrap_or(settings.port), state).await
}

fn cmd_template(action: TemplateAction, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = TemplateRegistry::with_dir(&settings.templates_dir);
    let store = FileCatalog::new(&settings.templates_dir);

    match action {
        TemplateAction::List => {
            let templates = registry.list()?;
            eprintln!("Templates ({}):\n", templates.len());
            for t in templates {
                println!("  {} (v{})", t.name, t.version);
                if let Some(ref description) = t.description {
                    println!("     {}", description);
                }
                println!("     Fields: {}", t.fields.len());
            }
        }

        TemplateAction::Import { file, name } => {
            eprintln!("Importing template from: {}", file.display());
            let template = store.import(&file, name.as_deref())?;
            eprintln!(
                "Template {} saved to {}",
                template.name,
                store.dir().display()
            );
        }

        TemplateAction::Show { name } => {
            let template = registry.get(&name)?;
            println!("{}", serde_json::to_string_pretty(&template)?);
        }

        TemplateAction::Delete { name } => {
            store.delete(&name)?;
            eprintln!("Template deleted: {}", name);
        }
    }

    Ok(())
}

fn print_errors(errors: &hookmap::ValidationErrorReport) {
    for (index, messages) in errors.iter().take(5) {
        eprintln!("   Record {}:", index);
        for message in messages.iter().take(3) {
            eprintln!("     - {}", message);
        }
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
