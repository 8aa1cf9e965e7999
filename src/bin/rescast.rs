//! Rescast CLI
//!
//! Emits JSON Schema and OpenAPI documents from declaration documents, and
//! serializes JSON objects through declared resources.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use rescast::{
    load_declarations_auto, load_json_auto, load_json_str, Context, Data, Declarations, Resource,
    SchemaOptions, Selection,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rescast")]
#[command(about = "Serialize objects and emit schemas from resource declarations")]
#[command(version)]
struct Cli {
    /// Log level for diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the JSON Schema of one resource
    Schema {
        /// Declaration document: file path or URL (http:// or https://)
        declarations: String,

        /// Resource to emit
        #[arg(long, short)]
        resource: String,

        /// Derive the resource first with this selection (JSON, e.g. '["id", {"items": ["sku"]}]')
        #[arg(long)]
        select: Option<String>,

        /// Emit OpenAPI 3.0 flavored schema (nullable: true)
        #[arg(long)]
        openapi: bool,

        /// Emit nested resources as $ref
        #[arg(long)]
        use_ref: bool,

        /// Emit a standalone document with $schema and $defs
        #[arg(long, conflicts_with = "openapi")]
        document: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Emit the OpenAPI document for all declared operations
    Openapi {
        /// Declaration document: file path or URL (http:// or https://)
        declarations: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Emit nested resources as components/schemas references
        #[arg(long)]
        use_refs: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Serialize a JSON object, or array of objects, through a resource
    Serialize {
        /// Declaration document: file path or URL (http:// or https://)
        declarations: String,

        /// Input JSON: file path or URL
        input: String,

        /// Resource to serialize through
        #[arg(long, short)]
        resource: String,

        /// Selection (JSON, e.g. '["*", "image_url"]')
        #[arg(long)]
        select: Option<String>,

        /// Context object passed to computed fields (JSON)
        #[arg(long)]
        context: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Schema {
            declarations,
            resource,
            select,
            openapi,
            use_ref,
            document,
            output,
            pretty,
        } => run_schema(SchemaArgs {
            declarations,
            resource,
            select,
            options: SchemaOptions::new().openapi(openapi).use_ref(use_ref),
            document,
            output,
            pretty,
        }),

        Commands::Openapi {
            declarations,
            format,
            use_refs,
            output,
            pretty,
        } => run_openapi(&declarations, format, use_refs, output, pretty),

        Commands::Serialize {
            declarations,
            input,
            resource,
            select,
            context,
            output,
            pretty,
        } => run_serialize(SerializeArgs {
            declarations,
            input,
            resource,
            select,
            context,
            output,
            pretty,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct SchemaArgs {
    declarations: String,
    resource: String,
    select: Option<String>,
    options: SchemaOptions,
    document: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_schema(args: SchemaArgs) -> Result<(), u8> {
    let declarations = load(&args.declarations)?;
    let mut resource = find_resource(&declarations, &args.resource)?;

    if let Some(spec) = &args.select {
        let selection = parse_selection(spec)?;
        resource = resource.select(&selection).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
    }

    let schema = if args.document {
        resource.to_json_schema_document(&args.options)
    } else {
        resource.to_schema(&args.options)
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&to_json(&schema, args.pretty)?, args.output)
}

fn run_openapi(
    source: &str,
    format: Format,
    use_refs: bool,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let declarations = load(source)?;
    let schema = declarations.into_schema();
    let schema = if use_refs { schema.use_refs(true) } else { schema };

    let document = schema.to_openapi().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let rendered = match format {
        Format::Json => to_json(&document, pretty)?,
        Format::Yaml => serde_yaml::to_string(&document).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?,
    };

    write_output(&rendered, output)
}

struct SerializeArgs {
    declarations: String,
    input: String,
    resource: String,
    select: Option<String>,
    context: Option<String>,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_serialize(args: SerializeArgs) -> Result<(), u8> {
    let declarations = load(&args.declarations)?;
    let resource = find_resource(&declarations, &args.resource)?;

    let selection = match &args.select {
        Some(spec) => parse_selection(spec)?,
        None => Selection::wildcard(),
    };

    let context = match &args.context {
        Some(raw) => match parse_json_arg(raw, "--context")? {
            Value::Object(map) => Context::from(map),
            _ => {
                eprintln!("Error: --context must be a JSON object");
                return Err(2);
            }
        },
        None => Context::new(),
    };

    let input = load_json_auto(&args.input).map_err(|e| {
        eprintln!("Error loading input: {}", e);
        e.exit_code() as u8
    })?;

    let value = resource
        .serialize_with(Data::from_json(&input), &context, &selection)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    write_output(&to_json(&value, args.pretty)?, args.output)
}

fn load(source: &str) -> Result<Declarations, u8> {
    load_declarations_auto(source).map_err(|e| {
        eprintln!("Error loading declarations: {}", e);
        e.exit_code() as u8
    })
}

fn find_resource(declarations: &Declarations, name: &str) -> Result<Resource, u8> {
    declarations.resource(name).cloned().ok_or_else(|| {
        eprintln!("Error: unknown resource `{}`", name);
        2u8
    })
}

fn parse_json_arg(raw: &str, flag: &str) -> Result<Value, u8> {
    load_json_str(raw).map_err(|e| {
        eprintln!("Error parsing {}: {}", flag, e);
        e.exit_code() as u8
    })
}

fn parse_selection(raw: &str) -> Result<Selection, u8> {
    let spec = parse_json_arg(raw, "--select")?;
    Selection::from_json(&spec).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn to_json(value: &Value, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn write_output(rendered: &str, output: Option<PathBuf>) -> Result<(), u8> {
    match output {
        Some(path) => {
            std::fs::write(&path, rendered).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", rendered);
        }
    }
    Ok(())
}
