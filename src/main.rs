use anyhow::{Context as _, Result};
use clap::Parser as ClapParser;
use serde_json::json;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use structviz::analyzer::{Context, Options, PackMode};
use structviz::config::find_catalog;
use structviz::error::Error;
use structviz::render::render_layout;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(about = "Shows the memory layout of C struct declarations")]
struct Args {
    /// Header or source file to read. Reads stdin when omitted.
    input_file: Option<PathBuf>,

    /// Pack value. 0 selects natural alignment. Defaults to the first
    /// `#pragma pack(N)` in the input.
    #[arg(short, long)]
    pack: Option<String>,

    /// Struct to lay out. Defaults to the first one declared.
    #[arg(short, long = "struct")]
    struct_name: Option<String>,

    /// JSON type catalog to use instead of the built-in one.
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    json: bool,

    /// Lay out every struct in the input.
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Print the input without comments before the layout.
    #[arg(long, default_value_t = false)]
    display: bool,

    /// Print the catalog entry this struct would add as a reusable type.
    #[arg(long, default_value_t = false)]
    register: bool,

    /// Print the type catalog and exit.
    #[arg(long, default_value_t = false)]
    list_types: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read stdin")?;
            Ok(source)
        }
    }
}

fn error_json(error: &Error) -> serde_json::Value {
    match error {
        Error::UnknownType(name) => json!({ "unknown_type": name }),
        _ => json!({ "error": error.to_string() }),
    }
}

fn report_error(error: &Error, as_json: bool) {
    if as_json {
        println!("{}", error_json(error));
    } else {
        eprintln!("error: {error}");
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let catalog = find_catalog(args.catalog.as_deref())?;

    if args.list_types {
        println!("{}", catalog.to_json_string()?);
        return Ok(ExitCode::SUCCESS);
    }

    let source = read_input(args.input_file.as_ref())?;
    let pack = args
        .pack
        .as_deref()
        .map(PackMode::from_arg)
        .unwrap_or_default();

    let mut context = Context::new(catalog);

    if args.all {
        let results = match context.analyze_all(&source, pack) {
            Ok(results) => results,
            Err(error) => {
                report_error(&error, args.json);
                return Ok(ExitCode::FAILURE);
            }
        };

        let pack_value = pack.resolve(&source);
        let failed = results.iter().any(|(_, layout)| layout.is_err());

        if args.json {
            let values = results
                .iter()
                .map(|(name, layout)| match layout {
                    Ok(layout) => json!({ "struct_name": name, "layout": layout }),
                    Err(error) => json!({ "struct_name": name, "layout": error_json(error) }),
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&values)?);
        } else {
            for (name, layout) in &results {
                match layout {
                    Ok(layout) => println!("{}", render_layout(name, layout, pack_value)),
                    Err(error) => eprintln!("error: struct {name}: {error}\n"),
                }
            }
        }

        return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    let options = Options {
        struct_name: args.struct_name,
        pack,
        register: args.register,
    };

    let output = match context.analyze(&source, &options) {
        Ok(output) => output,
        Err(error) => {
            report_error(&error, args.json);
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.display && !args.json {
        println!("{}\n", output.display);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!(
            "{}",
            render_layout(&output.struct_name, &output.layout, output.pack_value)
        );

        if let Some(info) = output.registered {
            let mut entry = serde_json::Map::new();
            entry.insert(output.struct_name.clone(), serde_json::to_value(info)?);
            println!("catalog entry: {}", serde_json::Value::Object(entry));
        }
    }

    Ok(ExitCode::SUCCESS)
}
