use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use miette::{Context as _, IntoDiagnostic as _, Result};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};
use wiring_compiler::{
    Compiler, WireOptions, WireOrder,
    backend::{Backend as _, CppEmitter, DotBackend},
};
use wiring_manifest::{Catalog, ComponentSchema, Document, Stage};

#[derive(Parser)]
#[command(name = "wiring")]
#[command(version)]
#[command(about = "Validate component configurations and emit their wiring code")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv, -vvvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Compile(CompileArgs),
    Check(CheckArgs),
    Schema(SchemaArgs),
}

#[derive(Args)]
struct CompileArgs {
    /// Select the emitted output.
    #[arg(long = "emit", value_enum, default_value_t = EmitKind::Cpp)]
    emit: EmitKind,

    #[command(flatten)]
    order: OrderArg,

    /// Write the output to a file instead of stdout.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Configuration file to compile.
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    order: OrderArg,

    /// Configuration file to check.
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
}

#[derive(Args)]
struct SchemaArgs {
    /// Print the catalog as JSON.
    #[arg(long = "json")]
    json: bool,
}

#[derive(Args)]
struct OrderArg {
    /// Order in which components are constructed.
    #[arg(long = "order", value_enum, default_value_t = OrderKind::Dependency)]
    order: OrderKind,
}

impl OrderArg {
    fn wire_options(&self) -> WireOptions {
        let order = match self.order {
            OrderKind::Dependency => WireOrder::Dependency,
            OrderKind::Declared => WireOrder::Declared,
        };
        WireOptions::builder().order(order).build()
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmitKind {
    Cpp,
    Dot,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderKind {
    Dependency,
    Declared,
}

fn main() -> Result<()> {
    miette::set_panic_hook();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Compile(args) => compile(args),
        Command::Check(args) => check(args),
        Command::Schema(args) => schema(args),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().into_diagnostic()?
    } else {
        let wiring_level = match verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("error,wiring={wiring_level},wiring_={wiring_level}"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .with(ErrorLayer::default())
        .init();

    Ok(())
}

fn load(path: &Path, catalog: &Catalog) -> Result<Document> {
    let source = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read `{}`", path.display()))?;
    let document = Document::parse_named(path.display().to_string(), Arc::from(source), catalog)?;
    Ok(document)
}

fn compile(args: CompileArgs) -> Result<()> {
    let compiler = Compiler::default();
    let document = load(&args.config, compiler.catalog())?;
    let opts = args.order.wire_options();

    let artifact = match args.emit {
        EmitKind::Cpp => {
            let mut cpp = CppEmitter::new();
            compiler
                .wire(&document, &opts, &mut cpp)
                .wrap_err("compile failed")?;
            cpp.into_source()
        }
        EmitKind::Dot => {
            let scenario = compiler
                .check(&document, &opts)
                .wrap_err("compile failed")?;
            DotBackend.emit(&scenario)?
        }
    };

    match args.output {
        Some(path) => fs::write(&path, artifact)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write `{}`", path.display())),
        None => {
            print!("{artifact}");
            Ok(())
        }
    }
}

fn check(args: CheckArgs) -> Result<()> {
    let compiler = Compiler::default();
    let document = load(&args.config, compiler.catalog())?;

    let scenario = compiler
        .check(&document, &args.order.wire_options())
        .wrap_err("check failed")?;

    for (index, component) in scenario.components().iter().enumerate() {
        println!(
            "{:>3}  {}  {}",
            index + 1,
            component.id,
            component.handle.class()
        );
    }
    Ok(())
}

fn schema(args: SchemaArgs) -> Result<()> {
    let catalog = Catalog::builtin();
    let schemas: Vec<&ComponentSchema> = catalog.schemas().collect();

    if args.json {
        let json = serde_json::to_string_pretty(&schemas).into_diagnostic()?;
        println!("{json}");
        return Ok(());
    }

    for schema in schemas {
        print!("{}  {}", schema.domain, schema.qualified_class());
        if schema.multi {
            print!("  (list)");
        }
        println!();
        if !schema.platforms.is_empty() {
            println!("    platform: {}", schema.platforms.join(" | "));
        }
        if !schema.dependencies.is_empty() {
            println!("    depends on: {}", schema.dependencies.join(", "));
        }
        for option in schema.options() {
            let presence = if option.is_required() {
                "required"
            } else {
                "optional"
            };
            let stage = match option.stage {
                Stage::Constructor => "constructor".to_string(),
                Stage::Setter(setter) => format!("{setter}()"),
                Stage::Trigger(getter) => format!("{getter}()"),
            };
            println!(
                "  {:<16}{:<10}{:<40}{stage}",
                option.name,
                presence,
                option.kind.to_string()
            );
        }
    }
    Ok(())
}
