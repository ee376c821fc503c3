//! # restbind-routes CLI Tool
//!
//! Print the route table an interface descriptor resolves to, or its OpenAPI document.

use clap::{Parser, ValueEnum};
use restbind::{BindingConfig, Direction, InterfaceDescriptor, NamingStyle, RouteTable};
use std::fs;

/// Command-line arguments for the restbind-routes tool
#[derive(Parser)]
#[command(name = "restbind-routes")]
#[command(about = "Resolve an interface descriptor into HTTP routes")]
#[command(version = "0.1.0")]
struct Args {
    /// Path to the JSON interface descriptor
    descriptor: String,

    /// Naming style for inferred segments (lower_snake or upper_underscore)
    #[arg(short, long)]
    style: Option<String>,

    /// Root path, overriding the descriptor's own
    #[arg(short, long)]
    root: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Openapi,
}

fn main() {
    let args = Args::parse();

    match run(&args) {
        Ok(rendered) => match &args.output {
            Some(path) => {
                if let Err(e) = fs::write(path, rendered) {
                    eprintln!("Error writing {}: {}", path, e);
                    std::process::exit(1);
                }
                println!("Routes written to: {}", path);
            }
            None => println!("{}", rendered),
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(&args.descriptor)?;
    let descriptor = InterfaceDescriptor::from_json(&json)?;
    let table = build_table(&descriptor, args.style.as_deref(), args.root.as_deref())?;
    render(&table, args.format)
}

fn build_table(
    descriptor: &InterfaceDescriptor,
    style: Option<&str>,
    root: Option<&str>,
) -> Result<RouteTable, Box<dyn std::error::Error>> {
    let mut config = BindingConfig::new();
    if let Some(style) = style {
        config = config.naming_style(style.parse::<NamingStyle>()?);
    }
    if let Some(root) = root {
        config = config.root(root);
    }
    Ok(RouteTable::build(descriptor, &config)?)
}

fn render(table: &RouteTable, format: Format) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        Format::Text => render_text(table),
        Format::Json => serde_json::to_string_pretty(&table.describe())?,
        Format::Openapi => table.openapi(table.interface(), "0.1.0").to_json_pretty()?,
    })
}

/// One route per line, bindings indented beneath it
fn render_text(table: &RouteTable) -> String {
    let mut out = String::new();
    for route in table.routes() {
        out.push_str(&format!(
            "{:<7} {:<40} {} -> {}\n",
            route.verb.as_str(),
            route.pattern.to_string(),
            route.qualified_name,
            route.returns()
        ));
        for binding in &route.bindings {
            let direction = match binding.direction {
                Direction::In => String::new(),
                other => format!(" ({})", other),
            };
            out.push_str(&format!(
                "        {:<20} {}{}\n",
                binding.parameter, binding.location, direction
            ));
        }
        for injection in &route.injections {
            out.push_str(&format!(
                "        {:<20} injected by `{}`\n",
                injection.parameter, injection.hook
            ));
        }
    }
    out.trim_end().to_string()
}
