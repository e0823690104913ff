//! Progression resolver command-line driver.
//!
//! Usage:
//!   progression --content content.json --build build.json [--steps]

mod driver;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays clean JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = driver::parse_config_from_args(&args);
    if let Err(e) = driver::run(config).await {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn print_help() {
    println!("Progression - resolve a character build against leveling tables");
    println!();
    println!("USAGE:");
    println!("  progression --content <FILE> --build <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --content <FILE>    Content bundle (class tables, subclasses, quota rows)");
    println!("  --build <FILE>      Build to resolve: classes and selections");
    println!("  --steps             Also print pick steps for each class");
    println!();
    println!("ENVIRONMENT:");
    println!("  RUST_LOG              Log filter (default: info)");
    println!("  PROGRESSION_CASTERS   Comma-separated class-wide caster list");
    println!();
    println!("EXAMPLES:");
    println!("  progression --content content.json --build wizard5.json");
    println!("  progression --content content.json --build multiclass.json --steps");
}
