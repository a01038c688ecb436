//! Thin CLI driver. The command frontend's lexing/parsing/validation/
//! execution lives in the `netcfg` library; this binary only discovers
//! input, prints results, and maps errors to an exit code — the parts
//! spec.md §1 calls out as external collaborators to the core.

use std::path::PathBuf;

use clap::Parser;
use netlink::Transactor;
use netcfg::executor::{Executor, Outcome};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "netcfg", about = "Declarative Linux network configuration")]
struct Cli {
    /// Config file to run; reads from stdin if omitted.
    file: Option<PathBuf>,

    /// Also print the connectivity and health analyzer reports for any
    /// bare listing command.
    #[arg(long)]
    analyze: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let source = match &cli.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };

    let commands = netcfg::load(&source)?;
    info!(count = commands.len(), "parsed commands");

    let tx = Transactor::open(libc::NETLINK_ROUTE)?;
    let mut executor = Executor::new(tx);

    let mut failed = false;
    for cmd in &commands {
        match executor.run(cmd) {
            Ok(Outcome::Applied) => println!("{} {}: ok", cmd.subject, cmd.verb),
            Ok(Outcome::AppliedWithWarnings(warnings)) => {
                println!("{} {}: ok (with warnings)", cmd.subject, cmd.verb);
                for w in warnings {
                    println!("  warning: {w}");
                }
            }
            Ok(Outcome::Snapshot(snapshot)) => {
                println!("{} interfaces, {} addresses, {} routes", snapshot.interfaces.len(), snapshot.addresses.len(), snapshot.routes.len());
                if cli.analyze {
                    for record in netcfg::analyzers::connectivity(&snapshot) {
                        println!("  [{}] {}", record.status_label, record.message);
                    }
                    for record in netcfg::analyzers::health(&snapshot) {
                        println!("  [{}] {}", record.status_label, record.message);
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "command failed");
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
