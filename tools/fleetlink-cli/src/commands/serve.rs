//! Serve Command - run the ingestion loop until Ctrl+C

use clap::Args;
use colored::Colorize;
use tokio::signal;

use crate::context::FleetContext;
use crate::error::CliResult;
use crate::output::table;

/// Subscribe to the fleet topics and persist every message
#[derive(Debug, Args)]
pub struct ServeCommand {}

impl ServeCommand {
    pub async fn execute(self, ctx: &FleetContext) -> CliResult<()> {
        ctx.start_ingestion();

        let [telemetry, commands] = ctx.topics.subscriptions();
        println!(
            "📡 Ingesting {} and {} from {}",
            telemetry.bold(),
            commands.bold(),
            ctx.mqtt.broker_key()
        );
        println!("{}", "Press Ctrl+C to stop".dimmed());

        signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        ctx.ingestion.shutdown().await;

        println!();
        println!("{}", table::format_stats_table(&ctx.ingestion.stats()));
        println!("{}", "✅ Stopped".green());
        Ok(())
    }
}
