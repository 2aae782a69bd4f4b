use anyhow::Result;
use clap::Parser;

use tailstream_agent::cli::AgentCli;
use tailstream_agent::logging;
use tailstream_agent::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AgentCli::parse();

    // 설정 계층: 기본값 -> 파일 -> 환경변수 -> CLI
    let config = orchestrator::load_config(&cli).await?;

    if cli.validate {
        println!(
            "configuration is valid ({} stream(s))",
            config.resolved_streams().len()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tailstream agent starting");

    if cli.stdin {
        let stream = orchestrator::stdin_stream(&config, &cli)?;
        orchestrator::run_stdin(&config, &stream).await?;
    } else {
        let mut agent = Orchestrator::build_from_config(config)?;
        agent.run().await?;
    }

    tracing::info!("tailstream agent shut down");
    Ok(())
}
