use pulse_core::buildinfo;

mod agent;
mod alloc_stats;
mod config;
mod reporter;
mod sampler;
mod storage;
mod transport;

#[global_allocator]
static ALLOC: alloc_stats::CountingAllocator = alloc_stats::CountingAllocator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    buildinfo::print_build_info();

    let config = config::AgentConfig::load()?;
    pulse_core::init_observability("info")?;

    agent::Agent::new(config).run().await?;

    Ok(())
}
