use clap::Parser;
use distributed_queue::config::{ClusterConfig, MAX_BACKUP_COUNT};
use distributed_queue::container::listener::{ItemEvent, ListenerRegistry};
use distributed_queue::engine::node::Node;
use distributed_queue::invocation::handlers;
use distributed_queue::invocation::transport::{HttpTransport, Transport};
use distributed_queue::membership::types::{Member, MemberId};
use distributed_queue::partition::router::PartitionRouter;
use distributed_queue::partition::table::PartitionTable;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "queue-node", about = "Runs one member of a distributed queue cluster")]
struct Args {
    /// Address the HTTP endpoints listen on.
    #[arg(long)]
    bind: SocketAddr,

    /// This member's id; must appear in the --member list.
    #[arg(long)]
    member_id: String,

    /// Cluster member as id=host:port. Repeat for every member, this one included.
    #[arg(long = "member", required = true)]
    members: Vec<Member>,

    /// JSON cluster configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Queue names whose item events are logged.
    #[arg(long = "log-events")]
    log_events: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ClusterConfig::load(path)?,
        None => ClusterConfig::default(),
    };
    let config = Arc::new(config);

    let member_id = MemberId(args.member_id.clone());
    if !args.members.iter().any(|member| member.id == member_id) {
        return Err(anyhow::anyhow!(
            "--member-id {} is not in the --member list",
            member_id
        ));
    }

    tracing::info!("Starting member {} on {}", member_id, args.bind);
    for member in &args.members {
        tracing::info!("  - {} at {}", member.id, member.addr);
    }

    // 1. Static topology:
    let router = Arc::new(PartitionRouter::new(config.partition_count));
    let ids: Vec<MemberId> = args.members.iter().map(|member| member.id.clone()).collect();
    router.publish(PartitionTable::round_robin(
        1,
        config.partition_count,
        &ids,
        MAX_BACKUP_COUNT,
    ))?;

    // 2. Member:
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&args.members, 3));
    let listeners = ListenerRegistry::new();
    for name in &args.log_events {
        listeners.add(
            name,
            Arc::new(|event: &ItemEvent| -> anyhow::Result<()> {
                tracing::info!(
                    "{:?} on {} (member {})",
                    event.kind,
                    event.name,
                    event.member
                );
                Ok(())
            }),
            false,
        );
    }
    let node = Node::start(member_id, router.clone(), config.clone(), transport, listeners);

    // 3. Spawn stats reporter:
    let stats_router = router.clone();
    let stats_member = node.member_id().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));

        loop {
            interval.tick().await;
            let table = stats_router.snapshot();
            tracing::info!(
                "Partition table v{}: {} primary, {} backup partitions on {}",
                table.version(),
                table.primary_partitions_of(&stats_member).len(),
                table.backup_partitions_of(&stats_member).len(),
                stats_member
            );
        }
    });

    // 4. Start HTTP server:
    let app = handlers::router(node);

    tracing::info!("HTTP server listening on {}", args.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
