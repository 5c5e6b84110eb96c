use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use xid::{CUSTOM_EPOCH, DefaultXid, Xid};
use xid_coord::{DEFAULT_NAMESPACE, Registration, SessionOptions};

/// Runtime configuration for the `xid-node` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is honored).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "xid-node",
    version,
    about = "Allocates node ids through a coordinator and mints xids from them"
)]
pub struct CliArgs {
    /// Namespace all allocation keys live under.
    ///
    /// Environment variable: `XID_NAMESPACE`
    #[arg(long, env = "XID_NAMESPACE", default_value_t = String::from(DEFAULT_NAMESPACE))]
    pub namespace: String,

    /// Logical service name. Processes sharing it draw from one node space.
    ///
    /// Environment variable: `XID_KEY`
    #[arg(long, env = "XID_KEY", default_value_t = String::from("default"))]
    pub key: String,

    /// Number of simulated processes, each allocating its own node id.
    ///
    /// Environment variable: `XID_NODES`
    #[arg(long, env = "XID_NODES", default_value_t = 4)]
    pub nodes: usize,

    /// Ids minted per node.
    ///
    /// Environment variable: `XID_COUNT`
    #[arg(long, env = "XID_COUNT", default_value_t = 5)]
    pub count: usize,

    /// TTL of each registration lease, in seconds.
    ///
    /// Environment variable: `XID_LEASE_TTL_SECS`
    #[arg(long, env = "XID_LEASE_TTL_SECS", default_value_t = 120)]
    pub lease_ttl_secs: u64,

    /// Bind each registration to its allocation session (ephemeral-node
    /// style) instead of a lease of its own.
    ///
    /// Environment variable: `XID_SESSION_BOUND`
    #[arg(long, env = "XID_SESSION_BOUND", default_value_t = false)]
    pub session_bound: bool,

    /// TTL of the coordination session, in seconds.
    ///
    /// Environment variable: `XID_SESSION_TTL_SECS`
    #[arg(long, env = "XID_SESSION_TTL_SECS", default_value_t = 60)]
    pub session_ttl_secs: u64,

    /// Upper bound on a single allocation, in seconds.
    ///
    /// Environment variable: `XID_ALLOCATE_TIMEOUT_SECS`
    #[arg(long, env = "XID_ALLOCATE_TIMEOUT_SECS", default_value_t = 10)]
    pub allocate_timeout_secs: u64,

    /// Encoder epoch, in seconds since 1970-01-01 UTC. Defaults to
    /// 2020-01-01.
    ///
    /// Environment variable: `XID_EPOCH_SECS`
    #[arg(long, env = "XID_EPOCH_SECS", default_value_t = CUSTOM_EPOCH.as_secs())]
    pub epoch_secs: u64,

    /// Keep the registrations alive until Ctrl+C or SIGTERM.
    #[arg(long, default_value_t = false)]
    pub hold: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub namespace: String,
    pub key: String,
    pub nodes: usize,
    pub count: usize,
    pub lease_ttl: Duration,
    pub session: SessionOptions,
    pub registration: Registration,
    pub allocate_timeout: Duration,
    pub epoch: Duration,
    pub hold: bool,
}

impl TryFrom<CliArgs> for NodeConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let node_space = DefaultXid::max_node_id() as usize + 1;

        if args.key.is_empty() {
            bail!("XID_KEY must not be empty");
        }

        if args.nodes == 0 {
            bail!("XID_NODES must be greater than 0");
        }

        if args.nodes > node_space {
            bail!(
                "XID_NODES ({}) exceeds the node id space (max = {})",
                args.nodes,
                node_space
            );
        }

        if args.lease_ttl_secs == 0 {
            bail!("XID_LEASE_TTL_SECS must be greater than 0");
        }

        if args.session_ttl_secs == 0 {
            bail!("XID_SESSION_TTL_SECS must be greater than 0");
        }

        if args.allocate_timeout_secs == 0 {
            bail!("XID_ALLOCATE_TIMEOUT_SECS must be greater than 0");
        }

        Ok(Self {
            namespace: args.namespace,
            key: args.key,
            nodes: args.nodes,
            count: args.count,
            lease_ttl: Duration::from_secs(args.lease_ttl_secs),
            session: SessionOptions::new(Duration::from_secs(args.session_ttl_secs)),
            registration: if args.session_bound {
                Registration::Session
            } else {
                Registration::Lease
            },
            allocate_timeout: Duration::from_secs(args.allocate_timeout_secs),
            epoch: Duration::from_secs(args.epoch_secs),
            hold: args.hold,
        })
    }
}
