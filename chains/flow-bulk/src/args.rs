use crate::config::FlowBulkConfig;
use clap::Args;
use core_logic::FailurePolicy;

/// Flags shared by every job; each overrides the config file when given
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the TOML config
    #[arg(short, long, default_value = "config/flow-bulk.toml")]
    pub config: String,

    /// Flow network (mainnet, testnet, emulator)
    #[arg(long)]
    pub network: Option<String>,

    /// Signer alias from flow.json
    #[arg(long)]
    pub signer: Option<String>,

    /// Address of the signing account
    #[arg(long)]
    pub account: Option<String>,

    /// Proposal key index on the signing account
    #[arg(long)]
    pub key_index: Option<u32>,

    /// Access REST endpoint
    #[arg(long)]
    pub access_node: Option<String>,

    /// Items per transaction
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Maximum number of batch transactions to send
    #[arg(long)]
    pub max_batches: Option<usize>,

    /// Seconds between status checks
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Status checks before a transaction counts as expired
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Extra delay in seconds after a transaction is sealed
    #[arg(long)]
    pub post_seal_delay: Option<u64>,

    /// halt, resync-and-continue or prompt-operator
    #[arg(long)]
    pub failure_policy: Option<FailurePolicy>,

    /// Deliberate resubmissions after a transient submission error
    #[arg(long)]
    pub submit_retries: Option<u32>,

    /// Continue from the checkpoint of an earlier run
    #[arg(long, default_value = "false")]
    pub resume: bool,

    /// Print the batch plan and exit without sending anything
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Debug output in the log file, info on the console
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

impl RunArgs {
    /// Loads the config file (or defaults) and applies the flags on top
    pub fn load_config(&self) -> anyhow::Result<FlowBulkConfig> {
        let path = if std::path::Path::new(&self.config).exists() {
            self.config.clone()
        } else if self.config == "config/flow-bulk.toml"
            && std::path::Path::new("chains/flow-bulk/config/flow-bulk.toml").exists()
        {
            "chains/flow-bulk/config/flow-bulk.toml".to_string()
        } else {
            self.config.clone()
        };

        let mut config = FlowBulkConfig::load_or_default(&path)?;
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut FlowBulkConfig) {
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(signer) = &self.signer {
            config.signer = signer.clone();
        }
        if let Some(account) = &self.account {
            config.account = account.clone();
        }
        if let Some(key_index) = self.key_index {
            config.key_index = key_index;
        }
        if let Some(access_node) = &self.access_node {
            config.access_node = Some(access_node.clone());
        }

        let submission = &mut config.submission;
        if let Some(chunk_size) = self.chunk_size {
            submission.chunk_size = chunk_size;
        }
        if let Some(max_batches) = self.max_batches {
            submission.max_batches = max_batches;
        }
        if let Some(secs) = self.poll_interval {
            submission.poll_interval_ms = secs * 1000;
        }
        if let Some(attempts) = self.max_attempts {
            submission.max_poll_attempts = attempts;
        }
        if let Some(secs) = self.post_seal_delay {
            submission.post_confirm_delay_ms = secs * 1000;
        }
        if let Some(policy) = self.failure_policy {
            submission.failure_policy = policy;
        }
        if let Some(retries) = self.submit_retries {
            submission.submit_retries = retries;
        }
    }
}
