//! Shared harness for specs

pub use flow_core::{JobId, JobStatus, NodeStatus};
pub use similar_asserts::assert_eq;
pub use std::time::Duration;

use flow_adapters::{AgentAdapter, FileJobStore, ShellAgent, TomlDefinitions};
use flow_core::Job;
use flow_daemon::{Config, Daemon, DaemonService};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Upper bound on how long a spec waits for a job
pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(10);

const POLL: Duration = Duration::from_millis(10);

/// A state directory with flow files and, once started, a daemon
pub struct Project {
    dir: TempDir,
    daemon: Option<Daemon>,
}

impl Project {
    pub fn empty() -> Self {
        Self { dir: TempDir::new().unwrap(), daemon: None }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `flows/<name>.toml`
    pub fn flow(&self, name: &str, content: &str) -> &Self {
        let flows = self.path().join("flows");
        std::fs::create_dir_all(&flows).unwrap();
        std::fs::write(flows.join(format!("{name}.toml")), content).unwrap();
        self
    }

    pub fn config(&self) -> Config {
        let mut config = Config::new(self.path());
        config.drain_timeout = Duration::from_secs(2);
        config
    }

    /// Start with the shell agent and the file store
    pub fn start(&mut self) -> &Daemon {
        let config = self.config();
        let agent = ShellAgent::new(&config.logs_path);
        self.start_with(config, agent)
    }

    pub fn start_with<A: AgentAdapter>(&mut self, config: Config, agent: A) -> &Daemon {
        let definitions = Arc::new(TomlDefinitions::new(&config.flows_dir));
        let store = FileJobStore::new(&config.state_dir);
        let daemon = Daemon::start(config, definitions, store, agent).unwrap();
        self.daemon.insert(daemon)
    }

    pub fn service(&self) -> &Arc<DaemonService> {
        match &self.daemon {
            Some(daemon) => daemon.service(),
            None => panic!("daemon not started"),
        }
    }

    pub fn store(&self) -> FileJobStore {
        FileJobStore::new(self.path())
    }

    /// Create a job and wait for it to finish
    pub async fn run(&self, flow: &str) -> Job {
        let job = self.service().create_job(flow).await.unwrap();
        self.wait(job.id).await
    }

    pub async fn wait(&self, id: JobId) -> Job {
        let daemon = self.daemon.as_ref().unwrap();
        tokio::time::timeout(SPEC_WAIT_MAX, daemon.wait_finished(id, POLL))
            .await
            .unwrap_or_else(|_| panic!("job {id} did not finish in time"))
            .unwrap()
    }

    /// `(path, status)` of every scheduled node, in tree order
    pub fn statuses(&self, flow: &str, build_number: u32) -> Vec<(String, NodeStatus)> {
        self.service()
            .list_node_results(flow, build_number)
            .unwrap()
            .into_iter()
            .map(|r| (r.path.to_string(), r.status))
            .collect()
    }

    pub async fn shutdown(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            daemon.shutdown().await;
        }
    }
}

/// Expected `(path, status)` rows
pub fn rows(expected: &[(&str, NodeStatus)]) -> Vec<(String, NodeStatus)> {
    expected.iter().map(|(p, s)| (p.to_string(), *s)).collect()
}
