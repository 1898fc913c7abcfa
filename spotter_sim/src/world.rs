//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::identity::SimIdentity;
use crate::store::{MemoryStore, SessionStore};

use spotter_core::{ReportConfig, ReportError, ReportService};
use spotter_env::{SpotterContext, UserId};
use std::sync::{Arc, Mutex};

/// The report service type every simulated client runs.
pub type SimService = ReportService<SimContext, SessionStore<SimIdentity>, SimIdentity>;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of clients to spawn
    pub num_clients: usize,

    /// Engine configuration shared by every client
    pub report: ReportConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_clients: 4,
            report: ReportConfig::default(),
        }
    }
}

/// Handle to a simulated client device.
pub struct SimClient {
    /// Signed-in user of this device
    pub user: UserId,

    /// Session the device's store handle is bound to
    pub identity: Arc<SimIdentity>,

    /// The client's report service
    pub service: SimService,

    /// Every error passed to the service's error handler
    pub errors: Arc<Mutex<Vec<ReportError>>>,
}

impl SimClient {
    /// Number of errors the error handler has seen.
    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

/// The SimWorld - one shared store and the clients talking to it.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// The shared report table
    pub store: MemoryStore,

    /// Client handles, indexed by spawn order
    pub clients: Vec<SimClient>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        let context = SimContext::shared(config.seed);
        let store = MemoryStore::new(context.clone());

        Self {
            config,
            context,
            store,
            clients: Vec::new(),
        }
    }

    /// Spawns the configured number of clients and returns their users.
    pub fn spawn_clients(&mut self) -> Vec<UserId> {
        let mut users = Vec::new();

        for i in 0..self.config.num_clients {
            let user = UserId::from_seed(self.config.seed.wrapping_add(i as u64));
            self.clients.push(self.build_client(user.clone()));
            users.push(user);
        }

        users
    }

    fn build_client(&self, user: UserId) -> SimClient {
        let identity = Arc::new(SimIdentity::signed_in(user.clone()));
        let session = Arc::new(self.store.session(identity.clone()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let sink = errors.clone();
        let service = ReportService::new(
            self.context.clone(),
            session,
            identity.clone(),
            self.config.report.clone().with_name(format!("client-{}", user)),
        )
        .with_error_handler(move |e| sink.lock().unwrap().push(e.clone()));

        SimClient {
            user,
            identity,
            service,
            errors,
        }
    }

    /// Returns client `index`.
    ///
    /// # Panics
    /// If fewer clients were spawned.
    pub fn client(&self, index: usize) -> &SimClient {
        &self.clients[index]
    }

    /// Returns the current simulation time in hours.
    pub fn hours(&self) -> f64 {
        self.context.elapsed().as_secs_f64() / 3600.0
    }

    /// Returns the number of clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
