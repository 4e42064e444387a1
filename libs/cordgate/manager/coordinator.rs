use crate::core::config::{GatewayConfig, ShardInfo};
use crate::core::connection_state::{SessionState, ShardMetrics};
use crate::core::session::{GatewaySession, ShardHandle};
use crate::protocol::{DispatchEvent, GatewayCommand};
use crate::traits::{
    GatewayDelegate, GatewayError, GatewayTransport, Result, Scheduler, ShardDelegate,
    TimerHandle,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds one transport per shard
pub type TransportFactory = Arc<dyn Fn(u32) -> Box<dyn GatewayTransport> + Send + Sync>;

/// Barrier bookkeeping shared by all shard links
///
/// Raw counters only grow until the shard set is rebuilt. The per-cycle
/// sets decide when "fully connected"/"fully disconnected" fire, so a shard
/// reporting twice in one cycle is counted once.
#[derive(Debug, Default)]
struct BarrierState {
    epoch: u64,
    shard_count: usize,
    connected_count: usize,
    closed_count: usize,
    connected: HashSet<u32>,
    closed: HashSet<u32>,
    closing: bool,
    fully_connected_fired: bool,
    fully_disconnected_fired: bool,
}

impl BarrierState {
    fn is_fully_connected(&self) -> bool {
        self.connected.len() == self.shard_count
    }

    /// Begin a connect cycle, counting `still_connected` shards as already up
    fn start_cycle(&mut self, still_connected: impl IntoIterator<Item = u32>) {
        self.closing = false;
        self.connected.clear();
        self.connected.extend(still_connected);
        self.closed.clear();
        self.fully_connected_fired = false;
        self.fully_disconnected_fired = false;
    }
}

/// Session-to-coordinator notification path, tagged with the shard set's epoch
struct ShardLink {
    epoch: u64,
    barrier: Arc<Mutex<BarrierState>>,
    delegate: Arc<dyn GatewayDelegate>,
}

impl ShardLink {
    fn is_current(&self) -> bool {
        self.barrier.lock().epoch == self.epoch
    }
}

impl ShardDelegate for ShardLink {
    fn shard_connected(&self, shard: u32) {
        let fire = {
            let mut barrier = self.barrier.lock();
            if barrier.epoch != self.epoch {
                return;
            }
            barrier.connected_count += 1;
            barrier.connected.insert(shard);
            let complete = barrier.connected.len() == barrier.shard_count;
            let fire = complete && !barrier.fully_connected_fired && !barrier.closing;
            if fire {
                barrier.fully_connected_fired = true;
            }
            fire
        };

        self.delegate.on_shard_connected(shard);
        if fire {
            info!("All shards connected");
            self.delegate.on_fully_connected();
        }
    }

    fn shard_disconnected(&self, shard: u32) {
        let fire = {
            let mut barrier = self.barrier.lock();
            if barrier.epoch != self.epoch {
                return;
            }
            barrier.closed_count += 1;
            barrier.closed.insert(shard);
            let complete = barrier.closed.len() == barrier.shard_count;
            let fire = complete && !barrier.fully_disconnected_fired;
            if fire {
                barrier.fully_disconnected_fired = true;
            }
            fire
        };

        self.delegate.on_shard_disconnected(shard);
        if fire {
            info!("All shards disconnected");
            self.delegate.on_fully_disconnected("All shards closed");
        }
    }

    fn shard_dispatch(&self, shard: u32, event: DispatchEvent) {
        if self.is_current() {
            self.delegate.on_dispatch(event, shard);
        }
    }

    fn shard_hello(&self, shard: u32, _heartbeat_interval: Duration) {
        if self.is_current() {
            self.delegate.on_hello(shard);
        }
    }
}

struct ShardSet {
    info: ShardInfo,
    handles: Vec<ShardHandle>,
    threads: Vec<JoinHandle<()>>,
}

impl ShardSet {
    fn get(&self, shard: u32) -> Option<&ShardHandle> {
        let index = shard.checked_sub(self.info.range().start)?;
        self.handles.get(index as usize)
    }
}

/// Owns every shard session of one client and presents them as one connection
pub struct ShardCoordinator {
    config: Arc<GatewayConfig>,
    scheduler: Arc<dyn Scheduler>,
    transports: TransportFactory,
    delegate: Arc<dyn GatewayDelegate>,
    barrier: Arc<Mutex<BarrierState>>,
    shards: RwLock<ShardSet>,
    pending_connects: Mutex<Vec<TimerHandle>>,
}

impl ShardCoordinator {
    /// Spawn a session per shard in `config.shards`. Nothing connects until
    /// [`ShardCoordinator::connect`].
    pub fn new(
        config: GatewayConfig,
        scheduler: Arc<dyn Scheduler>,
        transports: TransportFactory,
        delegate: Arc<dyn GatewayDelegate>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let info = config.shards.clone();
        let barrier = Arc::new(Mutex::new(BarrierState {
            shard_count: info.count(),
            ..BarrierState::default()
        }));

        let shards = spawn_shards(&config, &scheduler, &transports, &delegate, &barrier, info, 0)?;
        info!(
            "Coordinator ready with {} shard(s) of {}",
            shards.handles.len(),
            shards.info.total()
        );

        Ok(Self {
            config,
            scheduler,
            transports,
            delegate,
            barrier,
            shards: RwLock::new(shards),
            pending_connects: Mutex::new(Vec::new()),
        })
    }

    /// Connect every shard, `connect_stagger` apart in index order
    ///
    /// A no-op while every shard of the current cycle is connected.
    pub fn connect(&self) {
        let shards = self.shards.read();
        let epoch = {
            let mut barrier = self.barrier.lock();
            if !barrier.closing && barrier.is_fully_connected() {
                debug!("All shards already connected, ignoring connect");
                return;
            }
            // Shards still connected from before count as up, unless a
            // disconnect is already taking them down
            let closing = barrier.closing;
            let still_connected = shards
                .handles
                .iter()
                .filter(|handle| !closing && handle.is_connected())
                .map(ShardHandle::shard);
            barrier.start_cycle(still_connected);
            barrier.epoch
        };
        self.cancel_pending_connects();

        let stagger = self.config.connect_stagger;
        let mut pending = Vec::with_capacity(shards.handles.len());

        for (index, handle) in shards.handles.iter().enumerate() {
            if index == 0 {
                debug!("Connecting shard {}", handle.shard());
                if let Err(e) = handle.connect() {
                    warn!("Failed to connect shard {}: {}", handle.shard(), e);
                }
                continue;
            }

            let Some(delay) = u32::try_from(index).ok().and_then(|i| stagger.checked_mul(i)) else {
                warn!(
                    "Connect delay for shard {} overflows, not scheduling it",
                    handle.shard()
                );
                continue;
            };
            let handle = handle.clone();
            let barrier = Arc::clone(&self.barrier);
            let timer = self.scheduler.after(
                delay,
                Box::new(move || {
                    let proceed = {
                        let barrier = barrier.lock();
                        !barrier.closing && barrier.epoch == epoch
                    };
                    if !proceed {
                        debug!("Skipping staggered connect of shard {}", handle.shard());
                        return;
                    }
                    debug!("Connecting shard {}", handle.shard());
                    if let Err(e) = handle.connect() {
                        warn!("Failed to connect shard {}: {}", handle.shard(), e);
                    }
                }),
            );
            pending.push(timer);
        }

        *self.pending_connects.lock() = pending;
    }

    /// Disconnect every shard. Fires "fully disconnected" right away when not
    /// all shards had connected, since there is nothing to wait for.
    pub fn disconnect(&self) {
        let synthesize = {
            let mut barrier = self.barrier.lock();
            barrier.closing = true;
            let synthesize = !barrier.is_fully_connected() && !barrier.fully_disconnected_fired;
            if synthesize {
                barrier.fully_disconnected_fired = true;
            }
            synthesize
        };
        self.cancel_pending_connects();

        for handle in self.shards.read().handles.iter() {
            if let Err(e) = handle.disconnect() {
                warn!("Failed to disconnect shard {}: {}", handle.shard(), e);
            }
        }

        if synthesize {
            info!("Closed before all shards connected");
            self.delegate.on_fully_disconnected("Closed");
        }
    }

    /// Route a command to one shard
    pub fn send(&self, command: GatewayCommand, shard: u32) -> Result<()> {
        let shards = self.shards.read();
        let handle = shards.get(shard).ok_or(GatewayError::ShardOutOfRange {
            shard,
            count: shards.handles.len(),
        })?;
        handle.send(command)
    }

    /// Tear down every session and rebuild the shard set from `info`
    ///
    /// Counters reset together with the rebuild. Call
    /// [`ShardCoordinator::connect`] afterwards to bring the new set up.
    pub fn reshard(&self, info: ShardInfo) -> Result<()> {
        let old = {
            let mut shards = self.shards.write();
            // The epoch only moves under the shard set's write lock
            let epoch = self.barrier.lock().epoch + 1;

            // The current set keeps its barrier until the new one exists
            let rebuilt = spawn_shards(
                &self.config,
                &self.scheduler,
                &self.transports,
                &self.delegate,
                &self.barrier,
                info,
                epoch,
            )?;

            {
                let mut barrier = self.barrier.lock();
                barrier.epoch = epoch;
                barrier.shard_count = rebuilt.info.count();
                barrier.connected_count = 0;
                barrier.closed_count = 0;
                barrier.start_cycle(std::iter::empty());
            }
            std::mem::replace(&mut *shards, rebuilt)
        };
        self.cancel_pending_connects();

        info!(
            "Resharding: replacing {} shard(s) with {}",
            old.handles.len(),
            self.shard_count()
        );
        retire(old);
        Ok(())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.read().handles.len()
    }

    pub fn shard_info(&self) -> ShardInfo {
        self.shards.read().info.clone()
    }

    pub fn states(&self) -> Vec<(u32, SessionState)> {
        self.shards
            .read()
            .handles
            .iter()
            .map(|h| (h.shard(), h.state()))
            .collect()
    }

    pub fn metrics(&self, shard: u32) -> Option<ShardMetrics> {
        self.shards.read().get(shard).map(ShardHandle::metrics)
    }

    pub fn handle(&self, shard: u32) -> Option<ShardHandle> {
        self.shards.read().get(shard).cloned()
    }

    /// Shard connect notifications since the shard set was built
    pub fn connected_count(&self) -> usize {
        self.barrier.lock().connected_count
    }

    /// Shard disconnect notifications since the shard set was built
    pub fn closed_count(&self) -> usize {
        self.barrier.lock().closed_count
    }

    pub fn is_closing(&self) -> bool {
        self.barrier.lock().closing
    }

    fn cancel_pending_connects(&self) {
        for timer in self.pending_connects.lock().drain(..) {
            timer.cancel();
        }
    }
}

impl Drop for ShardCoordinator {
    fn drop(&mut self) {
        self.cancel_pending_connects();
        for handle in self.shards.get_mut().handles.iter() {
            let _ = handle.shutdown();
        }
    }
}

fn spawn_shards(
    config: &Arc<GatewayConfig>,
    scheduler: &Arc<dyn Scheduler>,
    transports: &TransportFactory,
    delegate: &Arc<dyn GatewayDelegate>,
    barrier: &Arc<Mutex<BarrierState>>,
    info: ShardInfo,
    epoch: u64,
) -> Result<ShardSet> {
    let mut handles = Vec::with_capacity(info.count());
    let mut threads = Vec::with_capacity(info.count());

    for shard in info.range() {
        let link = Arc::new(ShardLink {
            epoch,
            barrier: Arc::clone(barrier),
            delegate: Arc::clone(delegate),
        });
        let (session, inbox) = GatewaySession::new(
            shard,
            info.total(),
            Arc::clone(config),
            transports(shard),
            Arc::clone(scheduler),
            link,
        );

        match session.spawn(inbox) {
            Ok((handle, thread)) => {
                handles.push(handle);
                threads.push(thread);
            }
            Err(e) => {
                retire(ShardSet { info, handles, threads });
                return Err(e);
            }
        }
    }

    Ok(ShardSet {
        info,
        handles,
        threads,
    })
}

/// Disconnect and stop a shard set, then wait for its threads
fn retire(set: ShardSet) {
    for handle in &set.handles {
        let _ = handle.disconnect();
        let _ = handle.shutdown();
    }
    for thread in set.threads {
        if thread.join().is_err() {
            warn!("Shard thread panicked during shutdown");
        }
    }
}
