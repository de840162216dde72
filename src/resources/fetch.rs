//! ECS resources that bridge the main thread with the fetch worker threads.
//!
//! Use [`setup_fetch_workers`] once during initialization to spawn the worker
//! pool and insert the [`FetchBridge`] resource. Call
//! [`shutdown_fetch_workers`] during teardown to stop and join every worker.
//!
//! Workers share one job queue, so the items of a batch are loaded
//! concurrently and may complete in any order.

use std::sync::Arc;
use std::thread::JoinHandle;

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::info;

use crate::events::fetch::{FetchCmd, FetchCompleted, FetchJob};
use crate::streaming::loader::FrameLoader;
use crate::systems::fetch::fetch_worker;

/// Shared bridge between the ECS world and the fetch workers.
#[derive(Resource)]
pub struct FetchBridge {
    /// Sender for [`FetchCmd`]s (ECS -> workers).
    pub tx_job: Sender<FetchCmd>,
    /// Receiver for [`FetchCompleted`]s (workers -> ECS).
    pub rx_done: Receiver<FetchCompleted>,
    handles: Vec<JoinHandle<()>>,
}

impl FetchBridge {
    /// Bridge over caller-owned channel ends, with no worker threads.
    ///
    /// The caller plays the worker: it receives the jobs and answers with
    /// completions in whatever order it likes.
    pub fn from_channels(tx_job: Sender<FetchCmd>, rx_done: Receiver<FetchCompleted>) -> Self {
        Self {
            tx_job,
            rx_done,
            handles: Vec::new(),
        }
    }

    /// Queues a job. Returns `false` once the workers are gone.
    pub fn submit(&self, job: FetchJob) -> bool {
        self.tx_job.send(FetchCmd::Load(job)).is_ok()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

/// Spawn `workers` fetch threads sharing `loader` and register the bridge.
pub fn setup_fetch_workers(world: &mut World, loader: Arc<dyn FrameLoader>, workers: usize) {
    let (tx_job, rx_job) = unbounded::<FetchCmd>();
    let (tx_done, rx_done) = unbounded::<FetchCompleted>();

    let handles = (0..workers.max(1))
        .map(|id| {
            let rx_job = rx_job.clone();
            let tx_done = tx_done.clone();
            let loader = Arc::clone(&loader);
            std::thread::spawn(move || fetch_worker(id, loader, rx_job, tx_done))
        })
        .collect::<Vec<_>>();

    info!("Started {} fetch workers", handles.len());

    world.insert_resource(FetchBridge {
        tx_job,
        rx_done,
        handles,
    });
}

/// Ask every worker to stop and join them.
///
/// Jobs still queued behind the shutdown commands are dropped; players that
/// are torn down at the same time ignore their completions anyway.
pub fn shutdown_fetch_workers(world: &mut World) {
    if let Some(bridge) = world.remove_resource::<FetchBridge>() {
        for _ in 0..bridge.handles.len() {
            let _ = bridge.tx_job.send(FetchCmd::Shutdown);
        }
        for handle in bridge.handles {
            let _ = handle.join();
        }
    }
}
