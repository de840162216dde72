//! Fetch worker threads and the systems that drain their completions.
//!
//! - [`fetch_worker`] runs on each worker thread, loading one
//!   [`FetchJob`](crate::events::fetch::FetchJob) at a time through the
//!   shared [`FrameLoader`].
//! - [`poll_fetch_completions`](crate::systems::uvol::poll_fetch_completions)
//!   applies completions on the main thread.
//!
//! Workers never touch the world. A completion for a player that no longer
//! exists is simply ignored on the main thread.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};

use crate::events::fetch::{FetchCmd, FetchCompleted};
use crate::streaming::loader::FrameLoader;

/// Entry point of a fetch worker thread.
///
/// Blocks on the job queue until it receives [`FetchCmd::Shutdown`] or every
/// sender is dropped.
pub fn fetch_worker(
    id: usize,
    loader: Arc<dyn FrameLoader>,
    rx_job: Receiver<FetchCmd>,
    tx_done: Sender<FetchCompleted>,
) {
    debug!("fetch worker {} starting", id);

    while let Ok(cmd) = rx_job.recv() {
        let job = match cmd {
            FetchCmd::Load(job) => job,
            FetchCmd::Shutdown => break,
        };
        trace!("worker {} loading {}", id, job.request.url());
        let result = loader.load(&job.request);
        let done = FetchCompleted {
            entity: job.entity,
            session: job.session,
            channel: job.channel,
            batch: job.batch,
            slot: job.slot,
            result,
        };
        if tx_done.send(done).is_err() {
            break;
        }
    }

    debug!("fetch worker {} exiting", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fetch::FetchJob;
    use crate::streaming::engine::ChannelId;
    use crate::streaming::loader::{Decoded, LoadError, LoadRequest, TextureFrame};
    use crate::streaming::manifest::TextureFormat;
    use bevy_ecs::prelude::Entity;
    use crossbeam_channel::unbounded;

    struct EchoLoader;

    impl FrameLoader for EchoLoader {
        fn load(&self, request: &LoadRequest) -> Result<Decoded, LoadError> {
            if request.url().contains("bad") {
                return Err(LoadError::Unsupported(request.url().to_string()));
            }
            Ok(Decoded::Texture(TextureFrame {
                data: request.url().as_bytes().into(),
            }))
        }
    }

    fn job(slot: usize, url: &str) -> FetchCmd {
        FetchCmd::Load(FetchJob {
            entity: Entity::PLACEHOLDER,
            session: 3,
            channel: ChannelId::Geometry,
            batch: 9,
            slot,
            request: LoadRequest::Texture {
                url: url.to_string(),
                format: TextureFormat::Ktx2,
            },
        })
    }

    #[test]
    fn worker_answers_every_job_then_stops() {
        let (tx_job, rx_job) = unbounded();
        let (tx_done, rx_done) = unbounded();
        tx_job.send(job(0, "a.ktx2")).unwrap();
        tx_job.send(job(1, "bad.ktx2")).unwrap();
        tx_job.send(FetchCmd::Shutdown).unwrap();
        fetch_worker(0, Arc::new(EchoLoader), rx_job, tx_done);

        let done: Vec<_> = rx_done.try_iter().collect();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].slot, 0);
        assert_eq!(done[0].session, 3);
        assert!(done[0].result.is_ok());
        assert!(done[1].result.is_err());
    }
}
