use anyhow::Context;
use tracing::{error, info};

use relay_worker::{Loop, WORKER_VERSION, WorkerSettings, logging};

fn main() -> anyhow::Result<()> {
    let settings = WorkerSettings::from_env()?;
    logging::init_tracing(settings.log_level, settings.log_format);

    info!("relay-worker {}", WORKER_VERSION);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(async {
        let mut worker = Loop::from_settings(&settings)?;
        worker.run().await
    });

    match result {
        Ok(()) => {
            info!("Worker exiting");
            Ok(())
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Fatal protocol error, aborting");
            std::process::abort();
        }
        Err(e) => Err(e.into()),
    }
}
