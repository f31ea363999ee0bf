//! Waiting for the process to be asked to stop.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{BeatOscError, CapturePipeline};

/// Which termination request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Ctrl-C / SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

/// Waits for SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<Termination> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let which = tokio::select! {
        _ = interrupt.recv() => Termination::Interrupt,
        _ = terminate.recv() => Termination::Terminate,
    };
    tracing::info!(signal = ?which, "termination requested");
    Ok(which)
}

/// Waits for Ctrl-C.
///
/// The handler only raises a flag; the flag is polled about once a second.
///
/// # Errors
///
/// Returns an error if the Ctrl-C handler cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<Termination> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::spawn(async move {
        if ctrl_c.await.is_ok() {
            handler_flag.store(true, Ordering::SeqCst);
        }
    });

    poll_until_set(&flag, Duration::from_secs(1)).await;
    tracing::info!(signal = ?Termination::Interrupt, "termination requested");
    Ok(Termination::Interrupt)
}

/// Keeps a started pipeline running until `shutdown` resolves or analysis
/// faults, then stops it.
///
/// A termination request is the normal way out and returns `Ok(())`. The
/// pipeline is stopped on every path.
///
/// # Errors
///
/// - `Estimator` if analysis faulted first
/// - `BackendError` if `shutdown` reports an error
/// - any error from [`CapturePipeline::stop()`]
pub async fn run_until<F>(pipeline: &mut CapturePipeline, shutdown: F) -> Result<(), BeatOscError>
where
    F: Future<Output = std::io::Result<Termination>>,
{
    let outcome = tokio::select! {
        signal = shutdown => match signal {
            Ok(which) => {
                tracing::debug!(signal = ?which, "stopping capture");
                Ok(())
            }
            Err(e) => Err(BeatOscError::BackendError(format!("signal handler: {e}"))),
        },
        fault = pipeline.fault() => Err(BeatOscError::Estimator(fault)),
    };

    pipeline.stop().await?;
    outcome
}

/// Sleeps in `period` steps until `flag` is set.
pub async fn poll_until_set(flag: &Arc<AtomicBool>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if flag.load(Ordering::SeqCst) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{estimator_factory, ScriptStep, ScriptedEstimator};
    use crate::{BeatOsc, ChannelSink, EstimatorFault, MockSource, PipelineEvent};
    use parking_lot::Mutex;
    use tokio::sync::{mpsc, oneshot};

    fn pipeline_with(
        steps: Vec<ScriptStep>,
        events: &Arc<Mutex<Vec<PipelineEvent>>>,
    ) -> CapturePipeline {
        let events = Arc::clone(events);
        BeatOsc::builder()
            .add_sink(ChannelSink::new(mpsc::channel(8).0))
            .estimator(estimator_factory(move |_| {
                Box::new(ScriptedEstimator::new(steps.clone()))
            }))
            .on_event(move |e| events.lock().push(e))
            .build()
            .unwrap()
    }

    fn silence() -> MockSource {
        let mut mock = MockSource::standard();
        mock.add_samples(&[0.0; 128 * 8]);
        mock
    }

    #[tokio::test]
    async fn test_run_until_stops_on_termination() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = pipeline_with(Vec::new(), &events);
        pipeline.start_with_mock(silence()).await.unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        let shutdown = async move {
            let _ = rx.await;
            Ok(Termination::Interrupt)
        };
        run_until(&mut pipeline, shutdown).await.unwrap();

        assert!(!pipeline.is_running());
        assert!(matches!(
            events.lock().last(),
            Some(PipelineEvent::CaptureStopped)
        ));
    }

    #[tokio::test]
    async fn test_run_until_returns_fault() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = pipeline_with(vec![ScriptStep::Quiet, ScriptStep::Fault], &events);
        pipeline.start_with_mock(silence()).await.unwrap();

        let result = run_until(&mut pipeline, std::future::pending()).await;

        assert!(matches!(
            result,
            Err(BeatOscError::Estimator(EstimatorFault::Internal(_)))
        ));
        assert!(!pipeline.is_running());
        assert!(matches!(
            events.lock().last(),
            Some(PipelineEvent::CaptureStopped)
        ));
    }

    #[tokio::test]
    async fn test_run_until_reports_signal_error() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = pipeline_with(Vec::new(), &events);
        pipeline.start_with_mock(silence()).await.unwrap();

        let shutdown = async { Err(std::io::Error::other("no handler")) };
        let result = run_until(&mut pipeline, shutdown).await;

        assert!(matches!(result, Err(BeatOscError::BackendError(_))));
        assert!(!pipeline.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_set() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let started = tokio::time::Instant::now();
        poll_until_set(&flag, Duration::from_secs(1)).await;

        // Noticed on the first poll after the flag flips
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_poll_returns_when_already_set() {
        let flag = Arc::new(AtomicBool::new(true));
        poll_until_set(&flag, Duration::from_secs(60)).await;
    }
}
