// src/watch.rs
//! Fixed-interval pass loop for `watch` mode. Shutdown is observed while a pass is
//! still running, not only between ticks.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Run `pass` on every tick of `interval` until `shutdown` resolves. An in-flight pass
/// is dropped at shutdown. A failed pass is logged and retried on the next tick.
///
/// Returns the number of passes that finished (failed ones included).
pub async fn run_until_shutdown<F, Fut, S>(interval: Duration, shutdown: S, mut pass: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    tokio::pin!(shutdown);
    let mut finished = 0usize;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(target: "pipeline", finished, "shutdown requested");
                break;
            }
            res = async {
                ticker.tick().await;
                pass().await
            } => {
                finished += 1;
                if let Err(e) = res {
                    warn!(target: "pipeline", error = ?e, "pass failed; retrying next tick");
                }
            }
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_interrupts_a_pass_in_progress() {
        let started = Arc::new(AtomicUsize::new(0));
        let s = started.clone();
        let run = run_until_shutdown(
            Duration::from_secs(60),
            tokio::time::sleep(Duration::from_millis(50)),
            move || {
                s.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok::<(), anyhow::Error>(())
                }
            },
        );
        let finished = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("loop must stop while the pass is still running");
        assert_eq!(finished, 0);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_passes_do_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let finished = run_until_shutdown(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(200)),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(anyhow::anyhow!("feed down")) }
            },
        )
        .await;
        assert!(finished >= 2, "finished {finished}");
        assert!(calls.load(Ordering::SeqCst) >= finished);
    }
}
