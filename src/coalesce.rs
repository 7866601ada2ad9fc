//! Debounced event coalescing.
//!
//! Collapses bursts of refresh or resort requests into a single action: the
//! worker waits for a quiet period after the most recent submission, then
//! runs the handler once with the last submitted request. Earlier requests
//! in the burst are replaced, not queued.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// Single-consumer debounce queue with one long-lived worker.
pub struct Coalescer<T> {
  tx: mpsc::UnboundedSender<T>,
  cancel: CancellationToken,
}

impl<T: Send + 'static> Coalescer<T> {
  /// Spawn a coalescer whose worker fires `handler` once per quiet `window`.
  ///
  /// Handler failures are logged and swallowed; the worker keeps listening
  /// for further submissions either way.
  pub fn spawn<F, Fut>(window: Duration, handler: F) -> Self
  where
    F: Fn(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CoreError>> + Send,
  {
    let (tx, mut rx) = mpsc::unbounded_channel::<T>();
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    tokio::spawn(async move {
      let mut pending: Option<T> = None;
      let mut deadline = Instant::now();

      loop {
        tokio::select! {
          _ = worker_cancel.cancelled() => break,
          submitted = rx.recv() => {
            match submitted {
              Some(request) => {
                // Keep latest, reset the quiet period.
                pending = Some(request);
                deadline = Instant::now() + window;
              }
              None => break,
            }
          }
          _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
            if let Some(request) = pending.take() {
              if let Err(e) = handler(request).await {
                log::warn!("Coalesced action failed: {}", e);
              }
            }
          }
        }
      }

      log::debug!("Coalescer worker stopped");
    });

    Self { tx, cancel }
  }

  /// Queue a request, replacing any not-yet-drained one. Never blocks.
  pub fn submit(&self, request: T) {
    if self.tx.send(request).is_err() {
      log::warn!("Coalescer worker is gone, dropping request");
    }
  }

  /// Stop the worker. Any pending request is dropped.
  pub fn shutdown(&self) {
    self.cancel.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  const WINDOW: Duration = Duration::from_millis(1_000);

  #[tokio::test(start_paused = true)]
  async fn test_burst_collapses_to_one_action() {
    let fired = Arc::new(AtomicUsize::new(0));
    let last_seen = Arc::new(AtomicUsize::new(0));

    let fired_in = fired.clone();
    let last_in = last_seen.clone();
    let coalescer = Coalescer::spawn(WINDOW, move |value: usize| {
      let fired = fired_in.clone();
      let last = last_in.clone();
      async move {
        fired.fetch_add(1, Ordering::SeqCst);
        last.store(value, Ordering::SeqCst);
        Ok(())
      }
    });

    for value in 1..=5 {
      coalescer.submit(value);
    }

    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(last_seen.load(Ordering::SeqCst), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_worker_survives_handler_failure() {
    let fired = Arc::new(AtomicUsize::new(0));

    let fired_in = fired.clone();
    let coalescer = Coalescer::spawn(WINDOW, move |value: usize| {
      let fired = fired_in.clone();
      async move {
        fired.fetch_add(1, Ordering::SeqCst);
        if value == 1 {
          Err(CoreError::Remote("boom".to_string()))
        } else {
          Ok(())
        }
      }
    });

    coalescer.submit(1);
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // A failed action must not kill the worker.
    coalescer.submit(2);
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_separate_bursts_fire_separately() {
    let fired = Arc::new(AtomicUsize::new(0));

    let fired_in = fired.clone();
    let coalescer = Coalescer::spawn(WINDOW, move |_: ()| {
      let fired = fired_in.clone();
      async move {
        fired.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    });

    coalescer.submit(());
    tokio::time::sleep(WINDOW * 2).await;
    coalescer.submit(());
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(fired.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_shutdown_drops_pending_request() {
    let fired = Arc::new(AtomicUsize::new(0));

    let fired_in = fired.clone();
    let coalescer = Coalescer::spawn(WINDOW, move |_: ()| {
      let fired = fired_in.clone();
      async move {
        fired.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    });

    coalescer.submit(());
    coalescer.shutdown();
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
  }
}
