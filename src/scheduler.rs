use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Lock a phase sink, recovering the data if a task panicked while holding it.
pub fn lock<S>(sink: &Mutex<S>) -> MutexGuard<'_, S> {
	sink.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one task per item on a bounded pool and wait for all of them.
///
/// The scheduler owns the phase's shared sink: it creates one `Arc<Mutex<S>>`,
/// hands a clone to every task, and returns the collected value once every
/// task has finished. Tasks start in input order and at most `limit` run at
/// once. A task that panics is logged and otherwise ignored.
pub async fn run_all<I, S, F, Fut>(items: Vec<I>, limit: usize, task: F) -> S
where
	S: Default + Send + 'static,
	F: Fn(I, Arc<Mutex<S>>) -> Fut,
	Fut: Future<Output = ()> + Send + 'static,
{
	let sink = Arc::new(Mutex::new(S::default()));
	let semaphore = Arc::new(Semaphore::new(limit.max(1)));
	let total = items.len();
	let mut handles = Vec::with_capacity(total);

	for (index, item) in items.into_iter().enumerate() {
		// Wait for a free slot before spawning, so admission follows input order
		let permit = match semaphore.clone().acquire_owned().await {
			Ok(permit) => permit,
			Err(_) => break,
		};
		debug!("starting task ({}/{})", index + 1, total);
		let fut = task(item, sink.clone());
		handles.push(tokio::spawn(async move {
			let _permit = permit;
			fut.await;
		}));
	}

	for handle in handles {
		if let Err(e) = handle.await {
			warn!("probe task failed: {}", e);
		}
	}

	let mut collected = lock(&sink);
	std::mem::take(&mut *collected)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[tokio::test]
	async fn test_every_task_runs() {
		let items: Vec<u32> = (1..=50).collect();
		let collected: Vec<u32> = run_all(items, 8, |n, sink: Arc<Mutex<Vec<u32>>>| async move {
			lock(&sink).push(n * 2);
		}).await;
		let mut sorted = collected.clone();
		sorted.sort();
		assert_eq!(sorted, (1..=50).map(|n| n * 2).collect::<Vec<_>>());
	}

	#[tokio::test]
	async fn test_concurrency_ceiling() {
		let active = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let items: Vec<usize> = (0..40).collect();

		let count: usize = {
			let active = active.clone();
			let peak = peak.clone();
			let finished: Vec<usize> = run_all(items, 4, move |i, sink: Arc<Mutex<Vec<usize>>>| {
				let active = active.clone();
				let peak = peak.clone();
				async move {
					let now = active.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					tokio::time::sleep(Duration::from_millis(5)).await;
					active.fetch_sub(1, Ordering::SeqCst);
					lock(&sink).push(i);
				}
			}).await;
			finished.len()
		};

		assert_eq!(count, 40);
		assert!(peak.load(Ordering::SeqCst) <= 4, "peak was {}", peak.load(Ordering::SeqCst));
		assert_eq!(active.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_panicking_task_does_not_stop_the_phase() {
		let items: Vec<u32> = (0..10).collect();
		let collected: Vec<u32> = run_all(items, 3, |n, sink: Arc<Mutex<Vec<u32>>>| async move {
			if n == 4 {
				panic!("task blew up");
			}
			lock(&sink).push(n);
		}).await;
		assert_eq!(collected.len(), 9);
		assert!(!collected.contains(&4));
	}

	#[tokio::test]
	async fn test_empty_input_and_zero_limit() {
		let collected: Vec<u8> = run_all(Vec::<u8>::new(), 0, |_, _sink: Arc<Mutex<Vec<u8>>>| async {}).await;
		assert!(collected.is_empty());

		let collected: Vec<u8> = run_all(vec![1u8, 2, 3], 0, |n, sink: Arc<Mutex<Vec<u8>>>| async move {
			lock(&sink).push(n);
		}).await;
		assert_eq!(collected.len(), 3);
	}
}
