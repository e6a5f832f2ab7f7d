//! Process-wide model handle with wholesale replacement.
//!
//! Readers clone an `Arc` to the current model and never block on training.
//! Retraining is serialized by an async mutex and publishes the new model
//! with a single swap, so a reader sees either the old complete model or
//! the new complete model.

use std::future::Future;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::debug;

pub struct ModelHandle<T: ?Sized> {
    current: RwLock<Option<Arc<T>>>,
    retrain_lock: Mutex<()>,
}

impl<T: ?Sized> Default for ModelHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ModelHandle<T> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            retrain_lock: Mutex::new(()),
        }
    }

    /// The current model, if one has been published.
    pub fn read(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Publishes `next`, returning the model it replaced.
    pub fn swap(&self, next: Arc<T>) -> Option<Arc<T>> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        guard.replace(next)
    }

    pub fn clear(&self) {
        self.current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Trains a replacement and publishes it. Concurrent retrains run one at
    /// a time; a failed training leaves the current model in place.
    pub async fn retrain<F, Fut, E>(&self, train: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, E>>,
    {
        let _guard = self.retrain_lock.lock().await;
        let next = train().await?;
        self.swap(Arc::clone(&next));
        Ok(next)
    }

    /// The current model, training and publishing one first if none exists.
    ///
    /// Callers that queued behind another trainer reuse its result instead
    /// of training again.
    pub async fn get_or_train<F, Fut, E>(&self, train: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, E>>,
    {
        if let Some(model) = self.read() {
            return Ok(model);
        }
        let _guard = self.retrain_lock.lock().await;
        if let Some(model) = self.read() {
            debug!("Model published while waiting for the retrain lock");
            return Ok(model);
        }
        let next = train().await?;
        self.swap(Arc::clone(&next));
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn read_swap_clear() {
        let handle: ModelHandle<u32> = ModelHandle::new();
        assert!(handle.read().is_none());
        assert!(handle.swap(Arc::new(1)).is_none());
        assert_eq!(handle.swap(Arc::new(2)).as_deref(), Some(&1));
        assert_eq!(handle.read().as_deref(), Some(&2));
        handle.clear();
        assert!(handle.read().is_none());
    }

    #[tokio::test]
    async fn failed_retrain_keeps_previous_model() {
        let handle: ModelHandle<u32> = ModelHandle::new();
        handle.swap(Arc::new(7));
        let result = handle
            .retrain(|| async { Err::<Arc<u32>, &str>("not enough data") })
            .await;
        assert_eq!(result.unwrap_err(), "not enough data");
        assert_eq!(handle.read().as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn get_or_train_trains_once() {
        let handle: Arc<ModelHandle<u32>> = Arc::new(ModelHandle::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = Arc::clone(&handle);
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                handle
                    .get_or_train(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, ()>(Arc::new(42))
                    })
                    .await
            }));
        }
        for task in tasks {
            assert_eq!(*task.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_retrains_publish_complete_models() {
        let handle: Arc<ModelHandle<Vec<u32>>> = Arc::new(ModelHandle::new());
        let mut tasks = Vec::new();
        for i in 0..4u32 {
            let handle = Arc::clone(&handle);
            tasks.push(tokio::spawn(async move {
                handle
                    .retrain(|| async move {
                        tokio::task::yield_now().await;
                        Ok::<_, ()>(Arc::new(vec![i; 100]))
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let model = handle.read().unwrap();
        assert_eq!(model.len(), 100);
        assert!(model.iter().all(|v| *v == model[0]));
    }
}
