//! Optimistic local updates with rollback
//!
//! The tentative value is visible as soon as the update starts. If the
//! remote mutation fails, the value captured before the update is put back.

use std::future::Future;

use tokio::sync::watch;

use crate::subscription::Record;

/// Locally owned value that can be updated ahead of the store
#[derive(Debug)]
pub struct Optimistic<T> {
    value: watch::Sender<T>,
}

impl<T> Optimistic<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(value: T) -> Self {
        let (value, _) = watch::channel(value);
        Self { value }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value, e.g. with confirmed data from a subscription
    pub fn set(&self, value: T) {
        self.value.send_replace(value);
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.value.subscribe()
    }

    /// Apply `tentative` now, then await `mutation`; restore the previous
    /// value if it fails.
    pub async fn update<R, E, Fut>(
        &self,
        tentative: impl FnOnce(&mut T),
        mutation: Fut,
    ) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        E: std::fmt::Display,
    {
        let previous = self.get();
        self.value.send_modify(tentative);

        match mutation.await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(error = %e, "Remote mutation failed, rolling back");
                self.value.send_replace(previous);
                Err(e)
            }
        }
    }
}

impl<T> Optimistic<Vec<Record<T>>>
where
    T: Clone + Send + Sync,
{
    /// Edit one record in place ahead of the store
    pub async fn update_record<R, E, Fut>(
        &self,
        id: &str,
        edit: impl FnOnce(&mut T),
        mutation: Fut,
    ) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        E: std::fmt::Display,
    {
        self.update(
            |records| {
                if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                    edit(&mut record.data);
                }
            },
            mutation,
        )
        .await
    }

    /// Remove one record ahead of the store
    pub async fn remove_record<R, E, Fut>(&self, id: &str, mutation: Fut) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        E: std::fmt::Display,
    {
        self.update(|records| records.retain(|r| r.id != id), mutation)
            .await
    }
}

/// One-shot form of [`Optimistic::update`]
pub async fn optimistic_update<T, R, E, Fut>(
    state: &Optimistic<T>,
    tentative: impl FnOnce(&mut T),
    mutation: Fut,
) -> Result<R, E>
where
    T: Clone + Send + Sync,
    Fut: Future<Output = Result<R, E>>,
    E: std::fmt::Display,
{
    state.update(tentative, mutation).await
}
