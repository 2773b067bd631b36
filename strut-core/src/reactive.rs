//! Single- and multi-value asynchronous result wrappers.
//!
//! Handlers may return deferred results; the dispatcher forwards these
//! shapes opaquely and adapts bare futures into [`Single`]. Both wrappers
//! box their inner future/stream, so they can cross type-erased handler
//! boundaries.

use crate::error::Error;
use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use futures_util::Stream;
use std::future::Future;

/// A deferred single value.
pub struct Single<T> {
    inner: BoxFuture<'static, Result<T, Error>>,
}

impl<T: Send + 'static> Single<T> {
    /// An already-resolved value.
    pub fn of(value: T) -> Self {
        Self {
            inner: future::ready(Ok(value)).boxed(),
        }
    }

    /// An already-failed value.
    pub fn error(error: Error) -> Self {
        Self {
            inner: future::ready(Err(error)).boxed(),
        }
    }

    /// Adapt a future into the single-value shape.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// Transform the value once it resolves.
    pub fn map<R, F>(self, f: F) -> Single<R>
    where
        R: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
    {
        Single {
            inner: self.inner.map(|result| result.map(f)).boxed(),
        }
    }

    /// Chain another deferred computation off the resolved value.
    pub fn flat_map<R, F>(self, f: F) -> Single<R>
    where
        R: Send + 'static,
        F: FnOnce(T) -> Single<R> + Send + 'static,
    {
        Single {
            inner: self
                .inner
                .then(|result| match result {
                    Ok(value) => f(value).inner,
                    Err(error) => future::ready(Err(error)).boxed(),
                })
                .boxed(),
        }
    }

    /// Await the value.
    pub async fn resolve(self) -> Result<T, Error> {
        self.inner.await
    }
}

/// A deferred sequence of values.
pub struct Multi<T> {
    inner: BoxStream<'static, Result<T, Error>>,
}

impl<T: Send + 'static> Multi<T> {
    pub fn from_values(values: Vec<T>) -> Self {
        Self {
            inner: stream::iter(values.into_iter().map(Ok)).boxed(),
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    pub fn from_stream<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<T, Error>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
        }
    }

    /// Transform each value as it arrives.
    pub fn map<R, F>(self, mut f: F) -> Multi<R>
    where
        R: Send + 'static,
        F: FnMut(T) -> R + Send + 'static,
    {
        Multi {
            inner: self.inner.map(move |result| result.map(&mut f)).boxed(),
        }
    }

    /// Drain the sequence, failing on the first error.
    pub async fn collect(self) -> Result<Vec<T>, Error> {
        self.inner.try_collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_of_resolves() {
        let value = Single::of(41).resolve().await.unwrap();
        assert_eq!(value, 41);
    }

    #[tokio::test]
    async fn test_single_map() {
        let value = Single::of(20).map(|n| n * 2).resolve().await.unwrap();
        assert_eq!(value, 40);
    }

    #[tokio::test]
    async fn test_single_flat_map() {
        let value = Single::of(3)
            .flat_map(|n| Single::of(n + 4))
            .resolve()
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_single_error_short_circuits_map() {
        let result = Single::<i32>::error(Error::Handler("boom".to_string()))
            .map(|n| n + 1)
            .resolve()
            .await;
        assert!(matches!(result, Err(Error::Handler(_))));
    }

    #[tokio::test]
    async fn test_single_from_future() {
        let value = Single::from_future(async { Ok::<_, Error>("deferred") })
            .resolve()
            .await
            .unwrap();
        assert_eq!(value, "deferred");
    }

    #[tokio::test]
    async fn test_multi_collect() {
        let values = Multi::from_values(vec![1, 2, 3])
            .map(|n| n * 10)
            .collect()
            .await
            .unwrap();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_multi_empty() {
        let values = Multi::<i32>::empty().collect().await.unwrap();
        assert!(values.is_empty());
    }
}
