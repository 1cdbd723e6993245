//! Deadline supervision.

use std::future::Future;
use std::time::Duration;

/// Which signal ended a [`race_deadline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Race<T> {
    /// The work finished first.
    Finished(T),
    /// The deadline expired first; the work future was dropped.
    DeadlineExpired,
}

/// Run `work` until it completes or `deadline` elapses.
///
/// If both become ready in the same poll the deadline wins. Dropping the
/// work future is the cancellation: anything it buffered is lost.
pub async fn race_deadline<F>(deadline: Duration, work: F) -> Race<F::Output>
where
    F: Future,
{
    let expiry = tokio::time::sleep(deadline);
    tokio::pin!(expiry);
    tokio::pin!(work);

    tokio::select! {
        biased;

        () = &mut expiry => Race::DeadlineExpired,
        output = &mut work => Race::Finished(output),
    }
}
