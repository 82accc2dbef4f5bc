//! Ordered fallback across candidates.

use std::future::Future;

/// The winning attempt of [`first_success`].
#[derive(Debug, PartialEq)]
pub struct Success<C, T, E> {
    pub candidate: C,
    pub value: T,
    /// Candidates that failed before the winner, in attempt order.
    pub failures: Vec<(C, E)>,
}

/// Tries `attempt` on each candidate in order and stops at the first success.
///
/// Returns the winner together with the failures that preceded it, or every
/// `(candidate, error)` pair in attempt order when all of them fail.
/// Candidates after the winner are never attempted.
///
/// # Examples
///
/// ```
/// use lexicon_pm_registry::first_success;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let won = first_success(["s1", "s2", "s3"], |s| async move {
///     if s == "s1" { Err("offline") } else { Ok(format!("from {s}")) }
/// })
/// .await
/// .unwrap();
/// assert_eq!(won.candidate, "s2");
/// assert_eq!(won.value, "from s2");
/// assert_eq!(won.failures, vec![("s1", "offline")]);
///
/// let failed = first_success(["a", "b"], |s| async move { Err::<(), _>(s.len()) }).await;
/// assert_eq!(failed.unwrap_err(), vec![("a", 1), ("b", 1)]);
/// # });
/// ```
pub async fn first_success<C, T, E, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Result<Success<C, T, E>, Vec<(C, E)>>
where
    C: Clone,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::new();
    for candidate in candidates {
        match attempt(candidate.clone()).await {
            Ok(value) => {
                return Ok(Success {
                    candidate,
                    value,
                    failures,
                });
            }
            Err(error) => failures.push((candidate, error)),
        }
    }
    Err(failures)
}
