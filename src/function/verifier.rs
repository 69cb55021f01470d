// verifier.rs
use super::ScanError;
use super::probe::Observation;
use std::future::Future;
use std::time::Duration;

/// 多次验证: 每次探测都判定为阳性才确认.
///
/// 任意一次探测失败或判定为阴性立即返回 `None`, 不再执行后续探测.
/// 两次探测之间固定等待 `delay`, 最后一次之后不等待.
pub async fn verify<P, Fut, C, E>(
    mut probe: P,
    classify: C,
    attempts: u32,
    delay: Duration,
) -> Option<E>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation, ScanError>>,
    C: Fn(&Observation) -> Option<E>,
{
    let mut evidence = None;

    for attempt in 1..=attempts {
        let observation = probe().await.ok()?;
        evidence = Some(classify(&observation)?);

        if attempt < attempts && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn observation(elapsed_ms: u64) -> Observation {
        Observation {
            elapsed: Duration::from_millis(elapsed_ms),
            status_ok: true,
            body: String::new(),
        }
    }

    fn slow(obs: &Observation) -> Option<Duration> {
        (obs.elapsed >= Duration::from_millis(100)).then_some(obs.elapsed)
    }

    #[tokio::test]
    async fn all_attempts_must_agree() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = verify(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(observation(150 + n as u64)) }
            },
            slow,
            3,
            Duration::ZERO,
        )
        .await;

        assert_eq!(result, Some(Duration::from_millis(152)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_first_negative() {
        for failing_attempt in 1..=4u32 {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = calls.clone();
            let result = verify(
                move || {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    let elapsed = if n == failing_attempt { 10 } else { 150 };
                    async move { Ok(observation(elapsed)) }
                },
                slow,
                5,
                Duration::ZERO,
            )
            .await;

            assert!(result.is_none());
            assert_eq!(calls.load(Ordering::SeqCst), failing_attempt);
        }
    }

    #[tokio::test]
    async fn network_error_fails_closed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = verify(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<Observation, _>(ScanError::NetworkError("timeout".into())) }
            },
            slow,
            3,
            Duration::ZERO,
        )
        .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts_only() {
        let start = Instant::now();
        let result = verify(|| async { Ok(observation(200)) }, slow, 3, Duration::from_secs(12)).await;
        assert!(result.is_some());
        // 3次探测之间只有2次等待
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(24) && elapsed < Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_has_no_delay() {
        let start = Instant::now();
        let result = verify(|| async { Ok(observation(200)) }, slow, 1, Duration::from_secs(12)).await;
        assert!(result.is_some());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_attempts_never_confirms() {
        let result = verify(|| async { Ok(observation(200)) }, slow, 0, Duration::ZERO).await;
        assert!(result.is_none());
    }
}
