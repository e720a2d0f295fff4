//! Integration tests for moving elements between queues

mod common;

use std::time::{Duration, Instant};

use anyhow::Result;
use pretty_assertions::assert_eq;
use simpleq::{QueueError, TransferOutcome};

use crate::common::{assert_list, b, TestContext};

#[tokio::test]
async fn test_pop_pipe_moves_oldest_element() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("poppipe-src").await?;
    let q2 = ctx.queue("poppipe-dst").await?;

    q.push(b"first").await?;
    q.push(b"second").await?;

    assert_eq!(q.pop_pipe(&q2).await?, Some(b("first")));
    assert_list(&q, &["second"]).await;
    assert_list(&q2, &["first"]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_pop_pipe_empty_source_returns_none() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("poppipe-empty-src").await?;
    let q2 = ctx.queue("poppipe-empty-dst").await?;

    assert_eq!(q.pop_pipe(&q2).await?, None);
    assert_list(&q2, &[]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_blocking_pop_pipe_waits_for_push() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("bpoppipe-src").await?;
    let q2 = ctx.queue("bpoppipe-dst").await?;
    let pusher = q.duplicate().await?;

    let push = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        pusher.push(b"piped").await?;
        pusher.close().await;
        Ok::<_, QueueError>(())
    });

    let el = q.blocking_pop_pipe(&q2, Duration::from_secs(2)).await?;
    assert_eq!(el, Some(b("piped")));
    push.await??;
    assert_list(&q2, &["piped"]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_blocking_pop_pipe_timeout_is_not_an_error() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("bpoppipe-timeout-src").await?;
    let q2 = ctx.queue("bpoppipe-timeout-dst").await?;

    let timeout = Duration::from_secs(1);
    let start = Instant::now();
    let el = q.blocking_pop_pipe(&q2, timeout).await?;

    assert_eq!(el, None);
    assert!(start.elapsed() >= timeout);

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_pull_pipe_moves_present_element() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("pullpipe-src").await?;
    let q2 = ctx.queue("pullpipe-dst").await?;

    for el in ["a", "b", "c"] {
        q.push(el.as_bytes()).await?;
    }
    q2.push(b"z").await?;

    assert_eq!(q.pull_pipe(&q2, b"b").await?, 2);
    assert_list(&q, &["c", "a"]).await;
    assert_list(&q2, &["b", "z"]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_pull_pipe_pushes_even_when_absent() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("pullpipe-absent-src").await?;
    let q2 = ctx.queue("pullpipe-absent-dst").await?;

    q.push(b"a").await?;

    assert_eq!(q.pull_pipe(&q2, b"ghost").await?, 1);
    assert_list(&q, &["a"]).await;
    assert_list(&q2, &["ghost"]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_safe_pull_pipe_moves_present_element() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("spullpipe-src").await?;
    let q2 = ctx.queue("spullpipe-dst").await?;

    for el in ["x", "dup", "y", "dup"] {
        q.push(el.as_bytes()).await?;
    }
    q2.push(b"existing").await?;

    let outcome = q.safe_pull_pipe(&q2, b"dup").await?;
    assert_eq!(outcome, TransferOutcome::Moved { destination_len: 2 });
    assert_eq!(outcome.destination_len(), 2);

    // Exactly one occurrence moved, the oldest one
    assert_list(&q, &["dup", "y", "x"]).await;
    assert_list(&q2, &["dup", "existing"]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_safe_pull_pipe_leaves_queues_when_absent() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("spullpipe-absent-src").await?;
    let q2 = ctx.queue("spullpipe-absent-dst").await?;

    q.push(b"a").await?;
    q2.push(b"z").await?;

    let outcome = q.safe_pull_pipe(&q2, b"ghost").await?;
    assert_eq!(outcome, TransferOutcome::NotMoved);
    assert_eq!(outcome.destination_len(), 0);
    assert_list(&q, &["a"]).await;
    assert_list(&q2, &["z"]).await;

    q.close().await;
    q2.close().await;
    ctx.cleanup().await
}

#[tokio::test]
async fn test_pull_pipe_and_safe_pull_pipe_differ_on_absent_element() -> Result<()> {
    let mut ctx = TestContext::new()?;
    let q = ctx.queue("pipes-compare-src").await?;
    let unsafe_dst = ctx.queue("pipes-compare-unsafe").await?;
    let safe_dst = ctx.queue("pipes-compare-safe").await?;

    let pulled = q.pull_pipe(&unsafe_dst, b"missing").await?;
    let outcome = q.safe_pull_pipe(&safe_dst, b"missing").await?;

    assert_eq!(pulled, 1);
    assert_eq!(outcome, TransferOutcome::NotMoved);
    assert_list(&unsafe_dst, &["missing"]).await;
    assert_list(&safe_dst, &[]).await;

    q.close().await;
    unsafe_dst.close().await;
    safe_dst.close().await;
    ctx.cleanup().await
}
