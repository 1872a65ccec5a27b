// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use flow_core::{CmdPayload, NodePath};
use std::sync::Arc;
use std::time::Duration;

fn item(job: u64, path: &str) -> CmdQueueItem {
    CmdQueueItem::new(JobId(job), NodePath::from(path), CmdPayload::default())
}

fn paths(items: &[CmdQueueItem]) -> Vec<String> {
    items.iter().map(|i| i.node_path.to_string()).collect()
}

#[tokio::test]
async fn dequeues_in_enqueue_order() {
    let queue = CommandQueue::new(8);
    queue.enqueue(item(1, "a/1")).await.unwrap();
    queue.enqueue(item(2, "b/1")).await.unwrap();
    queue.enqueue(item(1, "a/2")).await.unwrap();

    let mut out = Vec::new();
    while let Some(item) = queue.try_dequeue() {
        out.push(item);
    }
    assert_eq!(paths(&out), vec!["a/1", "b/1", "a/2"]);
}

#[tokio::test]
async fn enqueue_waits_while_full() {
    let queue = Arc::new(CommandQueue::new(1));
    queue.enqueue(item(1, "a/1")).await.unwrap();

    let blocked = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.enqueue(item(1, "a/2")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!blocked.is_finished());
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.dequeue().await.map(|i| i.node_path.to_string()), Some("a/1".into()));
    tokio::time::timeout(Duration::from_secs(1), blocked).await.unwrap().unwrap().unwrap();
    assert_eq!(paths(&queue.pending()), vec!["a/2"]);
}

#[tokio::test]
async fn dequeue_waits_for_an_item() {
    let queue = Arc::new(CommandQueue::new(4));
    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.dequeue().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    queue.enqueue(item(3, "c/1")).await.unwrap();

    let got = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(got.map(|i| i.job_id), Some(JobId(3)));
}

#[tokio::test]
async fn cancel_removes_only_that_job_and_frees_capacity() {
    let queue = CommandQueue::new(3);
    queue.enqueue(item(1, "a/1")).await.unwrap();
    queue.enqueue(item(2, "b/1")).await.unwrap();
    queue.enqueue(item(1, "a/2")).await.unwrap();

    assert_eq!(queue.cancel(JobId(1)), 2);
    assert_eq!(queue.cancel(JobId(1)), 0);
    assert_eq!(paths(&queue.pending()), vec!["b/1"]);

    // Both freed slots are usable without waiting
    tokio::time::timeout(Duration::from_millis(100), async {
        queue.enqueue(item(3, "c/1")).await.unwrap();
        queue.enqueue(item(3, "c/2")).await.unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn close_drains_then_ends() {
    let queue = CommandQueue::new(4);
    queue.enqueue(item(1, "a/1")).await.unwrap();
    queue.close();

    assert_eq!(queue.enqueue(item(1, "a/2")).await, Err(QueueError::Closed));
    assert!(queue.dequeue().await.is_some());
    assert!(queue.dequeue().await.is_none());
}

#[tokio::test]
async fn close_wakes_blocked_enqueuers_and_dequeuers() {
    let queue = Arc::new(CommandQueue::new(1));
    queue.enqueue(item(1, "a/1")).await.unwrap();
    let enqueuer = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.enqueue(item(1, "a/2")).await })
    };

    let empty = Arc::new(CommandQueue::new(1));
    let dequeuer = {
        let empty = Arc::clone(&empty);
        tokio::spawn(async move { empty.dequeue().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    queue.close();
    empty.close();
    let enqueued = tokio::time::timeout(Duration::from_secs(1), enqueuer).await.unwrap().unwrap();
    assert_eq!(enqueued, Err(QueueError::Closed));
    let dequeued = tokio::time::timeout(Duration::from_secs(1), dequeuer).await.unwrap().unwrap();
    assert!(dequeued.is_none());
}

#[test]
fn zero_capacity_is_raised_to_one() {
    assert_eq!(CommandQueue::new(0).capacity(), 1);
}
