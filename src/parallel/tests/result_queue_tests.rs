use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::BlockHashError;
use crate::parallel::result_queue::ResultQueue;

#[test]
fn test_fifo_per_producer() {
    let queue = Arc::new(ResultQueue::new());
    let producer = queue.new_producer();

    producer.push("A").unwrap();
    producer.push("B").unwrap();
    producer.push("C").unwrap();

    assert_eq!(queue.pop_timeout(Duration::ZERO), Some("A"));
    assert_eq!(queue.pop_timeout(Duration::ZERO), Some("B"));
    assert_eq!(queue.pop_timeout(Duration::ZERO), Some("C"));

    drop(producer);
    assert_eq!(queue.pop_timeout(Duration::ZERO), None);
}

#[test]
fn test_pop_without_producers_returns_immediately() {
    let queue: Arc<ResultQueue<u32>> = Arc::new(ResultQueue::new());

    // No producer was ever registered: even the default (500 ms) pop must
    // observe end-of-stream without waiting out its timeout.
    let started = Instant::now();
    assert_eq!(queue.pop(), None);
    assert!(
        started.elapsed() < Duration::from_millis(250),
        "pop blocked despite zero producers"
    );
}

#[test]
fn test_pop_waits_out_timeout_while_producer_alive() {
    let queue: Arc<ResultQueue<u32>> = Arc::new(ResultQueue::new());
    let _producer = queue.new_producer();

    let started = Instant::now();
    assert_eq!(queue.pop_timeout(Duration::from_millis(50)), None);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_last_producer_drop_wakes_blocked_consumer() {
    let queue: Arc<ResultQueue<u32>> = Arc::new(ResultQueue::new());
    let producer = queue.new_producer();

    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    let queue_clone = Arc::clone(&queue);
    let consumer = thread::spawn(move || {
        // Signal just before blocking; the timeout is deliberately long so
        // a missed wakeup would make the test time visibly out.
        ready_tx.send(()).unwrap();
        let started = Instant::now();
        let popped = queue_clone.pop_timeout(Duration::from_secs(10));
        (popped, started.elapsed())
    });

    ready_rx.recv().unwrap();
    drop(producer);

    let (popped, waited) = consumer.join().unwrap();
    assert_eq!(popped, None);
    assert!(
        waited < Duration::from_secs(2),
        "consumer was not woken by the last deregistration"
    );
}

#[test]
fn test_first_push_wakes_blocked_consumer() {
    let queue: Arc<ResultQueue<u32>> = Arc::new(ResultQueue::new());
    let producer = queue.new_producer();

    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    let queue_clone = Arc::clone(&queue);
    let consumer = thread::spawn(move || {
        ready_tx.send(()).unwrap();
        queue_clone.pop_timeout(Duration::from_secs(10))
    });

    ready_rx.recv().unwrap();
    producer.push(42).unwrap();

    assert_eq!(consumer.join().unwrap(), Some(42));
}

#[test]
fn test_concurrent_pushes_lose_nothing() {
    const PRODUCERS: usize = 4;
    const ITEMS: u64 = 200;

    let queue: Arc<ResultQueue<(usize, u64)>> = Arc::new(ResultQueue::new());

    let mut handles = Vec::new();
    for producer_id in 0..PRODUCERS {
        let producer = queue.new_producer();
        handles.push(thread::spawn(move || {
            for seq in 0..ITEMS {
                producer.push((producer_id, seq)).unwrap();
            }
        }));
    }

    // Consume until the stream ends: a None is only final once every
    // producer has deregistered and the queue is empty.
    let mut last_seq = [None::<u64>; PRODUCERS];
    let mut total = 0u64;
    loop {
        match queue.pop_timeout(Duration::from_millis(50)) {
            Some((producer_id, seq)) => {
                // FIFO per producer: sequence numbers from one producer
                // must arrive strictly increasing.
                if let Some(previous) = last_seq[producer_id] {
                    assert!(seq > previous, "producer {} reordered", producer_id);
                }
                last_seq[producer_id] = Some(seq);
                total += 1;
            }
            None => {
                if queue.producer_count() == 0 && queue.is_empty() {
                    break;
                }
            }
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(total, PRODUCERS as u64 * ITEMS);
    for (producer_id, seq) in last_seq.iter().enumerate() {
        assert_eq!(seq, &Some(ITEMS - 1), "producer {} lost items", producer_id);
    }
}

#[test]
fn test_push_after_close_fails() {
    let queue: Arc<ResultQueue<u32>> = Arc::new(ResultQueue::new());
    let producer = queue.new_producer();

    queue.close();

    assert!(matches!(
        producer.push(7),
        Err(BlockHashError::QueueClosed(_))
    ));
}

#[test]
fn test_items_pushed_before_drop_survive() {
    let queue: Arc<ResultQueue<u32>> = Arc::new(ResultQueue::new());
    let producer = queue.new_producer();

    producer.push(1).unwrap();
    producer.push(2).unwrap();
    drop(producer);

    // Deregistration must not discard queued items.
    assert_eq!(queue.pop_timeout(Duration::ZERO), Some(1));
    assert_eq!(queue.pop_timeout(Duration::ZERO), Some(2));
    assert_eq!(queue.pop_timeout(Duration::ZERO), None);
}
