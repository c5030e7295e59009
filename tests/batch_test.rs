use std::cell::Cell;
use std::time::Duration;

use rs_mediasweep::batch::run_batch;
use rs_mediasweep::{BatchItem, BatchOptions, Error};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn options(batch_size: usize, delay_ms: u64, continue_on_error: bool) -> BatchOptions {
    BatchOptions {
        batch_size,
        delay_between_batches_ms: delay_ms,
        continue_on_error,
    }
}

#[tokio::test(start_paused = true)]
async fn failures_are_isolated_per_item() {
    let results = run_batch(
        vec![1, 2, 3, 4],
        |n: i32, _| async move {
            if n == 3 {
                Err(format!("item {n} broke"))
            } else {
                Ok(n * 2)
            }
        },
        &BatchOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .expect("expected Ok(_)");

    assert_eq!(
        results,
        vec![
            BatchItem::Ok(2),
            BatchItem::Ok(4),
            BatchItem::Failed("item 3 broke".to_string()),
            BatchItem::Ok(8),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn first_failure_aborts_when_not_continuing() {
    let started = Cell::new(0usize);
    let started = &started;

    let result = run_batch(
        (0..6).collect::<Vec<usize>>(),
        move |n, _| async move {
            started.set(started.get() + 1);
            if n == 1 {
                Err("boom")
            } else {
                Ok(n)
            }
        },
        &options(2, 10, false),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(
        result,
        Err(Error::BatchItemFailed {
            index: 1,
            message: "boom".to_string()
        })
    );
    // the remaining chunks never started
    assert_eq!(started.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn chunks_are_bounded_and_paced() {
    let in_flight = Cell::new(0usize);
    let peak = Cell::new(0usize);
    let (in_flight, peak) = (&in_flight, &peak);
    let started = Instant::now();

    let results = run_batch(
        (0..5).collect::<Vec<u32>>(),
        move |n, index| async move {
            in_flight.set(in_flight.get() + 1);
            peak.set(peak.get().max(in_flight.get()));
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.set(in_flight.get() - 1);
            Ok::<_, String>((n, index))
        },
        &options(2, 100, true),
        &CancellationToken::new(),
    )
    .await
    .expect("expected Ok(_)");

    assert_eq!(peak.get(), 2);
    assert!(results
        .iter()
        .enumerate()
        .all(|(i, r)| r.ok() == Some(&(u32::try_from(i).unwrap_or(u32::MAX), i))));

    // three chunks of 10 ms with two pauses in between, none after the last
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(230));
    assert!(elapsed < Duration::from_millis(330));
}

#[tokio::test(start_paused = true)]
async fn cancellation_marks_unprocessed_items_skipped() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let opts = options(2, 100, true);

    let (results, ()) = tokio::join!(
        run_batch(
            vec!["a", "b", "c", "d"],
            |s, _| async move { Ok::<_, String>(s.to_uppercase()) },
            &opts,
            &cancel,
        ),
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        }
    );

    let results = results.expect("expected Ok(_)");
    assert_eq!(results.len(), 4);
    assert_eq!(results[0], BatchItem::Ok("A".to_string()));
    assert_eq!(results[1], BatchItem::Ok("B".to_string()));
    assert!(results[2].is_skipped());
    assert!(results[3].is_skipped());
}
