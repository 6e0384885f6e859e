use proptest::prelude::*;
use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};
use watchbox::{watchable, ObservableBox, ValueStream};

watchable! {
    pub struct Job {
        done: u32,
        status: String,
    }
}

#[test]
fn mutations_from_another_thread_are_published() {
    let job = Job::new(0, String::from("queued"));
    let boxed = ObservableBox::new(job.clone(), &["done", "status"]).unwrap();
    let seen: Arc<Mutex<Vec<u32>>> = Default::default();

    let _subscription = boxed.subscribe({
        let seen = seen.clone();
        move |j: &Job| seen.lock().unwrap().push(j.done())
    });

    let handle = thread::spawn({
        let job = job.clone();
        move || {
            for _ in 0..10 {
                job.update_done(|n| n + 1);
                thread::sleep(Duration::from_millis(1));
            }
            job.set_status(String::from("finished"));
        }
    });
    handle.join().unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(12, seen.len());
    assert_eq!((0..=10).collect::<Vec<_>>(), seen[..11].to_vec());
    assert_eq!(10, seen[11]);
    assert_eq!("finished", boxed.get().status());
}

#[test]
fn concurrent_pushes_are_all_delivered() {
    let stream = ValueStream::new(0usize);
    let seen: Arc<Mutex<Vec<usize>>> = Default::default();

    let _subscription = stream.subscribe({
        let seen = seen.clone();
        move |val| seen.lock().unwrap().push(*val)
    });

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let stream = stream.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    stream.send(t * 100 + i + 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut seen = seen.lock().unwrap().clone();
    assert_eq!(101, seen.len());

    // each thread's own pushes arrive in the order that thread made them
    for t in 0..4 {
        let own: Vec<usize> = seen
            .iter()
            .copied()
            .filter(|v| *v > t * 100 && *v <= t * 100 + 25)
            .collect();
        assert_eq!((t * 100 + 1..=t * 100 + 25).collect::<Vec<_>>(), own);
    }

    seen.sort();
    seen.dedup();
    assert_eq!(101, seen.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_workers_drive_a_box() {
    let job = Job::new(0, String::from("queued"));
    let boxed = ObservableBox::with_path(job.clone(), "done").unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let _subscription = boxed.subscribe(move |j: &Job| {
        let _ = tx.send(j.done());
    });

    let workers: Vec<_> = (0..5)
        .map(|_| {
            let job = job.clone();
            tokio::task::spawn_blocking(move || job.update_done(|n| n + 1))
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    let mut received = vec![];
    while let Ok(done) = rx.try_recv() {
        received.push(done);
    }

    assert_eq!(6, received.len());
    assert_eq!(0, received[0]);
    assert_eq!(5, boxed.get().done());
}

#[tokio::test]
async fn stream_outlives_box_across_tasks() {
    let job = Job::new(1, String::new());
    let stream = {
        let boxed = ObservableBox::with_path(job.clone(), "done").unwrap();
        boxed.stream()
    };

    let task = tokio::spawn({
        let stream = stream.clone();
        async move {
            stream.send(Job::new(7, String::from("manual")));
        }
    });
    task.await.unwrap();
    job.set_done(2);

    assert_eq!(7, stream.value().done());
    assert_eq!("manual", stream.value().status());
}

proptest! {
    #[test]
    fn every_push_is_delivered_in_order(values in prop::collection::vec(any::<i32>(), 0..40)) {
        let stream = ValueStream::new(0);
        let seen: Arc<Mutex<Vec<i32>>> = Default::default();

        let _subscription = stream.subscribe({
            let seen = seen.clone();
            move |val| seen.lock().unwrap().push(*val)
        });
        for v in &values {
            stream.send(*v);
        }

        let mut expected = vec![0];
        expected.extend(values.iter().copied());
        prop_assert_eq!(expected, seen.lock().unwrap().clone());
    }

    #[test]
    fn reentrant_fan_out_is_not_coalesced(values in prop::collection::vec(1i32..1000, 1..10)) {
        let stream = ValueStream::new(0);
        let relay: Arc<Mutex<Vec<i32>>> = Default::default();
        let listener: Arc<Mutex<Vec<i32>>> = Default::default();

        // the first push triggers all the others from inside a delivery
        let _relay = stream.subscribe({
            let relay = relay.clone();
            let stream = stream.clone();
            let rest = values[1..].to_vec();
            move |val| {
                relay.lock().unwrap().push(*val);
                if *val == -1 {
                    for v in &rest {
                        stream.send(*v);
                    }
                }
            }
        });
        let _listener = stream.subscribe({
            let listener = listener.clone();
            move |val| listener.lock().unwrap().push(*val)
        });

        stream.send(-1);

        let mut expected = vec![0, -1];
        expected.extend(values[1..].iter().copied());
        prop_assert_eq!(&expected, &*relay.lock().unwrap());
        prop_assert_eq!(&expected, &*listener.lock().unwrap());
    }

    #[test]
    fn watched_mutations_publish_once_each(steps in prop::collection::vec(0u32..5, 0..30)) {
        let job = Job::new(0, String::new());
        let boxed = ObservableBox::with_path(job.clone(), "done").unwrap();
        let seen: Arc<Mutex<Vec<u32>>> = Default::default();

        let _subscription = boxed.subscribe({
            let seen = seen.clone();
            move |j: &Job| seen.lock().unwrap().push(j.done())
        });

        let mut expected = vec![0];
        let mut total = 0;
        for step in &steps {
            total += step;
            job.set_done(total);
            expected.push(total);
        }

        prop_assert_eq!(expected, seen.lock().unwrap().clone());
    }
}
