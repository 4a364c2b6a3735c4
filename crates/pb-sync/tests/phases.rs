//! The barrier, stack lock and turn gate composed across real threads.

#![cfg(not(loom))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pb_core::TurnOrder;
use pb_sync::{PhaseBarrier, Rendezvous, SemMutex, Semaphore, TurnGate};

#[test]
fn test_gated_workers_wait_for_every_arrival() {
    const UNGATED: usize = 5;
    const GATED: usize = 3;

    let barrier = Arc::new(PhaseBarrier::new(UNGATED, GATED));
    let arrived = Arc::new(AtomicUsize::new(0));

    let gated: Vec<_> = (0..GATED)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let arrived = Arc::clone(&arrived);
            thread::spawn(move || {
                let pass = barrier.wait().unwrap();
                assert_eq!(arrived.load(Ordering::SeqCst), UNGATED);
                pass
            })
        })
        .collect();

    let ungated: Vec<_> = (0..UNGATED)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let arrived = Arc::clone(&arrived);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i as u64 * 2));
                arrived.fetch_add(1, Ordering::SeqCst);
                barrier.arrive();
            })
        })
        .collect();

    for handle in ungated {
        handle.join().unwrap();
    }
    let mut last_count = 0;
    for handle in gated {
        if handle.join().unwrap().is_last {
            last_count += 1;
        }
    }
    assert_eq!(last_count, 1);
    assert_eq!(barrier.passed(), GATED);
}

#[test]
fn test_critical_sections_never_overlap() {
    let lock = Arc::new(SemMutex::new("stack", Vec::<usize>::new()));
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                for _ in 0..50 {
                    let mut guard = lock.lock().unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    guard.push(i);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(lock.max_occupancy(), 1);
    assert_eq!(lock.lock().unwrap().len(), 400);
}

#[test]
fn test_full_pipeline_orders_phase_two() {
    const WORKERS: u64 = 6;

    let rendezvous = Arc::new(Rendezvous::new());
    let gate = Arc::new(TurnGate::new(TurnOrder::Descending, WORKERS));
    let order = Arc::new(Mutex::new(Vec::new()));

    // TID 1 opens the rendezvous; everyone else passes through it.
    let handles: Vec<_> = (1..=WORKERS)
        .rev()
        .map(|tid| {
            let rendezvous = Arc::clone(&rendezvous);
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                if tid == 1 {
                    rendezvous.open();
                } else {
                    rendezvous.pass().unwrap();
                }
                gate.enter(tid, |_| order.lock().unwrap().push(tid)).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![6, 5, 4, 3, 2, 1]);
    assert!(rendezvous.is_open());
}

#[test]
fn test_interrupt_wakes_blocked_waiter() {
    let sem = Arc::new(Semaphore::named("blocked", 0));
    let waiter = {
        let sem = Arc::clone(&sem);
        thread::spawn(move || sem.wait())
    };
    thread::sleep(Duration::from_millis(10));
    sem.interrupt();
    assert!(waiter.join().unwrap().is_err());
    assert!(sem.is_interrupted());
}
