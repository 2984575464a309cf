use std::collections::HashSet;
use std::io::Write;
use std::os::unix::io::{AsFd, AsRawFd};
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use fibers_poll::{make_wake_pipe, Error, EventBase, EventBuffer, EventMask};

fn pairs(n: usize) -> Vec<(UnixStream, UnixStream)> {
    (0..n).map(|_| UnixStream::pair().unwrap()).collect()
}

#[test]
fn burst_within_capacity_is_reported_exactly() {
    for capacity in [1, 2, 7, 32] {
        let (wake, woke) = make_wake_pipe().unwrap();
        let mut base = EventBase::new(EventBuffer::with_capacity(capacity)).unwrap();
        let mut streams = pairs(capacity);

        for (_, rx) in &streams {
            unsafe {
                base.add_watch(rx, EventMask::READ | EventMask::PERSIST)
                    .unwrap();
            }
        }

        // Only every other stream becomes ready.
        let mut expected = HashSet::new();
        for (tx, rx) in streams.iter_mut().step_by(2) {
            tx.write_all(b"x").unwrap();
            expected.insert(rx.as_raw_fd());
        }

        let n = base.run_once(wake.as_fd(), woke.as_fd(), 0).unwrap();
        assert_eq!(n, expected.len());

        let reported: HashSet<_> = base.events().iter().map(|r| r.fd).collect();
        assert_eq!(reported, expected);
        assert!(base
            .events()
            .iter()
            .all(|r| r.mask() == EventMask::READ));
    }
}

#[test]
fn burst_over_capacity_fails() {
    let (wake, woke) = make_wake_pipe().unwrap();
    let mut base = EventBase::new(EventBuffer::with_capacity(3)).unwrap();
    let mut streams = pairs(4);

    for (tx, rx) in &mut streams {
        unsafe {
            base.add_watch(&*rx, EventMask::READ | EventMask::PERSIST)
                .unwrap();
        }
        tx.write_all(b"x").unwrap();
    }

    match base.run_once(wake.as_fd(), woke.as_fd(), 0) {
        Err(Error::BufferFull { capacity, .. }) => assert_eq!(capacity, 3),
        other => panic!("expected a full buffer, got {:?}", other),
    }

    // Growing the buffer makes the same iteration succeed.
    base.resize(EventBuffer::with_capacity(4));
    assert_eq!(base.run_once(wake.as_fd(), woke.as_fd(), 0).unwrap(), 4);
}

#[test]
fn wake_interrupts_blocked_iteration() {
    let (wake, woke) = make_wake_pipe().unwrap();
    let mut base = EventBase::new(EventBuffer::with_capacity(2)).unwrap();
    let (_tx, rx) = UnixStream::pair().unwrap();

    unsafe {
        base.add_watch(&woke, EventMask::READ | EventMask::PERSIST)
            .unwrap();
        base.add_watch(&rx, EventMask::READ | EventMask::PERSIST)
            .unwrap();
    }

    let sender = wake.clone();
    let waker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        sender.wake().unwrap();
    });

    let start = Instant::now();
    // Block without a deadline; only the wake can end this.
    let n = base.run_once(wake.as_fd(), woke.as_fd(), -1).unwrap();
    waker.join().unwrap();

    assert_eq!(n, 0);
    assert!(base.events().is_empty());
    assert!(start.elapsed() < Duration::from_secs(10));

    // The wake was drained and does not fire again.
    assert_eq!(base.run_once(wake.as_fd(), woke.as_fd(), 0).unwrap(), 0);
}

#[test]
fn event_base_runs_on_a_worker_thread() {
    let (wake, woke) = make_wake_pipe().unwrap();
    let (mut tx, rx) = UnixStream::pair().unwrap();
    let mut base = EventBase::new(EventBuffer::with_capacity(2)).unwrap();

    unsafe {
        base.add_watch(&woke, EventMask::READ | EventMask::PERSIST)
            .unwrap();
        base.add_watch(&rx, EventMask::IMPL_READ | EventMask::PERSIST)
            .unwrap();
    }

    let rx_fd = rx.as_raw_fd();
    let worker = thread::spawn(move || {
        let n = base.run_once(wake.as_fd(), woke.as_fd(), -1).unwrap();
        let records = base.events().to_vec();
        (n, records, rx, wake, woke)
    });

    tx.write_all(b"ping").unwrap();
    let (n, records, _rx, _wake, _woke) = worker.join().unwrap();

    assert_eq!(n, 1);
    assert_eq!(records[0].fd, rx_fd);
    assert!(records[0].mask().contains(EventMask::READ));
}

#[test]
fn hang_up_reports_closed() {
    let (wake, woke) = make_wake_pipe().unwrap();
    let mut base = EventBase::new(EventBuffer::with_capacity(1)).unwrap();
    let (tx, rx) = UnixStream::pair().unwrap();

    unsafe {
        base.add_watch(&rx, EventMask::IMPL_READ | EventMask::PERSIST)
            .unwrap();
    }
    drop(tx);

    assert_eq!(base.run_once(wake.as_fd(), woke.as_fd(), 0).unwrap(), 1);
    let mask = base.events()[0].mask();
    // A hang-up is always at least readable, so reading observes the EOF.
    assert!(mask.contains(EventMask::READ));
    assert!(!mask.contains(EventMask::WRITE));
}
