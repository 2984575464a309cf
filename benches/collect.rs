use std::io::{Read, Write};
use std::os::unix::io::AsFd;
use std::os::unix::net::UnixStream;

use criterion::{criterion_group, criterion_main, Criterion};
use fibers_poll::{make_wake_pipe, EventBase, EventBuffer, EventMask};

fn idle(c: &mut Criterion) {
    let (wake, woke) = make_wake_pipe().unwrap();
    let mut base = EventBase::new(EventBuffer::with_capacity(64)).unwrap();
    let streams: Vec<_> = (0..63).map(|_| UnixStream::pair().unwrap()).collect();

    unsafe {
        base.add_watch(&woke, EventMask::READ | EventMask::PERSIST)
            .unwrap();
        for (_, rx) in &streams {
            base.add_watch(rx, EventMask::READ | EventMask::PERSIST)
                .unwrap();
        }
    }

    c.bench_function("poll_idle", |b| {
        b.iter(|| {
            base.run_once(wake.as_fd(), woke.as_fd(), 0).unwrap();
        });
    });
}

fn burst(c: &mut Criterion) {
    let (wake, woke) = make_wake_pipe().unwrap();
    let mut base = EventBase::new(EventBuffer::with_capacity(64)).unwrap();
    let mut streams: Vec<_> = (0..63).map(|_| UnixStream::pair().unwrap()).collect();

    unsafe {
        base.add_watch(&woke, EventMask::READ | EventMask::PERSIST)
            .unwrap();
        for (_, rx) in &streams {
            base.add_watch(rx, EventMask::READ | EventMask::PERSIST)
                .unwrap();
        }
    }

    c.bench_function("poll_burst", |b| {
        b.iter(|| {
            for (tx, _) in &mut streams {
                tx.write_all(&[0]).unwrap();
            }
            wake.wake().unwrap();

            let n = base.run_once(wake.as_fd(), woke.as_fd(), 0).unwrap();
            assert_eq!(n, 63);

            let mut buf = [0u8; 1];
            for (_, rx) in &mut streams {
                rx.read_exact(&mut buf).unwrap();
            }
        });
    });
}

criterion_group!(benches, idle, burst);
criterion_main!(benches);
