/// 并发测试模块
/// 测试多参与者配对、arena 自适应扩张/收缩以及取消竞争
use super::init_tracing;
use crate::{Exchanger, ExchangeError, Oversubscribed};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// 测试1: 场景 A，10,000 次新建交换器上的两方交换
#[test]
fn test_scenario_a_fresh_pairs() {
    for _ in 0..10_000 {
        let exchanger = Exchanger::<&'static str>::new();
        let remote = exchanger.clone();

        let t2 = thread::spawn(move || remote.register().exchange("B").unwrap());
        let got1 = exchanger.register().exchange("A").unwrap();
        let got2 = t2.join().unwrap();

        assert_eq!(got1, "B");
        assert_eq!(got2, "A");
    }
}

/// 测试2: 无丢失、无重复
///
/// 每一轮中所有线程恰好调用一次 exchange（线程数为偶数），
/// 每个物品必须被恰好另一个调用收到。
#[test]
fn test_no_loss_no_duplication() {
    const THREADS: usize = 32;
    const ROUNDS: usize = 200;

    let exchanger = Exchanger::<(usize, usize)>::builder().arena_slots(8).build();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let exchanger = exchanger.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut me = exchanger.register();
                let mut received = Vec::with_capacity(ROUNDS);
                for round in 0..ROUNDS {
                    barrier.wait();
                    let got = me.exchange((tid, round)).unwrap();
                    // 不会收到自己的物品，也不会收到其他轮次的物品
                    assert_ne!(got.0, tid);
                    assert_eq!(got.1, round);
                    received.push(got);
                }
                received
            })
        })
        .collect();

    let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
    for handle in handles {
        for item in handle.join().unwrap() {
            *counts.entry(item).or_default() += 1;
        }
    }

    assert_eq!(counts.len(), THREADS * ROUNDS);
    assert!(counts.values().all(|&n| n == 1));
}

/// 测试3: 配对是对称的
///
/// 如果 A 收到了 B 的物品，那么 B 必然收到了 A 的物品。
#[test]
fn test_pairing_is_symmetric() {
    const THREADS: usize = 16;
    const ROUNDS: usize = 100;

    let exchanger = Exchanger::<usize>::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let exchanger = exchanger.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut me = exchanger.register();
                (0..ROUNDS)
                    .map(|_| {
                        barrier.wait();
                        me.exchange(tid).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let partners: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for round in 0..ROUNDS {
        for tid in 0..THREADS {
            let partner = partners[tid][round];
            assert_eq!(partners[partner][round], tid);
        }
    }
}

/// 测试4: 场景 B，64 个线程持续交换
///
/// 竞争下 arena 上限必须超过初始值；负载停止后，
/// 零散的交换会让上限重新收缩。整个过程中配对保持恰好一次。
#[test]
fn test_scenario_b_arena_adapts() {
    init_tracing();

    const THREADS: u64 = 64;
    let window = Duration::from_millis(1_500);

    let exchanger = Exchanger::<u64>::builder().arena_slots(16).build();
    let initial = exchanger.arena_ceiling();
    let stop = Arc::new(AtomicBool::new(false));
    let peak = Arc::new(AtomicUsize::new(initial));

    let monitor = {
        let exchanger = exchanger.clone();
        let stop = Arc::clone(&stop);
        let peak = Arc::clone(&peak);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                peak.fetch_max(exchanger.arena_ceiling(), Ordering::Relaxed);
                thread::yield_now();
            }
        })
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|tid| {
            let exchanger = exchanger.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut me = exchanger.register();
                let mut delivered = Vec::new();
                let mut received = Vec::new();
                let mut seq = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let item = (tid << 32) | seq;
                    seq += 1;
                    match me.exchange_timeout(item, Duration::from_millis(5)) {
                        Ok(got) => {
                            delivered.push(item);
                            received.push(got);
                        }
                        Err(err) => {
                            // 取消时物品归还给调用者
                            assert!(err.is_timeout());
                            assert_eq!(err.into_inner(), item);
                        }
                    }
                }
                (delivered, received)
            })
        })
        .collect();

    thread::sleep(window);
    stop.store(true, Ordering::Relaxed);

    let mut delivered = Vec::new();
    let mut received = Vec::new();
    for worker in workers {
        let (d, r) = worker.join().unwrap();
        delivered.extend(d);
        received.extend(r);
    }
    monitor.join().unwrap();

    // 恰好一次：成功调用交出的物品与收到的物品一一对应
    delivered.sort_unstable();
    received.sort_unstable();
    assert!(!received.is_empty());
    assert_eq!(delivered, received);

    let peak = peak.load(Ordering::Relaxed).max(exchanger.arena_ceiling());
    // 单核上碰撞需要恰好在读槽与认领之间被抢占，几乎不会发生
    let multicore = thread::available_parallelism().is_ok_and(|n| n.get() > 1);
    if multicore {
        assert!(peak > initial, "arena never grew: peak {peak}, initial {initial}");
    }
    if peak == initial {
        return;
    }

    // 负载停止后，落在非零槽的零散等待者自旋超时并收缩 arena
    for _ in 0..5_000 {
        if exchanger.arena_ceiling() < peak {
            break;
        }
        let mut straggler = exchanger.register();
        let _ = straggler.exchange_timeout(0, Duration::from_millis(2));
    }
    assert!(
        exchanger.arena_ceiling() < peak,
        "arena did not shrink: ceiling {}, peak {peak}",
        exchanger.arena_ceiling()
    );
}

/// 测试5: 非零槽上的自旋超时收缩 arena
///
/// 单独的参与者在已扩张的 arena 上做有限超时交换：
/// 每次从 1 号槽开始，自旋耗尽并撤回后重新采样，累计足够次数后上限逐步降回 0。
#[test]
fn test_spinouts_shrink_grown_arena() {
    init_tracing();

    let exchanger = Exchanger::<u32>::builder().arena_slots(4).spins(16).build();
    exchanger.grow_arena_to(3);
    assert_eq!(exchanger.arena_ceiling(), 3);

    let mut me = exchanger.register_with_seed(7);
    let mut calls = 0u32;
    while exchanger.arena_ceiling() > 0 {
        assert!(calls < 500, "arena stuck at ceiling {}", exchanger.arena_ceiling());
        // 调用总在 0 号槽超时结束，把下次起点放回 1 号槽
        me.set_last_index(1);
        let err = me.exchange_timeout(calls, Duration::from_millis(1)).unwrap_err();
        assert_eq!(err, ExchangeError::TimedOut(calls));
        calls += 1;
    }

    // 收缩后仍能正常配对
    let remote = exchanger.clone();
    let partner = thread::spawn(move || remote.register().exchange(1).unwrap());
    assert_eq!(me.exchange(2).unwrap(), 1);
    assert_eq!(partner.join().unwrap(), 2);
}

/// 测试6: 取消与匹配竞争时不会出现"一方成功一方失败"
///
/// 只有两个参与者时，A 成功当且仅当 B 成功，并且互换物品；
/// 失败的一方总是拿回自己的物品。
#[test]
fn test_cancel_never_splits_a_pair() {
    const ROUNDS: u32 = 2_000;

    let exchanger = Exchanger::<(u8, u32)>::builder().arena_slots(1).build();
    let barrier = Arc::new(Barrier::new(2));

    let run = |side: u8| {
        let exchanger = exchanger.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut me = exchanger.register();
            (0..ROUNDS)
                .map(|round| {
                    barrier.wait();
                    let timeout = Duration::from_micros(u64::from(round % 50));
                    me.exchange_timeout((side, round), timeout)
                })
                .collect::<Vec<_>>()
        })
    };

    let (ta, tb) = (run(0), run(1));
    let a = ta.join().unwrap();
    let b = tb.join().unwrap();

    for (round, (ra, rb)) in a.into_iter().zip(b).enumerate() {
        let round = round as u32;
        match (ra, rb) {
            (Ok(from_b), Ok(from_a)) => {
                assert_eq!(from_b, (1, round));
                assert_eq!(from_a, (0, round));
            }
            (Err(ea), Err(eb)) => {
                assert_eq!(ea.into_inner(), (0, round));
                assert_eq!(eb.into_inner(), (1, round));
            }
            (ra, rb) => panic!("round {round} split: {ra:?} / {rb:?}"),
        }
    }
}

/// 测试7: 偏好阻塞的策略下仍然正确配对
#[test]
fn test_blocking_policy_still_pairs() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let exchanger = Exchanger::<usize>::builder()
        .arena_slots(4)
        .spin_policy(Oversubscribed::new(1, || usize::MAX))
        .build();
    let barrier = Arc::new(Barrier::new(THREADS));
    let received = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let exchanger = exchanger.clone();
            let barrier = Arc::clone(&barrier);
            let received = Arc::clone(&received);
            thread::spawn(move || {
                let mut me = exchanger.register();
                for round in 0..ROUNDS {
                    barrier.wait();
                    let got = me.exchange(tid * ROUNDS + round).unwrap();
                    received.lock().unwrap().push(got);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut received = Arc::try_unwrap(received).unwrap().into_inner().unwrap();
    received.sort_unstable();
    assert_eq!(received, (0..THREADS * ROUNDS).collect::<Vec<_>>());
}

/// 测试8: 零超时调用能与已在等待的伙伴配对
#[test]
fn test_zero_timeout_meets_waiting_partner() {
    let exchanger = Exchanger::<u32>::builder().arena_slots(1).build();
    let remote = exchanger.clone();
    let waiter = thread::spawn(move || remote.register().exchange(1).unwrap());

    let mut me = exchanger.register();
    let started = Instant::now();
    let got = loop {
        match me.exchange_timeout(2, Duration::ZERO) {
            Ok(got) => break got,
            Err(ExchangeError::TimedOut(item)) => assert_eq!(item, 2),
            Err(other) => panic!("unexpected {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(30));
        thread::yield_now();
    };

    assert_eq!(got, 1);
    assert_eq!(waiter.join().unwrap(), 2);
}
