//! End-to-end scenarios across the whole stack.

use parking_lot::Mutex;
use rill::prelude::*;
use rill::{Address, Envelope};
use rill_journal::{journal_path, Tailer};
use rill_runtime::ReactorRef;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn await_true(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn test_hello() {
    init_tracing();
    let system = ReactorSystem::new(SystemConfig::named("hello"));

    let upper = system
        .spawn(
            ReactorConfig::named("p"),
            Reactions::builder()
                .on::<String>(|ctx, text: String| {
                    ctx.reply(&text.to_uppercase());
                })
                .build(),
        )
        .unwrap();

    let replies = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = replies.clone();
    let sender = system
        .spawn(
            ReactorConfig::named("sender"),
            Reactions::builder()
                .on::<String>(move |_ctx, text: String| {
                    sink.lock().push(text);
                })
                .build(),
        )
        .unwrap();

    upper.tell(&sender, &"hi".to_string());
    assert!(await_true(Duration::from_secs(2), || {
        replies.lock().as_slice() == ["HI".to_string()]
    }));

    system.shutdown();
}

#[test]
fn test_dead_letter_completion() {
    init_tracing();
    let system = ReactorSystem::new(SystemConfig::named("dl"));
    let handle = system.handle();

    let sender = system
        .spawn(ReactorConfig::named("s"), Reactions::ignore_all())
        .unwrap();
    let ghost = ReactorRef::bind(
        Address::new(
            ReactorId::named("nobody"),
            handle.id().clone(),
            rill::DirectDriver::channel(),
        ),
        &handle,
    );

    let delivery = ghost.tell_with_policy(&sender, AckingPolicy::SenderRequired, &"x".to_string());
    assert_eq!(
        delivery.wait_timeout(Duration::from_secs(2)),
        Some(DeliveryStatus::NotDelivered)
    );

    system.shutdown();
}

/// Scenario: reactor `e` replies `n + 1` to every integer, all traffic over
/// the journal channel. The sender observes replies in order and the journal
/// holds all six records in append order.
#[test]
fn test_local_echo_via_journal() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::new(dir.path(), "main");
    let channel = config.channel_id();
    let system = ReactorSystem::new(
        SystemConfig::named("echo")
            .workers(2)
            .driver(Arc::new(JournalDriver::new(config))),
    );

    let echo = system
        .spawn(
            ReactorConfig::named("e"),
            Reactions::builder()
                .on::<u32>(|ctx, n: u32| {
                    ctx.reply(&(n + 1));
                })
                .build(),
        )
        .unwrap();

    let replies = Arc::new(Mutex::new(Vec::<u32>::new()));
    let sink = replies.clone();
    let sender = system
        .spawn(
            ReactorConfig::named("sender"),
            Reactions::builder()
                .on::<u32>(move |_ctx, n: u32| {
                    sink.lock().push(n);
                })
                .build(),
        )
        .unwrap();

    // Address both sides over the journal so requests and replies are
    // reified in the log.
    let echo_journal = echo.via(channel.clone());
    let sender_journal = sender.via(channel);
    for n in [1u32, 2, 3] {
        assert!(echo_journal
            .tell(&sender_journal, &n)
            .try_status()
            .unwrap()
            .is_delivered());
    }

    assert!(await_true(Duration::from_secs(5), || replies.lock().len() == 3));
    assert_eq!(*replies.lock(), vec![2, 3, 4]);

    // Three outbound sends plus three replies; per destination the journal
    // preserves append order, while the two streams interleave freely.
    let mut tailer = Tailer::open_at_start(&journal_path(dir.path(), "main")).unwrap();
    let mut outbound = Vec::new();
    let mut inbound = Vec::new();
    while let Some(record) = tailer.read_next().unwrap() {
        let env = Envelope::from_wire(&record).unwrap();
        let n = env.payload::<u32>().unwrap();
        if env.dest().reactor() == echo.id() {
            outbound.push(n);
        } else {
            inbound.push(n);
        }
    }
    assert_eq!(outbound, vec![1, 2, 3]);
    assert_eq!(inbound, vec![2, 3, 4]);

    system.shutdown();
}

/// Scenario: a parent with three slow-starting children terminates only
/// after the whole hierarchy is done.
#[test]
fn test_hierarchy_stop_with_remoting_attached() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let board = DirectoryBoard::new();
    let system = ReactorSystem::new(
        SystemConfig::named("hier")
            .workers(2)
            .driver(Arc::new(JournalDriver::new(JournalConfig::new(
                dir.path(),
                "main",
            )))),
    );
    let handle = system.handle();
    let _remoting = attach(&handle, [board]).unwrap();

    let stops = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let parent = system
        .spawn(ReactorConfig::named("parent"), Reactions::ignore_all())
        .unwrap();
    for i in 0..3 {
        let stops = stops.clone();
        handle
            .spawn_child(
                &parent,
                ReactorConfig::named(format!("child-{i}")),
                Reactions::builder()
                    .on::<ReactorInit>(|_ctx, _init: ReactorInit| {
                        std::thread::sleep(Duration::from_millis(10));
                    })
                    .on::<ReactorStop>(move |_ctx, _stop: ReactorStop| {
                        stops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    })
                    .build(),
            )
            .unwrap();
    }

    let parent_ctx = handle.context(parent.id()).unwrap();
    assert!(parent_ctx.stop().wait_timeout(Duration::from_secs(5)));
    assert_eq!(stops.load(std::sync::atomic::Ordering::SeqCst), 3);

    // A full shutdown afterwards is clean: remoting root and drivers go
    // down with the system.
    system.shutdown();
}

/// Ordering holds per sender even when the journal and direct channels are
/// both in play for different reactors.
#[test]
fn test_fifo_with_mixed_channels() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::new(dir.path(), "main");
    let channel = config.channel_id();
    let system = ReactorSystem::new(
        SystemConfig::named("mixed")
            .workers(4)
            .driver(Arc::new(JournalDriver::new(config))),
    );

    let direct_seen = Arc::new(Mutex::new(Vec::<u32>::new()));
    let journal_seen = Arc::new(Mutex::new(Vec::<u32>::new()));

    let direct_sink = direct_seen.clone();
    let direct_target = system
        .spawn(
            ReactorConfig::named("direct-target"),
            Reactions::builder()
                .on::<u32>(move |_ctx, n: u32| {
                    direct_sink.lock().push(n);
                })
                .build(),
        )
        .unwrap();

    let journal_sink = journal_seen.clone();
    let journal_target = system
        .spawn(
            ReactorConfig::named("journal-target"),
            Reactions::builder()
                .on::<u32>(move |_ctx, n: u32| {
                    journal_sink.lock().push(n);
                })
                .build(),
        )
        .unwrap()
        .via(channel);

    let sender = system
        .spawn(ReactorConfig::named("s"), Reactions::ignore_all())
        .unwrap();

    for n in 0..50u32 {
        direct_target.tell(&sender, &n);
        journal_target.tell(&sender, &n);
    }

    assert!(await_true(Duration::from_secs(5), || {
        direct_seen.lock().len() == 50 && journal_seen.lock().len() == 50
    }));
    assert_eq!(*direct_seen.lock(), (0..50).collect::<Vec<u32>>());
    assert_eq!(*journal_seen.lock(), (0..50).collect::<Vec<u32>>());

    system.shutdown();
}
