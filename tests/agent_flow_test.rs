/*!
 * Agent Flow Tests
 * End-to-end: encoded command records in, encoded event records out
 */

use std::io::{self, Cursor, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serial_test::serial;

use vmproc_agent::{
    spawn_flush_loop, Command, CommandKind, Dispatcher, Event, EventKind, EventQueue,
    InboundReader, ProcessTable, RxChannel, TermSize, TxChannel,
};
use vmproc_agent::wire::EVENT_RECORD_LEN;

const DEADLINE: Duration = Duration::from_secs(10);

/// Stand-in for the outbound control device
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn decode_events(bytes: &[u8]) -> Vec<Event> {
    bytes
        .chunks_exact(EVENT_RECORD_LEN)
        .map(|chunk| {
            let mut record = [0u8; EVENT_RECORD_LEN];
            record.copy_from_slice(chunk);
            Event::decode(&record).unwrap()
        })
        .collect()
}

fn command(kind: CommandKind, slot: i8, correlation: u64, payload: &[u8]) -> Command {
    Command {
        kind,
        slot,
        signal: 0,
        correlation,
        payload: payload.to_vec(),
        term_size: TermSize {
            rows: 24,
            cols: 80,
            xpixel: 0,
            ypixel: 0,
        },
    }
}

/// Run a full agent over an in-memory command stream, returning every
/// event record written outbound once `done` is satisfied.
fn run_agent(commands: &[Command], done: impl Fn(&[Event]) -> bool) -> Vec<Event> {
    let mut stream = Vec::new();
    for c in commands {
        stream.extend_from_slice(&c.encode());
    }

    let table = Arc::new(ProcessTable::new());
    let events = Arc::new(EventQueue::new());
    let sink = SharedSink::default();
    let bytes = Arc::clone(&sink.0);

    spawn_flush_loop(Arc::clone(&events), TxChannel::new(sink)).unwrap();
    events.push(Event::online());

    let dispatcher = Dispatcher::new(table, Arc::clone(&events));
    InboundReader::new(RxChannel::new(Cursor::new(stream)), dispatcher).run();

    let deadline = Instant::now() + DEADLINE;
    loop {
        let decoded = decode_events(&bytes.lock());
        if done(&decoded) {
            return decoded;
        }
        assert!(Instant::now() < deadline, "timed out; got {decoded:?}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_online_event_leads_the_stream() {
    let events = run_agent(&[command(CommandKind::Ping, -1, 1, &[])], |evs| {
        evs.len() >= 2
    });
    assert_eq!(events[0].kind, EventKind::Online);
    assert_eq!(events[0].slot, 0);
    assert_eq!(events[0].correlation, 0);
    assert!(events[0].payload.is_empty());
}

#[test]
fn test_results_follow_command_arrival_order() {
    let commands = vec![
        command(CommandKind::Ping, -1, 10, &[]),
        command(CommandKind::Kill, 63, 11, &[]),
        command(CommandKind::List, -1, 12, &[]),
        command(CommandKind::Ping, -1, 13, &[]),
    ];
    let events = run_agent(&commands, |evs| evs.len() >= 5);

    let results: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::CommandResult)
        .collect();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].correlation, 10);
    assert_eq!(results[0].reason(), "PONG");
    assert_eq!(results[1].correlation, 11);
    assert_eq!(results[1].reason(), "tid_killed");
    assert_eq!(results[2].correlation, 12);
    assert_eq!(results[2].payload.len(), 64);
    assert_eq!(results[3].correlation, 13);
}

#[test]
fn test_list_snapshot_is_empty_on_boot() {
    let events = run_agent(&[command(CommandKind::List, -1, 5, &[])], |evs| {
        evs.len() >= 2
    });
    let list = events
        .iter()
        .find(|e| e.correlation == 5)
        .expect("list result");
    assert_eq!(list.payload.len(), 64);
    assert!(list.payload.iter().all(|&b| b == 0));
}

#[test]
#[serial]
fn test_run_to_stopped_over_the_wire() {
    let events = run_agent(
        &[command(CommandKind::Run, -1, 21, b"printf abc; exit 7")],
        |evs| evs.iter().any(|e| e.kind == EventKind::Stopped),
    );

    let result = events
        .iter()
        .find(|e| e.correlation == 21)
        .expect("run result");
    assert!(!result.error);
    assert_eq!(result.reason(), "succ");

    let output: Vec<u8> = events
        .iter()
        .filter(|e| e.kind == EventKind::Stdout)
        .flat_map(|e| e.payload.iter().copied())
        .collect();
    assert_eq!(output, b"abc");

    let stopped = events
        .iter()
        .find(|e| e.kind == EventKind::Stopped)
        .unwrap();
    assert!(!stopped.error);
    assert_eq!(stopped.correlation, 7);
    assert_eq!(stopped.slot, result.slot);
}

#[test]
#[serial]
fn test_overload_runs_saturate_at_capacity() {
    let table = Arc::new(ProcessTable::new());
    let events = Arc::new(EventQueue::new());
    let dispatcher = Dispatcher::new(Arc::clone(&table), Arc::clone(&events));

    // 70 Runs against 64 slots. Drain as we go so result pushes never
    // block on the bounded queue.
    let mut results = Vec::new();
    for i in 0..70u64 {
        dispatcher.dispatch(command(CommandKind::Run, -1, 100 + i, b"sleep 30"));
        results.extend(
            events
                .drain()
                .into_iter()
                .filter(|e| e.kind == EventKind::CommandResult),
        );
    }

    let succ: Vec<_> = results.iter().filter(|e| e.reason() == "succ").collect();
    let rejected: Vec<_> = results
        .iter()
        .filter(|e| e.reason() == "no_tid")
        .collect();
    assert_eq!(succ.len(), 64);
    assert_eq!(rejected.len(), 6);

    // No slot id handed out twice.
    let mut slots: Vec<i8> = succ.iter().map(|e| e.slot).collect();
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), 64);
    for e in rejected {
        assert!(e.error);
    }

    // Tear down: kill every slot, then wait for all 64 Stopped events.
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut stopped = 0usize;
    let mut killed = vec![false; 64];
    while stopped < 64 {
        assert!(Instant::now() < deadline, "children never stopped");
        for slot in 0..64i8 {
            if !killed[slot as usize] {
                dispatcher.dispatch(command(CommandKind::Kill, slot, 500 + slot as u64, &[]));
            }
        }
        for event in events.drain() {
            match event.kind {
                EventKind::Stopped => stopped += 1,
                EventKind::CommandResult if event.reason() == "succ" => {
                    killed[(event.correlation - 500) as usize] = true;
                }
                _ => {}
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
