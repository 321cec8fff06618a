//! Multi-channel front-end tests: address sharding, clock-domain fanning,
//! acceptance queries, and epoch power reports.

use dramsim::config::{Config, DeviceParams, SystemParams};
use dramsim::mem::addressing::{AddressMapper, MappedAddress};
use dramsim::mem::system::MemorySystem;
use dramsim::mem::transaction::{Completion, Transaction, TransactionKind};
use std::cell::RefCell;
use std::rc::Rc;

fn two_channel_config() -> Config {
    let system = SystemParams {
        num_chans: 2,
        ..SystemParams::default()
    };
    Config::resolve(DeviceParams::default(), system, 4096).unwrap()
}

fn collecting_system(cfg: Config) -> (MemorySystem, Rc<RefCell<Vec<Completion>>>) {
    let mut system = MemorySystem::with_config(cfg);
    let completions = Rc::new(RefCell::new(Vec::new()));
    let reads = completions.clone();
    let writes = completions.clone();
    system.register_callbacks(
        Box::new(move |c| reads.borrow_mut().push(c)),
        Box::new(move |c| writes.borrow_mut().push(c)),
        None,
    );
    (system, completions)
}

/// Transactions land on the channel the address mapper names.
#[test]
fn test_channel_sharding() {
    let cfg = two_channel_config();
    let mapper = AddressMapper::new(&cfg);
    let (mut system, completions) = collecting_system(cfg);

    for channel in 0..2u64 {
        let address = mapper.compose(MappedAddress {
            channel,
            rank: 0,
            bank: 0,
            row: 0,
            column: 0,
        });
        system
            .add_transaction(Transaction::new(TransactionKind::Read, address, None))
            .unwrap();
    }

    for _ in 0..40 {
        system.update();
    }

    // Both channels were idle, so both reads see the uncontended latency.
    let done: Vec<u64> = completions.borrow().iter().map(|c| c.done_cycle).collect();
    assert_eq!(done, vec![26, 26]);
    let accepted: Vec<u64> = system
        .channels()
        .iter()
        .map(|c| c.controller().stats.reads_accepted)
        .collect();
    assert_eq!(accepted, vec![1, 1]);
}

/// The addressed flavor of willAccept checks only the target channel; the
/// addressless flavor is the conjunction over all channels.
#[test]
fn test_will_accept_flavors() {
    let cfg = two_channel_config();
    let mapper = AddressMapper::new(&cfg);
    let depth = cfg.trans_queue_depth;
    let (mut system, _completions) = collecting_system(cfg);

    let chan0 = |row: u64| {
        mapper.compose(MappedAddress {
            channel: 0,
            rank: 0,
            bank: 0,
            row,
            column: 0,
        })
    };
    let chan1 = mapper.compose(MappedAddress {
        channel: 1,
        rank: 0,
        bank: 0,
        row: 0,
        column: 0,
    });

    for row in 0..depth as u64 {
        system
            .add_transaction(Transaction::new(TransactionKind::Read, chan0(row), None))
            .unwrap();
    }

    assert!(!system.will_accept_transaction_for(chan0(0)));
    assert!(system.will_accept_transaction_for(chan1));
    assert!(!system.will_accept_transaction());
}

/// One host tick at half the DRAM clock delivers two DRAM cycles to every
/// channel.
#[test]
fn test_clock_crossing_fans_all_channels() {
    let cfg = two_channel_config();
    let dram_hz = cfg.dram_clk_hz();
    let mut system = MemorySystem::with_config(cfg);
    system.set_cpu_clock_speed(dram_hz / 2);

    for _ in 0..100 {
        system.update();
    }
    assert_eq!(system.cycle(), 200);
    for channel in system.channels() {
        assert_eq!(channel.controller().cycle(), 200);
    }
}

/// Without registered callbacks completions accumulate for draining.
#[test]
fn test_unregistered_completions_are_drainable() {
    let cfg = Config::resolve(DeviceParams::default(), SystemParams::default(), 2048).unwrap();
    let mut system = MemorySystem::with_config(cfg);
    system
        .add_transaction(Transaction::new(TransactionKind::Read, 0, None))
        .unwrap();
    for _ in 0..40 {
        system.update();
    }
    let drained = system.drain_completions();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].done_cycle, 26);
    assert!(system.drain_completions().is_empty());
}

/// The power callback fires once per rank per epoch, and an idle system
/// still burns background power.
#[test]
fn test_power_reports_per_epoch() {
    let system_params = SystemParams {
        epoch_length: 100,
        ..SystemParams::default()
    };
    let cfg = Config::resolve(DeviceParams::default(), system_params, 2048).unwrap();
    let mut system = MemorySystem::with_config(cfg);

    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    system.register_callbacks(
        Box::new(|_| {}),
        Box::new(|_| {}),
        Some(Box::new(move |r| sink.borrow_mut().push(r))),
    );

    for _ in 0..250 {
        system.update();
    }

    let reports = reports.borrow();
    // Two full epochs, one rank.
    assert_eq!(reports.len(), 2);
    for report in reports.iter() {
        assert!(report.background_w > 0.0);
        assert_eq!(report.rank, 0);
    }
}

/// Geometry is exposed for upstream address generators.
#[test]
fn test_dimensions() {
    let cfg = two_channel_config();
    let system = MemorySystem::with_config(cfg);
    assert_eq!(system.dimensions(), (2, 1, 8, 32768, 1024));
}

/// Storage mode routes the write payload back with its completion.
#[test]
fn test_storage_mode_routes_data_back() {
    let system_params = SystemParams {
        store_data: true,
        ..SystemParams::default()
    };
    let cfg = Config::resolve(DeviceParams::default(), system_params, 2048).unwrap();
    let (mut system, completions) = collecting_system(cfg);

    let payload = vec![0xa5u8; 32];
    system
        .add_transaction(Transaction::new(
            TransactionKind::Write,
            0,
            Some(payload.clone()),
        ))
        .unwrap();
    for _ in 0..40 {
        system.update();
    }

    let completions = completions.borrow();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].data.as_deref(), Some(payload.as_slice()));
}

/// Without storage mode the payload is dropped at acceptance.
#[test]
fn test_payload_dropped_without_storage_mode() {
    let cfg = Config::resolve(DeviceParams::default(), SystemParams::default(), 2048).unwrap();
    let (mut system, completions) = collecting_system(cfg);
    system
        .add_transaction(Transaction::new(
            TransactionKind::Write,
            0,
            Some(vec![1, 2, 3]),
        ))
        .unwrap();
    for _ in 0..40 {
        system.update();
    }
    assert!(completions.borrow()[0].data.is_none());
}
