//! Clock-domain crosser tests: after N host ticks the DRAM side must have
//! received exactly floor(N * f1 / f2) ticks, for any rational ratio.

use dramsim::clock::ClockDomainCrosser;

/// Checks the floor invariant at every step for one frequency pair.
fn check_ratio(dram_hz: u64, host_hz: u64, host_ticks: u64) {
    let mut crosser = ClockDomainCrosser::new(dram_hz, host_hz);
    let effective_host = if host_hz == 0 { dram_hz } else { host_hz };
    let mut total: u64 = 0;
    for n in 1..=host_ticks {
        total += crosser.advance();
        let expected = (n as u128 * dram_hz as u128 / effective_host as u128) as u64;
        assert_eq!(
            total, expected,
            "drift at host tick {} for ratio {}/{}",
            n, dram_hz, host_hz
        );
    }
}

/// Equal clocks tick one for one.
#[test]
fn test_one_to_one() {
    check_ratio(666_666_667, 666_666_667, 10_000);
}

/// A zero host frequency means 1:1.
#[test]
fn test_zero_host_is_one_to_one() {
    let mut crosser = ClockDomainCrosser::new(800_000_000, 0);
    let mut total = 0;
    for _ in 0..1000 {
        total += crosser.advance();
    }
    assert_eq!(total, 1000);
}

/// DRAM faster than host: multiple DRAM ticks per host tick.
#[test]
fn test_fast_dram() {
    check_ratio(2, 1, 1_000);
    check_ratio(7, 3, 100_000);
}

/// DRAM slower than host: some host ticks deliver nothing.
#[test]
fn test_slow_dram() {
    check_ratio(1, 2, 1_000);
    check_ratio(3, 7, 100_000);
}

/// Realistic frequency pairs with no common factor, long run.
#[test]
fn test_irregular_ratios_no_drift() {
    check_ratio(666_666_667, 2_000_000_000, 1_000_000);
    check_ratio(800_000_000, 3_200_000_001, 1_000_000);
    check_ratio(999_999_937, 1_000_000_000, 1_000_000);
}

/// The accumulator never owes a fractional tick: the remainder stays
/// strictly below the host frequency.
#[test]
fn test_accumulator_bounded() {
    let mut crosser = ClockDomainCrosser::new(123_456_789, 987_654_321);
    let mut total: u64 = 0;
    for n in 1..=100_000u64 {
        total += crosser.advance();
        let exact = n as u128 * 123_456_789u128;
        let paid = total as u128 * 987_654_321u128;
        assert!(exact - paid < 987_654_321);
    }
}
