use cosim_core::common::{Addr, MonitorError};
use cosim_core::monitor::{Breakpoint, BreakpointSlot};

const ENTRY: Addr = Addr::new(0x0800_4024);

#[test]
fn test_commit_then_conflict() {
    let mut slot = BreakpointSlot::new();
    slot.check_free(&Breakpoint::hardware(ENTRY)).unwrap();
    let handle = slot.commit(Breakpoint::hardware(ENTRY));
    assert_eq!(handle.addr(), ENTRY);
    assert_eq!(slot.active(), Some(&Breakpoint::hardware(ENTRY)));

    let other = Breakpoint::hardware(Addr::new(0x0800_5000));
    match slot.check_free(&other) {
        Err(MonitorError::BreakpointConflict { active, requested }) => {
            assert_eq!(active, ENTRY);
            assert_eq!(requested, other.addr);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn test_clear_without_breakpoint() {
    let mut armed = BreakpointSlot::new();
    let handle = armed.commit(Breakpoint::hardware(ENTRY));
    armed.release();

    assert!(matches!(
        armed.check_active(handle),
        Err(MonitorError::NoActiveBreakpoint)
    ));
    assert!(armed.active().is_none());
}

#[test]
fn test_stale_handle_rejected() {
    let mut slot = BreakpointSlot::default();
    let first = slot.commit(Breakpoint::hardware(ENTRY));
    slot.release();
    let second = slot.commit(Breakpoint::hardware(ENTRY));

    assert_ne!(first.id(), second.id());
    assert!(matches!(
        slot.check_active(first),
        Err(MonitorError::StaleBreakpoint(id)) if id == first.id()
    ));
    assert_eq!(slot.check_active(second).unwrap(), Breakpoint::hardware(ENTRY));
}
