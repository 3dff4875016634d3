use cosim_core::stats::{RunStats, STATS_SECTIONS, stats_section};

#[test]
fn test_record_step_accumulates() {
    let mut stats = RunStats::new();
    stats.record_step(10, 0.010);
    stats.record_step(2, 0.002);
    assert_eq!(stats.steps, 2);
    assert_eq!(stats.firmware_ticks, 12);
    assert!((stats.sim_seconds - 0.012).abs() < 1e-12);
}

#[test]
fn test_render_all_sections() {
    let mut stats = RunStats::new();
    stats.halts = 3;
    stats.spurious_halts = 1;
    stats.record_step(10, 0.010);
    stats.startup_attempts = 4;
    stats.finish();

    let report = stats.render_sections(&[]);
    assert!(report.contains("FIRMWARE CO-SIMULATION STATISTICS"));
    assert!(report.contains("SYNCHRONIZATION"));
    assert!(report.contains("1 (33.33%)"));
    assert!(report.contains("ticks_per_step         10.000"));
    assert!(report.contains("self_test_polls        4"));
}

#[test]
fn test_render_selected_section() {
    let stats = RunStats::new();
    let report = stats.render_sections(&["sync".to_string()]);
    assert!(report.contains("SYNCHRONIZATION"));
    assert!(!report.contains("FIRMWARE CO-SIMULATION STATISTICS"));
    assert!(!report.contains("STARTUP"));
    assert_eq!(STATS_SECTIONS, &["summary", "sync", "startup"]);
}

#[test]
fn test_finish_freezes_host_time() {
    let mut stats = RunStats::new();
    stats.finish();
    let first = stats.host_time();
    std::thread::sleep(std::time::Duration::from_millis(5));
    stats.finish();
    assert_eq!(stats.host_time(), first);
}

#[test]
fn test_stats_section_lookup() {
    assert_eq!(stats_section("sync"), Some("sync"));
    assert_eq!(stats_section(" Startup "), Some("startup"));
    assert_eq!(stats_section("timing"), None);
}
