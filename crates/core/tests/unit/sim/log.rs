use cosim_core::sim::{
    FlightRecord, JsonLinesSink, MemorySink, SensorFrame, TelemetryFrame, TelemetrySink,
    VehicleState,
};

fn record(step: u64) -> FlightRecord {
    FlightRecord {
        step,
        time_s: step as f64 * 0.001,
        tick: 1000 + step,
        dt_s: 0.001,
        motors: [0; 4],
        state: VehicleState::default(),
        sensors: SensorFrame::resting(),
        telemetry: TelemetryFrame::default(),
    }
}

#[test]
fn test_memory_sink_keeps_order() {
    let mut sink = MemorySink::new();
    for step in 1..=3 {
        sink.record(&record(step)).unwrap();
    }
    sink.flush().unwrap();
    let steps: Vec<u64> = sink.into_records().iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![1, 2, 3]);
}

#[test]
fn test_json_lines_one_object_per_step() {
    let mut sink = JsonLinesSink::new(Vec::new());
    sink.record(&record(1)).unwrap();
    sink.record(&record(2)).unwrap();
    sink.flush().unwrap();
    assert_eq!(sink.written(), 2);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: FlightRecord = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first, record(1));
    let value: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(value["tick"], 1002);
    assert_eq!(value["sensors"]["accel"][2], 9.81);
}

#[test]
fn test_boxed_sink_forwards() {
    let mut sink: Box<dyn TelemetrySink> = Box::new(JsonLinesSink::new(Vec::new()));
    sink.record(&record(7)).unwrap();
    sink.flush().unwrap();
}
