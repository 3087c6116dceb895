// Model tests: on-disk JSON shape, sample ordering

mod common;

use common::{at, record, system};
use loadwatch::models::*;

#[test]
fn sample_orders_entities_by_name() {
    let s = Sample::new(
        at(10, 0, 0),
        vec![record("web-2", 1.0, 1.0, 1), record("db", 2.0, 2.0, 2), record("web-1", 3.0, 3.0, 3)],
        None,
    );
    let names: Vec<&str> = s.samples.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["db", "web-1", "web-2"]);
    assert_eq!(s.entity("web-1").unwrap().cpu_percent, 3.0);
    assert!(s.entity("missing").is_none());
}

#[test]
fn sample_keeps_first_of_duplicate_names() {
    let s = Sample::new(
        at(10, 0, 0),
        vec![record("db", 1.0, 1.0, 1), record("db", 9.0, 9.0, 9)],
        None,
    );
    assert_eq!(s.samples.len(), 1);
    assert_eq!(s.samples[0].cpu_percent, 1.0);
}

#[test]
fn empty_sample_is_valid() {
    let s = Sample::new(at(10, 0, 0), vec![], None);
    assert!(s.samples.is_empty());
    let json = serde_json::to_string(&s).unwrap();
    assert_eq!(json, r#"{"timestamp":"2024-05-01 10:00:00","samples":[]}"#);
}

#[test]
fn sample_json_shape() {
    let mut r = record("web-1", 12.5, 100.25, 4);
    r.memory_percent = Some(10.0);
    let s = Sample::new(at(9, 30, 5), vec![r, record("db", 0.0, 1.0, 1)], Some(system(40.0, 55.5)));
    let v: serde_json::Value = serde_json::to_value(&s).unwrap();

    assert_eq!(v["timestamp"], "2024-05-01 09:30:05");
    assert_eq!(v["system"]["cpu_percent"], 40.0);
    assert_eq!(v["system"]["memory_percent"], 55.5);
    assert_eq!(v["samples"][0]["name"], "db");
    assert!(v["samples"][0].get("memory_percent").is_none());
    assert_eq!(v["samples"][1]["name"], "web-1");
    assert_eq!(v["samples"][1]["cpu_percent"], 12.5);
    assert_eq!(v["samples"][1]["memory_mb"], 100.25);
    assert_eq!(v["samples"][1]["memory_percent"], 10.0);
    assert_eq!(v["samples"][1]["pids"], 4);
    assert_eq!(v["samples"][1]["status"], "running");
}

#[test]
fn sample_json_reads_back() {
    let s = Sample::new(at(23, 59, 59), vec![record("a", 1.0, 2.0, 3)], Some(system(1.0, 2.0)));
    let json = serde_json::to_string_pretty(&s).unwrap();
    let back: Sample = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);
}

#[test]
fn bad_timestamp_is_rejected() {
    let err = serde_json::from_str::<Sample>(r#"{"timestamp":"yesterday","samples":[]}"#);
    assert!(err.is_err());
}
