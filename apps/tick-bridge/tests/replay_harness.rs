//! Replay Harness Integration Test
//!
//! Feeds a recorded CSV tick file through the full pipeline exactly as the
//! binary does in replay mode, and checks that the published snapshots
//! match what the live path would produce.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::io::Write;
use std::time::Duration;

use serde_json::Value;

use common::{CaptureSink, directory_with, wait_until};
use tick_bridge::{Pipeline, PipelineConfig, ReplayFeed};

const HEADER: &str =
    "kind,instrument,time,bid,ask,bid_size,ask_size,price,size,past_limit,open,high,low,close,volume\n";

fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn replayed_ticks_reproduce_the_live_snapshot() {
    let fixture = write_fixture(&format!(
        "{HEADER}\
         quote,AAPL,1000,100.5,100.6,10,20,,,,,,,,\n\
         trade,AAPL,1500,,,,,100.55,50,false,,,,,\n\
         quote,SPY,1600,500.0,500.1,1,2,,,,,,,,\n\
         trade,SPY,1700,,,,,500.05,7,true,,,,,\n\
         bar,SPY,2000,,,,,,,,500.0,501.5,499.0,500.75,12000\n"
    ));

    let sink = CaptureSink::new();
    let published = sink.published();
    let directory = directory_with(&["AAPL", "SPY"]);

    let config = PipelineConfig {
        idle_backoff: Duration::from_micros(50),
        drain_timeout: Duration::from_secs(2),
        ..PipelineConfig::default()
    };
    let mut pipeline =
        Pipeline::start(config, directory.clone(), Box::new(sink)).unwrap();

    let handler = pipeline.handler();
    let stats = ReplayFeed::new(fixture.path())
        .run(&directory, handler.as_ref())
        .unwrap();

    assert_eq!(stats.quotes, 2);
    assert_eq!(stats.trades, 2);
    assert_eq!(stats.bars, 1);
    assert_eq!(stats.skipped, 0);

    assert!(wait_until(Duration::from_secs(2), || {
        published.lock().len() == 3
    }));

    pipeline.shutdown();

    let captured = published.lock();
    let topics: Vec<&str> = captured.iter().map(|(t, _)| t.as_str()).collect();
    assert!(topics.contains(&"ticks:AAPL"));
    assert!(topics.contains(&"ticks:SPY"));
    assert!(topics.contains(&"bars:SPY"));

    let aapl = captured
        .iter()
        .find(|(t, _)| t == "ticks:AAPL")
        .map(|(_, p)| serde_json::from_slice::<Value>(p).unwrap())
        .unwrap();
    assert_eq!(aapl["price"]["bid"], 100.5);
    assert_eq!(aapl["price"]["ask"], 100.6);
    assert_eq!(aapl["price"]["last"], 100.55);
    assert_eq!(aapl["timestamps"]["quote"], 1000);
    assert_eq!(aapl["timestamps"]["trade"], 1500);

    let spy = captured
        .iter()
        .find(|(t, _)| t == "ticks:SPY")
        .map(|(_, p)| serde_json::from_slice::<Value>(p).unwrap())
        .unwrap();
    assert_eq!(spy["price"]["last"], 500.05);
    assert_eq!(spy["tickAttrib"]["pastLimit"], true);

    let bar = captured
        .iter()
        .find(|(t, _)| t == "bars:SPY")
        .map(|(_, p)| serde_json::from_slice::<Value>(p).unwrap())
        .unwrap();
    assert_eq!(bar["close"], 500.75);
    assert_eq!(bar["volume"], 12_000);
}

#[test]
fn rows_for_unregistered_instruments_are_skipped() {
    let fixture = write_fixture(&format!(
        "{HEADER}\
         quote,MSFT,1000,400.0,400.1,5,5,,,,,,,,\n\
         quote,AAPL,1100,100.5,100.6,10,20,,,,,,,,\n\
         trade,AAPL,1200,,,,,100.55,50,false,,,,,\n"
    ));

    let sink = CaptureSink::new();
    let published = sink.published();
    let directory = directory_with(&["AAPL"]);

    let config = PipelineConfig {
        idle_backoff: Duration::from_micros(50),
        drain_timeout: Duration::from_secs(2),
        ..PipelineConfig::default()
    };
    let mut pipeline =
        Pipeline::start(config, directory.clone(), Box::new(sink)).unwrap();

    let handler = pipeline.handler();
    let stats = ReplayFeed::new(fixture.path())
        .run(&directory, handler.as_ref())
        .unwrap();

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.dispatched(), 2);

    pipeline.shutdown();

    let captured = published.lock();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, "ticks:AAPL");
}
