use std::sync::Arc;

use energy_scan::ledger::MemoryLedger;
use energy_scan::scan::{error::ScanEvent, progress_channel, ScanUpdate, Termination};
use energy_scan::{spawn_scan, OutputSink, ScanConfig};

// energies in scan order (height 5 down to 1) are 5, 1, 9, 9, 2
const LEDGER: &str = r#"{
    "head": 6,
    "blocks": [
        {"height": 6, "transactions": [
            {"id": "0600", "kind": "TriggerSmartContract", "outcome": "SUCCESS"}
        ]},
        {"height": 5, "transactions": [
            {"id": "0500", "kind": "TriggerSmartContract", "outcome": "SUCCESS"},
            {"id": "0501", "kind": "TransferContract"}
        ]},
        {"height": 4, "transactions": [
            {"id": "0400", "kind": "CreateSmartContract", "outcome": "REVERT"}
        ]},
        {"height": 3, "transactions": [
            {"id": "0300", "kind": "TriggerSmartContract", "outcome": "OUT_OF_ENERGY"},
            {"id": "0301", "kind": "TriggerSmartContract", "outcome": "SUCCESS"}
        ]},
        {"height": 1, "transactions": [
            {"id": "0100", "kind": "TriggerSmartContract", "outcome": "SUCCESS"},
            {"id": "0101", "kind": "TriggerSmartContract", "outcome": "SUCCESS"}
        ]}
    ],
    "receipts": [
        {"id": "0600", "energy_usage_total": 1000},
        {"id": "0500", "energy_usage_total": 5},
        {"id": "0501", "energy_usage_total": 700},
        {"id": "0400", "energy_usage_total": 1},
        {"id": "0300", "energy_usage_total": 9},
        {"id": "0301", "energy_usage_total": 9},
        {"id": "0100", "energy_usage_total": 2}
    ]
}"#;

async fn scan_to_file(
    config: ScanConfig,
    ledger: MemoryLedger,
) -> (energy_scan::scan::ScanOutcome, Vec<ScanUpdate>, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("top.txt");
    let config = ScanConfig {
        output: OutputSink::File(path.clone()),
        progress_interval: 1,
        ..config
    };
    let ledger = Arc::new(ledger);
    let (sender, mut receiver) = progress_channel();

    let handle = spawn_scan(config, Arc::clone(&ledger), ledger, Some(sender)).unwrap();
    let mut updates = Vec::new();
    while let Some(update) = receiver.recv().await {
        updates.push(update);
    }
    let outcome = handle.join().await.unwrap();
    let report = std::fs::read_to_string(path).unwrap();

    (outcome, updates, report)
}

#[tokio::test]
async fn top_three_of_small_ledger() {
    let ledger = MemoryLedger::from_reader(LEDGER.as_bytes()).unwrap();
    let config = ScanConfig {
        top_k: 3,
        ..Default::default()
    };

    let (outcome, updates, report) = scan_to_file(config, ledger).await;

    assert_eq!(
        report,
        "0300: 9 OUT_OF_ENERGY\n0301: 9 SUCCESS\n0500: 5 SUCCESS\n"
    );
    assert_eq!(outcome.head(), 6);
    assert_eq!(outcome.termination(), Termination::GenesisReached);
    assert_eq!(outcome.lowest_height(), Some(0));

    let stats = outcome.stats();
    assert_eq!(stats.heights_scanned(), 6);
    assert_eq!(stats.missing_blocks(), 2);
    assert_eq!(stats.missing_receipts(), 1);
    assert_eq!(stats.candidates_offered(), 5);
    assert_eq!(stats.candidates_evicted(), 1);
    assert_eq!(stats.candidates_discarded(), 1);

    let missing: Vec<&ScanEvent> = updates
        .iter()
        .filter_map(|update| match update {
            ScanUpdate::Event(event @ ScanEvent::MissingBlock { .. }) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        missing,
        vec![
            &ScanEvent::MissingBlock { height: 2 },
            &ScanEvent::MissingBlock { height: 0 }
        ]
    );
}

#[tokio::test]
async fn large_top_k_keeps_every_qualifying_transaction() {
    let ledger = MemoryLedger::from_reader(LEDGER.as_bytes()).unwrap();

    let (outcome, _, report) = scan_to_file(ScanConfig::default(), ledger).await;

    assert_eq!(outcome.candidates().len(), 5);
    assert_eq!(outcome.stats().candidates_evicted(), 0);
    assert_eq!(
        report.lines().collect::<Vec<_>>(),
        vec![
            "0300: 9 OUT_OF_ENERGY",
            "0301: 9 SUCCESS",
            "0500: 5 SUCCESS",
            "0100: 2 SUCCESS",
            "0400: 1 REVERT",
        ]
    );
}

#[tokio::test]
async fn zero_top_k_reports_nothing() {
    let ledger = MemoryLedger::from_reader(LEDGER.as_bytes()).unwrap();
    let config = ScanConfig {
        top_k: 0,
        ..Default::default()
    };

    let (outcome, _, report) = scan_to_file(config, ledger).await;

    assert!(outcome.candidates().is_empty());
    assert_eq!(outcome.stats().candidates_discarded(), 5);
    assert_eq!(report, "");
}

#[tokio::test]
async fn unreadable_records_do_not_abort_the_scan() {
    let mut ledger = MemoryLedger::from_reader(LEDGER.as_bytes()).unwrap();
    ledger.fail_block_reads_at(3);
    ledger.fail_block_reads_at(4);

    let (outcome, updates, report) = scan_to_file(ScanConfig::default(), ledger).await;

    assert_eq!(outcome.termination(), Termination::GenesisReached);
    assert_eq!(outcome.stats().store_io_errors(), 2);
    assert_eq!(report, "0500: 5 SUCCESS\n0100: 2 SUCCESS\n");
    assert!(updates.iter().any(|update| matches!(
        update,
        ScanUpdate::Event(ScanEvent::StoreIoError { height: 3, .. })
    )));
}
