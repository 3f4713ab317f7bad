//! Orders the retained set and writes it to the configured sink
//!
//! One line per candidate, `<hex txid>: <energy> <outcome>`, highest energy first. Candidates
//! with equal energy are listed in the order the scan first saw them.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use energy_config::OutputSink;

use crate::primitives::Candidate;

/// Log target used for [`OutputSink::Log`] report lines.
pub const REPORT_LOG_TARGET: &str = "energy_scan::report";

/// Sorts candidates by descending energy, then first seen, then transaction id.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.energy()
            .cmp(&a.energy())
            .then_with(|| a.sequence().cmp(&b.sequence()))
            .then_with(|| a.txid().cmp(b.txid()))
    });
    candidates
}

/// Writes report lines for already ranked candidates.
pub fn write_lines<W: Write>(writer: &mut W, ranked: &[Candidate]) -> io::Result<()> {
    for candidate in ranked {
        writeln!(writer, "{candidate}")?;
    }
    writer.flush()
}

/// Emits a ranked report to an [`OutputSink`].
#[derive(Debug, Clone)]
pub struct Reporter {
    sink: OutputSink,
}

impl Reporter {
    /// Creates a reporter writing to `sink`.
    pub fn new(sink: OutputSink) -> Self {
        Self { sink }
    }

    /// Configured sink.
    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Writes one line per candidate, in the order given.
    ///
    /// A file sink is created or truncated first, so an empty report leaves an empty file.
    pub fn emit(&self, ranked: &[Candidate]) -> io::Result<()> {
        let written = match &self.sink {
            OutputSink::Console => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                write_lines(&mut handle, ranked)
            }
            OutputSink::Log => {
                for candidate in ranked {
                    tracing::info!(target: REPORT_LOG_TARGET, "{candidate}");
                }
                Ok(())
            }
            OutputSink::File(path) => {
                let mut writer = BufWriter::new(File::create(path)?);
                write_lines(&mut writer, ranked)
            }
        };
        written?;

        tracing::debug!(sink = %self.sink, lines = ranked.len(), "Report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::primitives::{OutcomeCode, TxId};

    fn candidate(id: u8, energy: u64, sequence: u64) -> Candidate {
        Candidate::from_parts(
            TxId::from_bytes(vec![id]),
            energy,
            OutcomeCode::Success,
            100,
            sequence,
        )
    }

    #[test]
    fn ranks_by_energy_then_first_seen() {
        let ranked = rank(vec![
            candidate(0x01, 5, 0),
            candidate(0x02, 9, 3),
            candidate(0x03, 9, 2),
            candidate(0x04, 12, 4),
        ]);
        let order: Vec<u8> = ranked.iter().map(|c| c.txid().as_bytes()[0]).collect();
        assert_eq!(order, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn writes_one_line_per_candidate() {
        let ranked = rank(vec![candidate(0xab, 7, 1), candidate(0x0c, 70, 0)]);
        let mut buffer = Vec::new();
        write_lines(&mut buffer, &ranked).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "0c: 70 SUCCESS\nab: 7 SUCCESS\n"
        );
    }

    #[test]
    fn file_sink_truncates_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.txt");
        std::fs::write(&path, "stale\nstale\nstale\n").unwrap();

        Reporter::new(OutputSink::File(path.clone()))
            .emit(&[candidate(0xff, 1, 0)])
            .unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "ff: 1 SUCCESS\n");
    }

    #[test]
    fn empty_report_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");

        Reporter::new(OutputSink::File(path.clone())).emit(&[]).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "");
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn log_sink_emits_one_event_per_candidate() {
        let captured = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_target(true)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        let ranked = rank(vec![
            candidate(0x01, 5, 0),
            candidate(0x02, 50, 1),
            candidate(0x03, 9, 2),
        ]);

        tracing::subscriber::with_default(subscriber, || {
            Reporter::new(OutputSink::Log).emit(&ranked).unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let target = format!("{REPORT_LOG_TARGET}: ");
        let events: Vec<(&str, &str)> = output
            .lines()
            .filter_map(|line| line.split_once(target.as_str()))
            .collect();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|(prefix, _)| prefix.contains("INFO")));
        let messages: Vec<&str> = events.iter().map(|(_, message)| *message).collect();
        assert_eq!(
            messages,
            vec!["02: 50 SUCCESS", "03: 9 SUCCESS", "01: 5 SUCCESS"]
        );
    }
}
