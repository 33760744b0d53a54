//! Drive frames from a reader through a router.
//!
//! Both modes route the same data frames in the same order and apply the
//! same read-error policy, so their middleware sees identical streams.

use std::io::Read;
use std::thread;
use std::time::Instant;

use dmlcap_dml::Router;
use dmlcap_frame::{Frame, FrameError, FrameReader};

use crate::cancel::CancellationToken;
use crate::config::{Mode, PipelineConfig, ReadErrorPolicy};
use crate::error::{PipelineError, Result};
use crate::queue::{bounded, QueueError, QueueReceiver, QueueSender};
use crate::stats::RunStats;

const PRODUCER_THREAD: &str = "frame-producer";

/// Decode a whole capture using the configured mode.
pub fn run<R: Read + Send>(
    reader: FrameReader<R>,
    router: &mut Router,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<RunStats> {
    match config.mode {
        Mode::Sequential => run_sequential(reader, router, config, cancel),
        Mode::Pipelined => run_pipelined(reader, router, config, cancel),
    }
}

/// Read, decode and dispatch on the calling thread.
pub fn run_sequential<R: Read>(
    mut reader: FrameReader<R>,
    router: &mut Router,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<RunStats> {
    let start = Instant::now();
    let before = router.stats();
    let mut control_frames = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        match reader.read_frame() {
            Ok(Some(frame)) => {
                if frame.control {
                    control_frames += 1;
                    continue;
                }
                router.route_frame(frame.payload)?;
            }
            Ok(None) => break,
            Err(err) => {
                read_failed(err, reader.frames_read() + 1, config.on_read_error)?;
                break;
            }
        }
    }

    let stats = RunStats::new(
        reader.frames_read(),
        control_frames,
        before,
        router.stats(),
        start.elapsed(),
    );
    tracing::debug!(frames = stats.frames, delivered = stats.delivered, "sequential run finished");
    Ok(stats)
}

/// Read frames on a producer thread while the calling thread decodes them.
///
/// At most `config.queue_capacity` data frames wait in the queue. The
/// producer reads the next frame before waiting for space, so while the
/// queue is full it holds one more frame in hand: no more than
/// `queue_capacity + 1` frames are read ahead of the one being routed.
/// Control frames never enter the queue.
pub fn run_pipelined<R: Read + Send>(
    mut reader: FrameReader<R>,
    router: &mut Router,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<RunStats> {
    let start = Instant::now();
    let before = router.stats();
    let (tx, rx) = bounded::<Frame>(config.queue_capacity, cancel)?;
    let on_read_error = config.on_read_error;

    let (frames, control_frames) = thread::scope(|scope| {
        let producer = thread::Builder::new()
            .name(PRODUCER_THREAD.into())
            .spawn_scoped(scope, || produce(&mut reader, tx, on_read_error, cancel))
            .map_err(PipelineError::Spawn)?;
        let consumed = consume(rx, router);
        let ProducerReport {
            frames,
            control_frames,
            result,
        } = producer
            .join()
            .map_err(|_| PipelineError::ProducerPanicked)?;

        consumed?;
        result?;
        Ok::<(u64, u64), PipelineError>((frames, control_frames))
    })?;

    let stats = RunStats::new(
        frames,
        control_frames,
        before,
        router.stats(),
        start.elapsed(),
    );
    tracing::debug!(frames = stats.frames, delivered = stats.delivered, "pipelined run finished");
    Ok(stats)
}

struct ProducerReport {
    frames: u64,
    control_frames: u64,
    result: Result<()>,
}

fn produce<R: Read>(
    reader: &mut FrameReader<R>,
    queue: QueueSender<Frame>,
    on_read_error: ReadErrorPolicy,
    cancel: &CancellationToken,
) -> ProducerReport {
    tracing::debug!("frame producer started");
    let mut control_frames = 0u64;

    let result = loop {
        if cancel.is_cancelled() {
            break Err(PipelineError::Cancelled);
        }
        match reader.read_frame() {
            Ok(Some(frame)) => {
                if frame.control {
                    control_frames += 1;
                    continue;
                }
                match queue.push(frame) {
                    Ok(()) => {}
                    // The consumer stopped; its own result explains why.
                    Err(QueueError::Closed) => break Ok(()),
                    Err(QueueError::Cancelled) => break Err(PipelineError::Cancelled),
                }
            }
            Ok(None) => break Ok(()),
            Err(err) => break read_failed(err, reader.frames_read() + 1, on_read_error),
        }
    };

    tracing::debug!(frames = reader.frames_read(), "frame producer finished");
    ProducerReport {
        frames: reader.frames_read(),
        control_frames,
        result,
    }
}

fn consume(queue: QueueReceiver<Frame>, router: &mut Router) -> Result<()> {
    while let Some(frame) = queue.pop()? {
        router.route_frame(frame.payload)?;
    }
    Ok(())
}

fn read_failed(err: FrameError, index: u64, policy: ReadErrorPolicy) -> Result<()> {
    match policy {
        ReadErrorPolicy::Propagate => Err(PipelineError::Frame { index, source: err }),
        ReadErrorPolicy::Truncate => {
            tracing::warn!(frame = index, error = %err, "ending capture early at unreadable frame");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use dmlcap_dml::{
        decode_record, DispatchTable, DmlError, Envelope, FieldSpec, FieldType, Message,
        MiddlewareError, RouterConfig,
    };
    use dmlcap_frame::FrameWriter;

    use super::*;

    fn table() -> Arc<DispatchTable> {
        let specs = vec![FieldSpec::new("x", FieldType::Int)];
        let mut builder = DispatchTable::builder();
        builder
            .register(5, 2, "GAME", "MSG_POSITION", move |payload: &[u8]| {
                decode_record(&specs, payload)
            })
            .unwrap();
        Arc::new(builder.build())
    }

    fn router(config: RouterConfig) -> (Router, Arc<Mutex<Vec<String>>>) {
        let mut router = Router::with_config(table(), config);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        router.register_middleware(move |message: &Message| -> std::result::Result<(), MiddlewareError> {
            sink.lock()
                .unwrap()
                .push(serde_json::to_string(&message.fields)?);
            Ok(())
        });
        (router, seen)
    }

    fn position(x: i32) -> Bytes {
        Envelope::new(5, 2, x.to_le_bytes().to_vec()).to_bytes()
    }

    fn capture(data: usize, control_every: usize) -> Vec<u8> {
        let mut writer = FrameWriter::new(Vec::new());
        for x in 0..data {
            if control_every > 0 && x % control_every == 0 {
                writer.send_control(dmlcap_frame::KEEP_ALIVE, b"").unwrap();
            }
            writer.send_data(&position(x as i32)).unwrap();
        }
        writer.into_inner()
    }

    fn reader(bytes: Vec<u8>) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(bytes))
    }

    #[test]
    fn sequential_counts_frames_and_messages() {
        let (mut router, seen) = router(RouterConfig::default());
        let cancel = CancellationToken::new();
        let stats = run_sequential(
            reader(capture(10, 3)),
            &mut router,
            &PipelineConfig::default(),
            &cancel,
        )
        .unwrap();

        assert_eq!(stats.delivered, 10);
        assert_eq!(stats.control_frames, 4);
        assert_eq!(stats.frames, 14);
        assert_eq!(seen.lock().unwrap().len(), 10);
        assert_eq!(seen.lock().unwrap()[9], r#"{"x":9}"#);
    }

    #[test]
    fn pipelined_matches_sequential() {
        let bytes = capture(200, 7);
        let cancel = CancellationToken::new();

        let (mut seq_router, seq_seen) = router(RouterConfig::default());
        let seq = run_sequential(
            reader(bytes.clone()),
            &mut seq_router,
            &PipelineConfig::default(),
            &cancel,
        )
        .unwrap();

        let (mut pipe_router, pipe_seen) = router(RouterConfig::default());
        let pipe = run_pipelined(
            reader(bytes),
            &mut pipe_router,
            &PipelineConfig::pipelined(),
            &cancel,
        )
        .unwrap();

        assert_eq!(*seq_seen.lock().unwrap(), *pipe_seen.lock().unwrap());
        assert_eq!(
            (seq.frames, seq.control_frames, seq.delivered),
            (pipe.frames, pipe.control_frames, pipe.delivered)
        );
    }

    #[test]
    fn control_only_capture_ends_cleanly() {
        let mut writer = FrameWriter::new(Vec::new());
        for _ in 0..5 {
            writer.send_control(dmlcap_frame::KEEP_ALIVE, b"").unwrap();
        }
        let bytes = writer.into_inner();
        let cancel = CancellationToken::new();

        for config in [PipelineConfig::default(), PipelineConfig::pipelined()] {
            let (mut router, seen) = router(RouterConfig::default());
            let stats = run(reader(bytes.clone()), &mut router, &config, &cancel).unwrap();
            assert_eq!(stats.delivered, 0);
            assert_eq!(stats.control_frames, 5);
            assert!(seen.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn truncated_capture_propagates_after_earlier_frames() {
        let mut bytes = capture(3, 0);
        bytes.extend_from_slice(&[0x0D, 0xF0, 0x10]);
        let cancel = CancellationToken::new();

        for config in [PipelineConfig::default(), PipelineConfig::pipelined()] {
            let (mut router, seen) = router(RouterConfig::default());
            let err = run(reader(bytes.clone()), &mut router, &config, &cancel).unwrap_err();
            assert!(matches!(
                err,
                PipelineError::Frame {
                    index: 4,
                    source: FrameError::Truncated { .. }
                }
            ));
            assert_eq!(seen.lock().unwrap().len(), 3);
        }
    }

    #[test]
    fn truncate_policy_ends_quietly() {
        let mut bytes = capture(3, 0);
        bytes.extend_from_slice(&[0x0D, 0xF0, 0x10]);
        let cancel = CancellationToken::new();

        for mode in [Mode::Sequential, Mode::Pipelined] {
            let config = PipelineConfig {
                mode,
                on_read_error: ReadErrorPolicy::Truncate,
                ..PipelineConfig::default()
            };
            let (mut router, _) = router(RouterConfig::default());
            let stats = run(reader(bytes.clone()), &mut router, &config, &cancel).unwrap();
            assert_eq!(stats.delivered, 3);
        }
    }

    #[test]
    fn routing_error_stops_both_stages() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.send_data(&position(1)).unwrap();
        writer
            .send_data(&Envelope::new(40, 1, Vec::new()).to_bytes())
            .unwrap();
        for x in 0..100 {
            writer.send_data(&position(x)).unwrap();
        }
        let bytes = writer.into_inner();
        let cancel = CancellationToken::new();

        for config in [PipelineConfig::default(), PipelineConfig::pipelined()] {
            let (mut router, seen) = router(RouterConfig::default());
            let err = run(reader(bytes.clone()), &mut router, &config, &cancel).unwrap_err();
            assert!(matches!(
                err,
                PipelineError::Route(DmlError::UnknownMessage {
                    service_id: 40,
                    order_number: 1
                })
            ));
            assert_eq!(seen.lock().unwrap().len(), 1);
        }
    }

    #[test]
    fn short_envelope_is_reported_not_panicked() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.send_data(&[5, 2]).unwrap();
        let cancel = CancellationToken::new();

        let (mut router, _) = router(RouterConfig::default());
        let err = run_pipelined(
            reader(writer.into_inner()),
            &mut router,
            &PipelineConfig::pipelined(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Route(DmlError::Envelope(_))));
    }

    #[test]
    fn cancelled_run_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        for config in [PipelineConfig::default(), PipelineConfig::pipelined()] {
            let (mut router, seen) = router(RouterConfig::default());
            let err = run(reader(capture(10, 0)), &mut router, &config, &cancel).unwrap_err();
            assert!(matches!(err, PipelineError::Cancelled));
            assert!(seen.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn zero_capacity_is_rejected_before_reading() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..PipelineConfig::pipelined()
        };
        let (mut router, _) = router(RouterConfig::default());
        let cancel = CancellationToken::new();
        let err = run(reader(capture(1, 0)), &mut router, &config, &cancel).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCapacity(0)));
    }

    #[test]
    fn empty_capture_reports_zero_rate() {
        let (mut router, _) = router(RouterConfig::default());
        let cancel = CancellationToken::new();
        let stats = run(
            reader(Vec::new()),
            &mut router,
            &PipelineConfig::pipelined(),
            &cancel,
        )
        .unwrap();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.messages_per_sec(), 0);
    }

    struct CountingReader {
        inner: Cursor<Vec<u8>>,
        bytes: Arc<AtomicUsize>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.bytes.fetch_add(n, Ordering::SeqCst);
            Ok(n)
        }
    }

    #[test]
    fn producer_reads_at_most_one_frame_past_a_full_queue() {
        // header + body header + envelope + one INT
        const FRAME_LEN: usize = 16;
        const CAPACITY: usize = 2;

        let bytes = capture(20, 0);
        assert_eq!(bytes.len(), 20 * FRAME_LEN);
        let read = Arc::new(AtomicUsize::new(0));
        let reader = FrameReader::new(CountingReader {
            inner: Cursor::new(bytes),
            bytes: Arc::clone(&read),
        });

        let mut router = Router::new(table());
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        router.register_middleware(move |_: &Message| -> std::result::Result<(), MiddlewareError> {
            let mut progress = sink.lock().unwrap();
            if progress.is_empty() {
                thread::sleep(Duration::from_millis(100));
            }
            progress.push(read.load(Ordering::SeqCst) / FRAME_LEN);
            Ok(())
        });

        let config = PipelineConfig {
            queue_capacity: CAPACITY,
            ..PipelineConfig::pipelined()
        };
        let stats = run_pipelined(reader, &mut router, &config, &CancellationToken::new()).unwrap();
        assert_eq!(stats.delivered, 20);

        let progress = progress.lock().unwrap();
        // Stalled on the first message: the queue filled and one frame is in hand.
        assert_eq!(progress[0], 1 + CAPACITY + 1);
        for (routed, frames_read) in progress.iter().enumerate() {
            assert!(
                *frames_read <= routed + 1 + CAPACITY + 1,
                "message {routed}: {frames_read} frames read"
            );
        }
    }
}
