//! Demultiplexes one interleaved event stream into per-context log sinks.
//!
//! Each valid context gets its own artifact from its start event until its
//! finish event. The active-capture map is the only shared mutable state:
//! inserts and removals take the write lock, forwarding takes the read lock,
//! so forwarding for different contexts proceeds in parallel while a start or
//! finish is never observed half-applied.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;

use crate::BuildLogResult;
use crate::core::{BuildHandle, BuildKind, BuildRecord, CaptureConfig};

use super::event::{BuildEvent, ContextId, EventKind, is_real_project};
use super::listing::BuildListing;
use super::paths::{ArtifactPathGenerator, UuidPathGenerator};
use super::sink::{JsonlSinkFactory, LogSink, SinkFactory, SinkOptions};

struct ActiveCapture {
    sink: Mutex<Box<dyn LogSink>>,
    build: BuildHandle,
    log_path: PathBuf,
}

impl ActiveCapture {
    fn forward(&self, event: &BuildEvent) {
        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = sink.write_event(event) {
            tracing::warn!(context = %event.context, path = %self.log_path.display(), error = %e, "failed to forward event");
        }
    }

    fn shutdown(&self) {
        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = sink.shutdown() {
            tracing::warn!(path = %self.log_path.display(), error = %e, "failed to close build log");
        }
    }
}

pub struct EventDemultiplexer {
    kind: BuildKind,
    options: SinkOptions,
    sinks: Arc<dyn SinkFactory>,
    paths: Arc<dyn ArtifactPathGenerator>,
    listing: Arc<dyn BuildListing>,
    active: RwLock<HashMap<ContextId, ActiveCapture>>,
}

impl EventDemultiplexer {
    pub fn new(
        kind: BuildKind,
        listing: Arc<dyn BuildListing>,
        sinks: Arc<dyn SinkFactory>,
        paths: Arc<dyn ArtifactPathGenerator>,
        options: SinkOptions,
    ) -> Self {
        EventDemultiplexer {
            kind,
            options,
            sinks,
            paths,
            listing,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Demultiplexer writing JSONL artifacts where `config` says.
    pub fn from_config(kind: BuildKind, config: &CaptureConfig, listing: Arc<dyn BuildListing>) -> Self {
        Self::new(
            kind,
            listing,
            Arc::new(JsonlSinkFactory),
            Arc::new(UuidPathGenerator::from_config(config)),
            config.sink_options(),
        )
    }

    pub fn kind(&self) -> BuildKind {
        self.kind
    }

    /// Route one event.
    ///
    /// # Errors
    /// Fails if a start event's sink cannot be opened (the context stays
    /// untracked), or if a finish event reaches a record that already left
    /// `Running`. Sink write and close failures are logged, not returned.
    pub fn handle_event(&self, event: &BuildEvent) -> BuildLogResult<()> {
        if !event.context.is_valid() {
            return Ok(());
        }

        match &event.kind {
            EventKind::Started { project_path, dimensions, targets } => {
                self.on_started(event, project_path, dimensions, targets.as_deref())
            }
            EventKind::Finished { succeeded, .. } => self.on_finished(event, *succeeded),
            EventKind::Other(_) => {
                self.forward(event);
                Ok(())
            }
        }
    }

    /// Number of contexts currently being captured.
    pub fn active_count(&self) -> usize {
        self.read_active().len()
    }

    pub fn is_tracking(&self, context: ContextId) -> bool {
        self.read_active().contains_key(&context)
    }

    fn on_started(
        &self,
        event: &BuildEvent,
        project_path: &str,
        dimensions: &[String],
        targets: Option<&[String]>,
    ) -> BuildLogResult<()> {
        if !self.listing.is_logging() || !is_real_project(project_path) {
            return Ok(());
        }

        // Published before the entry is visible to finish handlers
        let mut active = self.write_active();
        if active.contains_key(&event.context) {
            tracing::warn!(context = %event.context, project = project_path, "ignoring duplicate start for a tracked context");
            return Ok(());
        }

        let log_path = self.paths.next_path();
        let sink = self.open_sink(&log_path, event)?;
        let mut record = self.new_record(project_path, dimensions, targets, event.timestamp);
        // Known up front so an unfinished build still cleans up its artifact
        record.set_log_path(&log_path);
        let build = BuildHandle::new(record);

        tracing::debug!(context = %event.context, project = project_path, path = %log_path.display(), "capture started");
        self.listing.add_entry(build.clone());
        active.insert(
            event.context,
            ActiveCapture {
                sink: Mutex::new(sink),
                build,
                log_path,
            },
        );
        Ok(())
    }

    fn on_finished(&self, event: &BuildEvent, succeeded: Option<bool>) -> BuildLogResult<()> {
        let Some(capture) = self.write_active().remove(&event.context) else {
            tracing::trace!(context = %event.context, "finish for untracked context");
            return Ok(());
        };

        let succeeded = match self.kind {
            BuildKind::Evaluation => true,
            BuildKind::Build | BuildKind::DesignTimeBuild => succeeded.unwrap_or(true),
        };
        let finished = capture
            .build
            .lock()
            .finish(succeeded, event.timestamp, Some(capture.log_path.clone()));

        capture.forward(event);
        capture.shutdown();
        if finished.is_ok() {
            let elapsed = capture.build.lock().elapsed();
            tracing::debug!(context = %event.context, elapsed = ?elapsed, "capture finished");
        }

        self.listing.notify_change();
        finished
    }

    fn forward(&self, event: &BuildEvent) {
        let active = self.read_active();
        match active.get(&event.context) {
            Some(capture) => capture.forward(event),
            None => tracing::trace!(context = %event.context, "dropping event for untracked context"),
        }
    }

    fn open_sink(&self, log_path: &Path, start: &BuildEvent) -> BuildLogResult<Box<dyn LogSink>> {
        let mut sink = self.sinks.open(log_path, &self.options).inspect_err(|e| {
            tracing::warn!(path = %log_path.display(), error = %e, "failed to open build log");
        })?;

        if let Err(e) = sink.write_event(start) {
            if let Err(close_err) = sink.shutdown() {
                tracing::debug!(path = %log_path.display(), error = %close_err, "failed to close partial build log");
            }
            if let Err(rm_err) = std::fs::remove_file(log_path) {
                tracing::debug!(path = %log_path.display(), error = %rm_err, "failed to remove partial build log");
            }
            tracing::warn!(path = %log_path.display(), error = %e, "failed to write start event");
            return Err(e);
        }
        Ok(sink)
    }

    fn new_record(
        &self,
        project_path: &str,
        dimensions: &[String],
        targets: Option<&[String]>,
        start_time: OffsetDateTime,
    ) -> BuildRecord {
        match self.kind {
            BuildKind::Evaluation => BuildRecord::new(
                project_path,
                Vec::<String>::new(),
                None::<Vec<String>>,
                self.kind,
                start_time,
            ),
            BuildKind::Build | BuildKind::DesignTimeBuild => BuildRecord::new(
                project_path,
                dimensions.iter().cloned(),
                targets.map(|t| t.to_vec()),
                self.kind,
                start_time,
            ),
        }
    }

    fn read_active(&self) -> RwLockReadGuard<'_, HashMap<ContextId, ActiveCapture>> {
        self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_active(&self) -> RwLockWriteGuard<'_, HashMap<ContextId, ActiveCapture>> {
        self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildLogError;
    use crate::capture::event::{EventPayload, Importance};
    use crate::core::BuildStatus;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-01-15 12:00:00 UTC);

    #[derive(Default)]
    struct Recorder {
        opened: Mutex<Vec<PathBuf>>,
        written: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        fail_open: AtomicBool,
        fail_writes: AtomicBool,
    }

    struct RecordingSink {
        written: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        fail_writes: bool,
    }

    impl LogSink for RecordingSink {
        fn write_event(&mut self, _event: &BuildEvent) -> BuildLogResult<()> {
            if self.fail_writes {
                return Err(BuildLogError::Message("write refused".to_string()));
            }
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn shutdown(&mut self) -> BuildLogResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl SinkFactory for Recorder {
        fn open(&self, path: &Path, _options: &SinkOptions) -> BuildLogResult<Box<dyn LogSink>> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(BuildLogError::Message("disk full".to_string()));
            }
            self.opened.lock().unwrap().push(path.to_path_buf());
            Ok(Box::new(RecordingSink {
                written: self.written.clone(),
                closed: self.closed.clone(),
                fail_writes: self.fail_writes.load(Ordering::SeqCst),
            }))
        }
    }

    struct FixedPaths;

    impl ArtifactPathGenerator for FixedPaths {
        fn next_path(&self) -> PathBuf {
            PathBuf::from("/nonexistent/capture.buildlog")
        }
    }

    #[derive(Default)]
    struct Listing {
        stopped: AtomicBool,
        entries: Mutex<Vec<BuildHandle>>,
        changes: AtomicUsize,
    }

    impl BuildListing for Listing {
        fn is_logging(&self) -> bool {
            !self.stopped.load(Ordering::SeqCst)
        }

        fn add_entry(&self, build: BuildHandle) {
            self.entries.lock().unwrap().push(build);
        }

        fn notify_change(&self) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn demux(kind: BuildKind) -> (EventDemultiplexer, Arc<Recorder>, Arc<Listing>) {
        let recorder = Arc::new(Recorder::default());
        let listing = Arc::new(Listing::default());
        let demux = EventDemultiplexer::new(
            kind,
            listing.clone(),
            recorder.clone(),
            Arc::new(FixedPaths),
            SinkOptions::default(),
        );
        (demux, recorder, listing)
    }

    fn msg(ctx: i32) -> BuildEvent {
        BuildEvent::message(ContextId(ctx), T0, Importance::Normal, "working")
    }

    fn take_entries(listing: &Listing) -> Vec<BuildHandle> {
        listing.entries.lock().unwrap().drain(..).collect()
    }

    #[test]
    fn test_start_then_finish_single_pair() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId(7), T0, "app.csproj")).unwrap();
        assert!(demux.is_tracking(ContextId(7)));

        demux
            .handle_event(&BuildEvent::finished(ContextId(7), T0 + Duration::seconds(5), "app.csproj", None))
            .unwrap();

        assert_eq!(demux.active_count(), 0);
        assert_eq!(recorder.opened.lock().unwrap().len(), 1);
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.written.load(Ordering::SeqCst), 2);
        assert_eq!(listing.changes.load(Ordering::SeqCst), 1);

        let entries = take_entries(&listing);
        assert_eq!(entries.len(), 1);
        let record = entries[0].lock();
        assert_eq!(record.status(), BuildStatus::Finished);
        assert_eq!(record.elapsed(), Duration::seconds(5));
    }

    #[test]
    fn test_events_after_finish_are_dropped() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId(1), T0, "a.proj")).unwrap();
        demux.handle_event(&BuildEvent::finished(ContextId(1), T0, "a.proj", None)).unwrap();
        demux.handle_event(&msg(1)).unwrap();
        demux.handle_event(&BuildEvent::finished(ContextId(1), T0, "a.proj", None)).unwrap();

        assert_eq!(recorder.written.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
        assert_eq!(listing.changes.load(Ordering::SeqCst), 1);
        take_entries(&listing);
    }

    #[test]
    fn test_sentinel_and_untracked_events_ignored() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId::INVALID, T0, "a.proj")).unwrap();
        demux.handle_event(&BuildEvent::finished(ContextId(42), T0, "a.proj", Some(false))).unwrap();
        demux.handle_event(&msg(42)).unwrap();

        assert_eq!(demux.active_count(), 0);
        assert!(recorder.opened.lock().unwrap().is_empty());
        assert!(listing.entries.lock().unwrap().is_empty());
        assert_eq!(listing.changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disabled_capture_and_null_project_ignored() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId(1), T0, "(null)")).unwrap();
        listing.stopped.store(true, Ordering::SeqCst);
        demux.handle_event(&BuildEvent::started(ContextId(2), T0, "b.proj")).unwrap();

        assert_eq!(demux.active_count(), 0);
        assert!(recorder.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_start_keeps_first_capture() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId(3), T0, "first.proj")).unwrap();
        demux.handle_event(&BuildEvent::started(ContextId(3), T0, "second.proj")).unwrap();

        assert_eq!(demux.active_count(), 1);
        assert_eq!(recorder.opened.lock().unwrap().len(), 1);
        let entries = take_entries(&listing);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lock().project_path(), Path::new("first.proj"));
    }

    #[test]
    fn test_open_failure_propagates_and_leaves_context_untracked() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        recorder.fail_open.store(true, Ordering::SeqCst);

        let err = demux.handle_event(&BuildEvent::started(ContextId(5), T0, "a.proj")).unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(!demux.is_tracking(ContextId(5)));
        assert!(listing.entries.lock().unwrap().is_empty());

        // Later events for the context fall into the untracked path
        demux.handle_event(&msg(5)).unwrap();
        demux.handle_event(&BuildEvent::finished(ContextId(5), T0, "a.proj", None)).unwrap();
        assert_eq!(recorder.written.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_kind_honors_verdict_and_build_info() {
        let (demux, _recorder, listing) = demux(BuildKind::Build);
        let start = BuildEvent::started(ContextId(9), T0, "lib.csproj")
            .with_build_info(vec!["Debug|AnyCPU".into()], Some(vec!["Build".into(), "Pack".into()]));
        demux.handle_event(&start).unwrap();
        demux
            .handle_event(&BuildEvent::finished(ContextId(9), T0 + Duration::seconds(2), "lib.csproj", Some(false)))
            .unwrap();

        let entries = take_entries(&listing);
        let record = entries[0].lock();
        assert_eq!(record.status(), BuildStatus::Failed);
        assert_eq!(record.kind(), BuildKind::Build);
        assert_eq!(record.dimensions(), &["Debug|AnyCPU".to_string()]);
        assert_eq!(record.targets(), &["Build".to_string(), "Pack".to_string()]);
    }

    #[test]
    fn test_evaluation_ignores_build_info_and_verdict() {
        let (demux, _recorder, listing) = demux(BuildKind::Evaluation);
        let start = BuildEvent::started(ContextId(4), T0, "lib.csproj").with_build_info(vec!["x".into()], None);
        demux.handle_event(&start).unwrap();
        demux.handle_event(&BuildEvent::finished(ContextId(4), T0, "lib.csproj", Some(false))).unwrap();

        let entries = take_entries(&listing);
        let record = entries[0].lock();
        assert_eq!(record.status(), BuildStatus::Finished);
        assert!(record.dimensions().is_empty());
    }

    #[test]
    fn test_finish_on_already_finished_record_is_invalid_state() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId(6), T0, "a.proj")).unwrap();
        let handle = listing.entries.lock().unwrap()[0].clone();
        handle.lock().finish(true, T0, None).unwrap();

        let err = demux.handle_event(&BuildEvent::finished(ContextId(6), T0, "a.proj", None)).unwrap_err();
        assert!(matches!(err, BuildLogError::InvalidState(BuildStatus::Finished)));
        // The sink is still closed and the context released
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
        assert!(!demux.is_tracking(ContextId(6)));
        take_entries(&listing);
    }

    #[test]
    fn test_interleaved_contexts_route_independently() {
        let (demux, recorder, listing) = demux(BuildKind::Evaluation);
        demux.handle_event(&BuildEvent::started(ContextId(1), T0, "a.proj")).unwrap();
        demux.handle_event(&BuildEvent::started(ContextId(2), T0, "b.proj")).unwrap();
        demux
            .handle_event(&BuildEvent::other(
                ContextId(2),
                T0,
                EventPayload::TargetStarted { target: "Build".into() },
            ))
            .unwrap();
        demux.handle_event(&BuildEvent::finished(ContextId(1), T0, "a.proj", None)).unwrap();

        assert!(demux.is_tracking(ContextId(2)));
        assert!(!demux.is_tracking(ContextId(1)));
        assert_eq!(recorder.written.load(Ordering::SeqCst), 4);
        take_entries(&listing);
    }

    #[test]
    fn test_failed_start_write_closes_and_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("partial.buildlog");
        std::fs::write(&partial, b"header\n").unwrap();

        struct PartialPath(PathBuf);
        impl ArtifactPathGenerator for PartialPath {
            fn next_path(&self) -> PathBuf {
                self.0.clone()
            }
        }

        let recorder = Arc::new(Recorder::default());
        recorder.fail_writes.store(true, Ordering::SeqCst);
        let listing = Arc::new(Listing::default());
        let demux = EventDemultiplexer::new(
            BuildKind::Evaluation,
            listing.clone(),
            recorder.clone(),
            Arc::new(PartialPath(partial.clone())),
            SinkOptions::default(),
        );

        let err = demux.handle_event(&BuildEvent::started(ContextId(2), T0, "a.proj")).unwrap_err();
        assert!(err.to_string().contains("write refused"));
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
        assert!(!partial.exists());
        assert!(!demux.is_tracking(ContextId(2)));
        assert!(listing.entries.lock().unwrap().is_empty());
    }

    /// Records the order of listing calls.
    #[derive(Default)]
    struct CallLog {
        calls: Mutex<Vec<&'static str>>,
        changes: AtomicUsize,
    }

    impl BuildListing for CallLog {
        fn is_logging(&self) -> bool {
            true
        }

        fn add_entry(&self, _build: BuildHandle) {
            self.calls.lock().unwrap().push("add");
        }

        fn notify_change(&self) {
            self.calls.lock().unwrap().push("change");
            self.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_racing_finish_never_precedes_publication() {
        let log = Arc::new(CallLog::default());
        let demux = EventDemultiplexer::new(
            BuildKind::Evaluation,
            log.clone(),
            Arc::new(Recorder::default()),
            Arc::new(FixedPaths),
            SinkOptions::default(),
        );

        for round in 0..200 {
            let ctx = ContextId(round);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    demux.handle_event(&BuildEvent::started(ctx, T0, "a.proj")).unwrap();
                });
                scope.spawn(|| {
                    let finish = BuildEvent::finished(ctx, T0, "a.proj", None);
                    while log.changes.load(Ordering::SeqCst) <= round as usize {
                        demux.handle_event(&finish).unwrap();
                        std::thread::yield_now();
                    }
                });
            });
        }

        let calls = log.calls.lock().unwrap();
        assert_eq!(calls.len(), 400);
        for pair in calls.chunks(2) {
            assert_eq!(pair, ["add", "change"]);
        }
    }
}
