use std::collections::{HashSet, VecDeque};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use log::{info, warn};

use crate::error::BatchError;
use crate::ffmpeg::extractor::AudioExtractor;
use crate::fstools::{classify_file, collect_video_files, mp3_output_path, DirEntryCategory};
use crate::quality::QualityConfig;
use crate::registry::TaskRegistry;
use crate::task::{ConversionTask, Outcome};

pub struct TaskReport {
    pub task: ConversionTask,
    pub outcome: Outcome,
}

pub struct BatchPlan {
    pub tasks: Vec<ConversionTask>,
    pub skipped: Vec<ConversionTask>,
    /// Inputs whose output path is already claimed by an earlier task in
    /// the same batch; never scheduled, so no two tasks share an output.
    pub conflicts: Vec<ConversionTask>,
}

#[derive(Debug, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub interrupted: bool,
}

impl Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} converted, {} failed, {} skipped, {} cancelled",
            self.succeeded, self.failed, self.skipped, self.cancelled
        )
    }
}

/// Schedules conversion tasks onto a bounded pool of worker threads and
/// aggregates their outcomes in completion order. A task failure never
/// aborts its siblings; an interrupt cancels everything in flight and
/// removes the partial outputs still tracked in the registry.
pub struct BatchProcessor {
    quality: QualityConfig,
    threads: usize,
    cancel: Arc<AtomicBool>,
    registry: TaskRegistry,
    program: String,
}

impl BatchProcessor {
    pub fn new(quality: QualityConfig, threads: usize, cancel: Arc<AtomicBool>) -> Self {
        BatchProcessor {
            quality,
            threads,
            cancel,
            registry: TaskRegistry::new(),
            program: String::from("ffmpeg"),
        }
    }

    pub fn program(mut self, program: &str) -> Self {
        self.program = String::from(program);
        self
    }

    /// Enumerates eligible inputs and pairs each with its mp3 output path.
    /// Inputs whose output already exists are set aside, not scheduled.
    pub fn plan(&self, input: &Path, output_dir: Option<&Path>) -> Result<BatchPlan, BatchError> {
        let (inputs, default_dir) = match classify_file(input) {
            DirEntryCategory::DoesNotExist => {
                return Err(BatchError::for_file(input, "path does not exist"));
            },
            DirEntryCategory::RegularFile => (
                vec![PathBuf::from(input)],
                input
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or(Path::new("."))
                    .to_path_buf(),
            ),
            DirEntryCategory::Directory => (collect_video_files(input), PathBuf::from(input)),
            DirEntryCategory::Unknown => {
                return Err(BatchError::for_file(input, "not a regular file or directory"));
            },
        };
        let out_dir = match output_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_dir,
        };
        fs::create_dir_all(&out_dir).map_err(|err| {
            BatchError::for_file(&out_dir, &format!("unable to create output directory: {}", err))
        })?;

        let mut tasks = vec![];
        let mut skipped = vec![];
        let mut conflicts = vec![];
        let mut claimed_outputs = HashSet::new();
        for file in inputs {
            let output = mp3_output_path(&file, &out_dir);
            let task = ConversionTask::new(file, output);
            if task.output.exists() {
                skipped.push(task);
            } else if !claimed_outputs.insert(task.output.clone()) {
                // same stem under different subdirectories
                conflicts.push(task);
            } else {
                tasks.push(task);
            }
        }
        Ok(BatchPlan {
            tasks,
            skipped,
            conflicts,
        })
    }

    pub fn run(&self, input: &Path, output_dir: Option<&Path>) -> Result<BatchReport, BatchError> {
        let plan = self.plan(input, output_dir)?;

        let mut report = BatchReport::default();
        for task in &plan.skipped {
            println!("Target exists: {:?}", task.output);
            report.skipped += 1;
        }
        for task in &plan.conflicts {
            println!(
                "Failed: {:?}: output path {:?} already claimed by another input",
                task.input, task.output
            );
            report.failed += 1;
        }

        if !plan.tasks.is_empty() {
            self.run_workers(plan.tasks, &mut report);
        }

        if self.is_cancelled() {
            report.interrupted = true;
            self.cleanup_registry();
        }
        Ok(report)
    }

    fn run_workers(&self, tasks: Vec<ConversionTask>, report: &mut BatchReport) {
        let worker_count = self.threads.max(1).min(tasks.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (tx, rx) = mpsc::channel::<TaskReport>();

        let mut handles = Vec::with_capacity(worker_count);
        for slot in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let cancel = Arc::clone(&self.cancel);
            let registry = self.registry.clone();
            let quality = self.quality;
            let program = self.program.clone();
            handles.push(thread::spawn(move || {
                let extractor = AudioExtractor::new(Arc::clone(&cancel))
                    .program(&program)
                    .position(slot as u16);
                loop {
                    // stop admitting tasks once cancellation is requested
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let next = { queue.lock().unwrap().pop_front() };
                    let Some(task) = next else { break };
                    let outcome = extractor.extract(&task, &quality, &registry);
                    if tx.send(TaskReport { task, outcome }).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        // completion order, not submission order
        for TaskReport { task, outcome } in rx {
            match &outcome {
                Outcome::Success => {
                    println!("Completed: {:?} -> {:?}", task.input, task.output);
                    report.succeeded += 1;
                },
                Outcome::Skipped(reason) => {
                    println!("Skipped {:?}: {}", task.input, reason);
                    report.skipped += 1;
                },
                Outcome::Failure(reason) => {
                    println!("Failed: {:?}: {}", task.input, reason);
                    report.failed += 1;
                },
                Outcome::Cancelled => {
                    println!("Cancelled: {:?}", task.input);
                    report.cancelled += 1;
                },
            }
        }

        for handle in handles {
            if let Err(err) = handle.join() {
                warn!("worker thread panicked: {:?}", err);
            }
        }
    }

    /// Deletes every output path still registered at cancellation time.
    /// Each path is attempted exactly once; deletion failures are logged
    /// and never stall the shutdown.
    fn cleanup_registry(&self) {
        for path in self.registry.drain() {
            match fs::remove_file(&path) {
                Ok(()) => info!("removed partial output {:?}", path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => (),
                Err(err) => warn!("unable to remove partial output {:?}: {}", path, err),
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn registry(&self) -> &TaskRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(path: &Path, script: &str) {
        fs::write(path, script).unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    fn processor(cancel: bool) -> BatchProcessor {
        BatchProcessor::new(
            QualityConfig::from_args("vbr", "high").unwrap(),
            4,
            Arc::new(AtomicBool::new(cancel)),
        )
    }

    #[test]
    fn test_plan_missing_input_is_fatal() {
        assert!(processor(false)
            .plan(&PathBuf::from("/no/such/input.mp4"), None)
            .is_err());
    }

    #[test]
    fn test_plan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp4");
        File::create(&input).unwrap();

        let plan = processor(false).plan(&input, None).unwrap();
        assert_eq!(plan.skipped.len(), 0);
        assert_eq!(
            plan.tasks,
            vec![ConversionTask::new(input, dir.path().join("talk.mp3"))]
        );
    }

    #[test]
    fn test_plan_single_file_with_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp4");
        File::create(&input).unwrap();
        let out_dir = dir.path().join("audio");

        let plan = processor(false).plan(&input, Some(&out_dir)).unwrap();
        assert!(out_dir.is_dir());
        assert_eq!(plan.tasks[0].output, out_dir.join("talk.mp3"));
    }

    #[test]
    fn test_plan_directory_excludes_existing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mp4", "b.mkv", "c.webm"] {
            File::create(dir.path().join(name)).unwrap();
        }
        File::create(dir.path().join("b.mp3")).unwrap();

        let plan = processor(false).plan(dir.path(), None).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].output, dir.path().join("b.mp3"));
    }

    #[test]
    fn test_plan_rejects_duplicate_output_paths() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["sub1", "sub2"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            File::create(dir.path().join(sub).join("a.mp4")).unwrap();
        }

        let plan = processor(false).plan(dir.path(), None).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.tasks[0].input, dir.path().join("sub1").join("a.mp4"));
        assert_eq!(plan.conflicts[0].input, dir.path().join("sub2").join("a.mp4"));

        // scheduled outputs are pairwise distinct
        let outputs: HashSet<_> = plan.tasks.iter().map(|t| t.output.clone()).collect();
        assert_eq!(outputs.len(), plan.tasks.len());
    }

    #[test]
    fn test_run_counts_duplicate_outputs_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["sub1", "sub2"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            File::create(dir.path().join(sub).join("a.mp4")).unwrap();
        }

        // cancel pre-set so no worker runs; only the conflict is reported
        let report = processor(true).run(dir.path(), None).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
    }

    #[test]
    fn test_run_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = processor(false).run(dir.path(), None).unwrap();
        assert_eq!(report, BatchReport::default());
    }

    #[test]
    fn test_run_reports_preexisting_outputs_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.mp4")).unwrap();
        File::create(dir.path().join("a.mp3")).unwrap();

        let report = processor(true).run(dir.path(), None).unwrap();
        assert_eq!(report.skipped, 1);
        // pre-existing outputs are never cleanup candidates
        assert!(dir.path().join("a.mp3").exists());
    }

    #[test]
    fn test_run_interrupted_before_start_schedules_nothing() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.mp4")).unwrap();
        File::create(dir.path().join("b.mkv")).unwrap();

        let report = processor(true).run(dir.path(), None).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 0);
        assert!(!dir.path().join("a.mp3").exists());
        assert!(!dir.path().join("b.mp3").exists());
    }

    #[test]
    fn test_worker_pool_bounds_concurrent_transcoders() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let active = dir.path().join("active");
        let videos = dir.path().join("videos");
        for d in [&bin, &active, &videos] {
            fs::create_dir(d).unwrap();
        }
        let counts = dir.path().join("counts.txt");

        // a probe the extractor can find on PATH
        write_script(&bin.join("ffprobe"), "#!/bin/sh\necho '5.0'\n");
        unsafe {
            std::env::set_var(
                "PATH",
                format!(
                    "{}:{}",
                    bin.display(),
                    std::env::var("PATH").unwrap_or_default()
                ),
            );
        }

        // transcoder stand-in that records how many invocations overlap it
        let transcoder = dir.path().join("counting-transcoder");
        write_script(
            &transcoder,
            &format!(
                "#!/bin/sh\n\
                 for last do :; done\n\
                 : > \"$last\"\n\
                 echo 'time=00:00:01.00' >&2\n\
                 : > \"{active}/$$\"\n\
                 sleep 1\n\
                 ls \"{active}\" | wc -l >> \"{counts}\"\n\
                 rm -f \"{active}/$$\"\n\
                 exit 0\n",
                active = active.display(),
                counts = counts.display()
            ),
        );

        for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4"] {
            File::create(videos.join(name)).unwrap();
        }

        let processor = BatchProcessor::new(
            QualityConfig::from_args("vbr", "high").unwrap(),
            2,
            Arc::new(AtomicBool::new(false)),
        )
        .program(&transcoder.display().to_string());
        let report = processor.run(&videos, None).unwrap();
        assert_eq!(report.succeeded, 4);

        let recorded = fs::read_to_string(&counts).unwrap();
        let peak = recorded
            .lines()
            .filter_map(|line| line.trim().parse::<usize>().ok())
            .max()
            .unwrap();
        assert!(peak <= 2, "observed {} simultaneous transcoders", peak);
    }

    #[test]
    fn test_cleanup_registry_removes_registered_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(true);
        let mut guards = vec![];
        for name in ["a.mp3", "b.mp3"] {
            let path = dir.path().join(name);
            File::create(&path).unwrap();
            guards.push(processor.registry().register(&path));
        }
        // keep the entries registered, as an in-flight task would
        for guard in guards {
            std::mem::forget(guard);
        }

        processor.cleanup_registry();
        assert!(!dir.path().join("a.mp3").exists());
        assert!(!dir.path().join("b.mp3").exists());
        assert!(processor.registry().is_empty());
    }

    #[test]
    fn test_cleanup_registry_continues_past_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(true);
        let present = dir.path().join("present.mp3");
        File::create(&present).unwrap();
        std::mem::forget(processor.registry().register(&dir.path().join("gone.mp3")));
        std::mem::forget(processor.registry().register(&present));

        processor.cleanup_registry();
        assert!(!present.exists());
        assert!(processor.registry().is_empty());
    }
}
