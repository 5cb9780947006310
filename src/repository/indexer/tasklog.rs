//! Per-call profiling context
//!
//! Callers create a `TaskLog`, hand it to index and search calls, and
//! merge or print it afterwards. Nothing is process-global.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::util::format_duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStat {
    pub count: u64,
    pub total: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TaskLog {
    tasks: BTreeMap<&'static str, TaskStat>,
}

impl TaskLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task: &'static str, elapsed: Duration) {
        let stat = self.tasks.entry(task).or_default();
        stat.count += 1;
        stat.total += elapsed;
    }

    /// Run `f` and charge its wall time to `task`
    pub fn time<T>(&mut self, task: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(task, start.elapsed());
        out
    }

    pub fn get(&self, task: &str) -> Option<TaskStat> {
        self.tasks.get(task).copied()
    }

    pub fn merge(&mut self, other: &TaskLog) {
        for (task, stat) in &other.tasks {
            let mine = self.tasks.entry(*task).or_default();
            mine.count += stat.count;
            mine.total += stat.total;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// One line per task, slowest first
    pub fn summary(&self) -> Vec<String> {
        let mut tasks: Vec<_> = self.tasks.iter().collect();
        tasks.sort_by(|(na, sa), (nb, sb)| sb.total.cmp(&sa.total).then_with(|| na.cmp(nb)));
        tasks
            .into_iter()
            .map(|(task, stat)| {
                format!("{:<14} {:>8} x{}", task, format_duration(stat.total), stat.count)
            })
            .collect()
    }
}
