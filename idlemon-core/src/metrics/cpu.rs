//! Счётчики CPU из `/proc/stat`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Сырые счётчики CPU из агрегированной строки `cpu` в `/proc/stat`.
///
/// Значения монотонно растут с момента загрузки; загрузка за интервал
/// вычисляется как дельта между двумя снимками.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn busy(&self) -> u64 {
        self.total() - self.idle - self.iowait
    }

    /// Доля занятости CPU в процентах между двумя снимками.
    ///
    /// Возвращает `None`, если счётчики пошли назад (переполнение или
    /// некорректные данные) либо между снимками не прошло ни одного тика.
    pub fn busy_percent_since(&self, prev: &CpuTimes) -> Option<f32> {
        let total = self.total().checked_sub(prev.total())?;
        if total == 0 {
            return None;
        }
        let busy = self.busy().checked_sub(prev.busy())?;
        Some(busy as f32 / total as f32 * 100.0)
    }
}

/// Прочитать агрегированные счётчики CPU из файла формата `/proc/stat`.
pub fn read_cpu_times(stat_path: &Path) -> Result<CpuTimes> {
    let contents = fs::read_to_string(stat_path)
        .with_context(|| format!("failed to read {}", stat_path.display()))?;
    parse_cpu_times(&contents)
}

fn parse_cpu_times(contents: &str) -> Result<CpuTimes> {
    let line = contents
        .lines()
        .find(|line| line.starts_with("cpu "))
        .context("no aggregate `cpu` line in stat file")?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|field| field.parse::<u64>().unwrap_or(0))
        .collect();
    // user nice system idle — минимум, что пишут даже старые ядра.
    if fields.len() < 4 {
        anyhow::bail!("malformed `cpu` line: {line:?}");
    }

    let field = |i: usize| fields.get(i).copied().unwrap_or(0);
    Ok(CpuTimes {
        user: field(0),
        nice: field(1),
        system: field(2),
        idle: field(3),
        iowait: field(4),
        irq: field(5),
        softirq: field(6),
        steal: field(7),
    })
}
