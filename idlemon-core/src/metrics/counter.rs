//! Источник мгновенных системных метрик.
//!
//! `SystemCounter` — то, что монитор опрашивает раз в секунду.
//! `ProcSystemCounter` читает `/proc` и считает скорости как дельту
//! монотонных счётчиков между вызовами; первый вызов каждой серии
//! возвращает 0, пока нет базовой точки.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;

use super::cpu::{read_cpu_times, CpuTimes};
use super::disk::{read_disk_totals, DiskTotals};
use super::net::{read_net_totals, NetTotals};

/// Единицы дисковой пропускной способности.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRate {
    KiBps,
    MiBps,
}

/// Единицы сетевой пропускной способности.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitRate {
    Kbps,
    Mbps,
}

/// Мгновенные показатели загрузки системы.
///
/// Любой вызов может завершиться ошибкой из-за гонки со счётчиками или
/// драйверами; вызывающая сторона трактует такой замер как нулевую
/// нагрузку и продолжает работу.
pub trait SystemCounter: Send {
    /// Загрузка CPU в процентах (0–100).
    fn cpu_usage(&mut self) -> Result<f32>;

    /// Суммарный дисковый обмен (чтение + запись) по физическим дискам.
    fn disk_transfer(&mut self, unit: ByteRate) -> Result<f32>;

    /// Суммарный сетевой обмен (приём + передача) по всем интерфейсам.
    fn net_transfer(&mut self, unit: BitRate) -> Result<f32>;
}

/// Пути к файлам /proc, чтобы их можно было подменить в тестах.
#[derive(Debug, Clone)]
pub struct ProcPaths {
    pub stat: PathBuf,
    pub diskstats: PathBuf,
    pub net_dev: PathBuf,
}

impl ProcPaths {
    pub fn new(proc_root: impl AsRef<Path>) -> Self {
        let root = proc_root.as_ref();
        Self {
            stat: root.join("stat"),
            diskstats: root.join("diskstats"),
            net_dev: root.join("net").join("dev"),
        }
    }
}

impl Default for ProcPaths {
    fn default() -> Self {
        Self::new("/proc")
    }
}

/// Счётчики системы на основе `/proc`.
pub struct ProcSystemCounter {
    paths: ProcPaths,
    prev_cpu: Option<CpuTimes>,
    prev_disk: Option<(DiskTotals, Instant)>,
    prev_net: Option<(NetTotals, Instant)>,
}

impl ProcSystemCounter {
    pub fn new(paths: ProcPaths) -> Self {
        Self {
            paths,
            prev_cpu: None,
            prev_disk: None,
            prev_net: None,
        }
    }
}

impl SystemCounter for ProcSystemCounter {
    fn cpu_usage(&mut self) -> Result<f32> {
        let current = read_cpu_times(&self.paths.stat)?;
        let usage = match self.prev_cpu {
            // Нулевая или отрицательная дельта — повторное чтение в тот же
            // тик ядра либо откат счётчика; считаем нагрузку нулевой.
            Some(previous) => current.busy_percent_since(&previous).unwrap_or(0.0),
            None => 0.0,
        };
        self.prev_cpu = Some(current);
        Ok(usage)
    }

    fn disk_transfer(&mut self, unit: ByteRate) -> Result<f32> {
        let current = read_disk_totals(&self.paths.diskstats)?;
        let now = Instant::now();
        let rate = match self.prev_disk {
            Some((previous, at)) => {
                let delta = current.transferred().saturating_sub(previous.transferred());
                bytes_rate(delta, now.duration_since(at).as_secs_f64(), unit)
            }
            None => 0.0,
        };
        self.prev_disk = Some((current, now));
        Ok(rate)
    }

    fn net_transfer(&mut self, unit: BitRate) -> Result<f32> {
        let current = read_net_totals(&self.paths.net_dev)?;
        let now = Instant::now();
        let rate = match self.prev_net {
            Some((previous, at)) => {
                let delta = current.transferred().saturating_sub(previous.transferred());
                bits_rate(delta, now.duration_since(at).as_secs_f64(), unit)
            }
            None => 0.0,
        };
        self.prev_net = Some((current, now));
        Ok(rate)
    }
}

fn bytes_rate(delta_bytes: u64, elapsed_sec: f64, unit: ByteRate) -> f32 {
    if elapsed_sec <= 0.0 {
        return 0.0;
    }
    let per_sec = delta_bytes as f64 / elapsed_sec;
    let scaled = match unit {
        ByteRate::KiBps => per_sec / 1024.0,
        ByteRate::MiBps => per_sec / (1024.0 * 1024.0),
    };
    scaled as f32
}

fn bits_rate(delta_bytes: u64, elapsed_sec: f64, unit: BitRate) -> f32 {
    if elapsed_sec <= 0.0 {
        return 0.0;
    }
    let per_sec = delta_bytes as f64 * 8.0 / elapsed_sec;
    let scaled = match unit {
        BitRate::Kbps => per_sec / 1_000.0,
        BitRate::Mbps => per_sec / 1_000_000.0,
    };
    scaled as f32
}

/// Счётчик с фиксированными показателями, для тестов и отладки.
pub struct StaticCounter {
    pub cpu: f32,
    pub disk: f32,
    pub net: f32,
}

impl StaticCounter {
    pub fn new(cpu: f32, disk: f32, net: f32) -> Self {
        Self { cpu, disk, net }
    }
}

impl SystemCounter for StaticCounter {
    fn cpu_usage(&mut self) -> Result<f32> {
        Ok(self.cpu)
    }

    fn disk_transfer(&mut self, _unit: ByteRate) -> Result<f32> {
        Ok(self.disk)
    }

    fn net_transfer(&mut self, _unit: BitRate) -> Result<f32> {
        Ok(self.net)
    }
}

/// Счётчик с заранее заданной последовательностью замеров CPU.
///
/// Когда последовательность исчерпана, продолжает отдавать последнее
/// значение. Диск и сеть всегда нулевые.
pub struct ScriptedCounter {
    script: Vec<f32>,
    position: usize,
}

impl ScriptedCounter {
    pub fn from_cpu(script: Vec<f32>) -> Self {
        Self { script, position: 0 }
    }
}

impl SystemCounter for ScriptedCounter {
    fn cpu_usage(&mut self) -> Result<f32> {
        let value = self
            .script
            .get(self.position)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(0.0);
        self.position += 1;
        Ok(value)
    }

    fn disk_transfer(&mut self, _unit: ByteRate) -> Result<f32> {
        Ok(0.0)
    }

    fn net_transfer(&mut self, _unit: BitRate) -> Result<f32> {
        Ok(0.0)
    }
}
