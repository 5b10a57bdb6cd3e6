//! Монитор простоя: три окна метрик и секундный таймер выборки.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::metrics::{BitRate, ByteRate, SystemCounter};
use crate::window::MetricWindow;

/// Пороговые значения метрик. Отрицательное значение отключает метрику.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// CPU, проценты.
    pub cpu_percent: f32,
    /// Диск, MiB/s (чтение + запись).
    pub hdd_mibps: f32,
    /// Сеть, Mbit/s (приём + передача).
    pub net_mbps: f32,
}

struct MonitorState {
    cpu: MetricWindow,
    hdd: MetricWindow,
    net: MetricWindow,
    running: bool,
    counter: Box<dyn SystemCounter>,
    sampler: Option<JoinHandle<()>>,
}

impl MonitorState {
    /// Один тик выборки: замер каждой включённой метрики.
    ///
    /// Ошибка источника трактуется как нулевая нагрузка: ложный «ноль»
    /// на одном тике приемлемее остановки наблюдения.
    fn sample(&mut self) {
        if self.cpu.enabled() {
            let value = self.counter.cpu_usage().unwrap_or_else(|e| {
                warn!("cpu sample failed, recording 0: {e:#}");
                0.0
            });
            self.cpu.enqueue(value);
        }
        if self.hdd.enabled() {
            let value = self.counter.disk_transfer(ByteRate::MiBps).unwrap_or_else(|e| {
                warn!("disk sample failed, recording 0: {e:#}");
                0.0
            });
            self.hdd.enqueue(value);
        }
        if self.net.enabled() {
            let value = self.counter.net_transfer(BitRate::Mbps).unwrap_or_else(|e| {
                warn!("net sample failed, recording 0: {e:#}");
                0.0
            });
            self.net.enqueue(value);
        }
        debug!(
            cpu = self.cpu.latest(),
            hdd = self.hdd.latest(),
            net = self.net.latest(),
            "collected samples"
        );
    }

    fn reset_windows(&mut self) {
        self.cpu.reset();
        self.hdd.reset();
        self.net.reset();
    }
}

/// Монитор простоя системы.
///
/// Владеет тремя окнами (CPU, диск, сеть) и задачей периодической
/// выборки. Всё состояние сериализуется одним мьютексом: тик выборки
/// исполняется в отдельной tokio-задаче от вызовов `start`/`stop`/
/// `is_idle`, а операции дешевы (не больше `duration` замеров на окно).
///
/// Хэндл клонируется; обработчик событий питания и основной цикл
/// разделяют один экземпляр состояния.
#[derive(Clone)]
pub struct IdleMonitor {
    state: Arc<Mutex<MonitorState>>,
    tick: Duration,
}

impl IdleMonitor {
    /// `capacity` — требуемая длительность тишины в секундах, она же
    /// ёмкость каждого окна.
    pub fn new(
        thresholds: Thresholds,
        capacity: usize,
        tick: Duration,
        counter: Box<dyn SystemCounter>,
    ) -> Self {
        let state = MonitorState {
            cpu: MetricWindow::new(thresholds.cpu_percent, capacity),
            hdd: MetricWindow::new(thresholds.hdd_mibps, capacity),
            net: MetricWindow::new(thresholds.net_mbps, capacity),
            running: false,
            counter,
            sampler: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            tick,
        }
    }

    /// Запустить периодическую выборку с чистыми окнами.
    ///
    /// Период получает одноразовый случайный сдвиг до четверти такта,
    /// чтобы не синхронизироваться с другими читателями счётчиков.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        if state.running {
            return;
        }
        state.reset_windows();
        state.running = true;

        let jitter_ms = rand::thread_rng().gen_range(0..=self.tick.as_millis() as u64 / 4);
        let period = self.tick + Duration::from_millis(jitter_ms);
        let shared = Arc::clone(&self.state);
        state.sampler = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let mut state = shared.lock().unwrap();
                if !state.running {
                    break;
                }
                state.sample();
            }
        }));
        debug!(period_ms = period.as_millis() as u64, "idle monitor started");
    }

    /// Остановить выборку и сбросить окна: частично накопленные данные
    /// не переживают паузу.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(sampler) = state.sampler.take() {
            sampler.abort();
        }
        state.running = false;
        state.reset_windows();
        debug!("idle monitor stopped");
    }

    /// Система простаивает: монитор работает и каждое окно ниже порога
    /// (отключённое окно удовлетворяет условию всегда).
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.running
            && state.cpu.is_under_threshold()
            && state.hdd.is_under_threshold()
            && state.net.is_under_threshold()
    }

    /// Диагностический снимок текущего состояния.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.lock().unwrap();
        MonitorSnapshot {
            running: state.running,
            cpu: MetricSnapshot::of(&state.cpu),
            hdd: MetricSnapshot::of(&state.hdd),
            net: MetricSnapshot::of(&state.net),
        }
    }

    /// Синхронный тик выборки, минуя таймер.
    #[cfg(test)]
    pub(crate) fn sample_now(&self) {
        self.state.lock().unwrap().sample();
    }
}

/// Состояние одного окна для диагностики.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub enabled: bool,
    pub threshold: f32,
    pub average: f32,
    pub latest: f32,
    pub filled: usize,
    pub capacity: usize,
}

impl MetricSnapshot {
    fn of(window: &MetricWindow) -> Self {
        Self {
            enabled: window.enabled(),
            threshold: window.threshold(),
            average: window.average(),
            latest: window.latest(),
            filled: window.len(),
            capacity: window.capacity(),
        }
    }
}

/// Снимок монитора: состояние всех окон и флаг работы.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub running: bool,
    pub cpu: MetricSnapshot,
    pub hdd: MetricSnapshot,
    pub net: MetricSnapshot,
}

const EMPTY_CELL: &str = "             ";

impl MonitorSnapshot {
    fn write_row(
        &self,
        out: &mut fmt::Formatter<'_>,
        label: &str,
        pick: impl Fn(&MetricSnapshot) -> f32,
    ) -> fmt::Result {
        write!(out, "{label} :")?;
        if self.cpu.enabled {
            write!(out, "{:>6.0} %     ", pick(&self.cpu))?;
        } else {
            write!(out, "{EMPTY_CELL}")?;
        }
        if self.hdd.enabled {
            write!(out, "{:>6.1} MiB/s ", pick(&self.hdd))?;
        } else {
            write!(out, "{EMPTY_CELL}")?;
        }
        if self.net.enabled {
            write!(out, "{:>6.1} Mbps", pick(&self.net))?;
        }
        writeln!(out)
    }
}

impl fmt::Display for MonitorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "               CPU         HDD          Network")?;
        self.write_row(f, "Threshold", |m| m.threshold)?;
        self.write_row(f, "  Average", |m| m.average)?;
        self.write_row(f, "    Value", |m| m.latest)?;

        let metrics = [&self.cpu, &self.hdd, &self.net];
        if let Some(first) = metrics.iter().find(|metric| metric.enabled) {
            writeln!(f, "     Fill : {:>3} / {:>3}", first.filled, first.capacity)?;
        }
        Ok(())
    }
}
