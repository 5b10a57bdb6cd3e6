//! Обработчик событий suspend/resume.
//!
//! Решение о простое не должно опираться на данные, пережившие сон:
//! счётчики за время сна не двигались, а сразу после пробуждения дают
//! ложные выбросы. Поэтому при любом событии питания наблюдение
//! останавливается, а после пробуждения перезапускается с паузой.
//!
//! Порядок уведомлений от хоста не гарантирован: Suspend может прийти
//! после Resume, Resume может дублироваться, Suspend может потеряться.
//! Протокол «stop при любом событии, start только после паузы» вместе с
//! дебаунсом поглощает все наблюдавшиеся комбинации.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::monitor::IdleMonitor;

/// Событие питания хоста.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
}

/// Тайминги обработчика событий питания. Вынесены в конфигурацию, чтобы
/// тесты не ждали настоящие десятки секунд.
#[derive(Debug, Clone, Copy)]
pub struct PowerTimings {
    /// Окно после Resume, в котором Suspend считается дребезгом.
    pub debounce: Duration,
    /// Пауза после Resume до перезапуска замеров: драйверам и счётчикам
    /// нужно время стабилизироваться.
    pub settle: Duration,
}

impl Default for PowerTimings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(10),
            settle: Duration::from_secs(11),
        }
    }
}

/// Общее состояние сеанса наблюдения: точка отсчёта таймаута и флаг сна.
///
/// Точку отсчёта сдвигает обработчик питания после пробуждения, читает —
/// основной цикл; пока флаг сна поднят, таймаут не тикает.
#[derive(Debug)]
pub struct SessionState {
    started: Mutex<Instant>,
    sleeping: AtomicBool,
}

impl SessionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Mutex::new(Instant::now()),
            sleeping: AtomicBool::new(false),
        })
    }

    pub fn restart_timer(&self) {
        *self.started.lock().unwrap() = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.lock().unwrap().elapsed()
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::SeqCst)
    }

    fn set_sleeping(&self, value: bool) {
        self.sleeping.store(value, Ordering::SeqCst);
    }
}

/// Цикл обработчика событий питания. Завершается, когда закрывается
/// канал событий.
pub async fn run_power_controller(
    monitor: IdleMonitor,
    session: Arc<SessionState>,
    timings: PowerTimings,
    mut events: mpsc::Receiver<PowerEvent>,
) {
    let mut last_resume: Option<Instant> = None;

    while let Some(event) = events.recv().await {
        match event {
            PowerEvent::Suspend => {
                if let Some(resumed_at) = last_resume {
                    if resumed_at.elapsed() <= timings.debounce {
                        debug!("suspend within debounce window after resume, ignored");
                        continue;
                    }
                }
                info!("suspend notification, pausing idle monitor");
                session.set_sleeping(true);
                monitor.stop();
            }
            PowerEvent::Resume => {
                info!(
                    settle_ms = timings.settle.as_millis() as u64,
                    "resume notification, restarting idle monitor after settle delay"
                );
                // Stop и здесь: Suspend мог потеряться или ещё не дойти.
                session.set_sleeping(true);
                monitor.stop();

                // Пауза идёт вне блокировки монитора: выборка и основной
                // цикл не должны стоять вместе с нами.
                tokio::time::sleep(timings.settle).await;

                monitor.start();
                session.restart_timer();
                session.set_sleeping(false);
                last_resume = Some(Instant::now());
            }
        }
    }
    debug!("power event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::StaticCounter;
    use crate::monitor::Thresholds;

    fn quiet_monitor(capacity: usize, tick: Duration) -> IdleMonitor {
        IdleMonitor::new(
            Thresholds {
                cpu_percent: 60.0,
                hdd_mibps: -1.0,
                net_mbps: -1.0,
            },
            capacity,
            tick,
            Box::new(StaticCounter::new(40.0, 0.0, 0.0)),
        )
    }

    fn fast_timings() -> PowerTimings {
        PowerTimings {
            debounce: Duration::from_millis(100),
            settle: Duration::from_millis(40),
        }
    }

    #[tokio::test]
    async fn test_suspend_stops_monitor_and_marks_sleeping() {
        let monitor = quiet_monitor(1, Duration::from_millis(10));
        let session = SessionState::new();
        let (tx, rx) = mpsc::channel(4);
        let controller = tokio::spawn(run_power_controller(
            monitor.clone(),
            Arc::clone(&session),
            fast_timings(),
            rx,
        ));

        monitor.start();
        monitor.sample_now();
        assert!(monitor.is_idle());

        tx.send(PowerEvent::Suspend).await.expect("send suspend");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!monitor.snapshot().running);
        assert!(!monitor.is_idle());
        assert!(session.is_sleeping());

        drop(tx);
        controller.await.expect("controller task");
    }

    #[tokio::test]
    async fn test_resume_resets_windows_and_restarts() {
        let monitor = quiet_monitor(2, Duration::from_secs(1));
        let session = SessionState::new();
        let (tx, rx) = mpsc::channel(4);
        let controller = tokio::spawn(run_power_controller(
            monitor.clone(),
            Arc::clone(&session),
            fast_timings(),
            rx,
        ));

        monitor.start();
        monitor.sample_now();
        monitor.sample_now();
        assert!(monitor.is_idle());
        let before_resume = session.elapsed();

        tx.send(PowerEvent::Resume).await.expect("send resume");
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Во время паузы стабилизации наблюдение остановлено.
        assert!(session.is_sleeping());
        assert!(!monitor.snapshot().running);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // После паузы монитор работает с пустыми окнами, отсчёт таймаута
        // начат заново.
        assert!(!session.is_sleeping());
        let snapshot = monitor.snapshot();
        assert!(snapshot.running);
        assert!(!monitor.is_idle(), "windows must refill before idling again");
        assert!(session.elapsed() < before_resume + Duration::from_millis(60));

        drop(tx);
        controller.await.expect("controller task");
        monitor.stop();
    }

    #[tokio::test]
    async fn test_suspend_right_after_resume_is_debounced() {
        let monitor = quiet_monitor(1, Duration::from_millis(10));
        let session = SessionState::new();
        let (tx, rx) = mpsc::channel(4);
        let controller = tokio::spawn(run_power_controller(
            monitor.clone(),
            Arc::clone(&session),
            fast_timings(),
            rx,
        ));

        monitor.start();
        tx.send(PowerEvent::Resume).await.expect("send resume");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(monitor.snapshot().running);

        // Дребезг: Suspend сразу после пробуждения не трогает монитор.
        tx.send(PowerEvent::Suspend).await.expect("send suspend");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(monitor.snapshot().running);
        assert!(!session.is_sleeping());

        drop(tx);
        controller.await.expect("controller task");
        monitor.stop();
    }

    #[tokio::test]
    async fn test_duplicate_resume_is_absorbed() {
        let monitor = quiet_monitor(1, Duration::from_millis(10));
        let session = SessionState::new();
        let (tx, rx) = mpsc::channel(4);
        let controller = tokio::spawn(run_power_controller(
            monitor.clone(),
            Arc::clone(&session),
            fast_timings(),
            rx,
        ));

        monitor.start();
        tx.send(PowerEvent::Resume).await.expect("first resume");
        tx.send(PowerEvent::Resume).await.expect("second resume");
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(monitor.snapshot().running);
        assert!(!session.is_sleeping());

        drop(tx);
        controller.await.expect("controller task");
        monitor.stop();
    }
}
