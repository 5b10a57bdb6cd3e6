//! idlemon-core — однократная проверка, простаивает ли хост.
//!
//! Ядро наблюдает за CPU, диском и сетью через скользящие окна,
//! учитывает события suspend/resume и чёрный список процессов и выносит
//! одно решение: система тихая (код выхода 0) или нет (код выхода 1).

pub mod blacklist;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod power;
pub mod window;

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::blacklist::BlacklistChecker;
use crate::config::Config;
use crate::metrics::SystemCounter;
use crate::monitor::{IdleMonitor, MonitorSnapshot};
use crate::power::{run_power_controller, PowerEvent, SessionState};

/// Итог одного запуска: решение и снимок монитора для вывода.
#[derive(Debug, Clone, Serialize)]
pub struct IdleVerdict {
    pub idle: bool,
    pub snapshot: MonitorSnapshot,
}

impl IdleVerdict {
    /// Код выхода процесса: 0 — система простаивает, 1 — нет.
    pub fn exit_code(&self) -> i32 {
        if self.idle {
            0
        } else {
            1
        }
    }
}

/// Основной цикл принятия решения.
///
/// Наблюдает за системой не дольше `timeout` секунд (отрицательный
/// таймаут — без ограничения) и возвращает вердикт, когда либо все окна
/// продержались ниже порогов полный интервал `duration`, либо время
/// вышло. Канал `power_events`, если он передан, питает обработчик
/// suspend/resume.
pub async fn run_monitor(
    config: &Config,
    counter: Box<dyn SystemCounter>,
    power_events: Option<mpsc::Receiver<PowerEvent>>,
) -> Result<IdleVerdict> {
    let monitor = IdleMonitor::new(
        config.thresholds(),
        config.duration_sec as usize,
        config.tick_interval,
        counter,
    );

    // Защита от бессмысленной конфигурации: без интервала наблюдения
    // простой недоказуем.
    if config.duration_sec <= 0.0 {
        info!(duration = config.duration_sec, "non-positive duration, reporting not idle");
        return Ok(IdleVerdict {
            idle: false,
            snapshot: monitor.snapshot(),
        });
    }

    let blacklist = BlacklistChecker::compile(&config.blacklist);

    // Быстрый путь: если чёрный процесс уже работает, незачем запускать
    // выборку метрик.
    if !blacklist.not_exist_black() {
        info!("blacklisted process is already running, reporting not idle");
        return Ok(IdleVerdict {
            idle: false,
            snapshot: monitor.snapshot(),
        });
    }

    monitor.start();
    let session = SessionState::new();
    let power_task = power_events.map(|events| {
        tokio::spawn(run_power_controller(
            monitor.clone(),
            Arc::clone(&session),
            config.power,
            events,
        ))
    });

    // Сдвиг на полтакта относительно таймера выборки, чтобы решение
    // принималось по свежему замеру.
    tokio::time::sleep(config.tick_interval / 2).await;

    let refresh_console = stderr_is_tty();
    let mut ticker = tokio::time::interval(config.tick_interval);

    let verdict = loop {
        ticker.tick().await;
        let snapshot = monitor.snapshot();

        if refresh_console {
            // Живое обновление диагностики; только на интерактивном
            // терминале, чтобы не засорять перенаправленный stderr.
            eprint!("\x1b[2J\x1b[H");
            eprintln!("{}", render_status(config, &snapshot, &blacklist, &monitor));
        }

        let timed_out = config.timeout_sec >= 0.0
            && !session.is_sleeping()
            && session.elapsed().as_secs_f32() > config.timeout_sec;
        if timed_out {
            info!(timeout = config.timeout_sec, "timeout reached, reporting not idle");
            break IdleVerdict {
                idle: false,
                snapshot,
            };
        }

        if monitor.is_idle() && blacklist.not_exist_black() {
            info!("system is idle, reporting success");
            break IdleVerdict {
                idle: true,
                snapshot,
            };
        }
        debug!(elapsed_sec = session.elapsed().as_secs_f32(), "not idle yet");
    };

    if let Some(task) = power_task {
        task.abort();
    }
    monitor.stop();
    Ok(verdict)
}

/// Текст диагностики для живого обновления на stderr.
fn render_status(
    config: &Config,
    snapshot: &MonitorSnapshot,
    blacklist: &BlacklistChecker,
    monitor: &IdleMonitor,
) -> String {
    let mut status = String::new();
    status.push_str(&format!(
        "duration = {}    timeout = {}\n",
        config.duration_sec, config.timeout_sec
    ));
    status.push_str(&snapshot.to_string());
    status.push_str(&format!("NotExistBlack = {}\n", blacklist.not_exist_black()));
    status.push_str(&format!("SystemIsIdle  = {}\n", monitor.is_idle()));
    status
}

fn stderr_is_tty() -> bool {
    // Перенаправление в файл или пайп гасит живую перерисовку.
    unsafe { libc::isatty(libc::STDERR_FILENO) == 1 }
}
