//! Сквозные сценарии решения о простое с ужатым масштабом времени:
//! один «секундный» такт здесь — 25 мс.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use idlemon_core::config::Config;
use idlemon_core::metrics::{ScriptedCounter, StaticCounter};
use idlemon_core::power::PowerEvent;
use idlemon_core::run_monitor;

const TICK: Duration = Duration::from_millis(25);

fn test_config(duration: f32, timeout: f32) -> Config {
    Config {
        cpu_thd: 60.0,
        hdd_thd: -1.0,
        net_thd: -1.0,
        duration_sec: duration,
        timeout_sec: timeout,
        tick_interval: TICK,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_scenario_quiet_host_reports_idle() {
    // Три тихих замера подряд при duration = 3 — решение «простаивает».
    let config = test_config(3.0, 10.0);
    let counter = Box::new(ScriptedCounter::from_cpu(vec![40.0, 45.0, 50.0]));

    let started = Instant::now();
    let verdict = run_monitor(&config, counter, None)
        .await
        .expect("monitor run");

    assert!(verdict.idle);
    assert_eq!(verdict.exit_code(), 0);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "idle verdict must arrive within a few ticks"
    );
    assert!(verdict.snapshot.cpu.average < 60.0);
    assert_eq!(verdict.snapshot.cpu.capacity, 3);
}

#[tokio::test]
async fn test_scenario_busy_host_times_out() {
    // Выброс нагрузки держит среднее выше порога до самого таймаута.
    let config = test_config(3.0, 1.0);
    let counter = Box::new(ScriptedCounter::from_cpu(vec![40.0, 95.0, 90.0, 90.0]));

    let verdict = run_monitor(&config, counter, None)
        .await
        .expect("monitor run");

    assert!(!verdict.idle);
    assert_eq!(verdict.exit_code(), 1);
}

#[tokio::test]
async fn test_zero_duration_exits_immediately() {
    let config = test_config(0.0, 30.0);
    let counter = Box::new(StaticCounter::new(0.0, 0.0, 0.0));

    let started = Instant::now();
    let verdict = run_monitor(&config, counter, None)
        .await
        .expect("monitor run");

    assert!(!verdict.idle);
    assert_eq!(verdict.exit_code(), 1);
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "misconfiguration guard must not wait for sampling"
    );
    assert!(!verdict.snapshot.running, "sampling must never start");
}

#[tokio::test]
async fn test_running_blacklisted_process_blocks_idle() {
    // Имя собственного процесса гарантированно есть среди запущенных.
    let own_name = procfs::process::Process::myself()
        .and_then(|process| process.stat())
        .map(|stat| stat.comm)
        .expect("own /proc entry must be readable");

    let mut config = test_config(1.0, 30.0);
    config.blacklist = vec![own_name];
    let counter = Box::new(StaticCounter::new(0.0, 0.0, 0.0));

    let started = Instant::now();
    let verdict = run_monitor(&config, counter, None)
        .await
        .expect("monitor run");

    assert!(!verdict.idle);
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "pre-check must fire before sampling starts"
    );
}

#[tokio::test]
async fn test_resume_delays_idle_verdict() {
    // Resume в середине наблюдения сбрасывает окна: тихому хосту
    // приходится накапливать интервал заново.
    let mut config = test_config(2.0, 20.0);
    config.power.debounce = Duration::from_millis(100);
    config.power.settle = Duration::from_millis(50);
    let counter = Box::new(StaticCounter::new(10.0, 0.0, 0.0));

    let (tx, rx) = mpsc::channel(4);
    let sender = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _ = tx.send(PowerEvent::Resume).await;
        // Канал держится открытым до конца прогона.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let started = Instant::now();
    let verdict = run_monitor(&config, counter, rx.into())
        .await
        .expect("monitor run");
    sender.abort();

    assert!(verdict.idle, "quiet host must still end up idle");
    assert!(
        started.elapsed() > Duration::from_millis(70),
        "resume must reset the window and delay the verdict"
    );
}
