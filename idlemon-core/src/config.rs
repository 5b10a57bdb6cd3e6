//! Конфигурация одного запуска.
//!
//! Источники — файл настроек рядом с исполняемым файлом и командная
//! строка; командная строка побеждает. Файл хранит те же флаги, что и
//! командная строка, плюс шаблоны чёрного списка, и создаётся с
//! комментированным содержимым по умолчанию, если его ещё нет.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::monitor::Thresholds;
use crate::power::PowerTimings;

/// Пороги по умолчанию: %, MiB/s, Mbit/s, секунды, секунды.
pub const DEFAULT_CPU_THD: f32 = 60.0;
pub const DEFAULT_HDD_THD: f32 = 30.0;
pub const DEFAULT_NET_THD: f32 = -1.0;
pub const DEFAULT_DURATION: f32 = 20.0;
pub const DEFAULT_TIMEOUT: f32 = 30.0;

#[derive(Debug, Clone)]
pub struct Config {
    /// Порог CPU в процентах; отрицательный отключает метрику.
    pub cpu_thd: f32,
    /// Порог диска в MiB/s; отрицательный отключает метрику.
    pub hdd_thd: f32,
    /// Порог сети в Mbit/s; отрицательный отключает метрику.
    pub net_thd: f32,
    /// Сколько секунд подряд система должна быть тихой. Это же — ёмкость
    /// каждого окна замеров.
    pub duration_sec: f32,
    /// Максимальное время ожидания решения; отрицательное — без предела.
    pub timeout_sec: f32,
    /// Шаблоны чёрного списка из файла настроек.
    pub blacklist: Vec<String>,
    /// Период выборки и основного цикла.
    pub tick_interval: Duration,
    /// Тайминги обработчика событий питания.
    pub power: PowerTimings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cpu_thd: DEFAULT_CPU_THD,
            hdd_thd: DEFAULT_HDD_THD,
            net_thd: DEFAULT_NET_THD,
            duration_sec: DEFAULT_DURATION,
            timeout_sec: DEFAULT_TIMEOUT,
            blacklist: Vec::new(),
            tick_interval: Duration::from_secs(1),
            power: PowerTimings::default(),
        }
    }
}

impl Config {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            cpu_percent: self.cpu_thd,
            hdd_mibps: self.hdd_thd,
            net_mbps: self.net_thd,
        }
    }

    /// Путь файла настроек по умолчанию: `<исполняемый файл>.txt`.
    pub fn default_sidecar_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("failed to resolve current executable path")?;
        Ok(exe.with_extension("txt"))
    }

    /// Загрузить файл настроек, создав его с содержимым по умолчанию,
    /// если файла ещё нет.
    pub fn load_sidecar(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::write(path, DEFAULT_SIDECAR_TEXT).with_context(|| {
                format!("failed to create default settings file at {}", path.display())
            })?;
            info!(path = %path.display(), "created default settings file");
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        self.apply_sidecar(&contents);
        Ok(())
    }

    /// Разобрать текст файла настроек.
    ///
    /// `//` начинает комментарий до конца строки; пустые и повторные
    /// строки отбрасываются. Строки, начинающиеся с `-` или `/`,
    /// разбиваются на токены флагов; остальные — шаблоны чёрного списка.
    pub fn apply_sidecar(&mut self, contents: &str) {
        let mut lines: Vec<&str> = Vec::new();
        for raw in contents.lines() {
            let line = match raw.find("//") {
                Some(found) => &raw[..found],
                None => raw,
            };
            let line = line.trim();
            if line.is_empty() || lines.contains(&line) {
                continue;
            }
            lines.push(line);
        }

        let mut args: Vec<String> = Vec::new();
        for line in lines {
            if line.starts_with('-') || line.starts_with('/') {
                args.extend(line.split_whitespace().map(str::to_string));
            } else {
                self.blacklist.push(line.to_string());
            }
        }
        self.apply_args(&args);
    }

    /// Применить флаги вида `-cpu 60` (`/cpu 60` тоже принимается,
    /// ключи без учёта регистра).
    ///
    /// Неизвестные ключи пропускаются; неразборчивое значение оставляет
    /// прежнее значение в силе с предупреждением — ошибка конфигурации
    /// никогда не фатальна.
    pub fn apply_args<S: AsRef<str>>(&mut self, args: &[S]) {
        for (i, arg) in args.iter().enumerate() {
            let arg = arg.as_ref();
            let key = arg
                .strip_prefix('-')
                .or_else(|| arg.strip_prefix('/'));
            let Some(key) = key else {
                continue;
            };

            let slot = match key.to_ascii_lowercase().as_str() {
                "cpu" | "cputhd" => &mut self.cpu_thd,
                "hdd" | "hddthd" => &mut self.hdd_thd,
                "net" | "netthd" => &mut self.net_thd,
                "dur" | "duration" => &mut self.duration_sec,
                "timeout" => &mut self.timeout_sec,
                _ => continue,
            };

            let value = args.get(i + 1).map(|v| v.as_ref()).unwrap_or("");
            match value.parse::<f32>() {
                Ok(parsed) => *slot = parsed,
                Err(_) => warn!(key, value, "unparseable flag value ignored"),
            }
        }
    }
}

/// Содержимое файла настроек, создаваемого при первом запуске.
pub const DEFAULT_SIDECAR_TEXT: &str = "\
//
// idlemon settings
//
// Lines starting with '-' or '/' are flag tokens, the same keys as the
// command line takes. Command-line flags win over this file.
//
//   -cpu 60        CPU usage threshold, percent; negative disables
//   -hdd 30        disk transfer threshold, MiB/s (read + write)
//   -net -1        network transfer threshold, Mbit/s (rx + tx)
//   -duration 20   seconds of sustained quiet required
//   -timeout 30    give up after this many seconds; negative waits forever
//
// Every other non-empty line is a blacklisted process name pattern:
// '*' matches zero or more characters, '?' matches exactly one, a
// trailing .exe is ignored, matching is case-insensitive and covers the
// whole name. While any matching process runs, the host is never idle.
//
// '//' starts a comment; blank and duplicate lines are dropped.
//

-cpu 60
-hdd 30
-net -1
-duration 20
-timeout  30

ffmpeg
x264
";
