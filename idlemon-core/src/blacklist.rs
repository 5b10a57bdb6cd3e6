//! Чёрный список процессов.
//!
//! Шаблон — имя процесса с подстановками `*` (ноль и более символов) и
//! `?` (ровно один символ); расширение `.exe` отбрасывается, регистр не
//! учитывается, совпадение ищется по всему имени, а не по подстроке.
//! Все шаблоны компилируются один раз при загрузке конфигурации;
//! некорректный шаблон пропускается с предупреждением, остальные
//! продолжают работать.

use anyhow::Result;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

pub struct BlacklistChecker {
    patterns: Vec<Regex>,
}

impl BlacklistChecker {
    /// Скомпилировать шаблоны из конфигурации.
    pub fn compile(patterns: &[String]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            match compile_pattern(raw) {
                Ok(regex) => compiled.push(regex),
                Err(e) => warn!(pattern = %raw, "invalid blacklist pattern skipped: {e}"),
            }
        }
        Self { patterns: compiled }
    }

    /// Количество рабочих (скомпилированных) шаблонов.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Совпадает ли имя процесса с каким-либо шаблоном.
    pub fn matches_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|regex| regex.is_match(name))
    }

    /// Не запущен ли ни один процесс из чёрного списка.
    ///
    /// Ошибки перечисления `/proc` и исчезнувшие между итерациями
    /// процессы считаются отсутствием совпадения: мониторинг важнее
    /// одного пропущенного скана.
    pub fn not_exist_black(&self) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let processes = match procfs::process::all_processes() {
            Ok(processes) => processes,
            Err(e) => {
                warn!("failed to enumerate processes, treating blacklist as clear: {e}");
                return true;
            }
        };

        for process in processes {
            let Ok(process) = process else {
                continue; // процесс успел завершиться
            };
            let Ok(stat) = process.stat() else {
                continue;
            };
            if self.matches_name(&stat.comm) {
                debug!(pid = process.pid(), name = %stat.comm, "blacklisted process is running");
                return false;
            }
        }
        true
    }
}

/// Перевести шаблон с подстановками в якорённое регулярное выражение.
///
/// Остальные символы передаются как есть — поведение исходного формата
/// файла настроек, поэтому, например, `notepad++` остаётся некорректным
/// шаблоном и отбрасывается при компиляции.
fn compile_pattern(raw: &str) -> Result<Regex> {
    let mut name = raw.trim().to_string();
    if name.to_ascii_lowercase().ends_with(".exe") {
        name.truncate(name.len() - 4);
    }
    let translated = name.replace('?', ".").replace('*', ".*");
    let regex = RegexBuilder::new(&format!("^{translated}$"))
        .case_insensitive(true)
        .build()?;
    Ok(regex)
}
