use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use idlemon_core::config::Config;
use idlemon_core::metrics::{ProcPaths, ProcSystemCounter};
use idlemon_core::run_monitor;

mod logind;

/// Один прогон: наблюдает за хостом и завершается с кодом 0, если тот
/// простаивает, иначе с кодом 1.
#[derive(Parser, Debug)]
#[command(name = "idlemon", about = "One-shot system idle gate")]
struct Args {
    /// Порог CPU в процентах; отрицательный отключает метрику
    #[arg(long, visible_alias = "cputhd", value_name = "PERCENT", allow_hyphen_values = true)]
    cpu: Option<String>,

    /// Порог диска в MiB/s (чтение + запись); отрицательный отключает
    #[arg(long, visible_alias = "hddthd", value_name = "MIBPS", allow_hyphen_values = true)]
    hdd: Option<String>,

    /// Порог сети в Mbit/s (приём + передача); отрицательный отключает
    #[arg(long, visible_alias = "netthd", value_name = "MBPS", allow_hyphen_values = true)]
    net: Option<String>,

    /// Сколько секунд подряд система должна быть тихой
    #[arg(long, visible_alias = "dur", value_name = "SECONDS", allow_hyphen_values = true)]
    duration: Option<String>,

    /// Максимум секунд ожидания решения; отрицательный — без предела
    #[arg(long, value_name = "SECONDS", allow_hyphen_values = true)]
    timeout: Option<String>,

    /// Путь к файлу настроек вместо <исполняемый файл>.txt
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Напечатать итоговый снимок в JSON вместо текстовой таблицы
    #[arg(long)]
    json: bool,

    /// Не подписываться на события питания logind
    #[arg(long)]
    no_power_events: bool,
}

impl Args {
    /// Собрать переданные флаги обратно в токены для мягкого разбора:
    /// неразборчивое значение не валит запуск, а оставляет значение из
    /// файла настроек или по умолчанию.
    fn threshold_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        let pairs = [
            ("-cpu", &self.cpu),
            ("-hdd", &self.hdd),
            ("-net", &self.net),
            ("-duration", &self.duration),
            ("-timeout", &self.timeout),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                tokens.push(key.to_string());
                tokens.push(value.clone());
            }
        }
        tokens
    }
}

/// Привести флаги исторического формата (`-cpu 60`, `/cpu 60`) к виду,
/// который понимает clap.
fn normalize_args(argv: impl IntoIterator<Item = String>) -> Vec<String> {
    const KEYS: [&str; 9] = [
        "cpu", "cputhd", "hdd", "hddthd", "net", "netthd", "dur", "duration", "timeout",
    ];
    argv.into_iter()
        .map(|arg| {
            let stripped = if let Some(rest) = arg.strip_prefix('/') {
                Some(rest)
            } else if !arg.starts_with("--") {
                arg.strip_prefix('-')
            } else {
                None
            };
            match stripped {
                Some(key) if KEYS.contains(&key.to_ascii_lowercase().as_str()) => {
                    format!("--{}", key.to_ascii_lowercase())
                }
                _ => arg,
            }
        })
        .collect()
}

fn install_panic_hook() {
    // Последний рубеж: необработанная паника попадает в лог до
    // стандартного завершения. Код выхода в этом случае не 0/1, и
    // вызывающая сторона должна трактовать его как отдельный класс сбоя.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("unhandled panic: {info}");
        default_hook(info);
    }));
}

#[tokio::main]
async fn main() {
    // Лог уходит на stderr: stdout зарезервирован под решение.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    install_panic_hook();

    let args = Args::parse_from(normalize_args(std::env::args()));

    let mut config = Config::default();
    let sidecar = match &args.config {
        Some(path) => path.clone(),
        None => match Config::default_sidecar_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("cannot resolve settings file path, using built-in defaults: {e:#}");
                PathBuf::new()
            }
        },
    };
    if !sidecar.as_os_str().is_empty() {
        if let Err(e) = config.load_sidecar(&sidecar) {
            warn!("settings file not loaded, continuing with defaults: {e:#}");
        }
    }
    config.apply_args(&args.threshold_tokens());

    let counter = Box::new(ProcSystemCounter::new(ProcPaths::default()));

    let power_events = if args.no_power_events {
        None
    } else {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            if let Err(e) = logind::watch_power_events(tx).await {
                warn!("power event listener unavailable: {e:#}");
            }
        });
        Some(rx)
    };

    let verdict = match run_monitor(&config, counter, power_events).await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("idle monitoring failed: {e:#}");
            std::process::exit(2);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&verdict) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                error!("failed to serialize verdict: {e}");
                std::process::exit(2);
            }
        }
    } else {
        println!("{}", if verdict.idle { "true" } else { "false" });
        println!();
        print!("{}", verdict.snapshot);
    }

    std::process::exit(verdict.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(input: &[&str]) -> Vec<String> {
        normalize_args(input.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_single_dash_flags_are_normalized() {
        assert_eq!(
            normalized(&["idlemon", "-cpu", "60", "-NETTHD", "10"]),
            vec!["idlemon", "--cpu", "60", "--netthd", "10"]
        );
    }

    #[test]
    fn test_slash_flags_are_normalized() {
        assert_eq!(normalized(&["idlemon", "/hdd", "30"]), vec!["idlemon", "--hdd", "30"]);
    }

    #[test]
    fn test_other_args_pass_through() {
        assert_eq!(
            normalized(&["idlemon", "--json", "-1", "--timeout", "-1"]),
            vec!["idlemon", "--json", "-1", "--timeout", "-1"]
        );
    }

    #[test]
    fn test_cli_args_parse_with_aliases() {
        let args = Args::parse_from(normalized(&[
            "idlemon", "-cputhd", "40", "-dur", "5", "-timeout", "-1",
        ]));
        assert_eq!(args.cpu.as_deref(), Some("40"));
        assert_eq!(args.duration.as_deref(), Some("5"));
        assert_eq!(args.timeout.as_deref(), Some("-1"));
    }

    #[test]
    fn test_threshold_tokens_round_trip() {
        let args = Args::parse_from(normalized(&["idlemon", "-cpu", "70"]));
        let mut config = Config::default();
        config.apply_args(&args.threshold_tokens());
        assert_eq!(config.cpu_thd, 70.0);
    }
}
