//! Сбор метрик загрузки хоста.
//!
//! - **cpu**: счётчики CPU из `/proc/stat` и дельта между снимками
//! - **disk**: суммарный обмен по физическим дискам из `/proc/diskstats`
//! - **net**: суммарный обмен по интерфейсам из `/proc/net/dev`
//! - **counter**: трейт `SystemCounter` и его реализации — `/proc`,
//!   фиксированные и скриптованные счётчики для тестов

pub mod counter;
pub mod cpu;
pub mod disk;
pub mod net;

pub use counter::{
    BitRate, ByteRate, ProcPaths, ProcSystemCounter, ScriptedCounter, StaticCounter,
    SystemCounter,
};
