//! Скользящее окно замеров одной метрики (CPU, диск или сеть).
//!
//! Окно хранит не более `capacity` последних секундных замеров и отвечает
//! на единственный вопрос: держится ли среднее по окну ниже порога.
//! Содержимое окна имеет смысл только как непрерывная последовательность,
//! поэтому при любом перезапуске наблюдения окно сбрасывается целиком.

use std::collections::VecDeque;

/// Допуск при сравнении среднего с порогом.
///
/// Средние по счётчикам почти никогда не опускаются до ровного 0.00
/// (особенно у диска), поэтому порог сравнивается с небольшим запасом.
const THRESHOLD_EPSILON: f32 = 0.01;

/// Ограниченная FIFO-очередь последних замеров с проверкой порога.
///
/// Окно отключено, если порог отрицательный или ёмкость нулевая: такая
/// метрика не замеряется и не влияет на решение о простое.
#[derive(Debug)]
pub struct MetricWindow {
    threshold: f32,
    capacity: usize,
    samples: VecDeque<f32>,
    latest: f32,
    enabled: bool,
}

impl MetricWindow {
    pub fn new(threshold: f32, capacity: usize) -> Self {
        let enabled = threshold >= 0.0 && capacity > 0;
        Self {
            threshold,
            capacity,
            samples: VecDeque::with_capacity(if enabled { capacity } else { 0 }),
            latest: 0.0,
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_filled(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Последний записанный замер; 0, если окно пусто или отключено.
    pub fn latest(&self) -> f32 {
        if self.enabled && !self.samples.is_empty() {
            self.latest
        } else {
            0.0
        }
    }

    /// Добавить замер. У заполненного окна сначала вытесняется самый старый.
    pub fn enqueue(&mut self, value: f32) {
        if !self.enabled {
            return;
        }
        if self.is_filled() {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.latest = value;
    }

    /// Очистить окно и последний замер.
    pub fn reset(&mut self) {
        if !self.enabled {
            return;
        }
        self.samples.clear();
        self.latest = 0.0;
    }

    /// Среднее по текущим замерам; 0 для пустого окна.
    pub fn average(&self) -> f32 {
        if !self.enabled || self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().sum();
        sum / self.samples.len() as f32
    }

    /// Держится ли среднее по окну ниже порога.
    ///
    /// Отключённое окно всегда отвечает `true`. Незаполненное — всегда
    /// `false`: пока не накоплен полный интервал наблюдения, простой
    /// не подтверждается.
    pub fn is_under_threshold(&self) -> bool {
        if !self.enabled {
            return true;
        }
        if !self.is_filled() {
            return false;
        }
        self.average() < self.threshold + THRESHOLD_EPSILON
    }
}
