//! Суммарный дисковый обмен из `/proc/diskstats`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Размер сектора, в которых ядро считает поля `sectors read/written`.
const SECTOR_SIZE: u64 = 512;

/// Суммарные байты чтения и записи по физическим дискам с момента загрузки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskTotals {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl DiskTotals {
    pub fn transferred(&self) -> u64 {
        self.read_bytes + self.write_bytes
    }
}

/// Прочитать суммарный дисковый обмен из файла формата `/proc/diskstats`.
pub fn read_disk_totals(path: &Path) -> Result<DiskTotals> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_disk_totals(&contents))
}

fn parse_disk_totals(contents: &str) -> DiskTotals {
    let mut totals = DiskTotals::default();
    let mut disks: Vec<String> = Vec::new();

    for line in contents.lines() {
        // Формат строки: "8 0 sda reads merged sectors ms writes merged sectors ms ..."
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }
        let name = parts[2];

        // Виртуальные устройства и наложенные слои (dm/md) дублируют
        // обмен нижележащих дисков.
        if name.starts_with("loop")
            || name.starts_with("ram")
            || name.starts_with("zram")
            || name.starts_with("dm-")
            || name.starts_with("md")
        {
            continue;
        }

        // Разделы идут после родительского устройства (sda → sda1,
        // nvme0n1 → nvme0n1p1); считаем только целые диски, иначе тот же
        // обмен попадает в сумму дважды.
        if disks
            .iter()
            .any(|disk| name.len() > disk.len() && name.starts_with(disk.as_str()))
        {
            continue;
        }
        disks.push(name.to_string());

        let read_sectors = parts[5].parse::<u64>().unwrap_or(0);
        let write_sectors = parts[9].parse::<u64>().unwrap_or(0);
        totals.read_bytes += read_sectors * SECTOR_SIZE;
        totals.write_bytes += write_sectors * SECTOR_SIZE;
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "\
   7       0 loop0 100 0 8000 10 0 0 0 0 0 0 0
   8       0 sda 1000 0 2000 100 500 0 1000 50 0 0 0
   8       1 sda1 900 0 1800 90 400 0 800 40 0 0 0
 259       0 nvme0n1 300 0 600 30 200 0 400 20 0 0 0
 259       1 nvme0n1p1 300 0 600 30 200 0 400 20 0 0 0
 253       0 dm-0 300 0 600 30 200 0 400 20 0 0 0
";

    #[test]
    fn test_counts_whole_disks_only() {
        let totals = parse_disk_totals(DISKSTATS);
        // sda: 2000 + 1000 секторов, nvme0n1: 600 + 400; разделы, loop и dm
        // не учитываются.
        assert_eq!(totals.read_bytes, (2000 + 600) * SECTOR_SIZE);
        assert_eq!(totals.write_bytes, (1000 + 400) * SECTOR_SIZE);
        assert_eq!(totals.transferred(), 4600 * SECTOR_SIZE);
    }

    #[test]
    fn test_short_and_empty_lines_skipped() {
        let totals = parse_disk_totals("garbage\n8 0 sdb\n\n");
        assert_eq!(totals, DiskTotals::default());
    }
}
