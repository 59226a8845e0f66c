use anyhow::{Context, Result};
use clap::Parser;
use label::RatioLabel;
use log::{info, warn};
use prettytable::{cell, row, Table};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use yolo_core::config::Config;

#[derive(Debug, Clone, Parser)]
enum Opts {
    /// Print the anchor templates.
    Anchors {
        /// configuration file
        config_file: PathBuf,
    },
    /// Encode ground truth labels and print assignment statistics.
    Encode {
        /// configuration file
        config_file: PathBuf,
        /// JSON file of per-image label lists in [xmin, ymin, xmax, ymax, class_id] rows
        label_file: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logger();

    match Opts::parse() {
        Opts::Anchors { config_file } => {
            anchors(config_file)?;
        }
        Opts::Encode {
            config_file,
            label_file,
        } => {
            encode(config_file, label_file)?;
        }
    }

    Ok(())
}

fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    match env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(log::LevelFilter::Info),
    };
    builder.init();
}

fn anchors(config_file: impl AsRef<Path>) -> Result<()> {
    let config = Config::open(config_file)?;
    let templates = config.anchor_templates()?;
    let grid_sizes = templates.grid_sizes(config.anchors.input_size)?;

    let mut table = Table::new();
    table.add_row(row!["level", "stride", "grid", "index", "w", "h"]);

    for (level, (&stride, [grid_h, grid_w])) in
        templates.strides().iter().zip(grid_sizes).enumerate()
    {
        for (index, size) in templates.scale_anchors(level).iter().enumerate() {
            table.add_row(row![
                level,
                stride,
                format!("{}x{}", grid_h, grid_w),
                index,
                size.w(),
                size.h(),
            ]);
        }
    }

    table.printstd();
    Ok(())
}

fn encode(config_file: impl AsRef<Path>, label_file: impl AsRef<Path>) -> Result<()> {
    let label_file = label_file.as_ref();
    let config = Config::open(config_file)?;
    let encoder = config.target_encoder()?;

    let label_lists: Vec<Vec<RatioLabel>> = {
        let text = fs::read_to_string(label_file)
            .with_context(|| format!("unable to read label file {}", label_file.display()))?;
        let rows: Vec<Vec<[f64; 5]>> = serde_json::from_str(&text)
            .with_context(|| format!("unable to parse label file {}", label_file.display()))?;
        parse_label_lists(rows)
    };

    let target = encoder.encode(config.anchors.input_size, &label_lists)?;
    let stats = target.stats();

    let mut table = Table::new();
    table.add_row(row!["level", "stride", "grid", "positive", "ignored"]);
    for (level, stat) in stats.iter().enumerate() {
        let [grid_h, grid_w] = stat.grid_size;
        table.add_row(row![
            level,
            stat.stride,
            format!("{}x{}", grid_h, grid_w),
            stat.num_positive,
            stat.num_ignored,
        ]);
    }
    table.printstd();

    let num_labels: usize = label_lists.iter().map(|labels| labels.len()).sum();
    info!(
        "encoded {} labels over {} images into {} positive anchors out of {} entries per image",
        num_labels,
        target.batch_size(),
        target.num_positive(),
        target.num_entries()
    );

    Ok(())
}

/// Parse per-image label rows, dropping invalid rows one by one.
fn parse_label_lists(rows: Vec<Vec<[f64; 5]>>) -> Vec<Vec<RatioLabel>> {
    rows.into_iter()
        .enumerate()
        .map(|(image_index, rows)| {
            rows.into_iter()
                .filter_map(|row| match RatioLabel::try_from(row) {
                    Ok(label) => Some(label),
                    Err(err) => {
                        warn!(
                            "drop invalid label {:?} in image {}: {}",
                            row, image_index, err
                        );
                        None
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_rows_do_not_drop_their_image() {
        let label_lists = parse_label_lists(vec![
            vec![[0.4, 0.4, 0.6, 0.6, 1.0], [0.6, 0.4, 0.4, 0.6, 0.0]],
            vec![[-0.5, -0.5, 1.5, 1.5, 0.0]],
            vec![[0.1, 0.2, 0.3, 0.4, 2.0]],
        ]);

        assert_eq!(label_lists.len(), 3);
        assert_eq!(label_lists[0].len(), 1);
        assert_eq!(label_lists[0][0].class, 1);
        assert!(label_lists[1].is_empty());
        assert_eq!(label_lists[2].len(), 1);
    }
}
