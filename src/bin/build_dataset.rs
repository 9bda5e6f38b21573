use anyhow::Context;
use log::info;
use phin_dataset::dataset::{ByteTokenizer, DatasetFormat};
use phin_dataset::{DatasetBuilder, PipelineConfig};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input_dir = PathBuf::from(args.next().unwrap_or_else(|| "raw_audio".to_string()));
    let segment_first = args.any(|a| a == "--segment");

    if !input_dir.is_dir() {
        println!(
            "Input directory not found: {}. Please provide a directory of WAV files.",
            input_dir.display()
        );
        return Ok(());
    }

    // Collect source recordings in a stable order
    let mut sources: Vec<PathBuf> = std::fs::read_dir(&input_dir)
        .with_context(|| format!("reading {}", input_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "wav"))
        .collect();
    sources.sort();

    if sources.is_empty() {
        println!("No WAV files found in {}.", input_dir.display());
        return Ok(());
    }
    println!("Found {} audio files", sources.len());

    let config = PipelineConfig::default();
    let builder = DatasetBuilder::new(config)?;

    // Either feed whole recordings to the dataset or cut them into
    // overlapping windows first; both paths produce the same record shape.
    let units = if segment_first {
        info!("Segmenting sources before dataset assembly");
        let (segments, report) = builder.segment_sources(&sources)?;
        println!(
            "Wrote {} segments ({} skipped sources, {} write failures)",
            segments.len(),
            report.skipped_sources,
            report.segment_write_failures
        );
        segments
    } else {
        sources
    };

    println!("Building dataset over {} units...", units.len());
    let (dataset, report) = builder.build(&units);
    println!(
        "Assembled {} entries ({} skipped, {} fallback descriptions)",
        report.processed, report.skipped_sources, report.feature_failures
    );

    let json_path = builder.config().json_dataset_path();
    builder.export(&dataset, DatasetFormat::Json, &json_path, &ByteTokenizer)?;
    println!("Dataset created: {}", json_path.display());

    let jsonl_path = builder.config().jsonl_dataset_path();
    let skips = builder.export(
        &dataset,
        DatasetFormat::JsonlTokenized,
        &jsonl_path,
        &ByteTokenizer,
    )?;
    println!(
        "Tokenized dataset ready: {} ({} tokenizer skips)",
        jsonl_path.display(),
        skips
    );

    Ok(())
}
