use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

use portrait_crop::cli::Args;
use portrait_crop::image_processing::batch::{BatchProcessor, ProcessingStats};
use portrait_crop::image_processing::detection::{
    CommandDetector, SidecarDetector, SubjectDetector,
};
use portrait_crop::image_processing::{
    ImageOutcome, ProcessingConfig, ProcessingEngine, ProcessingResult,
};
use portrait_crop::json_output::JsonMessage;
use portrait_crop::report::CropReport;
use portrait_crop::utils::{
    create_progress_bar, error_println, format_duration, validate_inputs, verbose_println,
    warn_println,
};

fn build_detector(args: &Args) -> Result<Box<dyn SubjectDetector>> {
    if let Some(program) = &args.detector {
        let detector = CommandDetector::new(program, args.detector_args.clone())
            .with_context(|| format!("Invalid detector program: {}", program.display()))?;
        Ok(Box::new(detector))
    } else {
        Ok(Box::new(SidecarDetector::new(args.sidecar_dir.clone())))
    }
}

fn print_configuration(args: &Args, config: &ProcessingConfig, detector: &dyn SubjectDetector) {
    println!("{}", style("Configuration:").bold());
    println!("  Output directory: {}", args.output_dir.display());
    println!("  Detector: {}", detector.name());
    if let Some(program) = &args.detector {
        println!("    Program: {}", program.display());
        if !args.detector_args.is_empty() {
            println!("    Extra arguments: {:?}", args.detector_args);
        }
    }
    if let Some(dir) = &args.sidecar_dir {
        println!("    Report directory: {}", dir.display());
    }
    println!(
        "  Confidence threshold: {}",
        config.detection.confidence_threshold
    );
    println!("  NMS threshold: {}", config.detection.nms_threshold);
    println!("  Model input size: {}", config.detection.model_input_size);
    println!("  Parallel jobs: {}", config.parallel_jobs);
    println!("  Extensions: {:?}", config.extensions);
    println!("  Recursive: {}", config.recursive);
    if config.preview {
        println!("  Preview mode: enabled (overlays instead of crops)");
    }
    if config.force {
        println!("  Force: enabled (existing outputs are overwritten)");
    }
    if config.dry_run {
        println!("  Dry run mode: enabled (simulation only - no files will be created)");
    }
    println!();
}

fn print_summary(stats: &ProcessingStats, dry_run: bool) {
    let header = if dry_run {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    let cropped_label = if dry_run { "Would be cropped" } else { "Cropped" };
    println!("  {}: {}", cropped_label, style(stats.cropped).bold().green());

    if stats.skipped_existing > 0 {
        println!(
            "  Skipped (already exist): {}",
            style(stats.skipped_existing).bold().yellow()
        );
    }
    if stats.skipped_no_subjects > 0 {
        println!(
            "  Skipped (no subjects): {}",
            style(stats.skipped_no_subjects).bold().yellow()
        );
    }
    if stats.skipped_too_narrow > 0 {
        println!(
            "  Skipped (too narrow for 9:16): {}",
            style(stats.skipped_too_narrow).bold().yellow()
        );
    }
    if stats.failed > 0 {
        println!("  Failed: {}", style(stats.failed).bold().red());
    }

    println!();
    println!(
        "  Success rate: {}",
        style(format!("{:.1}%", stats.success_rate())).bold()
    );
    println!(
        "  Total time: {} ({} per image)",
        style(format_duration(stats.total_duration)).bold(),
        format_duration(stats.average_duration())
    );
}

fn emit_json_result(result: &Result<ProcessingResult>, input_path: &Path) {
    let message = match result {
        Ok(processed) => match &processed.outcome {
            ImageOutcome::Cropped { window, box_count } => JsonMessage::file_completed(
                input_path,
                processed.output_path.as_deref(),
                window,
                *box_count,
                processed.processing_time.as_millis() as u64,
            ),
            ImageOutcome::Skipped(reason) => JsonMessage::file_skipped(input_path, reason),
        },
        Err(e) => JsonMessage::file_failed(input_path, format!("{:#}", e)),
    };
    message.emit();
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;

    let json_mode = args.json_progress;
    let verbose = args.verbose && !json_mode;

    if !json_mode {
        println!("{}", style("Portrait Crop - 9:16 subject-aware cropping").bold().blue());
        println!();
        if let Some(config_path) = &args.config_file {
            verbose_println(
                verbose,
                &format!("Loaded configuration from: {}", config_path.display()),
            );
        }
    }

    validate_inputs(&args)?;

    let config = ProcessingConfig {
        detection: args.detection_options(),
        extensions: args.parse_extensions(),
        recursive: args.recursive,
        verbose,
        parallel_jobs: args.parallel_jobs(),
        force: args.force,
        preview: args.preview,
        dry_run: args.dry_run,
    };

    let detector = build_detector(&args)?;

    if verbose {
        print_configuration(&args, &config, detector.as_ref());
    }

    // Create output directory (skip in dry-run mode)
    if !config.dry_run {
        std::fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;
    } else {
        verbose_println(verbose, "Dry run mode: Skipping output directory creation");
    }

    let dry_run_mode = config.dry_run;
    let engine = ProcessingEngine::new(config, detector)?;

    let multi_progress = MultiProgress::new();
    let discovery_pb = if json_mode {
        ProgressBar::hidden()
    } else {
        multi_progress.add(ProgressBar::new(args.input_paths.len() as u64))
    };
    discovery_pb.set_style(
        ProgressStyle::with_template("{bar:20.green/blue} {pos:>2}/{len:2} {msg}")?
            .progress_chars("██▌ "),
    );
    discovery_pb.set_message("Scanning directories...");

    let image_files = engine.discover_images(&args.input_paths)?;
    discovery_pb.finish_with_message(format!("✓ Found {} images", image_files.len()));

    if image_files.is_empty() {
        if json_mode {
            JsonMessage::summary(&ProcessingStats::default()).emit();
        } else {
            warn_println("No images found with specified extensions");
        }
        return Ok(());
    }

    let main_progress = if json_mode {
        ProgressBar::hidden()
    } else {
        multi_progress.add(create_progress_bar(image_files.len() as u64)?)
    };
    main_progress.set_message("Cropping images");

    let results = engine.process_batch(
        &image_files,
        &args.output_dir,
        |processor: &BatchProcessor, input_path: &Path, result: &Result<ProcessingResult>| {
            if json_mode {
                emit_json_result(result, input_path);
                JsonMessage::progress(
                    processor.processed(),
                    processor.total_files,
                    processor.status_line(&format!("Processed {}", input_path.display())),
                );
            } else {
                let name = input_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                main_progress.set_message(processor.status_line(&name));
                main_progress.inc(1);
            }
        },
    )?;

    main_progress.finish_with_message("✓ Processing complete!");

    let stats = ProcessingStats::from_results(&results, start_time.elapsed());

    if json_mode {
        JsonMessage::summary(&stats).emit();
        return Ok(());
    }

    println!();

    for (input_path, result) in image_files.iter().zip(&results) {
        if let Err(e) = result {
            error_println(&format!("{}: {:#}", input_path.display(), e));
        }
    }

    print_summary(&stats, dry_run_mode);

    if args.report {
        CropReport::from_results(&image_files, &results).print();
    }

    Ok(())
}
