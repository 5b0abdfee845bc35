use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;

/// Upper bound for `--jobs`
pub const MAX_JOBS: usize = 64;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
        )?
        .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments (after the config file has been merged)
pub fn validate_inputs(args: &Args) -> Result<()> {
    if args.input_paths.is_empty() {
        return Err(anyhow::anyhow!(
            "No input given: pass -i/--input or set inputPaths in the config file"
        ));
    }

    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    if args.parse_extensions().is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }

    if !(0.0..=1.0).contains(&args.confidence_threshold) {
        return Err(anyhow::anyhow!(
            "Confidence threshold must be between 0.0 and 1.0, got: {}",
            args.confidence_threshold
        ));
    }

    if !(0.0..=1.0).contains(&args.nms_threshold) {
        return Err(anyhow::anyhow!(
            "NMS threshold must be between 0.0 and 1.0, got: {}",
            args.nms_threshold
        ));
    }

    if args.model_size == 0 {
        return Err(anyhow::anyhow!("Model input size must be greater than 0"));
    }

    if args.jobs > MAX_JOBS {
        return Err(anyhow::anyhow!(
            "Job count too high (max {}), got: {}",
            MAX_JOBS,
            args.jobs
        ));
    }

    match (&args.detector, args.sidecar) {
        (Some(_), true) => {
            return Err(anyhow::anyhow!(
                "--detector and --sidecar are mutually exclusive"
            ))
        }
        (None, false) => {
            return Err(anyhow::anyhow!(
                "No detector configured: pass --detector <PROGRAM> or --sidecar"
            ))
        }
        _ => {}
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_args(input: PathBuf) -> Args {
        Args {
            input_paths: vec![input],
            sidecar: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_has_valid_extension() {
        let extensions = vec!["jpg".to_string(), "png".to_string()];
        assert!(has_valid_extension(Path::new("a/IMG_01.JPG"), &extensions));
        assert!(has_valid_extension(Path::new("b.png"), &extensions));
        assert!(!has_valid_extension(Path::new("b.json"), &extensions));
        assert!(!has_valid_extension(Path::new("README"), &extensions));
    }

    #[test]
    fn test_validate_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_inputs(&valid_args(dir.path().to_path_buf())).is_ok());

        let missing = valid_args(dir.path().join("missing"));
        assert!(validate_inputs(&missing).is_err());

        let no_inputs = Args {
            sidecar: true,
            ..Default::default()
        };
        assert!(validate_inputs(&no_inputs).is_err());
    }

    #[test]
    fn test_validate_thresholds_and_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let base = || valid_args(dir.path().to_path_buf());

        let args = Args {
            confidence_threshold: 1.5,
            ..base()
        };
        assert!(validate_inputs(&args).is_err());

        let args = Args {
            nms_threshold: -0.1,
            ..base()
        };
        assert!(validate_inputs(&args).is_err());

        let args = Args {
            model_size: 0,
            ..base()
        };
        assert!(validate_inputs(&args).is_err());

        let args = Args {
            jobs: MAX_JOBS + 1,
            ..base()
        };
        assert!(validate_inputs(&args).is_err());

        let args = Args {
            extensions_str: " , ".to_string(),
            ..base()
        };
        assert!(validate_inputs(&args).is_err());
    }

    #[test]
    fn test_validate_detector_source() {
        let dir = tempfile::tempdir().unwrap();

        let none = Args {
            input_paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert!(validate_inputs(&none).is_err());

        let both = Args {
            detector: Some(PathBuf::from("find_subject")),
            ..valid_args(dir.path().to_path_buf())
        };
        assert!(validate_inputs(&both).is_err());

        let program = Args {
            input_paths: vec![dir.path().to_path_buf()],
            detector: Some(PathBuf::from("find_subject")),
            ..Default::default()
        };
        assert!(validate_inputs(&program).is_ok());
    }
}
